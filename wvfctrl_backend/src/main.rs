use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wvfctrl_backend::*;

/// Loads a constant voltage step into one channel of the waveform cards and starts it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Device list, "SERIAL COUNT SERIAL COUNT ...". Appended after the boards of --config.
    #[arg(short, long)]
    devices: Option<String>,

    /// JSON sequencer configuration (boards and encoder constants)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Global channel to program
    #[arg(long, default_value_t = 0)]
    channel: usize,

    /// Voltage of the constant step
    #[arg(long, default_value_t = 0.0)]
    voltage: f64,

    /// Only transmit, do not send the run command
    #[arg(long)]
    no_run: bool,

    /// Record frames in memory instead of opening USB devices
    #[arg(long)]
    dry_run: bool,
}

#[cfg(feature = "ftdi")]
fn hardware_transport() -> anyhow::Result<Box<dyn Transport>> {
    Ok(Box::new(FtdiTransport::new()))
}

#[cfg(not(feature = "ftdi"))]
fn hardware_transport() -> anyhow::Result<Box<dyn Transport>> {
    bail!("built without the ftdi feature, use --dry-run")
}

fn load_config(args: &Args) -> anyhow::Result<SequencerConfig> {
    let Some(path) = &args.config else {
        return Ok(SequencerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    SequencerConfig::from_json(&json)
        .with_context(|| format!("parsing configuration {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let transport: Box<dyn Transport> = if args.dry_run {
        Box::new(RecordingTransport::new())
    } else {
        hardware_transport()?
    };

    let mut exp = Experiment::with_config(transport, config.encoder.clone())?;
    for board in config.registry()?.boards() {
        exp.add_board(board.serial(), board.num_channels())?;
    }
    if let Some(devices) = &args.devices {
        exp.add_device_list(devices)?;
    }
    if exp.registry().is_empty() {
        bail!("no boards given, pass --devices or --config");
    }

    let step = exp.next_step(args.channel);
    exp.constant(args.channel, step, args.voltage)?;
    let (board, local) = exp.resolve(args.channel)?;
    info!(
        "Channel {} (board {} local channel {}) step {}: {} V",
        args.channel, board, local, step, args.voltage
    );

    exp.connect()?;
    if args.no_run {
        exp.transmit(args.channel)?;
    } else {
        exp.run(args.channel)?;
    }
    exp.disconnect();
    Ok(())
}
