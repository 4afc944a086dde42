//! # Transmitting programs to the cards with the `experiment` module
//!
//! This module extends the compile-only [`wvfcompiler_backend::Experiment`] with a
//! [`Transport`] and the connection state of the registered boards. Programs are built with
//! the [`BaseExperiment`] methods exactly as in the compiler crate, then:
//!
//! 1. [`Experiment::connect`] opens every registered board.
//! 2. [`Experiment::transmit`] loads one channel's program into its card (or
//!    [`Experiment::transmit_all`] for every programmed channel).
//! 3. [`Experiment::trigger`] starts playback; [`Experiment::run`] does both.
//!
//! Transmission never modifies the store, so a channel can be transmitted again at any
//! time. Boards still open when the experiment is dropped are closed.
//!
//! ```
//! use wvfctrl_backend::*;
//!
//! let mut exp = Experiment::new(RecordingTransport::new());
//! exp.add_board("BOARD0", 3).unwrap();
//! exp.waveform(0, 0, &[WaveformSample::new(1.0, 5.0, 5.0)]).unwrap();
//! exp.connect().unwrap();
//! exp.run(0).unwrap();
//! assert_eq!(exp.transport().frames().len(), 4);
//! ```

use tracing::{debug, info};

use wvfcompiler_backend::*;
use wvfcompiler_backend::impl_exp_boilerplate;

use crate::device::BoardConnections;
use crate::error::*;
use crate::framer::*;
use crate::transport::Transport;

pub struct Experiment<T: Transport> {
    registry: BoardRegistry,
    store: WaveformStore,
    config: EncoderConfig,
    transport: T,
    connections: BoardConnections,
}

impl_exp_boilerplate!(<T: Transport> Experiment<T>);

impl<T: Transport> Experiment<T> {
    /// An experiment with no boards, the default encoder configuration and no open connections.
    pub fn new(transport: T) -> Self {
        Self::assemble(
            BoardRegistry::new(),
            WaveformStore::new(),
            EncoderConfig::default(),
            transport,
        )
    }

    pub fn with_config(transport: T, config: EncoderConfig) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self::assemble(
            BoardRegistry::new(),
            WaveformStore::new(),
            config,
            transport,
        ))
    }

    /// Takes over the boards, programs and configuration of a compile-only experiment.
    pub fn from_compiled(compiled: &wvfcompiler_backend::Experiment, transport: T) -> Self {
        Self::assemble(
            compiled.registry().clone(),
            compiled.store().clone(),
            compiled.config().clone(),
            transport,
        )
    }

    // Drop forbids struct update syntax on this type
    fn assemble(
        registry: BoardRegistry,
        store: WaveformStore,
        config: EncoderConfig,
        transport: T,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            transport,
            connections: BoardConnections::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Opens every registered board that is not open yet.
    ///
    /// Fails with [`ControlError::DeviceNotFound`] on the first board that cannot be opened.
    pub fn connect(&mut self) -> ControlResult<()> {
        self.connections.open_all(&self.registry, &mut self.transport)
    }

    /// Closes every open board and returns how many closed cleanly.
    pub fn disconnect(&mut self) -> usize {
        self.connections.close_all(&mut self.transport)
    }

    /// True when every registered board is open.
    pub fn is_connected(&self) -> bool {
        self.registry
            .boards()
            .all(|board| self.connections.is_connected(board.serial()))
    }

    fn serial_of(&self, board: usize) -> ControlResult<String> {
        Ok(self.registry.board(board)?.serial().to_string())
    }

    /// Loads the program of global channel `channel` into its card.
    ///
    /// A channel without program data is a successful no-op. Otherwise the init frame,
    /// every non-empty step in ascending order and the end-of-memory frame are written;
    /// the first failed write aborts with [`ControlError::TransmitFailed`].
    pub fn transmit(&mut self, channel: usize) -> ControlResult<()> {
        if !self.store.contains_channel(channel) {
            debug!("Channel {} holds no program, nothing to transmit", channel);
            return Ok(());
        }
        let (board, local) = self.resolve(channel)?;
        let serial = self.serial_of(board)?;
        let Some(frames) = program_frames(&self.store, channel, local)? else {
            return Ok(());
        };
        for frame in &frames {
            self.connections.write(&mut self.transport, &serial, frame)?;
        }
        info!(
            "Transmitted channel {} ({} bytes) to board {} channel {}",
            channel,
            self.store.total_length(channel),
            serial,
            local
        );
        Ok(())
    }

    /// Starts playback of global channel `channel`.
    pub fn trigger(&mut self, channel: usize) -> ControlResult<()> {
        let (board, local) = self.resolve(channel)?;
        let serial = self.serial_of(board)?;
        self.connections
            .write(&mut self.transport, &serial, &run_frame(local))?;
        info!("Triggered board {} channel {}", serial, local);
        Ok(())
    }

    /// Transmits every programmed channel in ascending order, stopping at the first failure.
    pub fn transmit_all(&mut self) -> ControlResult<()> {
        for channel in self.programmed_channels() {
            self.transmit(channel)?;
        }
        Ok(())
    }

    /// [`transmit`](Experiment::transmit) followed by [`trigger`](Experiment::trigger).
    pub fn run(&mut self, channel: usize) -> ControlResult<()> {
        self.transmit(channel)?;
        self.trigger(channel)
    }
}

impl<T: Transport> Drop for Experiment<T> {
    fn drop(&mut self) {
        if !self.connections.is_empty() {
            self.disconnect();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::RecordingTransport;

    fn connected() -> Experiment<RecordingTransport> {
        let mut exp = Experiment::new(RecordingTransport::new());
        exp.add_device_list("DACBRD00 3 DACBRD01 3").unwrap();
        exp.connect().unwrap();
        exp
    }

    #[test]
    fn transmit_writes_to_owning_board() {
        let mut exp = connected();
        exp.constant(4, 0, 5.0).unwrap();
        exp.transmit(4).unwrap();
        let frames = exp.transport().frames_for("DACBRD01");
        assert_eq!(frames[0], &init_frame(1, 5)[..]);
        assert_eq!(frames.len(), 3);
        assert!(exp.transport().frames_for("DACBRD00").is_empty());
    }

    #[test]
    fn transmit_empty_channel_sends_nothing() {
        let mut exp = connected();
        exp.transmit(2).unwrap();
        // Not even a registered channel, but there is nothing to send either
        exp.transmit(42).unwrap();
        assert!(exp.transport().frames().is_empty());
    }

    #[test]
    fn trigger_out_of_range() {
        let mut exp = connected();
        assert!(matches!(
            exp.trigger(6),
            Err(ControlError::Compiler(CompilerError::ChannelOutOfRange { channel: 6, total: 6 }))
        ));
    }

    #[test]
    fn transmit_requires_connection() {
        let mut exp = Experiment::new(RecordingTransport::new());
        exp.add_board("DACBRD00", 3).unwrap();
        exp.constant(0, 0, 1.0).unwrap();
        assert_eq!(
            exp.transmit(0),
            Err(ControlError::NotConnected("DACBRD00".to_string()))
        );
        assert!(!exp.is_connected());
    }

    #[test]
    fn transmit_stops_at_first_failure() {
        let mut exp = connected();
        exp.constant(0, 0, 1.0).unwrap();
        exp.constant(0, 1, 2.0).unwrap();
        // Init frame and first step succeed
        exp.transport_mut().fail_after(2);
        assert!(matches!(
            exp.transmit(0),
            Err(ControlError::TransmitFailed { .. })
        ));
        assert_eq!(exp.transport().frames().len(), 2);
        // The store is untouched, so a retry rebuilds the same frames
        exp.transport_mut().clear_frames();
        exp.transmit(0).unwrap();
        assert_eq!(exp.transport().frames().len(), 4);
    }

    #[test]
    fn failed_init_frame_sends_nothing_else() {
        let mut exp = connected();
        exp.constant(0, 0, 1.0).unwrap();
        exp.transport_mut().fail_after(0);
        assert!(matches!(
            exp.transmit(0),
            Err(ControlError::TransmitFailed { ref serial, .. }) if serial == "DACBRD00"
        ));
        assert!(exp.transport().frames().is_empty());
    }

    #[test]
    fn failed_end_frame_is_reported() {
        let mut exp = connected();
        exp.constant(0, 0, 1.0).unwrap();
        exp.constant(0, 1, 2.0).unwrap();
        // Init frame and both steps succeed
        exp.transport_mut().fail_after(1 + 2);
        assert!(matches!(
            exp.transmit(0),
            Err(ControlError::TransmitFailed { .. })
        ));
        let frames = exp.transport().frames_for("DACBRD00");
        assert_eq!(frames.len(), 3);
        assert!(!frames.contains(&&end_frame()[..]));
    }

    #[test]
    fn failed_trigger_is_reported() {
        let mut exp = connected();
        exp.constant(3, 0, 1.0).unwrap();
        exp.transmit(3).unwrap();
        exp.transport_mut().fail_after(0);
        assert!(matches!(
            exp.trigger(3),
            Err(ControlError::TransmitFailed { ref serial, .. }) if serial == "DACBRD01"
        ));
        assert_eq!(exp.transport().frames_for("DACBRD01").len(), 3);
    }

    #[test]
    fn run_stops_before_trigger_on_failed_transmit() {
        let mut exp = connected();
        exp.constant(0, 0, 1.0).unwrap();
        exp.transport_mut().fail_after(1);
        assert!(exp.run(0).is_err());
        assert!(!exp
            .transport()
            .frames_for("DACBRD00")
            .contains(&&run_frame(0)[..]));
    }

    #[test]
    fn transmit_all_in_channel_order() {
        let mut exp = connected();
        exp.constant(5, 0, 1.0).unwrap();
        exp.constant(1, 0, 1.0).unwrap();
        exp.transmit_all().unwrap();
        let serials: Vec<&str> = exp
            .transport()
            .frames()
            .iter()
            .map(|f| f.serial.as_str())
            .collect();
        assert_eq!(
            serials,
            ["DACBRD00", "DACBRD00", "DACBRD00", "DACBRD01", "DACBRD01", "DACBRD01"]
        );
    }

    #[test]
    fn disconnect_closes_boards() {
        let mut exp = connected();
        assert!(exp.is_connected());
        assert_eq!(exp.disconnect(), 2);
        assert!(!exp.is_connected());
        assert_eq!(exp.transport().closed_serials(), vec!["DACBRD00", "DACBRD01"]);
    }

    #[test]
    fn from_compiled_keeps_programs() {
        let mut compiled = wvfcompiler_backend::Experiment::new();
        compiled.add_board("BOARD0", 3).unwrap();
        compiled.constant(2, 0, 1.0).unwrap();
        let exp = Experiment::from_compiled(&compiled, RecordingTransport::new());
        assert_eq!(exp.channel_program(2), compiled.channel_program(2));
    }
}
