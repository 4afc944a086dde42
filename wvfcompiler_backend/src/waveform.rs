//! Encoding of piecewise-linear voltage waveforms into DAC program lines.
//!
//! Each waveform line is 8 bytes, little endian throughout (the FPGA reads the lower
//! word first):
//!
//! | bytes | content |
//! |---|---|
//! | 0..2 | duration in DAC ticks |
//! | 2..4 | start voltage as a `full_scale` code |
//! | 4..8 | per-tick slope, with 16 fractional bits |
//!
//! The card loads the start code into a 32-bit accumulator (integer part in the upper
//! word) and adds the slope once per tick, so slopes much smaller than one code per tick
//! still integrate to the right end voltage.

use tracing::debug;

use crate::config::EncoderConfig;
use crate::error::*;
use crate::store::WaveformStore;
use crate::utils::*;

/// One linear segment of a waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformSample {
    /// Absolute time (ms) at which the segment ends
    pub time: f64,
    /// Voltage at the start of the segment
    pub start: f64,
    /// Voltage reached at the end of the segment
    pub end: f64,
}

impl WaveformSample {
    pub fn new(time: f64, start: f64, end: f64) -> Self {
        Self { time, start, end }
    }

    /// A segment holding `value` until `time`.
    pub fn constant(time: f64, value: f64) -> Self {
        Self::new(time, value, value)
    }

    fn is_finite(&self) -> bool {
        self.time.is_finite() && self.start.is_finite() && self.end.is_finite()
    }
}

// The helpers below expect a validated config: `f64::clamp` panics on inverted bounds.

/// Number of DAC ticks for a segment of `interval` ms, after clamping the interval to
/// the allowed line times.
pub(crate) fn tick_count(config: &EncoderConfig, interval: f64) -> i64 {
    let interval = interval.clamp(config.min_line_time, config.max_line_time);
    config.rounding.apply(interval / config.device_tick)
}

/// DAC code of `voltage`, after clamping it to the output range.
pub(crate) fn voltage_code(config: &EncoderConfig, voltage: f64) -> i64 {
    let voltage = voltage.clamp(config.min_voltage, config.max_voltage);
    config
        .rounding
        .apply((voltage * config.full_scale as f64) / config.max_voltage)
}

/// Per-tick increment of the card's accumulator that ramps from `start` to `end` in `ticks` ticks.
///
/// Both voltages are clamped first. Negative slopes are returned as negative numbers and
/// packed in two's complement.
pub(crate) fn ramp_coefficient(config: &EncoderConfig, start: f64, end: f64, ticks: i64) -> i64 {
    debug_assert!(ticks > 0, "ramp over {} ticks", ticks);
    let start = start.clamp(config.min_voltage, config.max_voltage);
    let end = end.clamp(config.min_voltage, config.max_voltage);
    let full_scale = config.full_scale as f64;
    config.rounding.apply(
        (full_scale + 1.) * ((end - start) * full_scale) / (ticks as f64 * config.max_voltage),
    )
}

/// Encodes `samples` as one program step of `channel` and appends it to the store.
///
/// Sample times are absolute: each line lasts from the previous sample's time (0 for the
/// first) to its own. The step ends with the loop op-code when the configuration is
/// free-running, and always with the wait-for-trigger op-code.
///
/// Returns the number of bytes appended. Samples containing NaN or infinities, and
/// configurations failing [`EncoderConfig::validate`], are rejected and leave the store
/// untouched.
///
/// # Example
/// ```
/// # use wvfcompiler_backend::*;
/// let mut store = WaveformStore::new();
/// let config = EncoderConfig::sequencer();
/// encode_waveform_step(&mut store, &config, 0, 0, &[WaveformSample::constant(1.0, 5.0)]).unwrap();
/// assert_eq!(
///     store.step(0, 0).unwrap(),
///     &[0xD0, 0x07, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFF]
/// );
/// ```
pub fn encode_waveform_step(
    store: &mut WaveformStore,
    config: &EncoderConfig,
    channel: usize,
    step: usize,
    samples: &[WaveformSample],
) -> CompilerResult<usize> {
    config.validate()?;
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(CompilerError::NonFiniteSample { index });
    }

    let mut bytes = Vec::with_capacity(8 * samples.len() + 4);
    let mut last_time = 0.;
    for sample in samples {
        let ticks = tick_count(config, sample.time - last_time);
        push_le(&mut bytes, ticks, 2);
        last_time = sample.time;

        push_le(&mut bytes, voltage_code(config, sample.start), 2);
        push_le(
            &mut bytes,
            ramp_coefficient(config, sample.start, sample.end, ticks),
            4,
        );
    }
    if config.free_run {
        push_le(&mut bytes, config.loop_to_start(), 2);
    }
    push_le(&mut bytes, config.wait_for_trigger(), 2);

    debug!(
        "Channel {} step {}: encoded {} waveform lines into {} bytes",
        channel,
        step,
        samples.len(),
        bytes.len()
    );
    store.append(channel, step, &bytes);
    Ok(bytes.len())
}
