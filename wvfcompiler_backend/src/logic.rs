//! Encoding of logic port steps.
//!
//! A logic line is 4 bytes: the port bitmask, then the line duration in logic ticks on
//! 3 bytes, little endian. Unlike waveform samples, logic sample times are durations.

use tracing::debug;

use crate::config::EncoderConfig;
use crate::error::*;
use crate::store::WaveformStore;
use crate::utils::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicSample {
    /// Duration (ms) of the logic state
    pub time: f64,
    /// Port state, one bit per line. Only the low 8 bits reach the card.
    pub mask: u32,
}

impl LogicSample {
    pub fn new(time: f64, mask: u32) -> Self {
        Self { time, mask }
    }
}

// Expects a validated config
pub(crate) fn logic_tick_count(config: &EncoderConfig, duration: f64) -> i64 {
    let duration = duration.clamp(config.min_logic_time, config.max_logic_time);
    config.rounding.apply(duration / config.logic_tick)
}

/// Encodes `samples` as one logic step of `channel` and appends it to the store,
/// followed by the wait-for-trigger op-code. Returns the number of bytes appended.
pub fn encode_logic_step(
    store: &mut WaveformStore,
    config: &EncoderConfig,
    channel: usize,
    step: usize,
    samples: &[LogicSample],
) -> CompilerResult<usize> {
    config.validate()?;
    if let Some(index) = samples.iter().position(|s| !s.time.is_finite()) {
        return Err(CompilerError::NonFiniteSample { index });
    }

    let mut bytes = Vec::with_capacity(4 * samples.len() + 2);
    for sample in samples {
        bytes.push(sample.mask as u8);
        push_le(&mut bytes, logic_tick_count(config, sample.time), 3);
    }
    push_le(&mut bytes, config.wait_for_trigger(), 2);

    debug!(
        "Channel {} step {}: encoded {} logic lines into {} bytes",
        channel,
        step,
        samples.len(),
        bytes.len()
    );
    store.append(channel, step, &bytes);
    Ok(bytes.len())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn logic_line_layout() {
        let mut store = WaveformStore::new();
        let config = EncoderConfig::sequencer();
        let samples = [LogicSample::new(1.0, 0b0101), LogicSample::new(50.0, 0x40)];
        assert_eq!(encode_logic_step(&mut store, &config, 2, 0, &samples).unwrap(), 10);
        assert_eq!(
            store.program(2),
            // 2000 ticks, then 100000 = 0x0186A0 ticks
            vec![0x05, 0xD0, 0x07, 0x00, 0x40, 0xA0, 0x86, 0x01, 0xFE, 0xFF]
        );
    }

    #[test]
    fn times_are_durations_not_deltas() {
        let mut store = WaveformStore::new();
        let config = EncoderConfig::sequencer();
        let samples = [LogicSample::new(1.0, 1), LogicSample::new(1.0, 2)];
        encode_logic_step(&mut store, &config, 0, 0, &samples).unwrap();
        let bytes = store.program(0);
        assert_eq!(read_le(&bytes[1..4]), 2000);
        assert_eq!(read_le(&bytes[5..8]), 2000);
    }

    #[test]
    fn wide_masks_are_truncated() {
        let mut store = WaveformStore::new();
        let config = EncoderConfig::sequencer();
        encode_logic_step(&mut store, &config, 0, 0, &[LogicSample::new(1.0, 0x1FF)]).unwrap();
        assert_eq!(store.program(0)[0], 0xFF);
    }

    #[test]
    fn durations_are_clamped() {
        let config = EncoderConfig::sequencer();
        assert_eq!(logic_tick_count(&config, 0.0), 4);
        assert_eq!(logic_tick_count(&config, 1e9), 16_000_000);
    }

    #[test]
    fn non_finite_time_rejected() {
        let mut store = WaveformStore::new();
        let config = EncoderConfig::sequencer();
        let samples = [LogicSample::new(f64::INFINITY, 1)];
        let result = encode_logic_step(&mut store, &config, 0, 0, &samples);
        assert_eq!(result, Err(CompilerError::NonFiniteSample { index: 0 }));
        assert!(store.is_empty());
    }
}
