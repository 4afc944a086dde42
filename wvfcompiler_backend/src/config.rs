//! Hardware constants of the waveform cards, bundled into one [`EncoderConfig`] value.
//!
//! All times are in milliseconds and all voltages in volts. Two presets exist:
//! [`EncoderConfig::sequencer`] matches the current firmware (values rounded up) and
//! [`EncoderConfig::legacy`] matches the older console program, which truncated instead.
//!
//! The top of the 16-bit time range is reserved for op-codes, which is why
//! `max_line_time` sits well below `full_scale * device_tick`.

use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::utils::Rounding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Largest unsigned value of a DAC word
    pub full_scale: u32,
    pub min_voltage: f64,
    pub max_voltage: f64,
    /// DAC update period
    pub device_tick: f64,
    /// Shortest waveform line, set by the 4 clock cycles needed to load a line
    pub min_line_time: f64,
    pub max_line_time: f64,
    /// Logic port update period
    pub logic_tick: f64,
    pub min_logic_time: f64,
    pub max_logic_time: f64,
    pub rounding: Rounding,
    /// Ends every waveform step with the loop-to-start op-code so the card repeats
    /// the first waveform in memory.
    pub free_run: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::sequencer()
    }
}

impl EncoderConfig {
    pub fn sequencer() -> Self {
        Self {
            full_scale: 65535,
            min_voltage: 0.0,
            max_voltage: 10.0,
            device_tick: 0.0005,
            min_line_time: 0.002,
            max_line_time: 32.6,
            logic_tick: 0.0005,
            min_logic_time: 0.002,
            max_logic_time: 8000.0,
            rounding: Rounding::Ceil,
            free_run: false,
        }
    }

    pub fn legacy() -> Self {
        Self {
            rounding: Rounding::Truncate,
            ..Self::sequencer()
        }
    }

    pub fn with_free_run(mut self, free_run: bool) -> Self {
        self.free_run = free_run;
        self
    }

    /// Op-code which sends the card back to the first line in memory.
    pub fn loop_to_start(&self) -> i64 {
        self.full_scale as i64 - 2
    }

    /// Op-code which pauses the card until the next trigger.
    pub fn wait_for_trigger(&self) -> i64 {
        self.full_scale as i64 - 1
    }

    /// Checks that every interval maps to a non-zero tick count which does not collide
    /// with an op-code, and that every voltage maps to a code in `0..=full_scale`.
    pub fn validate(&self) -> CompilerResult<()> {
        let fail = |msg: String| Err(CompilerError::InvalidConfig(msg));
        if self.full_scale < 3 || self.full_scale > u16::MAX as u32 {
            return fail(format!(
                "full_scale {} must fit a 16-bit word and leave room for op-codes",
                self.full_scale
            ));
        }
        let constants = [
            self.min_voltage,
            self.max_voltage,
            self.device_tick,
            self.min_line_time,
            self.max_line_time,
            self.logic_tick,
            self.min_logic_time,
            self.max_logic_time,
        ];
        if constants.iter().any(|c| !c.is_finite()) {
            return fail(format!("non-finite constant in {:?}", self));
        }
        // Codes are unsigned, a negative voltage would wrap around
        if self.min_voltage < 0.0 {
            return fail(format!("min_voltage {} is below 0 V", self.min_voltage));
        }
        if !(self.device_tick > 0.0) || !(self.logic_tick > 0.0) {
            return fail(format!(
                "ticks must be positive (device_tick={}, logic_tick={})",
                self.device_tick, self.logic_tick
            ));
        }
        if !(self.max_voltage > self.min_voltage) || !(self.max_voltage > 0.0) {
            return fail(format!(
                "empty voltage range [{}, {}]",
                self.min_voltage, self.max_voltage
            ));
        }
        if self.min_line_time < self.device_tick || self.max_line_time < self.min_line_time {
            return fail(format!(
                "line time range [{}, {}] incompatible with device tick {}",
                self.min_line_time, self.max_line_time, self.device_tick
            ));
        }
        if self.min_logic_time < self.logic_tick || self.max_logic_time < self.min_logic_time {
            return fail(format!(
                "logic time range [{}, {}] incompatible with logic tick {}",
                self.min_logic_time, self.max_logic_time, self.logic_tick
            ));
        }
        let max_ticks = self.rounding.apply(self.max_line_time / self.device_tick);
        if max_ticks >= self.loop_to_start() {
            return fail(format!(
                "max_line_time {} gives {} ticks, which collides with op-code {}",
                self.max_line_time,
                max_ticks,
                self.loop_to_start()
            ));
        }
        let max_logic_ticks = self.rounding.apply(self.max_logic_time / self.logic_tick);
        if max_logic_ticks > 0xFF_FFFF {
            return fail(format!(
                "max_logic_time {} gives {} ticks, which does not fit 3 bytes",
                self.max_logic_time, max_logic_ticks
            ));
        }
        Ok(())
    }
}
