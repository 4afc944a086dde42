// The "utils" module holds the byte packing, rounding and sample helpers shared by both encoders
use std::collections::HashMap;
use std::fmt;

use maplit::hashmap;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::*;

/// Float-to-integer conversion used when quantizing times, voltages and ramp slopes.
///
/// The current firmware expects values rounded up; the earlier console program
/// truncated towards zero instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    Ceil,
    Truncate,
}

impl Rounding {
    pub fn apply(&self, x: f64) -> i64 {
        match self {
            Rounding::Ceil => x.ceil() as i64,
            Rounding::Truncate => x.trunc() as i64,
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Rounding::Ceil => "ceil",
                Rounding::Truncate => "truncate",
            }
        )
    }
}

/// Appends the `nbytes` lowest bytes of `value` to `buf`, least significant byte first.
///
/// Negative values are written in two's complement, so `-1` packed on 4 bytes is `FF FF FF FF`.
pub fn push_le(buf: &mut Vec<u8>, value: i64, nbytes: usize) {
    let mut v = value as u64;
    for _ in 0..nbytes {
        buf.push(v as u8);
        v >>= 8;
    }
}

/// Reads back `bytes` as an unsigned little-endian integer. Inverse of [`push_le`] for
/// non-negative values.
pub fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

// Bit positions of the named lines on a board's logic port
fn logic_lines() -> HashMap<&'static str, u32> {
    hashmap! {
        "i" => 6,
        "d1" => 5,
        "d0" => 4,
        "l3" => 3,
        "l2" => 2,
        "l1" => 1,
        "l0" => 0,
    }
}

/// Builds a logic bitmask from line names, e.g. `["d0", "l1"]` gives `0b0001_0010`.
///
/// Naming a line twice sets it once.
pub fn logic_mask(lines: &[&str]) -> CompilerResult<u32> {
    let table = logic_lines();
    lines.iter().try_fold(0u32, |mask, name| {
        table
            .get(name)
            .map(|bit| mask | (1 << bit))
            .ok_or_else(|| CompilerError::UnknownLogicLine(name.to_string()))
    })
}

/// Zips three equal-length columns (times, start voltages, end voltages) into waveform samples.
pub fn waveform_samples_from_columns(
    times: ArrayView1<f64>,
    starts: ArrayView1<f64>,
    ends: ArrayView1<f64>,
) -> CompilerResult<Vec<crate::waveform::WaveformSample>> {
    if times.len() != starts.len() || times.len() != ends.len() {
        return Err(CompilerError::MismatchedColumns(format!(
            "{} times, {} start values, {} end values",
            times.len(),
            starts.len(),
            ends.len()
        )));
    }
    Ok(ndarray::Zip::from(&times)
        .and(&starts)
        .and(&ends)
        .map_collect(|&time, &start, &end| crate::waveform::WaveformSample::new(time, start, end))
        .to_vec())
}

/// Zips time and bitmask columns into logic samples.
pub fn logic_samples_from_columns(
    times: ArrayView1<f64>,
    masks: ArrayView1<u32>,
) -> CompilerResult<Vec<crate::logic::LogicSample>> {
    if times.len() != masks.len() {
        return Err(CompilerError::MismatchedColumns(format!(
            "{} times, {} masks",
            times.len(),
            masks.len()
        )));
    }
    Ok(times
        .iter()
        .zip(masks.iter())
        .map(|(&time, &mask)| crate::logic::LogicSample::new(time, mask))
        .collect())
}
