//! Sparse storage of encoded programs, keyed by global channel and step.
//!
//! A step is one segment of a channel's program, ended by a trigger-wait (or loop)
//! op-code. Steps are kept in ascending order since the card executes them in the
//! order they are written to memory.

use std::collections::BTreeMap;

use tracing::{debug, warn};

/// Selector meaning "every channel" or "every step" in [`WaveformStore::clear`].
pub const ALL: i64 = -1;

pub type StepBuffer = Vec<u8>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformStore {
    channels: BTreeMap<usize, BTreeMap<usize, StepBuffer>>,
}

impl WaveformStore {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }

    /// Returns the buffer of `(channel, step)`, creating an empty one if absent.
    pub fn ensure(&mut self, channel: usize, step: usize) -> &mut StepBuffer {
        self.channels
            .entry(channel)
            .or_default()
            .entry(step)
            .or_default()
    }

    pub fn append(&mut self, channel: usize, step: usize, bytes: &[u8]) {
        self.ensure(channel, step).extend_from_slice(bytes);
    }

    /// Removes stored program data.
    ///
    /// | `channel` | `step` | effect |
    /// |---|---|---|
    /// | `ALL` | any | empties the store |
    /// | `c` | `ALL` | removes channel `c` |
    /// | `c` | `s` | removes step `s` of channel `c` |
    ///
    /// Other negative selectors are ignored, as are channels and steps that hold no data.
    pub fn clear(&mut self, channel: i64, step: i64) {
        if channel == ALL {
            debug!("Clearing all channels");
            self.channels.clear();
            return;
        }
        if channel < ALL || step < ALL {
            warn!("Bad channel or step choice ({}, {}), nothing cleared", channel, step);
            return;
        }
        let channel = channel as usize;
        let Some(steps) = self.channels.get_mut(&channel) else {
            return;
        };
        if step == ALL {
            debug!("Clearing channel {}", channel);
            self.channels.remove(&channel);
            return;
        }
        if steps.remove(&(step as usize)).is_some() {
            debug!("Cleared step {} of channel {}", step, channel);
        }
        // A channel only exists while it holds at least one step
        if steps.is_empty() {
            self.channels.remove(&channel);
        }
    }

    /// Number of bytes stored across every step of `channel`.
    pub fn total_length(&self, channel: usize) -> usize {
        self.channels
            .get(&channel)
            .map_or(0, |steps| steps.values().map(|buf| buf.len()).sum())
    }

    /// Steps of `channel` in ascending order.
    pub fn steps(&self, channel: usize) -> impl Iterator<Item = (usize, &[u8])> {
        self.channels
            .get(&channel)
            .into_iter()
            .flat_map(|steps| steps.iter().map(|(&step, buf)| (step, buf.as_slice())))
    }

    pub fn step(&self, channel: usize, step: usize) -> Option<&[u8]> {
        self.channels
            .get(&channel)
            .and_then(|steps| steps.get(&step))
            .map(|buf| buf.as_slice())
    }

    /// The whole program of `channel`, steps concatenated in order.
    pub fn program(&self, channel: usize) -> Vec<u8> {
        self.steps(channel).flat_map(|(_, buf)| buf.iter().copied()).collect()
    }

    pub fn contains_channel(&self, channel: usize) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Channels holding at least one step, in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn filled() -> WaveformStore {
        let mut store = WaveformStore::new();
        store.append(0, 0, &[1, 2]);
        store.append(0, 1, &[3, 4, 5]);
        store.append(2, 0, &[6]);
        store
    }

    #[test]
    fn ensure_creates_empty_buffer() {
        let mut store = WaveformStore::new();
        assert!(store.ensure(3, 7).is_empty());
        assert!(store.contains_channel(3));
        assert_eq!(store.step(3, 7), Some(&[][..]));
        assert_eq!(store.total_length(3), 0);
    }

    #[test]
    fn append_preserves_prior_content() {
        let mut store = WaveformStore::new();
        store.append(1, 0, &[1, 2]);
        store.append(1, 0, &[3]);
        assert_eq!(store.step(1, 0), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn total_length_sums_steps() {
        let mut store = filled();
        assert_eq!(store.total_length(0), 5);
        assert_eq!(store.total_length(9), 0);
        store.clear(0, ALL);
        assert_eq!(store.total_length(0), 0);
        assert!(!store.contains_channel(0));
        assert!(store.contains_channel(2));
    }

    #[test]
    fn steps_iterate_in_ascending_order() {
        let mut store = WaveformStore::new();
        store.append(0, 5, &[5]);
        store.append(0, 1, &[1]);
        store.append(0, 3, &[3]);
        let order: Vec<usize> = store.steps(0).map(|(step, _)| step).collect();
        assert_eq!(order, vec![1, 3, 5]);
        assert_eq!(store.program(0), vec![1, 3, 5]);
        assert_eq!(store.steps(4).count(), 0);
    }

    #[test]
    fn clear_single_step() {
        let mut store = filled();
        store.clear(0, 1);
        assert_eq!(store.total_length(0), 2);
        // Missing step is a no-op
        store.clear(0, 9);
        assert_eq!(store.total_length(0), 2);
        // Removing the last step drops the channel
        store.clear(2, 0);
        assert!(!store.contains_channel(2));
        assert_eq!(store.channels().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn clear_everything() {
        let mut store = filled();
        store.clear(ALL, ALL);
        assert!(store.is_empty());

        let mut store = filled();
        store.clear(ALL, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_absent_channel_is_noop() {
        let mut store = WaveformStore::new();
        store.clear(2, ALL);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_ignores_bad_selectors() {
        let mut store = filled();
        store.clear(-2, ALL);
        store.clear(0, -5);
        store.clear(-7, 0);
        assert_eq!(store, filled());
    }
}
