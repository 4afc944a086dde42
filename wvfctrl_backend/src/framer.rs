//! Control frames of the card's USB protocol.
//!
//! Loading a channel's memory is a three part exchange: an init frame selecting the
//! channel, resetting the write address and announcing the burst length in 16-bit words,
//! then the raw program bytes, then the end-of-memory frame. A separate run frame starts
//! playback of a loaded channel.
//!
//! | Frame | Bytes |
//! |---|---|
//! | init | `04 <local> 03 00 00 00 <len_lo> <len_hi> 02` |
//! | end of memory | `01 FF FF` |
//! | run | `04 <local> 05` |

use wvfcompiler_backend::{WaveformStore, MAX_CHANNELS};

use crate::error::*;

pub const SELECT_CHANNEL: u8 = 0x04;
pub const SET_ADDRESS: u8 = 0x03;
pub const BURST_LENGTH: u8 = 0x00;
pub const BEGIN_BURST: u8 = 0x02;
pub const END_OF_MEMORY: u8 = 0x01;
pub const RUN: u8 = 0x05;

/// Largest program, in 16-bit words, the burst length field can announce.
pub const MAX_PROGRAM_WORDS: usize = u16::MAX as usize;

/// `local` must be below [`MAX_CHANNELS`], which board registration guarantees.
pub fn init_frame(local: usize, words: u16) -> [u8; 9] {
    debug_assert!(local < MAX_CHANNELS, "local channel {} does not fit a byte", local);
    let [len_lo, len_hi] = words.to_le_bytes();
    [
        SELECT_CHANNEL,
        local as u8,
        SET_ADDRESS,
        0x00,
        0x00,
        BURST_LENGTH,
        len_lo,
        len_hi,
        BEGIN_BURST,
    ]
}

pub fn end_frame() -> [u8; 3] {
    [END_OF_MEMORY, 0xFF, 0xFF]
}

pub fn run_frame(local: usize) -> [u8; 3] {
    debug_assert!(local < MAX_CHANNELS, "local channel {} does not fit a byte", local);
    [SELECT_CHANNEL, local as u8, RUN]
}

/// Every frame needed to load `channel` of `store` into local channel `local` of its card,
/// in write order. Returns `None` when the store holds nothing for the channel.
///
/// Steps are emitted in ascending order and empty steps are skipped.
pub fn program_frames(
    store: &WaveformStore,
    channel: usize,
    local: usize,
) -> ControlResult<Option<Vec<Vec<u8>>>> {
    if !store.contains_channel(channel) {
        return Ok(None);
    }
    let words = store.total_length(channel) / 2;
    if words > MAX_PROGRAM_WORDS {
        return Err(ControlError::ProgramTooLong { channel, words });
    }

    let mut frames = vec![init_frame(local, words as u16).to_vec()];
    frames.extend(
        store
            .steps(channel)
            .filter(|(_, bytes)| !bytes.is_empty())
            .map(|(_, bytes)| bytes.to_vec()),
    );
    frames.push(end_frame().to_vec());
    Ok(Some(frames))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_frames() {
        assert_eq!(init_frame(1, 0x0102), [0x04, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0x01, 0x02]);
        assert_eq!(end_frame(), [0x01, 0xFF, 0xFF]);
        assert_eq!(run_frame(2), [0x04, 0x02, 0x05]);
    }

    #[test]
    fn absent_channel_has_no_frames() {
        assert_eq!(program_frames(&WaveformStore::new(), 0, 0), Ok(None));
    }

    #[test]
    fn steps_framed_in_order() {
        let mut store = WaveformStore::new();
        store.append(3, 2, &[0xCC, 0xCC]);
        store.append(3, 0, &[0xAA, 0xAA, 0xAA, 0xAA]);
        store.ensure(3, 1);
        let frames = program_frames(&store, 3, 0).unwrap().unwrap();
        assert_eq!(
            frames,
            vec![
                init_frame(0, 3).to_vec(),
                vec![0xAA, 0xAA, 0xAA, 0xAA],
                vec![0xCC, 0xCC],
                end_frame().to_vec(),
            ]
        );
    }

    #[test]
    fn oversized_program_refused() {
        let mut store = WaveformStore::new();
        store.append(0, 0, &vec![0u8; 2 * (MAX_PROGRAM_WORDS + 1)]);
        assert_eq!(
            program_frames(&store, 0, 0),
            Err(ControlError::ProgramTooLong {
                channel: 0,
                words: MAX_PROGRAM_WORDS + 1
            })
        );
    }
}
