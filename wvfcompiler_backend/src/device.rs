//! Implements the registry of USB waveform cards. See [`BoardRegistry`] for
//! implementation details.
//!
//! A control system consists of one or more FPGA cards, each attached through its own
//! FT245 USB bridge and identified by the bridge's serial number. Every card carries a
//! fixed number of output channels (typically two DACs and one logic port).
//!
//! ## Global channels
//! Channels are addressed by a single *global* index spanning all boards: boards are
//! laid out in registration order, and the channels of a board follow those of every
//! board registered before it. With boards `[("A", 3), ("B", 2)]`, global channels
//! `0..3` live on `A` and `3..5` on `B`, so global channel 4 is local channel 1 of `B`.
//!
//! ## Device lists
//! Boards are usually registered from a device list of the form
//! `"SERIAL COUNT SERIAL COUNT ..."`, see [`BoardRegistry::from_device_list`].

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::*;

/// Serial numbers are at most 8 characters; the USB bridge pads them with two nulls.
pub const SERIAL_LEN: usize = 8;

/// Local channels are selected by a single byte in the control frames.
pub const MAX_CHANNELS: usize = 256;

fn serial_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{1,8}$").expect("serial pattern compiles"))
}

fn count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+$").expect("count pattern compiles"))
}

/// One USB waveform card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    serial: String,
    #[serde(rename = "channels")]
    num_channels: usize,
}

impl Board {
    /// Creates a board after validating its serial number and channel count.
    pub fn new(serial: &str, num_channels: usize) -> CompilerResult<Self> {
        if !serial_pattern().is_match(serial) {
            return Err(CompilerError::InvalidSerial(serial.to_string()));
        }
        if num_channels == 0 {
            return Err(CompilerError::NoChannels(serial.to_string()));
        }
        if num_channels > MAX_CHANNELS {
            return Err(CompilerError::TooManyChannels {
                serial: serial.to_string(),
                num_channels,
            });
        }
        Ok(Self {
            serial: serial.to_string(),
            num_channels,
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }
}

/// Ordered collection of boards, keyed by serial number.
///
/// Registration order defines the global channel layout and never changes afterwards:
/// boards cannot be removed or resized once registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardRegistry {
    boards: IndexMap<String, Board>,
}

impl BoardRegistry {
    pub fn new() -> Self {
        Self {
            boards: IndexMap::new(),
        }
    }

    /// Builds a registry from `(serial, channel count)` pairs, in order.
    pub fn from_pairs<'a, I>(pairs: I) -> CompilerResult<Self>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut registry = Self::new();
        for (serial, num_channels) in pairs {
            registry.register(serial, num_channels)?;
        }
        Ok(registry)
    }

    /// Parses a whitespace-separated device list, alternating serial numbers and channel counts.
    ///
    /// # Example
    /// ```
    /// # use wvfcompiler_backend::*;
    /// let registry = BoardRegistry::from_device_list("DACBRD00 3 DACBRD01 3").unwrap();
    /// assert_eq!(registry.total_channels(), 6);
    /// assert!(BoardRegistry::from_device_list("DACBRD00").is_err());
    /// ```
    pub fn from_device_list(list: &str) -> CompilerResult<Self> {
        let tokens: Vec<&str> = list.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(CompilerError::MalformedDeviceList(format!(
                "{:?} has a serial number without a channel count",
                list
            )));
        }
        let mut registry = Self::new();
        for pair in tokens.chunks(2) {
            let (serial, count) = (pair[0], pair[1]);
            if !count_pattern().is_match(count) {
                return Err(CompilerError::MalformedDeviceList(format!(
                    "channel count {:?} of board {} is not a number",
                    count, serial
                )));
            }
            let num_channels = count.parse::<usize>().map_err(|_| {
                CompilerError::MalformedDeviceList(format!("channel count {:?} too large", count))
            })?;
            registry.register(serial, num_channels)?;
        }
        Ok(registry)
    }

    /// Registers a board and returns its board index.
    pub fn register(&mut self, serial: &str, num_channels: usize) -> CompilerResult<usize> {
        let board = Board::new(serial, num_channels)?;
        if self.boards.contains_key(serial) {
            return Err(CompilerError::DuplicateSerial(serial.to_string()));
        }
        self.boards.insert(serial.to_string(), board);
        let index = self.boards.len() - 1;
        debug!(
            "Registered board {} ({} channels) as board {}, global channels {}..{}",
            serial,
            num_channels,
            index,
            self.total_channels() - num_channels,
            self.total_channels()
        );
        Ok(index)
    }

    /// Maps a global channel to `(board index, local channel)`.
    pub fn resolve(&self, channel: usize) -> CompilerResult<(usize, usize)> {
        let mut local = channel;
        for (index, board) in self.boards.values().enumerate() {
            if local < board.num_channels() {
                return Ok((index, local));
            }
            local -= board.num_channels();
        }
        Err(CompilerError::ChannelOutOfRange {
            channel,
            total: self.total_channels(),
        })
    }

    /// Maps `(board index, local channel)` back to the global channel.
    pub fn global_channel(&self, board: usize, local: usize) -> CompilerResult<usize> {
        let target = self.board(board)?;
        if local >= target.num_channels() {
            return Err(CompilerError::LocalChannelOutOfRange {
                board,
                local,
                num_channels: target.num_channels(),
            });
        }
        let offset: usize = self
            .boards
            .values()
            .take(board)
            .map(|b| b.num_channels())
            .sum();
        Ok(offset + local)
    }

    pub fn board(&self, index: usize) -> CompilerResult<&Board> {
        self.boards
            .get_index(index)
            .map(|(_, board)| board)
            .ok_or(CompilerError::BoardOutOfRange {
                board: index,
                num_boards: self.boards.len(),
            })
    }

    pub fn board_by_serial(&self, serial: &str) -> Option<&Board> {
        self.boards.get(serial)
    }

    pub fn board_index(&self, serial: &str) -> Option<usize> {
        self.boards.get_index_of(serial)
    }

    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    pub fn num_boards(&self) -> usize {
        self.boards.len()
    }

    pub fn total_channels(&self) -> usize {
        self.boards.values().map(|b| b.num_channels()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}
