//! The experiment module provides the highest level of abstraction for building waveform
//! card programs.
//!
//! ## Overview
//!
//! An experiment owns three pieces of state:
//! 1. A [`BoardRegistry`] describing the connected cards and how global channels map onto them.
//! 2. A [`WaveformStore`] holding the encoded program of every (channel, step).
//! 3. An [`EncoderConfig`] with the hardware constants used for encoding.
//!
//! Its behavior is defined by the [`BaseExperiment`] trait through default trait
//! implementations, so that other crates (e.g. the controller crate, which adds USB
//! transmission) can define their own experiment structs and reuse every method with the
//! [`impl_exp_boilerplate`] macro.
//!
//! ## Steps
//!
//! A channel's program is a sequence of *steps*. Each call to [`BaseExperiment::waveform`]
//! or [`BaseExperiment::logic`] appends one complete step (ending with a wait-for-trigger
//! op-code) to the given step number. When the card is triggered it plays the next step and
//! pauses again. [`BaseExperiment::next_step`] gives the first unused step number of a
//! channel, which is how sequences are usually built up.

use crate::config::*;
use crate::device::*;
use crate::error::*;
use crate::logic::*;
use crate::store::*;
use crate::waveform::*;

/// This trait defines the behavior of the [`Experiment`] struct through default trait implementations.
///
/// Trait methods are classified into the following categories:
/// 1. Field methods, implemented by [`impl_exp_boilerplate`]:
///     - [`registry`], [`registry_`], [`store`], [`store_`], [`config`]
/// 2. Board methods:
///     - [`add_board`], [`add_device_list`], [`resolve`], [`board_channel`], [`check_channel`]
/// 3. Encoding methods, which append one step to a channel's program:
///     - [`waveform`], [`constant`], [`logic`]
/// 4. Program queries and cleanup:
///     - [`channel_total_length`], [`channel_program`], [`channel_steps`], [`next_step`],
///       [`programmed_channels`], [`clear`]
///
/// [`registry`]: BaseExperiment::registry
/// [`registry_`]: BaseExperiment::registry_
/// [`store`]: BaseExperiment::store
/// [`store_`]: BaseExperiment::store_
/// [`config`]: BaseExperiment::config
/// [`add_board`]: BaseExperiment::add_board
/// [`add_device_list`]: BaseExperiment::add_device_list
/// [`resolve`]: BaseExperiment::resolve
/// [`board_channel`]: BaseExperiment::board_channel
/// [`check_channel`]: BaseExperiment::check_channel
/// [`waveform`]: BaseExperiment::waveform
/// [`constant`]: BaseExperiment::constant
/// [`logic`]: BaseExperiment::logic
/// [`channel_total_length`]: BaseExperiment::channel_total_length
/// [`channel_program`]: BaseExperiment::channel_program
/// [`channel_steps`]: BaseExperiment::channel_steps
/// [`next_step`]: BaseExperiment::next_step
/// [`programmed_channels`]: BaseExperiment::programmed_channels
/// [`clear`]: BaseExperiment::clear
pub trait BaseExperiment {
    // FIELD methods
    fn registry(&self) -> &BoardRegistry;
    fn registry_(&mut self) -> &mut BoardRegistry;
    fn store(&self) -> &WaveformStore;
    fn store_(&mut self) -> &mut WaveformStore;
    fn config(&self) -> &EncoderConfig;

    /// Registers a board at the end of the channel layout and returns its board index.
    ///
    /// # Example
    /// ```
    /// # use wvfcompiler_backend::*;
    /// let mut exp = Experiment::new();
    /// assert_eq!(exp.add_board("DACBRD00", 3).unwrap(), 0);
    /// assert_eq!(exp.add_board("DACBRD01", 3).unwrap(), 1);
    /// // Serial numbers are unique
    /// assert!(exp.add_board("DACBRD00", 2).is_err());
    /// ```
    fn add_board(&mut self, serial: &str, num_channels: usize) -> CompilerResult<usize> {
        self.registry_().register(serial, num_channels)
    }

    /// Registers every board of a `"SERIAL COUNT SERIAL COUNT ..."` list.
    ///
    /// The list is fully parsed before anything is registered, so a malformed list leaves
    /// the experiment unchanged. Boards already registered under the same serial are
    /// still an error.
    fn add_device_list(&mut self, list: &str) -> CompilerResult<()> {
        let parsed = BoardRegistry::from_device_list(list)?;
        if let Some(dup) = parsed
            .boards()
            .find(|b| self.registry().board_by_serial(b.serial()).is_some())
        {
            return Err(CompilerError::DuplicateSerial(dup.serial().to_string()));
        }
        for board in parsed.boards() {
            self.registry_().register(board.serial(), board.num_channels())?;
        }
        Ok(())
    }

    /// Maps a global channel to `(board index, local channel)`.
    fn resolve(&self, channel: usize) -> CompilerResult<(usize, usize)> {
        self.registry().resolve(channel)
    }

    /// Global channel of local channel `local` on board `board`.
    ///
    /// # Example
    /// ```
    /// # use wvfcompiler_backend::*;
    /// let mut exp = Experiment::new();
    /// exp.add_device_list("DACBRD00 3 DACBRD01 3").unwrap();
    /// // Logic port (local channel 2) of the second board
    /// assert_eq!(exp.board_channel(1, 2).unwrap(), 5);
    /// ```
    fn board_channel(&self, board: usize, local: usize) -> CompilerResult<usize> {
        self.registry().global_channel(board, local)
    }

    /// Fails with [`CompilerError::ChannelOutOfRange`] unless `channel` exists on a registered board.
    fn check_channel(&self, channel: usize) -> CompilerResult<()> {
        self.resolve(channel).map(|_| ())
    }

    /// Encodes a waveform step. See [`encode_waveform_step`] for the encoding itself.
    ///
    /// Returns the number of bytes appended to the program.
    fn waveform(
        &mut self,
        channel: usize,
        step: usize,
        samples: &[WaveformSample],
    ) -> CompilerResult<usize> {
        self.check_channel(channel)?;
        let config = self.config().clone();
        encode_waveform_step(self.store_(), &config, channel, step, samples)
    }

    /// Encodes a step which sets the channel to a constant `voltage` and waits.
    ///
    /// The single line has zero duration, which is clamped to the shortest line the card accepts.
    fn constant(&mut self, channel: usize, step: usize, voltage: f64) -> CompilerResult<usize> {
        self.waveform(channel, step, &[WaveformSample::constant(0., voltage)])
    }

    /// Encodes a logic step. See [`encode_logic_step`].
    fn logic(
        &mut self,
        channel: usize,
        step: usize,
        samples: &[LogicSample],
    ) -> CompilerResult<usize> {
        self.check_channel(channel)?;
        let config = self.config().clone();
        encode_logic_step(self.store_(), &config, channel, step, samples)
    }

    /// Removes program data, see [`WaveformStore::clear`] for the selector rules.
    /// `clear(ALL, ALL)` empties every channel.
    fn clear(&mut self, channel: i64, step: i64) {
        self.store_().clear(channel, step);
    }

    fn channel_total_length(&self, channel: usize) -> usize {
        self.store().total_length(channel)
    }

    /// Bytes that will be written to the card's memory for `channel`, steps in order.
    fn channel_program(&self, channel: usize) -> Vec<u8> {
        self.store().program(channel)
    }

    fn channel_steps(&self, channel: usize) -> Vec<usize> {
        self.store().steps(channel).map(|(step, _)| step).collect()
    }

    /// First step number after every step of `channel` (0 for an empty channel).
    fn next_step(&self, channel: usize) -> usize {
        self.store()
            .steps(channel)
            .last()
            .map_or(0, |(step, _)| step + 1)
    }

    fn programmed_channels(&self) -> Vec<usize> {
        self.store().channels().collect()
    }
}

/// The compile-only experiment: builds programs without any hardware attached.
#[derive(Debug, Clone, Default)]
pub struct Experiment {
    registry: BoardRegistry,
    store: WaveformStore,
    config: EncoderConfig,
}

/// A macro to implement the field methods of [`BaseExperiment`].
///
/// The struct must have `registry: BoardRegistry`, `store: WaveformStore` and
/// `config: EncoderConfig` fields. Generic structs list their parameters first.
///
/// Usage:
/// ```rust
/// use wvfcompiler_backend::*;
///
/// struct CustomExperiment {
///     registry: BoardRegistry,
///     store: WaveformStore,
///     config: EncoderConfig,
///     name: String,
/// }
/// impl_exp_boilerplate!(CustomExperiment);
///
/// let mut exp = CustomExperiment {
///     registry: BoardRegistry::new(),
///     store: WaveformStore::new(),
///     config: EncoderConfig::default(),
///     name: "bench".to_string(),
/// };
/// exp.add_board("DACBRD00", 3).unwrap();
/// exp.constant(1, 0, 2.5).unwrap();
/// assert_eq!(exp.channel_total_length(1), 10);
/// ```
#[macro_export]
macro_rules! impl_exp_boilerplate {
    (@fields) => {
        fn registry(&self) -> &$crate::device::BoardRegistry {
            &self.registry
        }
        fn registry_(&mut self) -> &mut $crate::device::BoardRegistry {
            &mut self.registry
        }
        fn store(&self) -> &$crate::store::WaveformStore {
            &self.store
        }
        fn store_(&mut self) -> &mut $crate::store::WaveformStore {
            &mut self.store
        }
        fn config(&self) -> &$crate::config::EncoderConfig {
            &self.config
        }
    };
    (<$($param: ident : $bound: path),+> $exp_type: ty) => {
        impl<$($param: $bound),+> $crate::experiment::BaseExperiment for $exp_type {
            $crate::impl_exp_boilerplate!(@fields);
        }
    };
    ($exp_type: ty) => {
        impl $crate::experiment::BaseExperiment for $exp_type {
            $crate::impl_exp_boilerplate!(@fields);
        }
    };
}

impl_exp_boilerplate!(Experiment);

impl Experiment {
    /// An experiment with no boards and the default ([`EncoderConfig::sequencer`]) configuration.
    pub fn new() -> Self {
        Self {
            registry: BoardRegistry::new(),
            store: WaveformStore::new(),
            config: EncoderConfig::default(),
        }
    }

    /// An experiment with no boards, encoding with `config`.
    pub fn with_config(config: EncoderConfig) -> CompilerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn with_registry(registry: BoardRegistry, config: EncoderConfig) -> CompilerResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            store: WaveformStore::new(),
            config,
        })
    }
}
