//! Controller half of the USB waveform card backend.
//!
//! Re-exports everything of [`wvfcompiler_backend`], so programs are built with the same
//! [`BaseExperiment`] methods, and adds the [`Transport`] seam, the wire framing and the
//! transmitting [`Experiment`].

pub mod config;
pub mod device;
pub mod error;
pub mod experiment;
pub mod framer;
#[cfg(feature = "ftdi")]
pub mod ftd2xx;
#[cfg(feature = "python")]
mod python;
pub mod transport;

pub use wvfcompiler_backend::*;

pub use crate::config::SequencerConfig;
pub use crate::device::BoardConnections;
pub use crate::error::*;
pub use crate::experiment::Experiment;
pub use crate::framer::*;
#[cfg(feature = "ftdi")]
pub use crate::ftd2xx::FtdiTransport;
pub use crate::transport::*;
