//! Compiler half of the USB waveform card backend: board registry, program store and the
//! waveform / logic encoders. Nothing in this crate talks to hardware; see the
//! `wvfctrl_backend` crate for transmission.

pub mod config;
pub mod device;
pub mod error;
pub mod experiment;
pub mod logic;
pub mod store;
pub mod utils;
pub mod waveform;

pub use config::*;
pub use device::*;
pub use error::*;
pub use experiment::*;
pub use logic::*;
pub use store::*;
pub use utils::*;
pub use waveform::*;
