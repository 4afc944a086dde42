//! JSON description of a sequencer setup: the attached boards and the encoder constants.
//!
//! ```json
//! {
//!   "devices": [{ "serial": "DACBRD00", "channels": 3 }],
//!   "encoder": { "rounding": "Truncate" }
//! }
//! ```
//! Omitted encoder fields take their [`EncoderConfig::sequencer`] values.

use serde::{Deserialize, Serialize};

use wvfcompiler_backend::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default)]
    pub devices: Vec<Board>,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl SequencerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validated registry of the configured boards, in listed order.
    ///
    /// Deserialization does not check serial numbers or channel counts, this does.
    pub fn registry(&self) -> CompilerResult<BoardRegistry> {
        BoardRegistry::from_pairs(
            self.devices
                .iter()
                .map(|board| (board.serial(), board.num_channels())),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_devices_and_partial_encoder() {
        let config = SequencerConfig::from_json(
            r#"{"devices": [{"serial": "DACBRD00", "channels": 3},
                            {"serial": "DACBRD01", "channels": 2}],
                "encoder": {"rounding": "Truncate", "free_run": true}}"#,
        )
        .unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.total_channels(), 5);
        assert_eq!(config.encoder.rounding, Rounding::Truncate);
        assert!(config.encoder.free_run);
        assert_eq!(config.encoder.full_scale, 65535);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(SequencerConfig::from_json("{}").unwrap(), SequencerConfig::default());
    }

    #[test]
    fn registry_validates_boards() {
        let config = SequencerConfig::from_json(
            r#"{"devices": [{"serial": "DACBRD00", "channels": 0}]}"#,
        )
        .unwrap();
        assert!(matches!(config.registry(), Err(CompilerError::NoChannels(_))));
    }
}
