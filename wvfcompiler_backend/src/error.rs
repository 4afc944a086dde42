//! Error type shared by the registry, the encoders and the experiment façade.

/// Errors raised while registering boards or encoding channel programs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompilerError {
    #[error("Channel {channel} out of range: {total} channels registered")]
    ChannelOutOfRange { channel: usize, total: usize },

    #[error("Board {board} has no local channel {local} ({num_channels} channels)")]
    LocalChannelOutOfRange {
        board: usize,
        local: usize,
        num_channels: usize,
    },

    #[error("Board index {board} out of range: {num_boards} boards registered")]
    BoardOutOfRange { board: usize, num_boards: usize },

    #[error("Invalid serial number {0:?}: expected 1 to 8 alphanumeric characters")]
    InvalidSerial(String),

    #[error("Board {0} already registered")]
    DuplicateSerial(String),

    #[error("Board {0} must have at least one channel")]
    NoChannels(String),

    #[error("Board {serial} has {num_channels} channels, a card addresses at most 256")]
    TooManyChannels { serial: String, num_channels: usize },

    #[error("Malformed device list: {0}")]
    MalformedDeviceList(String),

    #[error("Sample {index} contains a non-finite value")]
    NonFiniteSample { index: usize },

    #[error("Invalid encoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample columns differ in length: {0}")]
    MismatchedColumns(String),

    #[error("Unknown logic line {0:?}")]
    UnknownLogicLine(String),
}

pub type CompilerResult<T> = Result<T, CompilerError>;
