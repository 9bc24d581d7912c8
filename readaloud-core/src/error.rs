use thiserror::Error;

/// Longest message, in Unicode code points, that may be read aloud in one call.
pub const MAX_MESSAGE_CHARS: usize = 1500;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Config error: {0:#}")]
    Config(anyhow::Error),

    #[error("Access key or secret key is empty")]
    Credentials,

    #[error(
        "message size is {length}. Please pass with the length of {max} or less",
        max = MAX_MESSAGE_CHARS
    )]
    MessageTooLong { length: usize },

    #[error("speaking rate must be greater than 0, got {0}")]
    InvalidRate(u32),

    #[error("Provider error: {0:#}")]
    Provider(anyhow::Error),

    #[error("Failed to read audio stream: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Device error: {0:#}")]
    Device(anyhow::Error),
}

impl From<serde_yaml::Error> for SpeechError {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Config(anyhow::anyhow!(source))
    }
}

pub type Result<T, E = SpeechError> = std::result::Result<T, E>;
