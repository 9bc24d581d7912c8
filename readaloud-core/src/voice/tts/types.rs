use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// Synthesized audio as returned by a provider, not yet buffered
pub type AudioStream = Box<dyn AsyncRead + Send + Unpin>;

/// A message to synthesize. Unset fields fall back to the provider config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechRequest {
    pub message: String,
    pub voice_id: Option<String>,
    pub speaking_rate_percent: Option<u32>,
}

impl SpeechRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn with_rate(mut self, speaking_rate_percent: u32) -> Self {
        self.speaking_rate_percent = Some(speaking_rate_percent);
        self
    }
}

/// Fully resolved request handed to a [`super::provider::SpeechProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisInput {
    /// SSML document wrapping the message
    pub markup: String,
    pub voice: String,
    pub text_type: String,
    pub output_format: String,
    pub sample_rate_hz: u32,
}

/// Voice offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language_code: String,
}
