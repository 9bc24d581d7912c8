use anyhow::Result;
use async_trait::async_trait;

use super::types::{AudioStream, SynthesisInput, Voice};

/// Trait for cloud text-to-speech services
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Issue one synthesis request. The call is all-or-nothing and is never
    /// retried.
    async fn synthesize(&self, input: &SynthesisInput) -> Result<AudioStream>;

    /// List available voices
    async fn list_voices(&self) -> Result<Vec<Voice>>;
}
