//! AWS Polly text-to-speech implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_polly::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_polly::types::{OutputFormat, TextType, VoiceId};
use aws_sdk_polly::Client;

use super::provider::SpeechProvider;
use super::types::{AudioStream, SynthesisInput, Voice};
use crate::error::SpeechError;
use crate::settings::ProviderConfig;

/// AWS Polly provider. The audio comes back as a streaming binary body
/// that is handed on without being collected.
pub struct PollyProvider {
    client: Client,
}

impl PollyProvider {
    /// Create a client from a static access key / secret key pair. No request
    /// is made until the first synthesis.
    pub fn new(
        access_key: &str,
        secret_key: &str,
        config: &ProviderConfig,
    ) -> Result<Self, SpeechError> {
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(SpeechError::Credentials);
        }

        let credentials = Credentials::new(access_key, secret_key, None, None, "readaloud-static");
        let sdk_config = aws_sdk_polly::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();

        tracing::debug!(region = %config.region, "polly client created");

        Ok(Self {
            client: Client::from_conf(sdk_config),
        })
    }

    /// Create a client from the default AWS credential chain, optionally
    /// pinned to a named profile
    pub async fn from_env(profile: Option<&str>, config: &ProviderConfig) -> Self {
        let mut aws_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = profile {
            aws_config_loader = aws_config_loader.profile_name(profile);
        }

        aws_config_loader = aws_config_loader.region(Region::new(config.region.clone()));

        let aws_config = aws_config_loader.load().await;
        Self {
            client: Client::new(&aws_config),
        }
    }
}

#[async_trait]
impl SpeechProvider for PollyProvider {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<AudioStream> {
        let response = self
            .client
            .synthesize_speech()
            .text(&input.markup)
            .text_type(TextType::from(input.text_type.as_str()))
            .voice_id(VoiceId::from(input.voice.as_str()))
            .output_format(OutputFormat::from(input.output_format.as_str()))
            .sample_rate(input.sample_rate_hz.to_string())
            .send()
            .await
            .context("Failed to synthesize speech")?;

        tracing::debug!(
            content_type = ?response.content_type,
            request_characters = response.request_characters,
            "polly synthesis started"
        );

        Ok(Box::new(Box::pin(response.audio_stream.into_async_read())))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        let response = self
            .client
            .describe_voices()
            .send()
            .await
            .context("Failed to list voices")?;

        let voices = response
            .voices
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| {
                let id = v.id?.as_str().to_string();
                let name = v.name?;
                let language_code = v.language_code?.as_str().to_string();
                Some(Voice {
                    id,
                    name,
                    language_code,
                })
            })
            .collect();

        Ok(voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_config;

    #[test]
    fn test_empty_access_key_rejected() {
        let result = PollyProvider::new("", "secret", &default_config());
        assert!(matches!(result, Err(SpeechError::Credentials)));
    }

    #[test]
    fn test_empty_secret_key_rejected() {
        let result = PollyProvider::new("AKIDEXAMPLE", "", &default_config());
        assert!(matches!(result, Err(SpeechError::Credentials)));
    }

    #[tokio::test]
    async fn test_static_credentials_build_without_network() {
        let result = PollyProvider::new("AKIDEXAMPLE", "secret", &default_config());
        assert!(result.is_ok());
    }
}
