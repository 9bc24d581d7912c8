//! Request shaping in front of a [`SpeechProvider`]

use std::sync::Arc;

use super::provider::SpeechProvider;
use super::types::{AudioStream, SpeechRequest, SynthesisInput, Voice};
use crate::error::{Result, SpeechError};
use crate::settings::ProviderConfig;
use crate::voice::audio::AudioFormatSpec;

pub struct SpeechSynthesisClient {
    provider: Arc<dyn SpeechProvider>,
    config: ProviderConfig,
    format: AudioFormatSpec,
}

impl SpeechSynthesisClient {
    pub fn new(provider: Arc<dyn SpeechProvider>, config: ProviderConfig) -> Self {
        Self {
            provider,
            config,
            format: AudioFormatSpec::PCM_16K_MONO,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Fill in defaults and build the provider request for `req`
    pub fn build_input(&self, req: &SpeechRequest) -> Result<SynthesisInput> {
        let rate = req.speaking_rate_percent.unwrap_or(self.config.speed);
        if rate == 0 {
            return Err(SpeechError::InvalidRate(rate));
        }

        let voice = req
            .voice_id
            .clone()
            .unwrap_or_else(|| self.config.voice.clone());

        Ok(SynthesisInput {
            markup: speech_markup(&req.message, rate),
            voice,
            text_type: self.config.text_type.clone(),
            output_format: self.config.format.clone(),
            sample_rate_hz: self.format.sample_rate_hz,
        })
    }

    pub async fn synthesize(&self, req: SpeechRequest) -> Result<AudioStream> {
        let input = self.build_input(&req)?;
        tracing::debug!(
            voice = %input.voice,
            chars = req.message.chars().count(),
            "requesting speech synthesis"
        );

        self.provider
            .synthesize(&input)
            .await
            .map_err(SpeechError::Provider)
    }

    pub async fn list_voices(&self) -> Result<Vec<Voice>> {
        self.provider
            .list_voices()
            .await
            .map_err(SpeechError::Provider)
    }
}

/// Wrap `message` in an SSML prosody element. The text is carried as CDATA;
/// any `]]>` inside it is split across two sections so it stays literal.
pub fn speech_markup(message: &str, rate_percent: u32) -> String {
    let escaped = message.replace("]]>", "]]]]><![CDATA[>");
    format!(r#"<speak><prosody rate="{rate_percent}%"><![CDATA[{escaped}]]></prosody></speak>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_config;
    use crate::voice::mock::{MockSpeechProvider, MockSynthesisBehavior};
    use tokio::io::AsyncReadExt;

    fn client(provider: &MockSpeechProvider) -> SpeechSynthesisClient {
        SpeechSynthesisClient::new(Arc::new(provider.clone()), default_config())
    }

    #[test]
    fn test_speech_markup() {
        assert_eq!(
            speech_markup("Hello", 100),
            r#"<speak><prosody rate="100%"><![CDATA[Hello]]></prosody></speak>"#
        );
    }

    #[test]
    fn test_speech_markup_keeps_markup_literal() {
        let markup = speech_markup("</speak><break time=\"9s\"/>", 80);
        assert_eq!(
            markup,
            r#"<speak><prosody rate="80%"><![CDATA[</speak><break time="9s"/>]]></prosody></speak>"#
        );
    }

    #[test]
    fn test_speech_markup_cannot_close_cdata() {
        let markup = speech_markup("a]]><b/>", 100);
        assert_eq!(
            markup,
            r#"<speak><prosody rate="100%"><![CDATA[a]]]]><![CDATA[><b/>]]></prosody></speak>"#
        );
    }

    #[tokio::test]
    async fn test_defaults_fill_unset_fields() {
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(vec![1, 2, 3]));

        client(&provider)
            .synthesize(SpeechRequest::new("Hi"))
            .await
            .unwrap();

        let captured = provider.captured_inputs();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].voice, "Joanna");
        assert_eq!(captured[0].text_type, "ssml");
        assert_eq!(captured[0].output_format, "pcm");
        assert_eq!(captured[0].sample_rate_hz, 16_000);
        assert!(captured[0].markup.contains(r#"rate="100%""#));
    }

    #[tokio::test]
    async fn test_request_overrides_defaults() {
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(Vec::new()));

        client(&provider)
            .synthesize(SpeechRequest::new("Hi").with_voice("Matthew").with_rate(150))
            .await
            .unwrap();

        let captured = provider.captured_inputs();
        assert_eq!(captured[0].voice, "Matthew");
        assert!(captured[0].markup.contains(r#"rate="150%""#));
    }

    #[tokio::test]
    async fn test_zero_rate_rejected_before_request() {
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(Vec::new()));

        let err = client(&provider)
            .synthesize(SpeechRequest::new("Hi").with_rate(0))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SpeechError::InvalidRate(0)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_returned_unaltered() {
        let audio: Vec<u8> = (0..=255).collect();
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(audio.clone()));

        let mut stream = client(&provider)
            .synthesize(SpeechRequest::new("Hi"))
            .await
            .unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();

        assert_eq!(received, audio);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_once() {
        let provider =
            MockSpeechProvider::new(MockSynthesisBehavior::Error("ThrottlingException".into()));

        let err = client(&provider)
            .synthesize(SpeechRequest::new("Hi"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SpeechError::Provider(_)));
        assert!(err.to_string().contains("ThrottlingException"));
        assert_eq!(provider.call_count(), 1);
    }
}
