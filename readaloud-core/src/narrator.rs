//! Read short messages aloud: synthesize, then play through the local device

use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::error::{Result, SpeechError, MAX_MESSAGE_CHARS};
use crate::settings::{default_config, ProviderConfig};
use crate::voice::audio::controller::PlaybackController;
use crate::voice::audio::device::AudioDevice;
use crate::voice::tts::aws_polly::PollyProvider;
use crate::voice::tts::client::SpeechSynthesisClient;
use crate::voice::tts::provider::SpeechProvider;
use crate::voice::tts::types::{AudioStream, SpeechRequest, Voice};

/// Entry point tying a speech provider to an audio device. Synthesis calls
/// may run concurrently; playback is serialized per instance.
pub struct Narrator {
    client: SpeechSynthesisClient,
    controller: PlaybackController,
}

impl Narrator {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        device: Arc<dyn AudioDevice>,
        config: Option<ProviderConfig>,
    ) -> Self {
        let config = config.unwrap_or_else(default_config);
        Self {
            client: SpeechSynthesisClient::new(provider, config),
            controller: PlaybackController::new(device),
        }
    }

    /// Narrator backed by AWS Polly with a static key pair. Fails before any
    /// client is built when either key is empty.
    pub fn with_polly(
        access_key: &str,
        secret_key: &str,
        config: Option<ProviderConfig>,
        device: Arc<dyn AudioDevice>,
    ) -> Result<Self> {
        let config = config.unwrap_or_else(default_config);
        let provider = PollyProvider::new(access_key, secret_key, &config)?;
        Ok(Self::new(Arc::new(provider), device, Some(config)))
    }

    pub fn config(&self) -> &ProviderConfig {
        self.client.config()
    }

    /// Read `message` aloud with the configured voice and speed.
    ///
    /// Playback failures are returned to the caller along with validation
    /// and provider failures.
    pub async fn read_aloud(&self, message: &str) -> Result<()> {
        self.speak(SpeechRequest::new(message)).await
    }

    /// Like [`Narrator::read_aloud`] with a per-call voice and speed
    pub async fn speak(&self, req: SpeechRequest) -> Result<()> {
        validate_message(&req.message)?;

        let stream = self.client.synthesize(req).await?;
        self.controller.play(stream).await
    }

    /// Synthesize without playing
    pub async fn send_to_server(&self, req: SpeechRequest) -> Result<AudioStream> {
        self.client.synthesize(req).await
    }

    /// Play an already synthesized stream
    pub async fn play<R>(&self, stream: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.controller.play(stream).await
    }

    pub async fn list_voices(&self) -> Result<Vec<Voice>> {
        self.client.list_voices().await
    }
}

fn validate_message(message: &str) -> Result<()> {
    let length = message.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(SpeechError::MessageTooLong { length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::mock::{
        DeviceEvent, MockAudioDevice, MockDeviceBehavior, MockSpeechProvider,
        MockSynthesisBehavior,
    };
    use rstest::rstest;

    fn narrator(provider: &MockSpeechProvider, device: &MockAudioDevice) -> Narrator {
        Narrator::new(Arc::new(provider.clone()), Arc::new(device.clone()), None)
    }

    #[rstest]
    #[case::empty(0, true)]
    #[case::short(12, true)]
    #[case::at_limit(1500, true)]
    #[case::over_limit(1501, false)]
    #[case::far_over(4000, false)]
    fn test_validate_message_length(#[case] chars: usize, #[case] valid: bool) {
        let message = "a".repeat(chars);
        assert_eq!(validate_message(&message).is_ok(), valid);
    }

    #[test]
    fn test_length_counts_code_points() {
        // 1500 three-byte characters is 4500 bytes
        let message = "語".repeat(1500);
        assert!(validate_message(&message).is_ok());

        let message = "語".repeat(1501);
        assert!(matches!(
            validate_message(&message),
            Err(SpeechError::MessageTooLong { length: 1501 })
        ));
    }

    #[tokio::test]
    async fn test_1501_chars_rejected_without_network() {
        let provider = MockSpeechProvider::default();
        let device = MockAudioDevice::default();

        let err = narrator(&provider, &device)
            .read_aloud(&"x".repeat(1501))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("1501"));
        assert_eq!(provider.call_count(), 0);
        assert!(device.events().is_empty());
    }

    #[tokio::test]
    async fn test_read_aloud_plays_synthesized_audio() {
        let audio: Vec<u8> = (0..500u32).map(|i| i as u8).collect();
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(audio.clone()));
        let device = MockAudioDevice::default();

        narrator(&provider, &device)
            .read_aloud(&"y".repeat(1500))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(device.written(), vec![audio]);
        assert_eq!(device.events().last(), Some(&DeviceEvent::ContextClose));
    }

    #[tokio::test]
    async fn test_read_aloud_uses_config_defaults() {
        let provider = MockSpeechProvider::default();
        let device = MockAudioDevice::default();
        let config = ProviderConfig {
            voice: "Brian".to_string(),
            speed: 90,
            ..default_config()
        };
        let narrator = Narrator::new(
            Arc::new(provider.clone()),
            Arc::new(device.clone()),
            Some(config),
        );

        narrator.read_aloud("Hello").await.unwrap();

        let captured = provider.captured_inputs();
        assert_eq!(captured[0].voice, "Brian");
        assert!(captured[0].markup.contains(r#"rate="90%""#));
    }

    #[tokio::test]
    async fn test_provider_error_skips_playback() {
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Error(
            "UnrecognizedClientException".to_string(),
        ));
        let device = MockAudioDevice::default();

        let err = narrator(&provider, &device)
            .read_aloud("Hello")
            .await
            .unwrap_err();

        assert!(matches!(err, SpeechError::Provider(_)));
        assert!(device.events().is_empty());
    }

    #[tokio::test]
    async fn test_playback_error_is_returned() {
        let provider = MockSpeechProvider::default();
        let device = MockAudioDevice::new(MockDeviceBehavior::FailOpen);

        let err = narrator(&provider, &device)
            .read_aloud("Hello")
            .await
            .unwrap_err();

        assert!(matches!(err, SpeechError::Device(_)));
    }

    #[tokio::test]
    async fn test_send_to_server_then_play() {
        let provider = MockSpeechProvider::new(MockSynthesisBehavior::Audio(vec![5; 32]));
        let device = MockAudioDevice::default();
        let narrator = narrator(&provider, &device);

        let stream = narrator
            .send_to_server(SpeechRequest::new("Hi").with_voice("Ivy"))
            .await
            .unwrap();
        assert!(device.events().is_empty());

        narrator.play(stream).await.unwrap();
        assert_eq!(device.written(), vec![vec![5; 32]]);
        assert_eq!(provider.captured_inputs()[0].voice, "Ivy");
    }

    #[test]
    fn test_with_polly_rejects_empty_key() {
        let device = MockAudioDevice::default();
        let result = Narrator::with_polly("", "secret", None, Arc::new(device));
        assert!(matches!(result, Err(SpeechError::Credentials)));
    }

    #[tokio::test]
    async fn test_list_voices() {
        let narrator = narrator(&MockSpeechProvider::default(), &MockAudioDevice::default());
        let voices = narrator.list_voices().await.unwrap();
        assert_eq!(voices[0].id, "Joanna");
    }
}
