pub mod error;
pub mod narrator;
pub mod settings;
pub mod voice;

pub use error::{SpeechError, MAX_MESSAGE_CHARS};
pub use narrator::Narrator;
pub use settings::{default_config, ProviderConfig};
pub use voice::audio::controller::PlaybackController;
pub use voice::audio::device::{AudioContext, AudioDevice, AudioPlayer};
pub use voice::audio::AudioFormatSpec;
pub use voice::tts::client::SpeechSynthesisClient;
pub use voice::tts::provider::SpeechProvider;
pub use voice::tts::types::{AudioStream, SpeechRequest, SynthesisInput, Voice};

#[cfg(feature = "cpal-device")]
pub use voice::audio::cpal_device::CpalDevice;
