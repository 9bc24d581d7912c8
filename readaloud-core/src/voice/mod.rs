pub mod audio;
pub mod mock;
pub mod tts;
