//! Capabilities the playback path needs from an audio output device.
//!
//! All calls are blocking. Contexts and players are created, used and closed
//! on a single thread, so only the device itself has to be shareable.

use anyhow::Result;

use super::AudioFormatSpec;

/// An audio output device that can be opened for one playback
pub trait AudioDevice: Send + Sync {
    /// Open an output context. `buffer_size_hint` is the total number of
    /// bytes that will be written.
    fn open(&self, format: AudioFormatSpec, buffer_size_hint: usize)
        -> Result<Box<dyn AudioContext>>;
}

/// An open output context
pub trait AudioContext {
    fn new_player(&mut self) -> Result<Box<dyn AudioPlayer>>;

    fn close(&mut self) -> Result<()>;
}

/// Sink for raw PCM bytes
pub trait AudioPlayer {
    /// Write audio, blocking until it has been handed to the device.
    /// Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn close(&mut self) -> Result<()>;
}
