//! Serialized playback of fully buffered audio
//!
//! A call to [`PlaybackController::play`] drains the whole input stream into
//! memory, opens the device sized for that buffer, writes it in one go and
//! closes everything again. Calls on the same controller never overlap.

use anyhow::{anyhow, Context};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

use super::device::{AudioContext, AudioDevice, AudioPlayer};
use super::AudioFormatSpec;
use crate::error::{Result, SpeechError};

/// Read size used while draining a synthesis stream
pub const DRAIN_CHUNK_SIZE: usize = 64 * 1024;

pub struct PlaybackController {
    device: Arc<dyn AudioDevice>,
    format: AudioFormatSpec,
    // tokio's mutex is fair, so waiting callers play in arrival order
    play_lock: Arc<Mutex<()>>,
}

impl PlaybackController {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self::with_format(device, AudioFormatSpec::PCM_16K_MONO)
    }

    pub fn with_format(device: Arc<dyn AudioDevice>, format: AudioFormatSpec) -> Self {
        Self {
            device,
            format,
            play_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn format(&self) -> AudioFormatSpec {
        self.format
    }

    /// Buffer `stream` to its end and play it. Holds the playback lock from
    /// the first read until the device is closed.
    pub async fn play<R>(&self, stream: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let guard = Arc::clone(&self.play_lock).lock_owned().await;

        let buffer = drain(stream).await?;
        tracing::debug!(
            bytes = buffer.len(),
            duration_ms = self.format.duration_of(buffer.len()).as_millis() as u64,
            "audio buffered"
        );

        let device = Arc::clone(&self.device);
        let format = self.format;

        // The guard moves with the device work so the lock outlives the
        // blocking task even if the caller stops polling.
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            play_buffer(device.as_ref(), format, &buffer)
        })
        .await
        .map_err(|e| SpeechError::Device(anyhow!("playback task failed: {e}")))?
    }
}

/// Read `stream` until end-of-input, returning every byte in order
pub async fn drain<R>(mut stream: R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; DRAIN_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return Ok(buffer),
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn play_buffer(device: &dyn AudioDevice, format: AudioFormatSpec, buffer: &[u8]) -> Result<()> {
    let mut session = PlaybackSession::open(device, format, buffer.len())?;
    let written = session.write_all(buffer);
    let closed = session.close();

    if written.is_ok() {
        tracing::info!(bytes = buffer.len(), "playback finished");
    }
    written.and(closed)
}

/// An open output context and its player. Both are closed when the session
/// is closed or dropped, player first.
struct PlaybackSession {
    context: Option<Box<dyn AudioContext>>,
    player: Option<Box<dyn AudioPlayer>>,
}

impl PlaybackSession {
    fn open(
        device: &dyn AudioDevice,
        format: AudioFormatSpec,
        buffer_size_hint: usize,
    ) -> Result<Self> {
        let context = device
            .open(format, buffer_size_hint)
            .context("Failed to open audio output")
            .map_err(SpeechError::Device)?;

        let mut session = Self {
            context: Some(context),
            player: None,
        };

        let player = match session.context.as_mut() {
            Some(context) => context.new_player(),
            None => Err(anyhow!("audio output already closed")),
        };
        session.player = Some(
            player
                .context("Failed to create audio player")
                .map_err(SpeechError::Device)?,
        );

        Ok(session)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let player = self
            .player
            .as_mut()
            .ok_or_else(|| SpeechError::Device(anyhow!("audio player already closed")))?;

        let written = player
            .write(data)
            .context("Failed to write audio")
            .map_err(SpeechError::Device)?;

        if written < data.len() {
            return Err(SpeechError::Device(anyhow!(
                "short write: {written} of {} bytes",
                data.len()
            )));
        }
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.release().map_err(SpeechError::Device)
    }

    fn release(&mut self) -> anyhow::Result<()> {
        let mut result = Ok(());

        if let Some(mut player) = self.player.take() {
            result = player.close().context("Failed to close audio player");
        }
        if let Some(mut context) = self.context.take() {
            let closed = context.close().context("Failed to close audio output");
            result = result.and(closed);
        }

        result
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = ?e, "failed to release audio output");
        }
    }
}
