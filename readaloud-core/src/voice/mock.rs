//! In-memory speech provider and audio device for tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::audio::device::{AudioContext, AudioDevice, AudioPlayer};
use super::audio::AudioFormatSpec;
use super::tts::provider::SpeechProvider;
use super::tts::types::{AudioStream, SynthesisInput, Voice};

/// Mock behavior for the mock speech provider
#[derive(Debug, Clone)]
pub enum MockSynthesisBehavior {
    /// Return these bytes as the audio stream
    Audio(Vec<u8>),
    /// Fail every request with this message
    Error(String),
}

impl Default for MockSynthesisBehavior {
    fn default() -> Self {
        Self::Audio(vec![0; 500])
    }
}

/// Mock speech provider that records every request it receives, and how
/// many were in flight at once
#[derive(Clone, Default)]
pub struct MockSpeechProvider {
    behavior: Arc<Mutex<MockSynthesisBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_inputs: Arc<Mutex<Vec<SynthesisInput>>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSpeechProvider {
    pub fn new(behavior: MockSynthesisBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            ..Default::default()
        }
    }

    /// Make each request take `delay`, standing in for network latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_behavior(&self, behavior: MockSynthesisBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Highest number of requests running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn captured_inputs(&self) -> Vec<SynthesisInput> {
        self.captured_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<AudioStream> {
        *self.call_count.lock().unwrap() += 1;
        self.captured_inputs.lock().unwrap().push(input.clone());

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            MockSynthesisBehavior::Audio(bytes) => Ok(Box::new(Cursor::new(bytes))),
            MockSynthesisBehavior::Error(message) => Err(anyhow!(message)),
        }
    }

    async fn list_voices(&self) -> Result<Vec<Voice>> {
        Ok(vec![Voice {
            id: "Joanna".to_string(),
            name: "Joanna".to_string(),
            language_code: "en-US".to_string(),
        }])
    }
}

/// Calls observed by [`MockAudioDevice`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Open { buffer_size_hint: usize },
    NewPlayer,
    Write { len: usize },
    PlayerClose,
    ContextClose,
}

/// Failure injection for [`MockAudioDevice`]
#[derive(Debug, Clone, Default)]
pub enum MockDeviceBehavior {
    #[default]
    Success,
    FailOpen,
    FailNewPlayer,
    FailWrite,
    /// Accept only the first `accept` bytes of each write
    ShortWrite { accept: usize },
    PanicOnWrite,
}

#[derive(Default)]
struct DeviceState {
    behavior: Mutex<MockDeviceBehavior>,
    events: Mutex<Vec<DeviceEvent>>,
    formats: Mutex<Vec<AudioFormatSpec>>,
    written: Mutex<Vec<Vec<u8>>>,
    windows: Mutex<Vec<(Instant, Instant)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl DeviceState {
    fn record(&self, event: DeviceEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn behavior(&self) -> MockDeviceBehavior {
        self.behavior.lock().unwrap().clone()
    }
}

/// Audio device that plays nothing and records every call, including how
/// many contexts were open at the same time
#[derive(Clone, Default)]
pub struct MockAudioDevice {
    state: Arc<DeviceState>,
    write_delay: Duration,
}

impl MockAudioDevice {
    pub fn new(behavior: MockDeviceBehavior) -> Self {
        let device = Self::default();
        device.set_behavior(behavior);
        device
    }

    /// Make each write block for `delay`, standing in for real playback time
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn set_behavior(&self, behavior: MockDeviceBehavior) {
        *self.state.behavior.lock().unwrap() = behavior;
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn formats(&self) -> Vec<AudioFormatSpec> {
        self.state.formats.lock().unwrap().clone()
    }

    /// Buffers passed to successful writes
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.written.lock().unwrap().clone()
    }

    /// Open-to-close interval of every context that was closed
    pub fn windows(&self) -> Vec<(Instant, Instant)> {
        self.state.windows.lock().unwrap().clone()
    }

    /// Highest number of contexts open at once
    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

impl AudioDevice for MockAudioDevice {
    fn open(
        &self,
        format: AudioFormatSpec,
        buffer_size_hint: usize,
    ) -> Result<Box<dyn AudioContext>> {
        self.state.record(DeviceEvent::Open { buffer_size_hint });
        self.state.formats.lock().unwrap().push(format);

        if matches!(self.state.behavior(), MockDeviceBehavior::FailOpen) {
            return Err(anyhow!("no output device available"));
        }

        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MockContext {
            state: Arc::clone(&self.state),
            write_delay: self.write_delay,
            opened_at: Instant::now(),
        }))
    }
}

struct MockContext {
    state: Arc<DeviceState>,
    write_delay: Duration,
    opened_at: Instant,
}

impl AudioContext for MockContext {
    fn new_player(&mut self) -> Result<Box<dyn AudioPlayer>> {
        if matches!(self.state.behavior(), MockDeviceBehavior::FailNewPlayer) {
            return Err(anyhow!("player limit reached"));
        }
        self.state.record(DeviceEvent::NewPlayer);

        Ok(Box::new(MockPlayer {
            state: Arc::clone(&self.state),
            write_delay: self.write_delay,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.state.record(DeviceEvent::ContextClose);
        self.state
            .windows
            .lock()
            .unwrap()
            .push((self.opened_at, Instant::now()));
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPlayer {
    state: Arc<DeviceState>,
    write_delay: Duration,
}

impl AudioPlayer for MockPlayer {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.state.record(DeviceEvent::Write { len: data.len() });
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }

        match self.state.behavior() {
            MockDeviceBehavior::FailWrite => Err(anyhow!("device unplugged")),
            MockDeviceBehavior::ShortWrite { accept } => Ok(accept.min(data.len())),
            MockDeviceBehavior::PanicOnWrite => panic!("mock audio driver crashed"),
            _ => {
                self.state.written.lock().unwrap().push(data.to_vec());
                Ok(data.len())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state.record(DeviceEvent::PlayerClose);
        Ok(())
    }
}
