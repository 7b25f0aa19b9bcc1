// CrashGuard - Host Doubles
//
// Stand-ins for the device collaborators. The host demo binary and the test
// suites both drive the engine through these.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail};

use crate::events::{Location, RawAccel};
use crate::platform::{
    AudioHandle, AudioOutput, Capability, CapabilityQuery, LocationProvider, MessageSender,
    MotionSource, SerialLink, StatusIndicator, StatusNotice,
};

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Plays back a fixed trace, then reports no new data.
#[derive(Debug, Default)]
pub struct ReplaySource {
    samples: VecDeque<RawAccel>,
    reads: Arc<AtomicUsize>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = RawAccel>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            reads: Arc::default(),
        }
    }

    /// Shared counter of `read` calls, observable after the source moves into a task.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl MotionSource for ReplaySource {
    fn read(&mut self) -> anyhow::Result<Option<RawAccel>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.samples.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct FixedLocation {
    fix: Option<Location>,
    queries: Arc<AtomicUsize>,
}

impl FixedLocation {
    pub fn new(fix: Option<Location>) -> Self {
        Self { fix, queries: Arc::default() }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

impl LocationProvider for FixedLocation {
    fn last_known(&mut self) -> anyhow::Result<Location> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.fix.ok_or_else(|| anyhow!("no last known location"))
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub body: String,
}

/// Records every attempt; recipients listed in `failing` get an error back.
#[derive(Debug, Clone, Default)]
pub struct RecordingMessenger {
    attempts: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<HashSet<String>>,
}

impl RecordingMessenger {
    pub fn failing_for<'a>(recipients: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            attempts: Arc::default(),
            failing: Arc::new(recipients.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn attempts(&self) -> Vec<SentMessage> {
        locked(&self.attempts).clone()
    }

    pub fn attempts_to(&self, recipient: &str) -> usize {
        locked(&self.attempts).iter().filter(|m| m.recipient == recipient).count()
    }
}

impl MessageSender for RecordingMessenger {
    fn send(&mut self, recipient: &str, body: &str) -> anyhow::Result<()> {
        locked(&self.attempts).push(SentMessage {
            recipient: recipient.to_string(),
            body: body.to_string(),
        });
        if self.failing.contains(recipient) {
            bail!("carrier rejected message to {recipient}");
        }
        log::info!("[sim] SMS to {recipient}:\n{body}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Started(u32),
    Stopped(u32),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    events: Arc<Mutex<Vec<AudioEvent>>>,
    next_id: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingAudio {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        locked(&self.events).clone()
    }

    /// Players started and not yet stopped.
    pub fn live_players(&self) -> usize {
        let events = locked(&self.events);
        let started = events.iter().filter(|e| matches!(e, AudioEvent::Started(_))).count();
        started - (events.len() - started)
    }
}

impl AudioOutput for RecordingAudio {
    fn play_loop(&mut self) -> anyhow::Result<AudioHandle> {
        if self.fail {
            bail!("no audio device");
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u32 + 1;
        locked(&self.events).push(AudioEvent::Started(id));
        Ok(AudioHandle::new(id))
    }

    fn stop(&mut self, handle: AudioHandle) {
        locked(&self.events).push(AudioEvent::Stopped(handle.id()));
    }
}

// ---------------------------------------------------------------------------
// Status & Capabilities
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct LogStatus {
    visible: Arc<AtomicBool>,
    shown: Arc<AtomicUsize>,
}

impl LogStatus {
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn times_shown(&self) -> usize {
        self.shown.load(Ordering::Acquire)
    }
}

impl StatusIndicator for LogStatus {
    fn show(&mut self, notice: &StatusNotice) -> anyhow::Result<()> {
        log::info!("[status] {}: {}", notice.title, notice.body);
        self.shown.fetch_add(1, Ordering::AcqRel);
        self.visible.store(true, Ordering::Release);
        Ok(())
    }

    fn clear(&mut self) {
        log::info!("[status] cleared");
        self.visible.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedCapabilities(HashSet<Capability>);

impl FixedCapabilities {
    pub fn all() -> Self {
        Self([Capability::FineLocation, Capability::ForegroundLocation].into_iter().collect())
    }

    pub fn only(granted: &[Capability]) -> Self {
        Self(granted.iter().copied().collect())
    }
}

impl CapabilityQuery for FixedCapabilities {
    fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

/// UART stand-in: each write pops the next scripted reply into the read queue.
/// Chunks queued with [`ScriptedLink::then_incoming`] arrive one per drained
/// read queue, like sentences a receiver emits after the line was cleared.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    replies: VecDeque<Vec<u8>>,
    incoming: VecDeque<u8>,
    later: VecDeque<Vec<u8>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLink {
    pub fn with_replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: replies.into_iter().map(|r| r.as_bytes().to_vec()).collect(),
            ..Self::default()
        }
    }

    /// Bytes already waiting on the line, e.g. a GNSS receiver's output.
    pub fn with_incoming(bytes: &[u8]) -> Self {
        Self {
            incoming: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn then_incoming(mut self, bytes: &[u8]) -> Self {
        self.later.push_back(bytes.to_vec());
        self
    }

    pub fn written(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.written)
    }
}

impl SerialLink for ScriptedLink {
    fn write_all(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        locked(&self.written).push(String::from_utf8_lossy(bytes).into_owned());
        if let Some(reply) = self.replies.pop_front() {
            self.incoming.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u64) -> anyhow::Result<usize> {
        if self.incoming.is_empty() {
            if let Some(chunk) = self.later.pop_front() {
                self.incoming.extend(chunk);
            }
        }
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn clear_input(&mut self) -> anyhow::Result<()> {
        self.incoming.clear();
        Ok(())
    }
}
