// CrashGuard - Platform Seams
//
// Everything the engine talks to but does not own. Device drivers implement
// these on the ESP32; `crate::sim` implements them for the host.

use crate::events::{Location, RawAccel};

/// Accelerometer delivering m/s² vectors at its own cadence.
pub trait MotionSource: Send {
    /// `Ok(None)` when no new reading is available this tick.
    fn read(&mut self) -> anyhow::Result<Option<RawAccel>>;
}

/// One-shot "last known location" query. Called at most once per crash.
pub trait LocationProvider: Send {
    fn last_known(&mut self) -> anyhow::Result<Location>;
}

/// Delivers one text to one recipient, splitting it into parts as the
/// provider requires.
pub trait MessageSender: Send {
    fn send(&mut self, recipient: &str, body: &str) -> anyhow::Result<()>;
}

/// Token for a playing alarm. Not `Clone`: whoever holds it owns the player.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioHandle(u32);

impl AudioHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Looping local alert tone.
pub trait AudioOutput: Send {
    fn play_loop(&mut self) -> anyhow::Result<AudioHandle>;
    fn stop(&mut self, handle: AudioHandle);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotice {
    pub title: &'static str,
    pub body: &'static str,
}

/// Low-priority "monitoring is active" indicator.
pub trait StatusIndicator: Send {
    fn show(&mut self, notice: &StatusNotice) -> anyhow::Result<()>;
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    FineLocation,
    ForegroundLocation,
}

/// Checked once at startup, never ad hoc.
pub trait CapabilityQuery {
    fn has(&self, capability: Capability) -> bool;
}

/// Capabilities the service needs before it may ingest a single sample.
pub fn required_capabilities(foreground_location_gated: bool) -> Vec<Capability> {
    let mut required = vec![Capability::FineLocation];
    if foreground_location_gated {
        required.push(Capability::ForegroundLocation);
    }
    required
}

/// Byte pipe to a UART peripheral (GNSS receiver, cellular modem).
pub trait SerialLink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    /// Read what is available within `timeout_ms`; `Ok(0)` on timeout.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> anyhow::Result<usize>;
    /// Drop everything received but not yet read.
    fn clear_input(&mut self) -> anyhow::Result<()>;
}
