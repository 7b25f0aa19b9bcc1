// CrashGuard - Alarm Controller
//
// Owns the single audio handle. A new alarm always releases the previous one
// first, and the alarm task's poll releases it after ALARM_AUTO_STOP_MS.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;

use crate::config::ALARM_AUTO_STOP_MS;
use crate::error::AlertError;
use crate::platform::{AudioHandle, AudioOutput};

pub type SharedAlarm = Arc<Mutex<AlarmController>>;

struct LiveAlarm {
    handle: AudioHandle,
    started_at_ms: u64,
}

pub struct AlarmController {
    output: Box<dyn AudioOutput>,
    live: Option<LiveAlarm>,
    auto_stop_ms: u64,
    closed: bool,
}

impl AlarmController {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            live: None,
            auto_stop_ms: ALARM_AUTO_STOP_MS,
            closed: false,
        }
    }

    pub fn shared(self) -> SharedAlarm {
        Arc::new(Mutex::new(self))
    }

    pub fn start(&mut self, now_ms: u64) -> Result<(), AlertError> {
        if self.closed {
            return Err(AlertError::AudioUnavailable(anyhow!("alarm already torn down")));
        }

        self.release();
        let handle = self.output.play_loop().map_err(AlertError::AudioUnavailable)?;
        log::info!("Alarm playing (handle {})", handle.id());
        self.live = Some(LiveAlarm { handle, started_at_ms: now_ms });
        Ok(())
    }

    /// Auto-stop check. Returns `true` if the alarm was released by this call.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .live
            .as_ref()
            .is_some_and(|live| now_ms.saturating_sub(live.started_at_ms) >= self.auto_stop_ms);
        if due {
            log::info!("Alarm auto-stop after {} ms", self.auto_stop_ms);
            self.release();
        }
        due
    }

    pub fn release(&mut self) {
        if let Some(live) = self.live.take() {
            log::debug!("Releasing alarm handle {}", live.handle.id());
            self.output.stop(live.handle);
        }
    }

    /// Teardown: release the player and refuse any later start.
    pub fn shutdown(&mut self) {
        self.release();
        self.closed = true;
    }

    pub fn is_playing(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

pub fn lock(alarm: &SharedAlarm) -> MutexGuard<'_, AlarmController> {
    alarm.lock().unwrap_or_else(PoisonError::into_inner)
}
