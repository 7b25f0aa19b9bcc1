// CrashGuard - Crash Classifier
//
// ARMED -> RESPONDING -> COOLDOWN -> ARMED.
//
// The classifier is a plain state machine driven by explicit timestamps; the
// detector task feeds it samples, completion signals, and clock ticks.

use crate::config::{COOLDOWN_MS, RATIO_THRESHOLD, WINDOW_MS};
use crate::events::{CrashEvent, MotionSample, ServiceState};
use crate::window::SlidingWindow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub window_ms: u64,
    pub ratio_threshold: f64,
    pub cooldown_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            window_ms: WINDOW_MS,
            ratio_threshold: RATIO_THRESHOLD,
            cooldown_ms: COOLDOWN_MS,
        }
    }
}

#[derive(Debug)]
pub struct CrashClassifier {
    tuning: Tuning,
    state: ServiceState,
    window: SlidingWindow,
    cooldown_until_ms: Option<u64>,
}

impl Default for CrashClassifier {
    fn default() -> Self {
        Self::new(Tuning::default())
    }
}

impl CrashClassifier {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            state: ServiceState::Armed,
            window: SlidingWindow::new(tuning.window_ms),
            cooldown_until_ms: None,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn cooldown_deadline(&self) -> Option<u64> {
        self.cooldown_until_ms
    }

    /// Feed one sample. Returns the crash event on the ARMED -> RESPONDING edge.
    pub fn on_sample(&mut self, sample: MotionSample, g_limit: f64) -> Option<CrashEvent> {
        self.poll(sample.timestamp_ms);

        match self.state {
            ServiceState::Responding => None,
            ServiceState::Cooldown => {
                self.window.push(sample);
                None
            }
            ServiceState::Armed => {
                self.window.push(sample);
                let ratio = self.window.ratio(g_limit);
                if ratio <= self.tuning.ratio_threshold {
                    return None;
                }

                self.state = ServiceState::Responding;
                log::warn!(
                    "Crash suspected: {:.0}% of {} samples above {:.2} G",
                    ratio * 100.0,
                    self.window.len(),
                    g_limit
                );
                Some(CrashEvent {
                    triggered_at_ms: sample.timestamp_ms,
                    ratio,
                    window_snapshot: self.window.snapshot(),
                })
            }
        }
    }

    /// Orchestrator finished. Returns `true` if this moved RESPONDING -> COOLDOWN.
    pub fn on_response_complete(&mut self, now_ms: u64) -> bool {
        if self.state != ServiceState::Responding {
            log::debug!("Ignoring response completion in {:?}", self.state);
            return false;
        }

        self.window.reset();
        self.state = ServiceState::Cooldown;
        self.cooldown_until_ms = Some(now_ms + self.tuning.cooldown_ms);
        log::info!("Response complete - cooling down for {} ms", self.tuning.cooldown_ms);
        true
    }

    /// Fire the cooldown timer if due. Returns `true` on COOLDOWN -> ARMED.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.cooldown_until_ms {
            Some(deadline) if self.state == ServiceState::Cooldown && now_ms >= deadline => {
                self.cooldown_until_ms = None;
                self.window.reset();
                self.state = ServiceState::Armed;
                log::info!("Cooldown over - re-armed");
                true
            }
            _ => false,
        }
    }
}
