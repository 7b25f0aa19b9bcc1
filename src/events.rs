// CrashGuard - Data Model & Task Messages

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Sensor Data
// ---------------------------------------------------------------------------

/// Tri-axis acceleration in m/s², as delivered by the motion source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawAccel {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

impl RawAccel {
    pub fn new(ax: f32, ay: f32, az: f32) -> Self {
        Self { ax, ay, az }
    }
}

/// One normalized reading. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Monotonic milliseconds (see [`crate::now_ms`]).
    pub timestamp_ms: u64,
    /// Acceleration magnitude in multiples of standard gravity, always ≥ 0.
    pub g_force: f64,
}

// ---------------------------------------------------------------------------
// Classifier State
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Armed = 0,
    Responding = 1,
    Cooldown = 2,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::Armed
    }
}

impl ServiceState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Responding,
            2 => Self::Cooldown,
            _ => Self::Armed,
        }
    }
}

/// Read side of the classifier state, shared with the lifecycle manager.
/// Only the detector task stores into it.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ServiceState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Crash Response
// ---------------------------------------------------------------------------

/// Emitted once per arming cycle, handed to the orchestrator, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashEvent {
    pub triggered_at_ms: u64,
    pub ratio: f64,
    pub window_snapshot: Vec<MotionSample>,
}

impl CrashEvent {
    pub fn peak_g(&self) -> f64 {
        self.window_snapshot
            .iter()
            .map(|s| s.g_force)
            .fold(0.0, f64::max)
    }
}

/// Last known position as reported by the location service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_m_s: f64,
}

impl Location {
    pub fn speed_kmh(&self) -> f64 {
        self.speed_m_s * 3.6
    }
}

// ---------------------------------------------------------------------------
// Detector Events - everything the single consumer task reacts to
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub enum DetectorEvent {
    /// Raw vector stamped by the sensor task at read time.
    Sample { accel: RawAccel, at_ms: u64 },
    /// The orchestrator finished its attempt (success is not implied).
    ResponseComplete,
    /// Tear down: drop any pending cooldown and exit.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_roundtrips_every_state() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), ServiceState::Armed);
        for state in [ServiceState::Responding, ServiceState::Cooldown, ServiceState::Armed] {
            cell.set(state);
            assert_eq!(cell.clone().get(), state);
        }
    }

    #[test]
    fn peak_g_of_snapshot() {
        let event = CrashEvent {
            triggered_at_ms: 10,
            ratio: 1.0,
            window_snapshot: vec![
                MotionSample { timestamp_ms: 0, g_force: 5.1 },
                MotionSample { timestamp_ms: 5, g_force: 7.4 },
            ],
        };
        assert_eq!(event.peak_g(), 7.4);
    }
}
