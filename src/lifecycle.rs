// CrashGuard - Lifecycle Manager
//
// Start-up gate, status indicator and task ownership. Nothing ingests a
// sample until every required capability is confirmed; teardown cancels the
// cooldown, releases the alarm and clears the status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::alarm::{self, AlarmController, SharedAlarm};
use crate::classifier::Tuning;
use crate::config::*;
use crate::error::StartupError;
use crate::events::{DetectorEvent, ServiceState, StateCell};
use crate::orchestrator::{ResponseOrchestrator, Responder};
use crate::platform::{
    required_capabilities, AudioOutput, CapabilityQuery, LocationProvider, MessageSender,
    MotionSource, StatusIndicator, StatusNotice,
};
use crate::store::{ConfigStore, ProfileStore};
use crate::tasks;

pub const MONITORING_NOTICE: StatusNotice = StatusNotice {
    title: "Kaza Takibi Aktif",
    body: "Arka planda izleniyorsunuz...",
};

// ---------------------------------------------------------------------------
// Sensor subscription
// ---------------------------------------------------------------------------

/// Whether the sensor task may deliver samples. Follows the classifier state
/// (subscribed in ARMED and COOLDOWN, not in RESPONDING) until closed.
#[derive(Debug, Clone, Default)]
pub struct SensorGate {
    state: StateCell,
    closed: Arc<AtomicBool>,
}

impl SensorGate {
    pub fn new(state: StateCell) -> Self {
        Self { state, closed: Arc::default() }
    }

    pub fn is_subscribed(&self) -> bool {
        !self.is_closed() && self.state.get() != ServiceState::Responding
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// External collaborators handed to the service at start-up.
pub struct ServiceParts {
    pub motion: Box<dyn MotionSource>,
    pub location: Box<dyn LocationProvider>,
    pub messenger: Box<dyn MessageSender>,
    pub audio: Box<dyn AudioOutput>,
    pub status: Box<dyn StatusIndicator>,
    pub config: Arc<dyn ConfigStore>,
    pub profile: Arc<dyn ProfileStore>,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub tuning: Tuning,
    pub sample_interval: Duration,
    /// Platforms that gate background sensing behind a second location grant.
    pub foreground_location_gated: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            sample_interval: Duration::from_millis(SENSOR_SAMPLE_INTERVAL_MS),
            foreground_location_gated: false,
        }
    }
}

pub struct CrashService {
    state: StateCell,
    gate: SensorGate,
    detector_tx: Sender<DetectorEvent>,
    alarm: SharedAlarm,
    status: Box<dyn StatusIndicator>,
    threads: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl CrashService {
    pub fn start(
        parts: ServiceParts,
        capabilities: &dyn CapabilityQuery,
        options: ServiceOptions,
    ) -> Result<Self, StartupError> {
        for capability in required_capabilities(options.foreground_location_gated) {
            if !capabilities.has(capability) {
                log::error!("Missing {capability:?} - crash monitoring not started");
                return Err(StartupError::PermissionDenied(capability));
            }
        }

        let ServiceParts { motion, location, messenger, audio, mut status, config, profile } = parts;
        status.show(&MONITORING_NOTICE).map_err(StartupError::Status)?;

        let alarm = AlarmController::new(audio).shared();
        let responder: Arc<dyn Responder> = Arc::new(ResponseOrchestrator::new(
            Arc::clone(&config),
            profile,
            location,
            messenger,
            Arc::clone(&alarm),
        ));

        let state = StateCell::default();
        let gate = SensorGate::new(state.clone());
        let (detector_tx, detector_rx) = mpsc::channel();

        let mut service = Self {
            state: state.clone(),
            gate: gate.clone(),
            detector_tx: detector_tx.clone(),
            alarm: Arc::clone(&alarm),
            status,
            threads: Vec::with_capacity(3),
            stopped: false,
        };

        // Detector first so nothing the sensor sends is lost.
        let detector = tasks::detector::DetectorContext {
            config,
            responder,
            state,
            tuning: options.tuning,
        };
        let self_tx = detector_tx.clone();
        service.spawn("detector", STACK_DETECTOR, move || {
            tasks::detector::detector_task(detector_rx, self_tx, detector);
        })?;

        let interval = options.sample_interval;
        service.spawn("sensor", STACK_SENSOR, move || {
            tasks::sensor::sensor_task(motion, gate, detector_tx, interval);
        })?;

        service.spawn("alarm", STACK_ALARM, move || {
            tasks::alarm::alarm_task(alarm);
        })?;

        log::info!("Crash monitoring started");
        Ok(service)
    }

    fn spawn<F>(&mut self, task: &'static str, stack: usize, f: F) -> Result<(), StartupError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(task.into())
            .stack_size(stack)
            .spawn(f)
            .map_err(|source| StartupError::Spawn { task, source })?;
        self.threads.push(handle);
        Ok(())
    }

    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    pub fn is_alarm_playing(&self) -> bool {
        alarm::lock(&self.alarm).is_playing()
    }

    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.gate.close();
        let _ = self.detector_tx.send(DetectorEvent::Shutdown);
        alarm::lock(&self.alarm).shutdown();

        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("?").to_string();
            if handle.join().is_err() {
                log::error!("{name} task panicked");
            }
        }

        self.status.clear();
        log::info!("Crash monitoring stopped");
    }
}

impl Drop for CrashService {
    fn drop(&mut self) {
        self.teardown();
    }
}
