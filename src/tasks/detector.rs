// CrashGuard - Detector Task
//
// Single consumer of samples, completion signals and the cooldown clock.
// Owns the classifier outright; other tasks only see its state through the
// shared StateCell. A crash event is handed to the responder on its own
// thread so the orchestrator's radio waits never stall this loop.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::classifier::{CrashClassifier, Tuning};
use crate::config::{Configuration, IDLE_RECV_TIMEOUT_MS, STACK_RESPONSE};
use crate::events::{CrashEvent, DetectorEvent, StateCell};
use crate::normalizer;
use crate::orchestrator::Responder;
use crate::store::ConfigStore;

pub struct DetectorContext {
    pub config: Arc<dyn ConfigStore>,
    pub responder: Arc<dyn Responder>,
    pub state: StateCell,
    pub tuning: Tuning,
}

pub fn detector_task(rx: Receiver<DetectorEvent>, self_tx: Sender<DetectorEvent>, ctx: DetectorContext) {
    log::info!("Detector task started");

    let mut classifier = CrashClassifier::new(ctx.tuning);
    let mut config = Configuration::default();
    ctx.state.set(classifier.state());

    loop {
        let timeout = match classifier.cooldown_deadline() {
            Some(deadline) => deadline.saturating_sub(crate::now_ms()).clamp(1, IDLE_RECV_TIMEOUT_MS),
            None => IDLE_RECV_TIMEOUT_MS,
        };

        match rx.recv_timeout(Duration::from_millis(timeout)) {
            Ok(DetectorEvent::Sample { accel, at_ms }) => {
                let sample = match normalizer::normalize(accel, at_ms) {
                    Ok(sample) => sample,
                    Err(e) => {
                        log::debug!("Dropping sample at {at_ms} ms: {e}");
                        continue;
                    }
                };
                // Read per sample: a changed limit applies from the next one.
                config = refresh(ctx.config.as_ref(), config);
                if let Some(event) = classifier.on_sample(sample, config.g_limit) {
                    ctx.state.set(classifier.state());
                    dispatch(event, &ctx.responder, &self_tx);
                }
            }
            Ok(DetectorEvent::ResponseComplete) => {
                classifier.on_response_complete(crate::now_ms());
            }
            Ok(DetectorEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        classifier.poll(crate::now_ms());
        ctx.state.set(classifier.state());
    }

    log::info!("Detector task stopped");
}

/// Reload preferences, keeping the last good copy if the store fails.
fn refresh(store: &dyn ConfigStore, current: Configuration) -> Configuration {
    match store.load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Keeping previous preferences: {e:#}");
            current
        }
    }
}

fn dispatch(event: CrashEvent, responder: &Arc<dyn Responder>, done_tx: &Sender<DetectorEvent>) {
    let event = Arc::new(event);
    let job = (Arc::clone(responder), Arc::clone(&event), done_tx.clone());
    let spawned = thread::Builder::new()
        .name("response".into())
        .stack_size(STACK_RESPONSE)
        .spawn(move || {
            let (responder, event, tx) = job;
            run_response(responder.as_ref(), &event, &tx);
        });

    if let Err(e) = spawned {
        // No thread for it: respond inline rather than drop the alert.
        log::error!("Could not spawn response thread: {e}");
        run_response(responder.as_ref(), &event, done_tx);
    }
}

fn run_response(responder: &dyn Responder, event: &CrashEvent, done_tx: &Sender<DetectorEvent>) {
    let report = responder.respond(event);
    log::info!(
        "Response finished: {} delivered, {} failed",
        report.delivered.len(),
        report.failed.len()
    );
    let _ = done_tx.send(DetectorEvent::ResponseComplete);
}
