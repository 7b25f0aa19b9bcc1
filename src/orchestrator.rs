// CrashGuard - Response Orchestrator
//
// Runs once per crash event on a detached thread. Alarm, location and
// messaging are attempted independently; none of them can stop the others
// and the caller is told "done" no matter how they went.

use std::sync::{Arc, Mutex, PoisonError};

use crate::alarm::{self, SharedAlarm};
use crate::config::MAX_EMERGENCY_CONTACTS;
use crate::error::AlertError;
use crate::events::{CrashEvent, Location};
use crate::message;
use crate::platform::{LocationProvider, MessageSender};
use crate::store::{ConfigStore, ProfileStore};

/// What the detector hands a crash event to.
pub trait Responder: Send + Sync {
    fn respond(&self, event: &CrashEvent) -> ResponseReport;
}

/// Outcome of one response run. Informational only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseReport {
    pub location: Option<Location>,
    pub alarm_started: bool,
    pub message: Option<String>,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct ResponseOrchestrator {
    config: Arc<dyn ConfigStore>,
    profile: Arc<dyn ProfileStore>,
    location: Mutex<Box<dyn LocationProvider>>,
    messenger: Mutex<Box<dyn MessageSender>>,
    alarm: SharedAlarm,
}

impl ResponseOrchestrator {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        profile: Arc<dyn ProfileStore>,
        location: Box<dyn LocationProvider>,
        messenger: Box<dyn MessageSender>,
        alarm: SharedAlarm,
    ) -> Self {
        Self {
            config,
            profile,
            location: Mutex::new(location),
            messenger: Mutex::new(messenger),
            alarm,
        }
    }

    fn locate(&self) -> Result<Location, AlertError> {
        let mut provider = self.location.lock().unwrap_or_else(PoisonError::into_inner);
        provider.last_known().map_err(AlertError::LocationUnavailable)
    }

    fn notify(&self, body: &str, recipients: &[String], report: &mut ResponseReport) {
        let mut messenger = self.messenger.lock().unwrap_or_else(PoisonError::into_inner);
        for recipient in recipients {
            match messenger.send(recipient, body) {
                Ok(()) => {
                    log::info!("Alert sent to {recipient}");
                    report.delivered.push(recipient.clone());
                }
                Err(source) => {
                    let err = AlertError::MessageSendFailed { recipient: recipient.clone(), source };
                    log::warn!("{err:#}");
                    report.failed.push(recipient.clone());
                }
            }
        }
    }
}

impl Responder for ResponseOrchestrator {
    fn respond(&self, event: &CrashEvent) -> ResponseReport {
        let mut report = ResponseReport::default();
        let config = self.config.load().unwrap_or_else(|e| {
            log::warn!("Configuration unreadable, using defaults: {e:#}");
            Default::default()
        });

        log::warn!(
            "Responding to crash at {} ms (ratio {:.2}, peak {:.1} G)",
            event.triggered_at_ms,
            event.ratio,
            event.peak_g()
        );

        // Alarm first: it is local and instant, the other steps may wait on radios.
        if config.alarm_enabled {
            match alarm::lock(&self.alarm).start(crate::now_ms()) {
                Ok(()) => report.alarm_started = true,
                Err(e) => log::warn!("{e:#}"),
            }
        }

        if config.location_enabled {
            match self.locate() {
                Ok(location) => {
                    log::info!("Location: {:.5}, {:.5}", location.latitude, location.longitude);
                    report.location = Some(location);
                }
                Err(e) => log::warn!("{e:#} - alerting without position"),
            }
        }

        if !config.sms_enabled {
            return report;
        }

        let profile = match self.profile.load() {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                log::warn!("{}", AlertError::ProfileUnavailable("no profile stored".into()));
                return report;
            }
            Err(e) => {
                log::warn!("{}", AlertError::ProfileUnavailable(format!("{e:#}")));
                return report;
            }
        };

        let body = message::compose_alert(&profile, report.location.as_ref());
        let mut recipients: Vec<String> =
            profile.contacts.iter().take(MAX_EMERGENCY_CONTACTS).cloned().collect();
        if let Some(extra) = config.diagnostic_recipient.filter(|r| !r.trim().is_empty()) {
            recipients.push(extra);
        }
        if recipients.is_empty() {
            log::warn!("No emergency contacts configured - nothing to send");
        }

        self.notify(&body, &recipients, &mut report);
        report.message = Some(body);
        report
    }
}
