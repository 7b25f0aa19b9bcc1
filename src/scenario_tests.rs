// CrashGuard - End-to-end Scenarios
//
// Whole-service runs: sensor, detector, response and alarm tasks on real
// threads, simulated peripherals underneath.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Configuration;
use crate::error::StartupError;
use crate::events::{RawAccel, ServiceState};
use crate::gnss::GnssReceiver;
use crate::lifecycle::{CrashService, ServiceOptions, ServiceParts};
use crate::platform::{Capability, LocationProvider};
use crate::sim::*;
use crate::store::{EmergencyProfile, MemoryConfigStore, MemoryProfileStore};

const CONTACT: &str = "+905551112233";
// 38.877 kn is 20 m/s.
const RMC_ISTANBUL: &str = "$GNRMC,083559.00,A,4100.0000,N,02900.0000,E,38.877,77.52,091202,,,A*70\r\n";

fn ali_veli() -> EmergencyProfile {
    EmergencyProfile {
        name: "Ali".into(),
        surname: "Veli".into(),
        birth_year: "1990".into(),
        blood_type: "A Rh+".into(),
        health_notes: String::new(),
        contacts: vec![CONTACT.into()],
    }
}

/// Calm riding, then a sustained ~6.5 G impact.
fn crash_trace() -> Vec<RawAccel> {
    let calm = std::iter::repeat(RawAccel::new(0.0, 0.0, 9.81)).take(10);
    let impact = std::iter::repeat(RawAccel::new(40.0, 40.0, 30.0)).take(120);
    calm.chain(impact).collect()
}

struct Scenario {
    motion: ReplaySource,
    location: Box<dyn LocationProvider>,
    messenger: RecordingMessenger,
    audio: RecordingAudio,
    status: LogStatus,
}

impl Scenario {
    fn new(location: Box<dyn LocationProvider>) -> Self {
        Self {
            motion: ReplaySource::new(crash_trace()),
            location,
            messenger: RecordingMessenger::default(),
            audio: RecordingAudio::default(),
            status: LogStatus::default(),
        }
    }

    fn parts(self) -> ServiceParts {
        ServiceParts {
            motion: Box::new(self.motion),
            location: self.location,
            messenger: Box::new(self.messenger),
            audio: Box::new(self.audio),
            status: Box::new(self.status),
            config: Arc::new(MemoryConfigStore::new(Configuration::default())),
            profile: Arc::new(MemoryProfileStore::new(Some(ali_veli()))),
        }
    }
}

fn options() -> ServiceOptions {
    ServiceOptions {
        sample_interval: Duration::from_millis(2),
        ..ServiceOptions::default()
    }
}

fn wait_for_cooldown(service: &CrashService) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while service.state() != ServiceState::Cooldown {
        assert!(Instant::now() < deadline, "no crash response within 10 s");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn crash_with_fix_texts_the_contact_with_position_and_speed() {
    let link = ScriptedLink::default().then_incoming(RMC_ISTANBUL.as_bytes());
    let gnss = GnssReceiver::new(link).with_query_timeout(Duration::from_millis(100));
    let scenario = Scenario::new(Box::new(gnss));
    let messenger = scenario.messenger.clone();
    let audio = scenario.audio.clone();

    let service = CrashService::start(scenario.parts(), &FixedCapabilities::all(), options()).unwrap();
    wait_for_cooldown(&service);

    let sent = messenger.attempts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, CONTACT);
    let body = &sent[0].body;
    assert!(body.contains("https://maps.google.com/?q=41.0,29.0"), "{body}");
    assert!(body.contains("A Rh+"));
    assert!(body.contains("72.0 km/h"), "{body}");
    assert!(body.starts_with("Ali Veli"));
    assert!(service.is_alarm_playing());

    service.stop();
    assert_eq!(audio.live_players(), 0);
}

#[test]
fn crash_without_fix_still_alerts() {
    let scenario = Scenario::new(Box::new(FixedLocation::new(None)));
    let messenger = scenario.messenger.clone();
    let audio = scenario.audio.clone();

    let service = CrashService::start(scenario.parts(), &FixedCapabilities::all(), options()).unwrap();
    wait_for_cooldown(&service);

    let sent = messenger.attempts();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].body.contains("maps.google.com"));
    assert!(!sent[0].body.contains("km/h"));
    assert!(sent[0].body.contains("Kan grubu: A Rh+"));
    assert_eq!(audio.events(), vec![AudioEvent::Started(1)]);

    service.stop();
}

#[test]
fn denied_location_means_nothing_is_ever_sampled() {
    let scenario = Scenario::new(Box::new(FixedLocation::new(None)));
    let reads = scenario.motion.read_counter();
    let messenger = scenario.messenger.clone();
    let status = scenario.status.clone();

    let denied = FixedCapabilities::only(&[Capability::ForegroundLocation]);
    let result = CrashService::start(scenario.parts(), &denied, options());
    assert!(matches!(result, Err(StartupError::PermissionDenied(Capability::FineLocation))));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(reads.load(Ordering::Relaxed), 0);
    assert!(messenger.attempts().is_empty());
    assert!(!status.is_visible());
}

#[test]
fn disabled_messaging_still_sounds_the_alarm() {
    let scenario = Scenario::new(Box::new(FixedLocation::new(None)));
    let messenger = scenario.messenger.clone();
    let audio = scenario.audio.clone();
    let mut parts = scenario.parts();
    parts.config = Arc::new(MemoryConfigStore::new(Configuration {
        sms_enabled: false,
        ..Configuration::default()
    }));

    let service = CrashService::start(parts, &FixedCapabilities::all(), options()).unwrap();
    wait_for_cooldown(&service);
    assert!(messenger.attempts().is_empty());
    assert_eq!(audio.live_players(), 1);
    service.stop();
}
