// CrashGuard - Crash Detection Engine
//
// Watches a motion stream for sustained high-G events and, when one is
// suspected, sounds a local alarm, looks up the last known position and texts
// the rider's emergency contacts.
//
// Everything above the drivers builds and tests on the host; the device
// bindings in `drivers` only exist on ESP-IDF targets.

pub mod alarm;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod gnss;
pub mod lifecycle;
pub mod message;
pub mod modem;
pub mod nmea;
pub mod normalizer;
pub mod orchestrator;
pub mod platform;
pub mod sim;
pub mod sms;
pub mod store;
pub mod tasks;
pub mod window;

#[cfg(target_os = "espidf")]
pub mod drivers;

#[cfg(test)]
mod scenario_tests;

// ---------------------------------------------------------------------------
// Utility: milliseconds since boot (monotonic, 64-bit so it never wraps)
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
pub fn now_ms() -> u64 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u64 }
}

#[cfg(not(target_os = "espidf"))]
pub fn now_ms() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static BOOT: OnceLock<Instant> = OnceLock::new();
    BOOT.get_or_init(Instant::now).elapsed().as_millis() as u64
}
