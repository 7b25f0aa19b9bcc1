// CrashGuard - Device Drivers (ESP-IDF only)

pub mod buzzer;
pub mod imu;
pub mod led;
pub mod nvs;
pub mod uart;
