// CrashGuard - Hardware, Timing & Runtime Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V) + MPU6050 + GNSS + cellular modem

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_BUZZER: i32 = 4;      // D2/A2 - Active buzzer (alarm tone)
pub const PIN_STATUS_LED: i32 = 5;  // D3    - Monitoring status LED
pub const PIN_I2C_SDA: i32 = 6;     // D4    - I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5    - I2C clock line
pub const PIN_GNSS_RX: i32 = 20;    // D7    - GNSS TX -> MCU RX (UART1)
pub const PIN_GNSS_TX: i32 = 21;    // D6    - MCU TX -> GNSS RX (UART1)
pub const PIN_MODEM_RX: i32 = 9;    // D9    - Modem TX -> MCU RX (UART0)
pub const PIN_MODEM_TX: i32 = 10;   // D10   - MCU TX -> Modem RX (UART0)

// ---------------------------------------------------------------------------
// I2C / UART Buses
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks
pub const GNSS_BAUD: u32 = 9_600;
pub const MODEM_BAUD: u32 = 115_200;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_SENSOR: usize = 4096;
pub const STACK_DETECTOR: usize = 8192;
pub const STACK_RESPONSE: usize = 12288; // message formatting + modem I/O
pub const STACK_ALARM: usize = 4096;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SENSOR_SAMPLE_INTERVAL_MS: u64 = 16;        // ~62.5 Hz
pub const WINDOW_MS: u64 = 300;                       // trailing classification window
pub const COOLDOWN_MS: u64 = 10_000;                  // dead time after a response
pub const ALARM_AUTO_STOP_MS: u64 = 30_000;           // alarm releases itself after 30 s
pub const ALARM_POLL_INTERVAL_MS: u64 = 100;
pub const LOCATION_QUERY_TIMEOUT_MS: u64 = 1_500;     // one-shot GNSS drain
pub const GNSS_SELFTEST_TIMEOUT_MS: u64 = 2_500;      // receivers talk at 1 Hz
pub const GNSS_FIX_MAX_AGE_MS: u64 = 120_000;         // older fixes are not reported
pub const MODEM_COMMAND_TIMEOUT_MS: u64 = 5_000;
pub const MODEM_SEND_TIMEOUT_MS: u64 = 60_000;        // network ack for AT+CMGS
pub const IDLE_RECV_TIMEOUT_MS: u64 = 1_000;          // detector wake-up when nothing is pending

// ---------------------------------------------------------------------------
// Crash Classification
// ---------------------------------------------------------------------------
pub const STANDARD_GRAVITY: f64 = 9.81;  // m/s² per G
pub const DEFAULT_G_LIMIT: f64 = 4.5;
pub const RATIO_THRESHOLD: f64 = 0.75;   // strictly greater than
pub const STOP_DURATION_S: f64 = 0.3;    // assumed crash stop time for the speed-limit mapping
pub const SPEED_LIMIT_MIN_KMH: f64 = 5.0;
pub const SPEED_LIMIT_MAX_KMH: f64 = 150.0;

// ---------------------------------------------------------------------------
// Alerting
// ---------------------------------------------------------------------------
pub const MAX_EMERGENCY_CONTACTS: usize = 3;
pub const MIN_REPORTED_SPEED_KMH: f64 = 1.0;

// ---------------------------------------------------------------------------
// MPU6050 Sensor Scale Factors
// ---------------------------------------------------------------------------
pub const ACCEL_SCALE_16G: f32 = 2048.0; // LSB/g at ±16 g

// ---------------------------------------------------------------------------
// NVS Storage
// ---------------------------------------------------------------------------
pub const NVS_NAMESPACE: &str = "crashguard";
pub const NVS_KEY_PREFERENCES: &str = "prefs";
pub const NVS_KEY_PROFILE: &str = "profile";
pub const NVS_MAX_VALUE_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Runtime Configuration (persisted by the companion app)
// ---------------------------------------------------------------------------

/// Tunable thresholds and toggles, read fresh for every classified sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// G-force a sample must exceed to count towards the ratio.
    #[serde(rename = "gLimit")]
    pub g_limit: f64,
    #[serde(rename = "alarm")]
    pub alarm_enabled: bool,
    #[serde(rename = "sms")]
    pub sms_enabled: bool,
    #[serde(rename = "location")]
    pub location_enabled: bool,
    /// Extra recipient that receives a copy of every alert. Off unless set.
    #[serde(rename = "diagnosticRecipient", skip_serializing_if = "Option::is_none")]
    pub diagnostic_recipient: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            g_limit: DEFAULT_G_LIMIT,
            alarm_enabled: true,
            sms_enabled: true,
            location_enabled: true,
            diagnostic_recipient: None,
        }
    }
}

impl Configuration {
    /// Parse the JSON preferences blob written by the companion app.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        if !config.g_limit.is_finite() || config.g_limit <= 0.0 {
            return Err(ConfigError::InvalidGLimit(config.g_limit));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Deceleration (in G) of a stop from `speed_kmh` within [`STOP_DURATION_S`].
pub fn g_limit_for_speed(speed_kmh: f64) -> Result<f64, ConfigError> {
    if !(SPEED_LIMIT_MIN_KMH..=SPEED_LIMIT_MAX_KMH).contains(&speed_kmh) {
        return Err(ConfigError::SpeedOutOfRange(speed_kmh));
    }
    let speed_ms = speed_kmh / 3.6;
    let acceleration = speed_ms / STOP_DURATION_S;
    Ok(acceleration / STANDARD_GRAVITY)
}
