// CrashGuard - Firmware Entry Point
//
// Boot sequence (device):
//   1. Bring up I2C (MPU6050) and the two UARTs (GNSS, cellular modem).
//   2. Component self-test: IMU, GNSS sentences, modem `AT`.
//   3. Open NVS preferences and emergency profile.
//   4. Start the crash service; the main thread then parks.
//
// On the host the same engine runs against simulated peripherals and replays
// a short drive that ends in a crash.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    device::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
mod device {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::gpio::{self, OutputPin, PinDriver};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::uart::{self, UartDriver};
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use crashguard::config::*;
    use crashguard::drivers::buzzer::Buzzer;
    use crashguard::drivers::imu::Mpu6050;
    use crashguard::drivers::led::StatusLed;
    use crashguard::drivers::nvs::{self, NvsConfigStore, NvsProfileStore};
    use crashguard::drivers::uart::UartLink;
    use crashguard::gnss::GnssReceiver;
    use crashguard::lifecycle::{CrashService, ServiceOptions, ServiceParts};
    use crashguard::modem::AtModem;
    use crashguard::platform::{Capability, CapabilityQuery};

    /// Self-test results. Location capability means the GNSS receiver talks.
    struct BootReport {
        imu_ok: bool,
        gnss_ok: bool,
        modem_ok: bool,
    }

    impl CapabilityQuery for BootReport {
        fn has(&self, capability: Capability) -> bool {
            match capability {
                Capability::FineLocation | Capability::ForegroundLocation => self.gnss_ok,
            }
        }
    }

    pub fn run() -> anyhow::Result<()> {
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        log::info!("CrashGuard firmware starting…");

        let peripherals = Peripherals::take()?;

        // ---- I2C bus (MPU6050) --------------------------------------------
        let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio6, // SDA
            peripherals.pins.gpio7, // SCL
            &i2c_config,
        )?;
        let i2c_bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

        // ---- UARTs --------------------------------------------------------
        let gnss_uart = UartDriver::new(
            peripherals.uart1,
            peripherals.pins.gpio21, // TX -> GNSS RX
            peripherals.pins.gpio20, // RX <- GNSS TX
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &uart::config::Config::default().baudrate(Hertz(GNSS_BAUD)),
        )?;
        let modem_uart = UartDriver::new(
            peripherals.uart0,
            peripherals.pins.gpio10, // TX -> modem RX
            peripherals.pins.gpio9,  // RX <- modem TX
            Option::<gpio::Gpio1>::None,
            Option::<gpio::Gpio1>::None,
            &uart::config::Config::default().baudrate(Hertz(MODEM_BAUD)),
        )?;

        // ---- Self-test ----------------------------------------------------
        let imu = Mpu6050::new(i2c_bus);
        let mut gnss = GnssReceiver::new(UartLink::new(gnss_uart));
        let mut modem = AtModem::new(UartLink::new(modem_uart));

        let report = BootReport {
            imu_ok: imu.is_connected(),
            gnss_ok: gnss.is_connected(Duration::from_millis(GNSS_SELFTEST_TIMEOUT_MS)),
            modem_ok: modem.is_connected(),
        };
        if !report.imu_ok || !report.gnss_ok || !report.modem_ok {
            log::error!(
                "Boot check FAILED - IMU:{} GNSS:{} MODEM:{}",
                report.imu_ok,
                report.gnss_ok,
                report.modem_ok
            );
        }
        imu.init()?;

        // ---- Storage ------------------------------------------------------
        let nvs = nvs::open(EspDefaultNvsPartition::take()?)?;
        let config_store = NvsConfigStore::new(Arc::clone(&nvs));
        if let Err(e) = config_store.seed_defaults() {
            log::warn!("Could not seed preferences: {e:#}");
        }

        // ---- Outputs ------------------------------------------------------
        let buzzer = PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;
        let led = PinDriver::output(peripherals.pins.gpio5.downgrade_output())?;

        let parts = ServiceParts {
            motion: Box::new(imu),
            location: Box::new(gnss),
            messenger: Box::new(modem),
            audio: Box::new(Buzzer::new(buzzer)),
            status: Box::new(StatusLed::new(led)),
            config: Arc::new(config_store),
            profile: Arc::new(NvsProfileStore::new(nvs)),
        };

        let service = CrashService::start(parts, &report, ServiceOptions::default())?;
        log::info!("Boot complete - monitoring in {:?}", service.state());

        // All work happens in the spawned tasks; the service must stay alive.
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}

// ---------------------------------------------------------------------------
// Host demo
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
mod host {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crashguard::config::Configuration;
    use crashguard::events::{Location, RawAccel};
    use crashguard::lifecycle::{CrashService, ServiceOptions, ServiceParts};
    use crashguard::sim::*;
    use crashguard::store::{EmergencyProfile, MemoryConfigStore, MemoryProfileStore};

    /// 2 s of cruising at ~1 G, then a 0.5 s impact at ~8 G.
    fn drive() -> Vec<RawAccel> {
        let cruise = (0..125).map(|i| RawAccel::new(0.3 * (i % 5) as f32, 0.2, 9.81));
        let impact = (0..30).map(|_| RawAccel::new(55.0, -40.0, 30.0));
        cruise.chain(impact).collect()
    }

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("CrashGuard host demo starting…");

        let messenger = RecordingMessenger::default();
        let profile = EmergencyProfile {
            name: "Ali".into(),
            surname: "Veli".into(),
            birth_year: "1990".into(),
            blood_type: "A Rh+".into(),
            health_notes: "Penisilin alerjisi".into(),
            contacts: vec!["+905551112233".into()],
        };
        let parts = ServiceParts {
            motion: Box::new(ReplaySource::new(drive())),
            location: Box::new(FixedLocation::new(Some(Location {
                latitude: 41.0082,
                longitude: 28.9784,
                speed_m_s: 20.0,
            }))),
            messenger: Box::new(messenger.clone()),
            audio: Box::new(RecordingAudio::default()),
            status: Box::new(LogStatus::default()),
            config: Arc::new(MemoryConfigStore::new(Configuration::default())),
            profile: Arc::new(MemoryProfileStore::new(Some(profile))),
        };

        let service = CrashService::start(parts, &FixedCapabilities::all(), ServiceOptions::default())?;

        let deadline = Instant::now() + Duration::from_secs(10);
        while messenger.attempts().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }

        match messenger.attempts().first() {
            Some(sent) => log::info!("Alert delivered to {}", sent.recipient),
            None => log::warn!("Drive ended without an alert"),
        }
        log::info!("Service state: {:?}", service.state());
        service.stop();
        Ok(())
    }
}
