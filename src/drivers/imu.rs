// CrashGuard - MPU6050 Accelerometer Driver
//
// Register-level driver over a shared I2C bus. Configured for the full ±16 g
// range so impacts do not clip; readings leave the driver in m/s² with
// gravity included.

use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;
use crate::events::RawAccel;
use crate::platform::MotionSource;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // 6-byte accel burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

const ACCEL_FS_16G: u8 = 0x18;
const DLPF_44HZ: u8 = 0x03;

pub struct Mpu6050 {
    bus: SharedBus,
}

impl Mpu6050 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    fn bus(&self) -> anyhow::Result<MutexGuard<'_, I2cDriver<'static>>> {
        self.bus.lock().map_err(|_| anyhow!("I2C bus mutex poisoned"))
    }

    /// Boot self-test: does WHO_AM_I answer?
    pub fn is_connected(&self) -> bool {
        let Ok(mut bus) = self.bus() else {
            return false;
        };
        let mut buf = [0u8; 1];
        match bus.write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor, accel ±16 g, DLPF 44 Hz.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = self.bus()?;
        bus.write(I2C_ADDR_MPU6050, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_CONFIG, DLPF_44HZ], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_ACCEL_CONFIG, ACCEL_FS_16G], I2C_TIMEOUT_TICKS)?;
        log::info!("MPU6050 initialised (±16g, DLPF 44Hz)");
        Ok(())
    }

    fn read_accel(&self) -> anyhow::Result<RawAccel> {
        let mut bus = self.bus()?;
        let mut raw = [0u8; 6];
        bus.write_read(I2C_ADDR_MPU6050, &[REG_ACCEL_XOUT_H], &mut raw, I2C_TIMEOUT_TICKS)?;

        let axis = |hi: u8, lo: u8| {
            i16::from_be_bytes([hi, lo]) as f32 / ACCEL_SCALE_16G * STANDARD_GRAVITY as f32
        };
        Ok(RawAccel::new(axis(raw[0], raw[1]), axis(raw[2], raw[3]), axis(raw[4], raw[5])))
    }
}

impl MotionSource for Mpu6050 {
    fn read(&mut self) -> anyhow::Result<Option<RawAccel>> {
        self.read_accel().map(Some)
    }
}
