// CrashGuard - UART Link
//
// SerialLink over an esp-idf UART driver, shared by the GNSS receiver and
// the cellular modem.

use anyhow::bail;
use esp_idf_hal::delay::TickType;
use esp_idf_hal::uart::UartDriver;

use crate::platform::SerialLink;

pub struct UartLink {
    uart: UartDriver<'static>,
}

impl UartLink {
    pub fn new(uart: UartDriver<'static>) -> Self {
        Self { uart }
    }
}

impl SerialLink for UartLink {
    fn write_all(&mut self, mut bytes: &[u8]) -> anyhow::Result<()> {
        while !bytes.is_empty() {
            let n = self.uart.write(bytes)?;
            if n == 0 {
                bail!("UART TX stalled with {} bytes pending", bytes.len());
            }
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> anyhow::Result<usize> {
        let ticks = TickType::new_millis(timeout_ms).ticks();
        Ok(self.uart.read(buf, ticks)?)
    }

    fn clear_input(&mut self) -> anyhow::Result<()> {
        self.uart.clear_rx()?;
        Ok(())
    }
}
