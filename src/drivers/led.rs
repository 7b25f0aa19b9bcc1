// CrashGuard - Status LED
//
// Lit for as long as monitoring runs.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::platform::{StatusIndicator, StatusNotice};

pub struct StatusLed {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl StatusLed {
    pub fn new(pin: PinDriver<'static, AnyOutputPin, Output>) -> Self {
        Self { pin }
    }
}

impl StatusIndicator for StatusLed {
    fn show(&mut self, notice: &StatusNotice) -> anyhow::Result<()> {
        log::info!("{}: {}", notice.title, notice.body);
        self.pin.set_high()?;
        Ok(())
    }

    fn clear(&mut self) {
        let _ = self.pin.set_low();
    }
}
