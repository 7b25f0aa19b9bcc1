// CrashGuard - Buzzer Driver
//
// Active buzzer on a GPIO: high sounds the tone, low silences it. Only one
// handle is ever live; the alarm controller guarantees the stop.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::platform::{AudioHandle, AudioOutput};

pub struct Buzzer {
    pin: PinDriver<'static, AnyOutputPin, Output>,
    next_id: u32,
}

impl Buzzer {
    pub fn new(pin: PinDriver<'static, AnyOutputPin, Output>) -> Self {
        Self { pin, next_id: 0 }
    }
}

impl AudioOutput for Buzzer {
    fn play_loop(&mut self) -> anyhow::Result<AudioHandle> {
        self.pin.set_high()?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(AudioHandle::new(self.next_id))
    }

    fn stop(&mut self, handle: AudioHandle) {
        if let Err(e) = self.pin.set_low() {
            log::warn!("Buzzer {} did not stop: {e}", handle.id());
        }
    }
}
