// CrashGuard - Alarm Task
//
// Ticks the alarm controller so a playing alarm stops on its own after
// ALARM_AUTO_STOP_MS. Exits once teardown closes the controller.

use std::thread;
use std::time::Duration;

use crate::alarm::{self, SharedAlarm};
use crate::config::ALARM_POLL_INTERVAL_MS;

pub fn alarm_task(alarm: SharedAlarm) {
    log::info!("Alarm task started");
    let interval = Duration::from_millis(ALARM_POLL_INTERVAL_MS);

    loop {
        {
            let mut controller = alarm::lock(&alarm);
            if controller.is_closed() {
                break;
            }
            controller.poll(crate::now_ms());
        }
        thread::sleep(interval);
    }

    log::info!("Alarm task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmController;
    use crate::sim::RecordingAudio;

    #[test]
    fn exits_after_shutdown_and_leaves_nothing_playing() {
        let audio = RecordingAudio::default();
        let shared = AlarmController::new(Box::new(audio.clone())).shared();
        alarm::lock(&shared).start(crate::now_ms()).unwrap();

        let task_alarm = std::sync::Arc::clone(&shared);
        let handle = thread::spawn(move || alarm_task(task_alarm));

        thread::sleep(Duration::from_millis(ALARM_POLL_INTERVAL_MS));
        assert!(alarm::lock(&shared).is_playing(), "auto-stop is 30 s away");

        alarm::lock(&shared).shutdown();
        handle.join().unwrap();
        assert_eq!(audio.live_players(), 0);
    }
}
