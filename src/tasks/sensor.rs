// CrashGuard - Sensor Task
//
// Polls the motion source at ~62.5 Hz while subscribed and stamps each raw
// vector with the read time before handing it to the detector.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::events::DetectorEvent;
use crate::lifecycle::SensorGate;
use crate::platform::MotionSource;

pub fn sensor_task(
    mut source: Box<dyn MotionSource>,
    gate: SensorGate,
    detector_tx: Sender<DetectorEvent>,
    interval: Duration,
) {
    log::info!("Sensor task started");

    while !gate.is_closed() {
        let tick_start = Instant::now();

        // Unsubscribed while a response is running: the source is not touched.
        if gate.is_subscribed() {
            match source.read() {
                Ok(Some(accel)) => {
                    let event = DetectorEvent::Sample { accel, at_ms: crate::now_ms() };
                    if detector_tx.send(event).is_err() {
                        log::warn!("Detector channel closed - exiting sensor task");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("Motion read error: {e:#}"),
            }
        }

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }

    log::info!("Sensor task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RawAccel, ServiceState, StateCell};
    use crate::sim::ReplaySource;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;

    fn spawn(
        trace: Vec<RawAccel>,
        gate: SensorGate,
    ) -> (mpsc::Receiver<DetectorEvent>, thread::JoinHandle<()>, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let source = ReplaySource::new(trace);
        let reads = source.read_counter();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            sensor_task(Box::new(source), gate, tx, Duration::from_millis(1));
        });
        (rx, handle, reads)
    }

    #[test]
    fn forwards_samples_in_order_until_closed() {
        let gate = SensorGate::default();
        let trace = vec![RawAccel::new(1.0, 0.0, 0.0), RawAccel::new(2.0, 0.0, 0.0)];
        let (rx, handle, _) = spawn(trace, gate.clone());

        let mut seen = Vec::new();
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                DetectorEvent::Sample { accel, .. } => seen.push(accel.ax),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(seen, vec![1.0, 2.0]);

        gate.close();
        handle.join().unwrap();
    }

    #[test]
    fn source_is_not_read_while_responding() {
        let state = StateCell::default();
        state.set(ServiceState::Responding);
        let gate = SensorGate::new(state.clone());
        let (rx, handle, reads) = spawn(vec![RawAccel::new(0.0, 0.0, 9.81)], gate.clone());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(reads.load(Ordering::Relaxed), 0);
        assert!(rx.try_recv().is_err());

        state.set(ServiceState::Cooldown);
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

        gate.close();
        handle.join().unwrap();
    }

    #[test]
    fn exits_when_detector_is_gone() {
        let (rx, handle, _) = spawn(vec![RawAccel::default(); 4], SensorGate::default());
        drop(rx);
        handle.join().unwrap();
    }
}
