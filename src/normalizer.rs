// CrashGuard - Sample Normalizer
//
// Raw m/s² vector -> scalar G-force. No filtering here: per-sample noise is
// the window's problem.

use crate::config::STANDARD_GRAVITY;
use crate::error::SampleError;
use crate::events::{MotionSample, RawAccel};

pub fn normalize(accel: RawAccel, at_ms: u64) -> Result<MotionSample, SampleError> {
    let (ax, ay, az) = (accel.ax as f64, accel.ay as f64, accel.az as f64);
    if !(ax.is_finite() && ay.is_finite() && az.is_finite()) {
        return Err(SampleError::NonFinite);
    }

    let magnitude = (ax * ax + ay * ay + az * az).sqrt();
    Ok(MotionSample {
        timestamp_ms: at_ms,
        g_force: magnitude / STANDARD_GRAVITY,
    })
}
