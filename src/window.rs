// CrashGuard - Sliding Window Aggregator
//
// Trailing time window of motion samples. Samples arrive in timestamp order,
// so eviction only ever looks at the front.

use std::collections::VecDeque;

use crate::config::WINDOW_MS;
use crate::events::MotionSample;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    span_ms: u64,
    samples: VecDeque<MotionSample>,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(WINDOW_MS)
    }
}

impl SlidingWindow {
    pub fn new(span_ms: u64) -> Self {
        Self {
            span_ms,
            samples: VecDeque::new(),
        }
    }

    /// Append `sample`, then drop everything older than the span relative to it.
    pub fn push(&mut self, sample: MotionSample) {
        let now = sample.timestamp_ms;
        self.samples.push_back(sample);
        while let Some(front) = self.samples.front() {
            if now.saturating_sub(front.timestamp_ms) > self.span_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Fraction of retained samples strictly above `g_limit`; 0 when empty.
    pub fn ratio(&self, g_limit: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let over = self.samples.iter().filter(|s| s.g_force > g_limit).count();
        over as f64 / self.samples.len() as f64
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn snapshot(&self) -> Vec<MotionSample> {
        self.samples.iter().copied().collect()
    }

    pub fn oldest(&self) -> Option<&MotionSample> {
        self.samples.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp_ms: u64, g_force: f64) -> MotionSample {
        MotionSample { timestamp_ms, g_force }
    }

    #[test]
    fn empty_window_has_zero_ratio() {
        let window = SlidingWindow::default();
        assert!(window.is_empty());
        assert_eq!(window.ratio(4.5), 0.0);
    }

    #[test]
    fn evicts_samples_older_than_span() {
        let mut window = SlidingWindow::new(300);
        window.push(sample(0, 1.0));
        window.push(sample(100, 1.0));
        window.push(sample(300, 1.0)); // exactly 300 ms old -> kept
        assert_eq!(window.len(), 3);

        window.push(sample(301, 1.0)); // t=0 now 301 ms old -> gone
        assert_eq!(window.len(), 3);
        assert_eq!(window.oldest().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn long_stall_drains_everything_but_the_new_sample() {
        let mut window = SlidingWindow::new(300);
        for t in (0..300).step_by(16) {
            window.push(sample(t, 5.0));
        }
        window.push(sample(5_000, 1.0));
        assert_eq!(window.len(), 1);
        assert_eq!(window.ratio(4.5), 0.0);
    }

    #[test]
    fn ratio_counts_strictly_greater_samples() {
        let mut window = SlidingWindow::new(300);
        window.push(sample(0, 4.5)); // equal, not over
        window.push(sample(10, 4.6));
        window.push(sample(20, 9.0));
        window.push(sample(30, 1.0));
        assert_eq!(window.ratio(4.5), 0.5);
    }

    #[test]
    fn ratio_stays_in_unit_interval_and_window_stays_bounded() {
        let mut window = SlidingWindow::new(300);
        // Irregular cadence with bursts and stalls.
        let gaps = [1u64, 1, 2, 40, 7, 0, 350, 3, 16, 16, 90, 500, 2, 2, 2];
        let mut t = 0;
        for (i, gap) in gaps.iter().cycle().take(200).enumerate() {
            t += gap;
            window.push(sample(t, (i % 7) as f64));
            let r = window.ratio(3.0);
            assert!((0.0..=1.0).contains(&r));
            assert!(window.snapshot().iter().all(|s| t - s.timestamp_ms <= 300));
        }
    }

    #[test]
    fn reset_empties_window() {
        let mut window = SlidingWindow::default();
        window.push(sample(0, 6.0));
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.ratio(4.5), 0.0);
    }
}
