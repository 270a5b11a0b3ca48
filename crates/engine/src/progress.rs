//! Progress observation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

/// Default logging interval for [`LogProgress`].
const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Write-only observer of one transfer's progress.
///
/// Owned by the transfer for its duration; receives an update after
/// every chunk write and every hole skip, so `transferred` tracks the
/// logical position within the stream.
pub trait ProgressSink {
    fn update(&mut self, transferred: u64, total: u64);
}

/// Discards all updates.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&mut self, _transferred: u64, _total: u64) {}
}

/// Logs progress through `tracing` at a bounded rate.
pub struct LogProgress {
    label: String,
    interval: Duration,
    last_logged: Option<Instant>,
    last_transferred: u64,
    speed: SpeedCalculator,
}

impl LogProgress {
    /// Creates a sink logging under `label` every 500 ms.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: DEFAULT_INTERVAL,
            last_logged: None,
            last_transferred: 0,
            speed: SpeedCalculator::new(None, None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl ProgressSink for LogProgress {
    fn update(&mut self, transferred: u64, total: u64) {
        self.speed
            .add_sample(transferred.saturating_sub(self.last_transferred));
        self.last_transferred = transferred;

        let now = Instant::now();
        let due = match self.last_logged {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        };
        // Always log the final update.
        if !due && transferred < total {
            return;
        }
        self.last_logged = Some(now);

        let percent = if total > 0 {
            transferred.saturating_mul(100) / total
        } else {
            100
        };
        info!(
            label = %self.label,
            transferred,
            total,
            percent,
            rate = self.speed.bytes_per_second() as u64,
            "transfer progress"
        );
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(100),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });

        // Prune samples outside the window.
        if let Some(cutoff) = now.checked_sub(self.window_size) {
            while let Some(front) = self.samples.front() {
                if front.timestamp >= cutoff {
                    break;
                }
                self.samples.pop_front();
            }
        }

        // Limit sample count.
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }

        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total_bytes: u64 = self.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_progress_accepts_updates() {
        let mut sink = NullProgress;
        sink.update(0, 0);
        sink.update(10, 100);
    }

    #[test]
    fn speed_calculator_no_samples() {
        let calc = SpeedCalculator::new(None, None);
        assert_eq!(calc.bytes_per_second(), 0.0);
        assert!(calc.eta(1000).is_none());
    }

    #[test]
    fn speed_calculator_single_sample() {
        let mut calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        // Need at least 2 samples.
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_multiple_samples() {
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(10)), None);
        calc.add_sample(500);
        std::thread::sleep(Duration::from_millis(50));
        calc.add_sample(500);

        // Timing is imprecise; just check the estimate is positive.
        assert!(calc.bytes_per_second() > 0.0);
        assert!(calc.eta(10_000).is_some());
    }

    #[test]
    fn speed_calculator_reset() {
        let mut calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        calc.add_sample(200);
        calc.reset();
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_max_samples() {
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(60)), Some(5));
        for i in 0..20 {
            calc.add_sample(i * 10);
        }
        assert!(calc.samples.len() <= 5);
    }

    #[test]
    fn log_progress_tracks_without_panic() {
        let mut sink = LogProgress::new("test").with_interval(Duration::from_millis(1));
        sink.update(10, 100);
        sink.update(100, 100);
    }
}
