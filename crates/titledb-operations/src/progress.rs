use std::time::{Duration, Instant};

/// Minimum time between two reports.
pub const MIN_INTERVAL: Duration = Duration::from_millis(200);
/// Minimum change in percent that triggers a report regardless of time.
pub const MIN_PERCENT_STEP: f64 = 0.5;

const RATE_PREVIOUS_WEIGHT: f64 = 0.65;
const RATE_CURRENT_WEIGHT: f64 = 0.35;

/// Rate limiter for download progress with a smoothed throughput estimate.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last_emit: Option<(Instant, u64, f64)>,
    rate: f64,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and decides whether it should be reported.
    ///
    /// Returns the current throughput estimate when the sample passes the
    /// throttle. The first sample and any `is_final` sample always pass.
    pub fn observe(
        &mut self,
        now: Instant,
        downloaded: u64,
        percent: f64,
        is_final: bool,
    ) -> Option<f64> {
        let Some((last_at, last_bytes, last_percent)) = self.last_emit else {
            self.last_emit = Some((now, downloaded, percent));
            return Some(self.rate);
        };

        let elapsed = now.saturating_duration_since(last_at);
        let due = is_final
            || elapsed >= MIN_INTERVAL
            || (percent - last_percent).abs() >= MIN_PERCENT_STEP;
        if !due {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            let current = downloaded.saturating_sub(last_bytes) as f64 / secs;
            self.rate = if self.rate == 0.0 {
                current
            } else {
                RATE_PREVIOUS_WEIGHT * self.rate + RATE_CURRENT_WEIGHT * current
            };
        }

        self.last_emit = Some((now, downloaded, percent));
        Some(self.rate)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Maps `downloaded / total` into the `[start, end]` percent band.
pub fn band_percent(start: f64, end: f64, downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        return start;
    }
    let fraction = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
    start + (end - start) * fraction
}
