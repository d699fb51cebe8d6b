use crate::rppg::config::{self, RppgConfig};
use crate::rppg::types::{BpmDisplay, HeartRateRecord};
use std::collections::VecDeque;

/// Calibration gate and delayed-average display stage. Owns the bounded
/// heart-rate history; what it emits is a pure function of that history and
/// the clock.
pub struct HeartRateSmoother {
    calibration_period_ms: u64,
    display_delay_ms: u64,
    history: VecDeque<HeartRateRecord>,
    calibration_start: Option<u64>,
    is_calibrating: bool,
}

impl HeartRateSmoother {
    pub fn new(config: &RppgConfig) -> Self {
        HeartRateSmoother {
            calibration_period_ms: config.calibration_period_ms,
            display_delay_ms: config.display_delay_ms,
            history: VecDeque::new(),
            calibration_start: None,
            is_calibrating: false,
        }
    }

    /// Begin a calibration window at `now_ms` with a fresh history.
    pub fn start(&mut self, now_ms: u64) {
        self.history.clear();
        self.calibration_start = Some(now_ms);
        self.is_calibrating = true;
        log::info!("Calibration: started, {} ms window", self.calibration_period_ms);
    }

    pub fn stop(&mut self) {
        self.calibration_start = None;
        self.is_calibrating = false;
    }

    pub fn is_calibrating(&self) -> bool {
        self.is_calibrating
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Record one raw estimate and drop records that have aged out of the
    /// calibration-plus-delay horizon.
    pub fn push_estimate(&mut self, bpm: u32, now_ms: u64) {
        self.history.push_back(HeartRateRecord {
            bpm,
            timestamp_ms: now_ms,
        });
        let horizon = self.calibration_period_ms + self.display_delay_ms;
        let cutoff = now_ms.saturating_sub(horizon);
        while let Some(front) = self.history.front() {
            if front.timestamp_ms < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// The value shown this tick: calibration progress until the window has
    /// passed, then the delayed stable BPM.
    pub fn display(&mut self, now_ms: u64) -> BpmDisplay {
        let Some(start) = self.calibration_start else {
            return BpmDisplay::Unavailable;
        };
        let elapsed = now_ms.saturating_sub(start);
        if elapsed < self.calibration_period_ms {
            let progress = (100 * elapsed / self.calibration_period_ms) as u8;
            return BpmDisplay::Calibrating { progress };
        }
        if self.is_calibrating {
            self.is_calibrating = false;
            log::info!("Calibration: complete, {} records", self.history.len());
        }
        self.delayed_stable_bpm(now_ms)
    }

    /// Mean of the records within two seconds of `now - display_delay`,
    /// withheld when the nearest record is too far away or the window is
    /// unstable.
    fn delayed_stable_bpm(&self, now_ms: u64) -> BpmDisplay {
        let target = now_ms.saturating_sub(self.display_delay_ms);
        let nearest = self
            .history
            .iter()
            .map(|r| distance_ms(r.timestamp_ms, target))
            .min();
        match nearest {
            None => return BpmDisplay::Unavailable,
            Some(d) if d > config::DISPLAY_WINDOW_MS => return BpmDisplay::Unavailable,
            Some(_) => {}
        }

        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count = 0usize;
        for r in &self.history {
            if distance_ms(r.timestamp_ms, target) < config::DISPLAY_WINDOW_MS {
                let bpm = r.bpm as f64;
                sum += bpm;
                sum_sq += bpm * bpm;
                count += 1;
            }
        }
        if count == 0 {
            return BpmDisplay::Unavailable;
        }
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        if variance.sqrt() > config::DISPLAY_MAX_STDDEV {
            log::debug!(
                "Calibration: delayed window unstable (stddev {:.1})",
                variance.sqrt()
            );
            return BpmDisplay::Unavailable;
        }
        BpmDisplay::Bpm {
            bpm: mean.round() as u32,
        }
    }
}

fn distance_ms(a: u64, b: u64) -> u64 {
    a.abs_diff(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoother() -> HeartRateSmoother {
        HeartRateSmoother::new(&RppgConfig::default())
    }

    /// One estimate per second, `bpm(t)` chosen by the caller.
    fn feed(smoother: &mut HeartRateSmoother, from_ms: u64, to_ms: u64, bpm: impl Fn(u64) -> u32) {
        let mut t = from_ms;
        while t < to_ms {
            smoother.push_estimate(bpm(t), t);
            t += 1_000;
        }
    }

    #[test]
    fn test_never_numeric_during_calibration() {
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 15_000, |_| 72);
        for t in (0..15_000).step_by(333) {
            assert!(!smoother.display(t).is_numeric(), "numeric at {} ms", t);
        }
        assert_eq!(
            smoother.display(14_999),
            BpmDisplay::Calibrating { progress: 99 }
        );
    }

    #[test]
    fn test_progress_is_floored_percentage() {
        let mut smoother = smoother();
        smoother.start(1_000);
        assert_eq!(
            smoother.display(1_000),
            BpmDisplay::Calibrating { progress: 0 }
        );
        assert_eq!(
            smoother.display(8_500),
            BpmDisplay::Calibrating { progress: 50 }
        );
        assert_eq!(
            smoother.display(15_999),
            BpmDisplay::Calibrating { progress: 99 }
        );
    }

    #[test]
    fn test_stable_history_yields_rounded_mean() {
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 20_000, |_| 71);
        // Target is 15 s; every record within (13 s, 17 s) is 71.
        assert_eq!(smoother.display(20_000), BpmDisplay::Bpm { bpm: 71 });
    }

    #[test]
    fn test_unstable_window_is_withheld() {
        let mut smoother = smoother();
        smoother.start(0);
        // Alternating 60/100 in the delayed window: stddev 20 > 15.
        feed(&mut smoother, 0, 20_000, |t| {
            if (t / 1_000) % 2 == 0 { 60 } else { 100 }
        });
        assert_eq!(smoother.display(20_000), BpmDisplay::Unavailable);
    }

    #[test]
    fn test_spread_within_fifteen_bpm_is_shown() {
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 20_000, |t| {
            if (t / 1_000) % 2 == 0 { 68 } else { 76 }
        });
        // Window records are 68, 76, 68.
        assert_eq!(smoother.display(20_000), BpmDisplay::Bpm { bpm: 71 });
    }

    #[test]
    fn test_stale_history_is_unavailable() {
        let mut smoother = smoother();
        smoother.start(0);
        // Last estimate at 9 s; by 18 s the delayed target (13 s) is more
        // than two seconds past it.
        feed(&mut smoother, 0, 10_000, |_| 72);
        assert!(smoother.display(15_500).is_numeric());
        assert_eq!(smoother.display(18_000), BpmDisplay::Unavailable);
    }

    #[test]
    fn test_empty_history_is_unavailable() {
        let mut smoother = smoother();
        smoother.start(0);
        assert_eq!(smoother.display(15_000), BpmDisplay::Unavailable);
    }

    #[test]
    fn test_history_is_pruned_to_horizon() {
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 60_000, |_| 70);
        // Horizon is 20 s behind the latest push at 59 s.
        assert!(smoother.history_len() <= 21);
    }

    #[test]
    fn test_step_change_ramps_with_display_lag() {
        // 15 s at 60 BPM then 15 s at 90 BPM: the display crosses the
        // midpoint about `display_delay` after the step.
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 30_000, |t| {
            if t < 15_000 { 60 } else { 90 }
        });
        // Just after calibration the delayed window is still all-60.
        assert_eq!(smoother.display(16_000), BpmDisplay::Bpm { bpm: 60 });
        // Around step + delay the window straddles the change.
        if let BpmDisplay::Bpm { bpm } = smoother.display(20_000) {
            assert!((70..=80).contains(&bpm), "midpoint read {}", bpm);
        } else {
            panic!("expected a numeric display at the midpoint");
        }
        // Once the window has moved fully past the step it reads 90.
        assert_eq!(smoother.display(23_500), BpmDisplay::Bpm { bpm: 90 });
    }

    #[test]
    fn test_stop_makes_display_unavailable() {
        let mut smoother = smoother();
        smoother.start(0);
        feed(&mut smoother, 0, 20_000, |_| 72);
        smoother.stop();
        assert_eq!(smoother.display(20_000), BpmDisplay::Unavailable);
    }
}
