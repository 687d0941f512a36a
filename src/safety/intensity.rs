use std::collections::VecDeque;
use std::time::Duration;

use crate::exercise::RepEvent;

/// 直近の運動強度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntensitySummary {
    /// 窓内の反復マグニチュードの平均
    pub mean_magnitude: f32,
    pub reps_per_minute: f32,
    /// 窓内の反復数
    pub count: usize,
}

impl IntensitySummary {
    pub fn is_high(&self, magnitude: f32, min_reps: usize) -> bool {
        self.count >= min_reps && self.mean_magnitude >= magnitude
    }
}

/// 時間窓内の反復イベントを保持する
pub struct IntensityTracker {
    window: Duration,
    events: VecDeque<(Duration, f32)>,
}

impl IntensityTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_secs(1)),
            events: VecDeque::new(),
        }
    }

    pub fn record(&mut self, event: &RepEvent) {
        self.events.push_back((event.timestamp, event.magnitude));
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// 窓から外れたイベントを捨てて集計する
    pub fn summary(&mut self, now: Duration) -> IntensitySummary {
        while let Some(&(t, _)) = self.events.front() {
            if now.saturating_sub(t) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
        let count = self.events.len();
        if count == 0 {
            return IntensitySummary::default();
        }
        let total: f32 = self.events.iter().map(|&(_, m)| m).sum();
        // セッション開始直後は経過時間で割る
        let span = self.window.min(now).max(Duration::from_secs(1));
        IntensitySummary {
            mean_magnitude: total / count as f32,
            reps_per_minute: count as f32 * 60.0 / span.as_secs_f32(),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::ExerciseMode;

    fn event(secs: u64, magnitude: f32) -> RepEvent {
        RepEvent {
            mode: ExerciseMode::ArmRaise,
            magnitude,
            timestamp: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_empty() {
        let mut t = IntensityTracker::new(Duration::from_secs(60));
        assert_eq!(t.summary(Duration::from_secs(10)), IntensitySummary::default());
    }

    #[test]
    fn test_mean_and_rate() {
        let mut t = IntensityTracker::new(Duration::from_secs(60));
        for (s, m) in [(10, 0.5), (20, 0.7), (30, 0.9)] {
            t.record(&event(s, m));
        }
        let summary = t.summary(Duration::from_secs(60));
        assert_eq!(summary.count, 3);
        assert!((summary.mean_magnitude - 0.7).abs() < 1e-6);
        assert!((summary.reps_per_minute - 3.0).abs() < 1e-4);
        assert!(summary.is_high(0.6, 3));
        assert!(!summary.is_high(0.6, 4));
    }

    #[test]
    fn test_old_events_expire() {
        let mut t = IntensityTracker::new(Duration::from_secs(60));
        t.record(&event(0, 1.0));
        t.record(&event(50, 0.2));
        let summary = t.summary(Duration::from_secs(90));
        assert_eq!(summary.count, 1);
        assert!((summary.mean_magnitude - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_rate_early_in_session() {
        let mut t = IntensityTracker::new(Duration::from_secs(60));
        t.record(&event(5, 0.5));
        t.record(&event(10, 0.5));
        let summary = t.summary(Duration::from_secs(20));
        assert!((summary.reps_per_minute - 6.0).abs() < 1e-4);
    }
}
