use std::time::Duration;

use crate::config::RepConfig;

use super::{ExerciseMode, ModeTable};

/// 反復検出ステートマシンの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepPhase {
    #[default]
    Rest,
    Rising,
    Peak,
    Returning,
}

/// 完了した1回の反復
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepEvent {
    pub mode: ExerciseMode,
    /// 0.0〜1.0
    pub magnitude: f32,
    pub timestamp: Duration,
}

/// サイクルは完了したが反復として数えなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepRejection {
    /// 遅すぎる（姿勢保持）
    Held,
    /// 速すぎる（ノイズ）
    Noise,
    /// 前回の反復から間隔が短すぎる
    Debounced,
}

/// Rest → Rising → Peak → Returning → Rest を1周したサイクル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepCycle {
    pub peak: f32,
    pub started_at: Duration,
    pub ended_at: Duration,
}

impl RepCycle {
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_sub(self.started_at)
    }
}

/// 1フレーム分の更新結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepStep {
    Continue,
    /// ピークに届かずに戻った
    Abandoned,
    Completed(RepCycle),
    Rejected(RepRejection),
}

/// 平滑化済み信号に対する1モード分の反復検出器
#[derive(Debug, Clone)]
pub struct RepDetector {
    config: RepConfig,
    phase: RepPhase,
    started_at: Duration,
    peak: f32,
}

impl RepDetector {
    pub fn new(config: RepConfig) -> Self {
        Self {
            config,
            phase: RepPhase::Rest,
            started_at: Duration::ZERO,
            peak: 0.0,
        }
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn config(&self) -> &RepConfig {
        &self.config
    }

    /// 進行中のサイクルを破棄して Rest に戻す
    pub fn reset(&mut self) {
        self.phase = RepPhase::Rest;
        self.peak = 0.0;
    }

    pub fn update(&mut self, signal: f32, timestamp: Duration) -> RepStep {
        let start = self.config.start;
        let peak = self.config.peak;
        let release = start - self.config.hysteresis;

        if self.phase == RepPhase::Rest {
            if signal < start {
                return RepStep::Continue;
            }
            self.phase = RepPhase::Rising;
            self.started_at = timestamp;
            self.peak = signal;
        } else {
            self.peak = self.peak.max(signal);
        }

        match self.phase {
            RepPhase::Rising => {
                if signal >= peak {
                    self.phase = RepPhase::Peak;
                } else if signal < release {
                    self.reset();
                    return RepStep::Abandoned;
                }
                RepStep::Continue
            }
            RepPhase::Peak | RepPhase::Returning => {
                if signal >= peak {
                    self.phase = RepPhase::Peak;
                    return RepStep::Continue;
                }
                if signal < peak - self.config.hysteresis {
                    self.phase = RepPhase::Returning;
                }
                if self.phase == RepPhase::Returning && signal < release {
                    let cycle = RepCycle {
                        peak: self.peak,
                        started_at: self.started_at,
                        ended_at: timestamp,
                    };
                    self.reset();
                    return self.judge(cycle);
                }
                RepStep::Continue
            }
            RepPhase::Rest => RepStep::Continue,
        }
    }

    fn judge(&self, cycle: RepCycle) -> RepStep {
        let duration = cycle.duration();
        if duration < Duration::from_millis(self.config.min_cycle_ms) {
            RepStep::Rejected(RepRejection::Noise)
        } else if duration > Duration::from_millis(self.config.max_cycle_ms) {
            RepStep::Rejected(RepRejection::Held)
        } else {
            RepStep::Completed(cycle)
        }
    }

    /// ピーク信号をマグニチュードに変換
    pub fn magnitude(&self, peak: f32) -> f32 {
        (peak / self.config.full_scale).clamp(0.0, 1.0)
    }
}

/// 同一モードの反復イベントの最小間隔を保証する
#[derive(Debug, Clone, Default)]
pub struct RepDebouncer {
    last_accepted: ModeTable<Option<Duration>>,
}

impl RepDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `interval` 以内の同モードイベントは拒否。受理した場合は記録する
    pub fn accept(&mut self, mode: ExerciseMode, timestamp: Duration, interval: Duration) -> bool {
        let last = &mut self.last_accepted[mode];
        if let Some(prev) = *last {
            if timestamp.saturating_sub(prev) < interval {
                return false;
            }
        }
        *last = Some(timestamp);
        true
    }

    pub fn reset(&mut self) {
        self.last_accepted = ModeTable::default();
    }
}
