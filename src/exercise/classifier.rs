use std::time::Duration;

use tracing::{debug, info};

use crate::config::{ExerciseConfig, FilterConfig, RepConfig};
use crate::filter::OneEuroFilter;
use crate::pose::window::FrameWindow;

use super::rep::{RepDebouncer, RepDetector, RepEvent, RepPhase, RepRejection, RepStep};
use super::{signal, ExerciseMode, ModeTable};

/// アクティブなモードの反復を検出する
///
/// 状態を持つのはアクティブなモードの検出器だけ。モードが変わると
/// 新しいモードの検出器とフィルタを Rest から作り直す。
pub struct ExerciseClassifier {
    reps: ModeTable<RepConfig>,
    smoothing: FilterConfig,
    floor: f32,
    active: ExerciseMode,
    detector: RepDetector,
    filter: OneEuroFilter,
    debouncer: RepDebouncer,
    signal: Option<f32>,
    last_timestamp: Option<Duration>,
    last_rejection: Option<RepRejection>,
}

impl ExerciseClassifier {
    pub fn new(config: &ExerciseConfig, floor: f32, mode: ExerciseMode) -> Self {
        let reps = config.reps();
        Self {
            detector: RepDetector::new(reps[mode].clone()),
            filter: OneEuroFilter::from_config(&config.smoothing),
            reps,
            smoothing: config.smoothing.clone(),
            floor,
            active: mode,
            debouncer: RepDebouncer::new(),
            signal: None,
            last_timestamp: None,
            last_rejection: None,
        }
    }

    pub fn active_mode(&self) -> ExerciseMode {
        self.active
    }

    pub fn phase(&self) -> RepPhase {
        self.detector.phase()
    }

    /// 直近の平滑化済み信号（キーポイント欠落中は最後の値）
    pub fn signal(&self) -> Option<f32> {
        self.signal
    }

    pub fn last_rejection(&self) -> Option<RepRejection> {
        self.last_rejection
    }

    /// 窓の最新フレームで1ステップ進める
    ///
    /// 同じフレームを二度渡しても状態は進まない。キーポイントが
    /// 欠けたフレームでは状態を凍結する。
    pub fn classify(&mut self, window: &FrameWindow, mode: ExerciseMode) -> Option<RepEvent> {
        if mode != self.active {
            self.switch_mode(mode);
        }
        let frame = window.latest()?;
        if self.last_timestamp.is_some_and(|t| frame.timestamp <= t) {
            return None;
        }
        self.last_timestamp = Some(frame.timestamp);

        let raw = signal::extract(mode, frame, self.floor)?;
        let smoothed = self.filter.filter(raw, frame.timestamp);
        self.signal = Some(smoothed);
        debug!(mode = ?mode, raw, smoothed, phase = ?self.detector.phase(), "signal");

        match self.detector.update(smoothed, frame.timestamp) {
            RepStep::Continue => None,
            RepStep::Abandoned => {
                debug!(mode = ?mode, "partial repetition abandoned");
                None
            }
            RepStep::Rejected(rejection) => {
                self.reject(mode, rejection);
                None
            }
            RepStep::Completed(cycle) => {
                let debounce = Duration::from_millis(self.detector.config().debounce_ms);
                if !self.debouncer.accept(mode, frame.timestamp, debounce) {
                    self.reject(mode, RepRejection::Debounced);
                    return None;
                }
                let event = RepEvent {
                    mode,
                    magnitude: self.detector.magnitude(cycle.peak),
                    timestamp: frame.timestamp,
                };
                self.last_rejection = None;
                info!(
                    mode = %mode,
                    magnitude = event.magnitude,
                    cycle_ms = cycle.duration().as_millis() as u64,
                    "repetition"
                );
                Some(event)
            }
        }
    }

    /// セッション再開時: 検出器・フィルタ・デバウンス履歴をすべて破棄
    pub fn reset(&mut self) {
        self.detector.reset();
        self.filter.reset();
        self.debouncer.reset();
        self.signal = None;
        self.last_rejection = None;
    }

    fn switch_mode(&mut self, mode: ExerciseMode) {
        debug!(from = ?self.active, to = ?mode, phase = ?self.detector.phase(), "classifier mode switch");
        self.active = mode;
        self.detector = RepDetector::new(self.reps[mode].clone());
        self.filter = OneEuroFilter::from_config(&self.smoothing);
        self.signal = None;
    }

    fn reject(&mut self, mode: ExerciseMode, rejection: RepRejection) {
        debug!(mode = ?mode, rejection = ?rejection, "repetition rejected");
        self.last_rejection = Some(rejection);
    }
}
