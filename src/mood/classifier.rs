use std::fmt;

use tracing::{debug, info};

use crate::config::{MoodConfig, MoodThresholds};
use crate::filter::Ema;
use crate::pose::face::{FaceCapability, FaceLandmarks};

use super::geometry::FaceGeometry;

/// 表示される気分・負担のラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mood {
    Struggling,
    Focused,
    Enjoying,
    Neutral,
    #[default]
    Unknown,
}

impl Mood {
    /// スコアを持つラベル（Unknown は観測結果ではない）
    const SCORED: [Mood; 4] = [Mood::Struggling, Mood::Focused, Mood::Enjoying, Mood::Neutral];

    fn slot(self) -> Option<usize> {
        Self::SCORED.iter().position(|&m| m == self)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Struggling => "struggling",
            Mood::Focused => "focused",
            Mood::Enjoying => "enjoying",
            Mood::Neutral => "neutral",
            Mood::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// 平滑化済みの気分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodState {
    pub mood: Mood,
    /// 0.0〜1.0
    pub confidence: f32,
    /// 同じラベルが続いているフレーム数
    pub held_frames: u32,
}

impl MoodState {
    pub fn unknown() -> Self {
        Self {
            mood: Mood::Unknown,
            confidence: 0.0,
            held_frames: 0,
        }
    }
}

impl Default for MoodState {
    fn default() -> Self {
        Self::unknown()
    }
}

/// 顔が使えないときの動きの滑らかさ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCue {
    /// 1フレームあたりの平均変化量
    pub speed: f32,
    /// 2階差分の平均（ぎこちなさ）
    pub jerk: f32,
}

impl MotionCue {
    /// 3サンプル未満では判定できない
    pub fn from_series(samples: &[f32]) -> Option<Self> {
        if samples.len() < 3 {
            return None;
        }
        let diffs: Vec<f32> = samples.windows(2).map(|w| w[1] - w[0]).collect();
        let speed = diffs.iter().map(|d| d.abs()).sum::<f32>() / diffs.len() as f32;
        let jerk = diffs.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f32>() / (diffs.len() - 1) as f32;
        Some(Self { speed, jerk })
    }
}

/// フレーム間で持ち越す気分の履歴
#[derive(Debug, Clone)]
pub struct MoodHistory {
    scores: [Ema; 4],
    current: MoodState,
    absent_frames: u32,
}

impl MoodHistory {
    pub fn new(config: &MoodConfig) -> Self {
        Self {
            scores: std::array::from_fn(|_| Ema::with_initial(config.smoothing_alpha, 0.0)),
            current: MoodState::unknown(),
            absent_frames: 0,
        }
    }

    pub fn state(&self) -> MoodState {
        self.current
    }

    /// 顔が連続して見えていないフレーム数
    pub fn absent_frames(&self) -> u32 {
        self.absent_frames
    }

    pub fn score(&self, mood: Mood) -> f32 {
        mood.slot().map_or(0.0, |i| self.scores[i].value())
    }
}

/// 顔の幾何特徴（無ければ動きの滑らかさ）から気分を推定する
pub struct MoodClassifier {
    config: MoodConfig,
    capability: FaceCapability,
}

impl MoodClassifier {
    pub fn new(config: MoodConfig, capability: FaceCapability) -> Self {
        if let FaceCapability::Unavailable { reason } = &capability {
            info!(reason = %reason, "mood classifier running on motion fallback");
        }
        Self { config, capability }
    }

    pub fn capability(&self) -> &FaceCapability {
        &self.capability
    }

    pub fn new_history(&self) -> MoodHistory {
        MoodHistory::new(&self.config)
    }

    /// 1フレーム分の観測で履歴を進め、表示用の状態を返す
    ///
    /// `motion` は顔モデルが無いときだけ使う。
    pub fn classify(
        &self,
        landmarks: Option<&FaceLandmarks>,
        motion: Option<&MotionCue>,
        history: &mut MoodHistory,
    ) -> MoodState {
        let observation = if self.capability.is_available() {
            landmarks
                .and_then(FaceGeometry::from_landmarks)
                .map(|g| (label_face(&g, &self.config.thresholds), 1.0))
        } else {
            motion.map(|cue| (self.label_motion(cue), self.config.fallback_confidence_cap))
        };

        let next = match observation {
            Some((raw, weight)) => {
                history.absent_frames = 0;
                for (i, score) in history.scores.iter_mut().enumerate() {
                    let hit = Mood::SCORED[i] == raw;
                    score.apply(if hit { weight } else { 0.0 });
                }
                self.select(history)
            }
            None => {
                history.absent_frames = history.absent_frames.saturating_add(1);
                for score in history.scores.iter_mut() {
                    score.decay(self.config.absence_decay);
                }
                self.hold_or_unknown(history)
            }
        };

        let held_frames = if next.0 == history.current.mood {
            history.current.held_frames.saturating_add(1)
        } else {
            info!(from = %history.current.mood, to = %next.0, confidence = next.1, "mood changed");
            1
        };
        history.current = MoodState {
            mood: next.0,
            confidence: next.1,
            held_frames,
        };
        debug!(mood = %history.current.mood, confidence = history.current.confidence, absent = history.absent_frames, "mood");
        history.current
    }

    /// ヒステリシス付きでラベルを選ぶ
    fn select(&self, history: &MoodHistory) -> (Mood, f32) {
        let (best, best_score) = Mood::SCORED
            .iter()
            .map(|&m| (m, history.score(m)))
            .fold((Mood::Unknown, f32::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        let incumbent = history.current.mood;
        let incumbent_score = history.score(incumbent);

        let can_switch = best_score >= self.config.min_confidence
            && (incumbent == Mood::Unknown || best_score >= incumbent_score + self.config.hysteresis);
        if best != incumbent && can_switch {
            return (best, best_score);
        }
        if incumbent != Mood::Unknown && incumbent_score >= self.config.min_confidence {
            return (incumbent, incumbent_score);
        }
        if best_score >= self.config.min_confidence {
            return (best, best_score);
        }
        (Mood::Unknown, 0.0)
    }

    /// 観測が無いフレーム: 減衰した信頼度で保持し、閾値を割ったら Unknown
    fn hold_or_unknown(&self, history: &MoodHistory) -> (Mood, f32) {
        let incumbent = history.current.mood;
        let confidence = history.score(incumbent);
        if incumbent == Mood::Unknown
            || history.absent_frames >= self.config.absent_frames_to_unknown
            || confidence < self.config.min_confidence
        {
            (Mood::Unknown, 0.0)
        } else {
            (incumbent, confidence)
        }
    }

    fn label_motion(&self, cue: &MotionCue) -> Mood {
        if cue.jerk > self.config.fallback_jerk {
            Mood::Struggling
        } else if cue.speed > self.config.fallback_motion {
            Mood::Focused
        } else {
            Mood::Neutral
        }
    }
}

/// 1フレーム分の生ラベル（先に一致した規則が優先）
pub fn label_face(geometry: &FaceGeometry, t: &MoodThresholds) -> Mood {
    let squinting = geometry.eye_aperture < t.squint_ear && geometry.brow_height < t.furrow_brow;
    let gasping = geometry.mouth_aperture > t.gasp_mar;
    if squinting || gasping {
        Mood::Struggling
    } else if geometry.mouth_width >= t.smile_width {
        Mood::Enjoying
    } else if geometry.brow_height < t.focus_brow && geometry.mouth_aperture < t.closed_mar {
        Mood::Focused
    } else {
        Mood::Neutral
    }
}
