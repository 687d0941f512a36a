use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::config::AdvisorConfig;
use crate::exercise::FormIssue;
use crate::mood::{Mood, MoodState};

use super::intensity::IntensitySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Urgency {
    Info,
    Caution,
    Alert,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Urgency::Info => "info",
            Urgency::Caution => "caution",
            Urgency::Alert => "alert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvisoryCategory {
    Rest,
    SlowDown,
    Form,
    Encouragement,
    Posture,
    ShoulderSafety,
    FaceLost,
    Break,
}

/// 画面に出す助言
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub urgency: Urgency,
    pub category: AdvisoryCategory,
    pub message: String,
    pub issued_at: Duration,
}

impl Advisory {
    pub fn new(urgency: Urgency, category: AdvisoryCategory, message: impl Into<String>, issued_at: Duration) -> Self {
        Self {
            urgency,
            category,
            message: message.into(),
            issued_at,
        }
    }

    fn same_kind(&self, urgency: Urgency, category: AdvisoryCategory) -> bool {
        self.urgency == urgency && self.category == category
    }
}

/// 気分以外の判断材料
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisoryContext<'a> {
    pub form_issues: &'a [FormIssue],
    /// 顔モデルがあり、かつ顔が連続して見えていないフレーム数
    pub face_missing_frames: u32,
}

/// カテゴリごとの最後の助言
#[derive(Debug, Clone, Default)]
pub struct AdvisoryLog {
    by_category: HashMap<AdvisoryCategory, Advisory>,
    latest: Option<Advisory>,
}

impl AdvisoryLog {
    pub fn record(&mut self, advisory: Advisory) {
        self.by_category.insert(advisory.category, advisory.clone());
        self.latest = Some(advisory);
    }

    pub fn last_in(&self, category: AdvisoryCategory) -> Option<&Advisory> {
        self.by_category.get(&category)
    }

    pub fn latest(&self) -> Option<&Advisory> {
        self.latest.as_ref()
    }

    pub fn clear(&mut self) {
        self.by_category.clear();
        self.latest = None;
    }
}

type Candidate = (Urgency, AdvisoryCategory, &'static str);

/// 気分と運動強度から助言を決める
pub struct SafetyAdvisor {
    config: AdvisorConfig,
}

impl SafetyAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// 気分の規則表（先に一致したものが優先）。
    ///
    /// 同じ緊急度・カテゴリの助言が `last` からクールダウン内なら `None`。
    pub fn advise(
        &self,
        mood: &MoodState,
        intensity: &IntensitySummary,
        last: Option<&Advisory>,
        now: Duration,
    ) -> Option<Advisory> {
        let candidate = self.mood_rule(mood, intensity)?;
        self.issue(candidate, last, now)
    }

    /// 気分の規則表の後に、フォーム・顔の見失い・休憩の規則を評価する
    ///
    /// 抑制はカテゴリごとの最後の助言に対して行う。
    pub fn advise_with_context(
        &self,
        mood: &MoodState,
        intensity: &IntensitySummary,
        context: &AdvisoryContext<'_>,
        log: &AdvisoryLog,
        now: Duration,
    ) -> Option<Advisory> {
        let mut candidates: Vec<Candidate> = Vec::with_capacity(4);
        candidates.extend(self.mood_rule(mood, intensity));
        candidates.extend(self.form_rule(context.form_issues));
        if context.face_missing_frames >= self.config.face_lost_frames {
            candidates.push((Urgency::Info, AdvisoryCategory::FaceLost, "No face detected - please face the camera"));
        }
        if self.break_due(log, now) {
            candidates.push((Urgency::Info, AdvisoryCategory::Break, "Take a short break if needed"));
        }

        candidates
            .into_iter()
            .find_map(|c| self.issue(c, log.last_in(c.1), now))
    }

    fn mood_rule(&self, mood: &MoodState, intensity: &IntensitySummary) -> Option<Candidate> {
        let high_intensity = intensity.is_high(
            self.config.high_intensity_magnitude,
            self.config.high_intensity_min_reps,
        );
        match mood.mood {
            Mood::Struggling if mood.held_frames >= self.config.alert_after_frames => Some((
                Urgency::Alert,
                AdvisoryCategory::Rest,
                "You look tired - please stop and rest",
            )),
            Mood::Struggling => Some((
                Urgency::Caution,
                AdvisoryCategory::SlowDown,
                "Slow down and breathe",
            )),
            Mood::Focused if high_intensity => Some((
                Urgency::Info,
                AdvisoryCategory::Form,
                "Great focus! Keep each movement slow and controlled",
            )),
            Mood::Enjoying => Some((
                Urgency::Info,
                AdvisoryCategory::Encouragement,
                "You're doing wonderfully - keep it up!",
            )),
            _ => None,
        }
    }

    fn form_rule(&self, issues: &[FormIssue]) -> Option<Candidate> {
        let issue = issues.first()?;
        let candidate = match issue {
            FormIssue::ShoulderStrain => (Urgency::Caution, AdvisoryCategory::ShoulderSafety, issue.message()),
            other if other.is_injury_risk() => (Urgency::Caution, AdvisoryCategory::Posture, other.message()),
            other => (Urgency::Info, AdvisoryCategory::Posture, other.message()),
        };
        Some(candidate)
    }

    fn break_due(&self, log: &AdvisoryLog, now: Duration) -> bool {
        if self.config.break_reminder_interval_ms == 0 {
            return false;
        }
        let interval = Duration::from_millis(self.config.break_reminder_interval_ms);
        let since = log
            .last_in(AdvisoryCategory::Break)
            .map_or(now, |last| now.saturating_sub(last.issued_at));
        since >= interval
    }

    fn issue(&self, (urgency, category, message): Candidate, last: Option<&Advisory>, now: Duration) -> Option<Advisory> {
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        if let Some(last) = last {
            if last.same_kind(urgency, category) && now.saturating_sub(last.issued_at) < cooldown {
                return None;
            }
        }
        info!(urgency = %urgency, category = ?category, message, "advisory");
        Some(Advisory::new(urgency, category, message, now))
    }
}
