use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::SessionError;
use crate::exercise::ModeTable;
use crate::game::HpMapping;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub exercise: ExerciseConfig,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// ループの目標FPS（0 = 制限なし）
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// 1フレームあたりの推論予算（ミリ秒）。超過すると警告
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
    /// 分類器に渡すフレーム窓の長さ
    #[serde(default = "default_window_frames")]
    pub window_frames: usize,
}

fn default_target_fps() -> u32 { 24 }
fn default_frame_budget_ms() -> u64 { 80 }
fn default_window_frames() -> usize { 30 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            frame_budget_ms: default_frame_budget_ms(),
            window_frames: default_window_frames(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

fn default_camera_width() -> u32 { 1024 }
fn default_camera_height() -> u32 { 768 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// MoveNet ONNX モデル
    #[serde(default = "default_pose_model")]
    pub pose: String,
    /// 68点顔ランドマーク ONNX モデル（空文字なら無し、気分推定は縮退モード）
    #[serde(default = "default_face_model", deserialize_with = "deserialize_optional_path")]
    pub face: Option<String>,
}

fn default_pose_model() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_face_model() -> Option<String> { Some("models/face_landmarks_68.onnx".to_string()) }

fn deserialize_optional_path<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = String::deserialize(deserializer)?;
    Ok((!path.trim().is_empty()).then_some(path))
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pose: default_pose_model(),
            face: default_face_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoseConfig {
    /// これ未満の信頼度のキーポイントは不在扱い
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
}

fn default_confidence_floor() -> f32 { 0.3 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
        }
    }
}

/// One Euro フィルタのパラメータ
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_cutoff")]
    pub min_cutoff: f32,
    #[serde(default = "default_beta")]
    pub beta: f32,
}

fn default_min_cutoff() -> f32 { 3.0 }
fn default_beta() -> f32 { 0.5 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: default_min_cutoff(),
            beta: default_beta(),
        }
    }
}

/// 反復検出のしきい値とタイミング
///
/// 信号はすべて 0.0〜1.0 に正規化されている前提。
#[derive(Debug, Clone, Deserialize)]
pub struct RepConfig {
    /// Rest → Rising に入る信号レベル
    #[serde(default = "default_rep_start")]
    pub start: f32,
    /// 有効な反復とみなすピーク信号レベル
    #[serde(default = "default_rep_peak")]
    pub peak: f32,
    /// 戻り判定のヒステリシス幅
    #[serde(default = "default_rep_hysteresis")]
    pub hysteresis: f32,
    /// これより速い1サイクルはノイズ
    #[serde(default = "default_min_cycle_ms")]
    pub min_cycle_ms: u64,
    /// これより遅い1サイクルは姿勢保持
    #[serde(default = "default_max_cycle_ms")]
    pub max_cycle_ms: u64,
    /// 同一モードの反復イベント間の最小間隔
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// マグニチュード 1.0 に相当するピーク信号
    #[serde(default = "default_full_scale")]
    pub full_scale: f32,
}

fn default_rep_start() -> f32 { 0.2 }
fn default_rep_peak() -> f32 { 0.5 }
fn default_rep_hysteresis() -> f32 { 0.08 }
fn default_min_cycle_ms() -> u64 { 600 }
fn default_max_cycle_ms() -> u64 { 8_000 }
fn default_debounce_ms() -> u64 { 800 }
fn default_full_scale() -> f32 { 1.0 }

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            start: default_rep_start(),
            peak: default_rep_peak(),
            hysteresis: default_rep_hysteresis(),
            min_cycle_ms: default_min_cycle_ms(),
            max_cycle_ms: default_max_cycle_ms(),
            debounce_ms: default_debounce_ms(),
            full_scale: default_full_scale(),
        }
    }
}

impl RepConfig {
    /// 腕上げ: 肩の高さ（レベル3/5 = 0.6）を超えたら有効
    pub fn arm_raise() -> Self {
        Self {
            peak: 0.55,
            ..Self::default()
        }
    }

    /// 側屈: 45° を 1.0 とした角度、15° 以上で有効
    pub fn side_stretch() -> Self {
        Self {
            start: 0.2,
            peak: 0.3,
            hysteresis: 0.06,
            max_cycle_ms: 10_000,
            ..Self::default()
        }
    }

    /// 椅子スクワット: 太ももが水平に近いほど 1.0
    pub fn chair_squat() -> Self {
        Self {
            start: 0.15,
            peak: 0.35,
            hysteresis: 0.06,
            min_cycle_ms: 800,
            max_cycle_ms: 12_000,
            debounce_ms: 1_000,
            full_scale: 0.9,
        }
    }

    fn validate(&self, name: &str) -> crate::error::Result<()> {
        let fail = |msg: &str| Err(SessionError::Config(format!("exercise.{}: {}", name, msg)));
        if !(0.0..=1.0).contains(&self.start) || !(0.0..=1.0).contains(&self.peak) {
            return fail("start and peak must be within 0.0..=1.0");
        }
        if self.start >= self.peak {
            return fail("start must be below peak");
        }
        if self.hysteresis < 0.0 || self.hysteresis >= self.start {
            return fail("hysteresis must be in 0.0..start");
        }
        if self.min_cycle_ms >= self.max_cycle_ms {
            return fail("min_cycle_ms must be below max_cycle_ms");
        }
        if self.full_scale <= 0.0 {
            return fail("full_scale must be positive");
        }
        Ok(())
    }
}

/// フォームチェック（姿勢・肩の安全・バランス）
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_form_check_interval_ms")]
    pub check_interval_ms: u64,
    /// 左右の肩の高さの許容差（正規化座標）
    #[serde(default = "default_level_tolerance")]
    pub shoulder_level_tolerance: f32,
    /// 鼻と肩中心の水平ずれの許容差
    #[serde(default = "default_level_tolerance")]
    pub head_alignment_tolerance: f32,
    /// 腕の鉛直からの角度がこれを超えると肩を痛めやすい
    #[serde(default = "default_shoulder_pain_zone_deg")]
    pub shoulder_pain_zone_deg: f32,
    /// 手首が肩よりこれ以上高いときだけ肩の負担を判定
    #[serde(default = "default_shoulder_strain_lift")]
    pub shoulder_strain_lift: f32,
    /// 側屈中の左右の腰の高さの許容差
    #[serde(default = "default_hip_level_tolerance")]
    pub hip_level_tolerance: f32,
    /// スクワット中に膝がつま先より前に出る許容量
    #[serde(default = "default_knee_alignment_tolerance")]
    pub knee_alignment_tolerance: f32,
    /// スクワット中の肩中心と腰中心の水平ずれ許容差
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: f32,
    /// スクワット中の背中の鉛直からの最大角度
    #[serde(default = "default_back_tilt_max_deg")]
    pub back_tilt_max_deg: f32,
}

fn default_form_check_interval_ms() -> u64 { 2_000 }
fn default_level_tolerance() -> f32 { 0.04 }
fn default_shoulder_pain_zone_deg() -> f32 { 160.0 }
fn default_shoulder_strain_lift() -> f32 { 0.13 }
fn default_hip_level_tolerance() -> f32 { 0.03 }
fn default_knee_alignment_tolerance() -> f32 { 0.05 }
fn default_balance_tolerance() -> f32 { 0.04 }
fn default_back_tilt_max_deg() -> f32 { 30.0 }

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_form_check_interval_ms(),
            shoulder_level_tolerance: default_level_tolerance(),
            head_alignment_tolerance: default_level_tolerance(),
            shoulder_pain_zone_deg: default_shoulder_pain_zone_deg(),
            shoulder_strain_lift: default_shoulder_strain_lift(),
            hip_level_tolerance: default_hip_level_tolerance(),
            knee_alignment_tolerance: default_knee_alignment_tolerance(),
            balance_tolerance: default_balance_tolerance(),
            back_tilt_max_deg: default_back_tilt_max_deg(),
        }
    }
}

/// `[exercise.arm_raise]` などモードごとの反復設定と共通設定
///
/// モード表の一部だけを書いた場合、省略したフィールドは
/// `RepConfig` の汎用デフォルトになる。
#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseConfig {
    #[serde(default = "RepConfig::arm_raise")]
    pub arm_raise: RepConfig,
    #[serde(default = "RepConfig::side_stretch")]
    pub side_stretch: RepConfig,
    #[serde(default = "RepConfig::chair_squat")]
    pub chair_squat: RepConfig,
    #[serde(default)]
    pub smoothing: FilterConfig,
    #[serde(default)]
    pub form: FormConfig,
}

impl ExerciseConfig {
    /// モード別の反復設定を表として取り出す
    pub fn reps(&self) -> ModeTable<RepConfig> {
        ModeTable::new(
            self.arm_raise.clone(),
            self.side_stretch.clone(),
            self.chair_squat.clone(),
        )
    }
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            arm_raise: RepConfig::arm_raise(),
            side_stretch: RepConfig::side_stretch(),
            chair_squat: RepConfig::chair_squat(),
            smoothing: FilterConfig::default(),
            form: FormConfig::default(),
        }
    }
}

/// 顔の幾何特徴から気分ラベルを決めるしきい値
///
/// 距離系は両目外側の距離で正規化した値。
#[derive(Debug, Clone, Deserialize)]
pub struct MoodThresholds {
    /// これ未満の目の開き (EAR) は目を細めている
    #[serde(default = "default_squint_ear")]
    pub squint_ear: f32,
    /// これ未満の眉-目距離は眉をひそめている
    #[serde(default = "default_furrow_brow")]
    pub furrow_brow: f32,
    /// これ未満の眉-目距離は集中（軽いひそめ）
    #[serde(default = "default_focus_brow")]
    pub focus_brow: f32,
    /// これを超える口の開き (MAR) は息切れ
    #[serde(default = "default_gasp_mar")]
    pub gasp_mar: f32,
    /// これ未満の口の開きは口を閉じている
    #[serde(default = "default_closed_mar")]
    pub closed_mar: f32,
    /// これ以上の口幅は笑顔
    #[serde(default = "default_smile_width")]
    pub smile_width: f32,
}

fn default_squint_ear() -> f32 { 0.2 }
fn default_furrow_brow() -> f32 { 0.2 }
fn default_focus_brow() -> f32 { 0.24 }
fn default_gasp_mar() -> f32 { 0.5 }
fn default_closed_mar() -> f32 { 0.1 }
fn default_smile_width() -> f32 { 0.62 }

impl Default for MoodThresholds {
    fn default() -> Self {
        Self {
            squint_ear: default_squint_ear(),
            furrow_brow: default_furrow_brow(),
            focus_brow: default_focus_brow(),
            gasp_mar: default_gasp_mar(),
            closed_mar: default_closed_mar(),
            smile_width: default_smile_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoodConfig {
    #[serde(default)]
    pub thresholds: MoodThresholds,
    /// ラベルスコアの EMA 係数
    #[serde(default = "default_mood_alpha")]
    pub smoothing_alpha: f32,
    /// ラベル切り替えに必要なスコア差
    #[serde(default = "default_mood_hysteresis")]
    pub hysteresis: f32,
    /// これ未満の信頼度は Unknown
    #[serde(default = "default_mood_min_confidence")]
    pub min_confidence: f32,
    /// 顔が見えないフレームごとのスコア減衰率
    #[serde(default = "default_absence_decay")]
    pub absence_decay: f32,
    /// 顔が見えないままこのフレーム数で Unknown
    #[serde(default = "default_absent_frames_to_unknown")]
    pub absent_frames_to_unknown: u32,
    /// 縮退モード（姿勢のみ）の信頼度上限
    #[serde(default = "default_fallback_confidence_cap")]
    pub fallback_confidence_cap: f32,
    /// 縮退モード: これを超えるジャークはぎこちない動き
    #[serde(default = "default_fallback_jerk")]
    pub fallback_jerk: f32,
    /// 縮退モード: これを超える平均速度で「動いている」
    #[serde(default = "default_fallback_motion")]
    pub fallback_motion: f32,
}

fn default_mood_alpha() -> f32 { 0.3 }
fn default_mood_hysteresis() -> f32 { 0.15 }
fn default_mood_min_confidence() -> f32 { 0.35 }
fn default_absence_decay() -> f32 { 0.85 }
fn default_absent_frames_to_unknown() -> u32 { 15 }
fn default_fallback_confidence_cap() -> f32 { 0.5 }
fn default_fallback_jerk() -> f32 { 0.08 }
fn default_fallback_motion() -> f32 { 0.01 }

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            thresholds: MoodThresholds::default(),
            smoothing_alpha: default_mood_alpha(),
            hysteresis: default_mood_hysteresis(),
            min_confidence: default_mood_min_confidence(),
            absence_decay: default_absence_decay(),
            absent_frames_to_unknown: default_absent_frames_to_unknown(),
            fallback_confidence_cap: default_fallback_confidence_cap(),
            fallback_jerk: default_fallback_jerk(),
            fallback_motion: default_fallback_motion(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Struggling がこのフレーム数続くと Alert
    #[serde(default = "default_alert_after_frames")]
    pub alert_after_frames: u32,
    /// 同じ種類・緊急度の助言を再発行しない時間
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// 高強度とみなす平均マグニチュード
    #[serde(default = "default_high_intensity_magnitude")]
    pub high_intensity_magnitude: f32,
    /// 高強度判定に必要な窓内の反復数
    #[serde(default = "default_high_intensity_min_reps")]
    pub high_intensity_min_reps: usize,
    /// 強度集計の時間窓
    #[serde(default = "default_intensity_window_ms")]
    pub intensity_window_ms: u64,
    /// 休憩リマインダーの間隔（0 = 無効）
    #[serde(default = "default_break_reminder_interval_ms")]
    pub break_reminder_interval_ms: u64,
    /// 顔が見えないままこのフレーム数で通知
    #[serde(default = "default_face_lost_frames")]
    pub face_lost_frames: u32,
}

fn default_alert_after_frames() -> u32 { 48 }
fn default_cooldown_ms() -> u64 { 8_000 }
fn default_high_intensity_magnitude() -> f32 { 0.6 }
fn default_high_intensity_min_reps() -> usize { 3 }
fn default_intensity_window_ms() -> u64 { 60_000 }
fn default_break_reminder_interval_ms() -> u64 { 300_000 }
fn default_face_lost_frames() -> u32 { 72 }

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            alert_after_frames: default_alert_after_frames(),
            cooldown_ms: default_cooldown_ms(),
            high_intensity_magnitude: default_high_intensity_magnitude(),
            high_intensity_min_reps: default_high_intensity_min_reps(),
            intensity_window_ms: default_intensity_window_ms(),
            break_reminder_interval_ms: default_break_reminder_interval_ms(),
            face_lost_frames: default_face_lost_frames(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_max_hp")]
    pub max_hp: u32,
    /// モードごとの マグニチュード → HP 変換
    #[serde(default = "default_hp_table", deserialize_with = "deserialize_hp_table")]
    pub hp: ModeTable<HpMapping>,
    /// 相手の自動攻撃の間隔（0 = 無効）
    #[serde(default = "default_opponent_attack_interval_ms")]
    pub opponent_attack_interval_ms: u64,
    #[serde(default = "default_opponent_attack_damage")]
    pub opponent_attack_damage: u32,
}

fn default_max_hp() -> u32 { 100 }
fn default_arm_raise_hp() -> HpMapping { HpMapping::Levels { levels: 5, hp_per_level: 4 } }
fn default_side_stretch_hp() -> HpMapping { HpMapping::Levels { levels: 3, hp_per_level: 10 } }
fn default_chair_squat_hp() -> HpMapping { HpMapping::Levels { levels: 3, hp_per_level: 15 } }
fn default_hp_table() -> ModeTable<HpMapping> {
    ModeTable::new(default_arm_raise_hp(), default_side_stretch_hp(), default_chair_squat_hp())
}

/// `[game.hp.<mode>]`。書かなかったモードはデフォルトのまま
#[derive(Debug, Clone, Deserialize)]
struct HpTable {
    #[serde(default = "default_arm_raise_hp")]
    arm_raise: HpMapping,
    #[serde(default = "default_side_stretch_hp")]
    side_stretch: HpMapping,
    #[serde(default = "default_chair_squat_hp")]
    chair_squat: HpMapping,
}

fn deserialize_hp_table<'de, D>(deserializer: D) -> std::result::Result<ModeTable<HpMapping>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let table = HpTable::deserialize(deserializer)?;
    Ok(ModeTable::new(table.arm_raise, table.side_stretch, table.chair_squat))
}
fn default_opponent_attack_interval_ms() -> u64 { 10_000 }
fn default_opponent_attack_damage() -> u32 { 5 }

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_hp: default_max_hp(),
            hp: default_hp_table(),
            opponent_attack_interval_ms: default_opponent_attack_interval_ms(),
            opponent_attack_damage: default_opponent_attack_damage(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト設定で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %format!("{:#}", e), "using default config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.exercise.arm_raise.validate("arm_raise")?;
        self.exercise.side_stretch.validate("side_stretch")?;
        self.exercise.chair_squat.validate("chair_squat")?;
        if self.game.max_hp == 0 {
            return Err(SessionError::Config("game.max_hp must be positive".to_string()));
        }
        if !(self.mood.smoothing_alpha > 0.0 && self.mood.smoothing_alpha <= 1.0) {
            return Err(SessionError::Config("mood.smoothing_alpha must be in (0, 1]".to_string()));
        }
        if !(0.0..1.0).contains(&self.mood.absence_decay) {
            return Err(SessionError::Config("mood.absence_decay must be in [0, 1)".to_string()));
        }
        if self.pose.confidence_floor <= 0.0 || self.pose.confidence_floor > 1.0 {
            return Err(SessionError::Config("pose.confidence_floor must be in (0, 1]".to_string()));
        }
        Ok(())
    }
}
