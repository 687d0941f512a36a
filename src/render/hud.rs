//! 画面上の HUD の配色とレイアウト（描画バックエンド非依存）

use std::time::Duration;

use crate::exercise::ExerciseMode;
use crate::game::{GameState, GameStatus};
use crate::mood::Mood;
use crate::safety::{Advisory, Urgency};

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FF00;

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0xFFFF00;

/// 現在のモードで使う骨格線
pub const ACTIVE_SKELETON_COLOR: u32 = 0x00FFFF;

/// 信頼度が低いキーポイントの色 (RGB)
pub const LOW_CONFIDENCE_COLOR: u32 = 0xFF0000;

pub const BAR_BACKGROUND: u32 = 0x202020;

/// 助言を表示し続ける時間
pub const ADVISORY_DISPLAY: Duration = Duration::from_secs(5);

/// HP 残量 (0.0〜1.0) に応じて緑 → 黄 → 赤
pub fn hp_color(fraction: f32) -> u32 {
    let f = fraction.clamp(0.0, 1.0);
    let (r, g) = if f >= 0.5 {
        (((1.0 - f) * 2.0 * 255.0) as u32, 255)
    } else {
        (255, (f * 2.0 * 255.0) as u32)
    };
    (r << 16) | (g << 8)
}

/// HP バーの塗りつぶし幅（ピクセル）
pub fn bar_fill(hp: u32, max_hp: u32, width: usize) -> usize {
    if max_hp == 0 {
        return 0;
    }
    (width as u64 * u64::from(hp.min(max_hp)) / u64::from(max_hp)) as usize
}

pub fn mood_color(mood: Mood) -> u32 {
    match mood {
        Mood::Struggling => 0xE04040,
        Mood::Focused => 0x4080FF,
        Mood::Enjoying => 0x40D060,
        Mood::Neutral => 0xC0C0C0,
        Mood::Unknown => 0x606060,
    }
}

pub fn urgency_color(urgency: Urgency) -> u32 {
    match urgency {
        Urgency::Info => 0x3070C0,
        Urgency::Caution => 0xE0A000,
        Urgency::Alert => 0xD02020,
    }
}

/// 表示期間内の助言のみ
pub fn visible_advisory(advisory: Option<&Advisory>, now: Duration) -> Option<&Advisory> {
    advisory.filter(|adv| now.saturating_sub(adv.issued_at) < ADVISORY_DISPLAY)
}

/// ウィンドウタイトルに出す1行の状況表示
pub fn status_line(game: &GameState, mood: Mood, advisory: Option<&Advisory>) -> String {
    let status = match game.status {
        GameStatus::Playing => format!("{} | HP {} vs {}", mode_label(game.active_mode), game.player_hp, game.opponent_hp),
        GameStatus::Won => "YOU WIN! press R to play again".to_string(),
        GameStatus::Lost => "Defeated - press R to try again".to_string(),
    };
    match advisory {
        Some(adv) => format!("{} | mood: {} | [{}] {}", status, mood, adv.urgency, adv.message),
        None => format!("{} | mood: {}", status, mood),
    }
}

fn mode_label(mode: ExerciseMode) -> &'static str {
    match mode {
        ExerciseMode::ArmRaise => "[1] Arm raise (attack)",
        ExerciseMode::SideStretch => "[2] Side stretch (attack)",
        ExerciseMode::ChairSquat => "[3] Chair squat (heal)",
    }
}
