use std::time::Duration;

use tracing::{debug, info};

use crate::config::GameConfig;
use crate::exercise::{ExerciseMode, ModeRole, ModeTable, RepEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

/// 描画用のゲーム状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub player_hp: u32,
    pub opponent_hp: u32,
    pub max_hp: u32,
    pub active_mode: ExerciseMode,
    pub status: GameStatus,
}

impl GameState {
    fn fresh(max_hp: u32, active_mode: ExerciseMode) -> Self {
        Self {
            player_hp: max_hp,
            opponent_hp: max_hp,
            max_hp,
            active_mode,
            status: GameStatus::Playing,
        }
    }
}

/// 入力1つに対する結果（ログとテスト用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Attacked { damage: u32, opponent_hp: u32 },
    /// 相手の HP が 0 になった
    Won { damage: u32 },
    Healed { amount: u32, player_hp: u32 },
    OpponentAttacked { damage: u32, player_hp: u32 },
    /// プレイヤーの HP が 0 になった
    Lost { damage: u32 },
    ModeSelected { from: ExerciseMode, to: ExerciseMode },
    Restarted,
    /// 終了状態での入力など、何も変わらなかった
    Ignored,
}

/// セッション全体の累計（リスタートでは消えない）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub reps: ModeTable<u32>,
    pub active_time: ModeTable<Duration>,
    pub damage_dealt: u32,
    pub healing: u32,
    pub wins: u32,
    pub losses: u32,
}

impl SessionStats {
    pub fn total_reps(&self) -> u32 {
        self.reps.iter().map(|(_, n)| *n).sum()
    }
}

/// HP・モード・勝敗を管理するステートマシン
pub struct GameMachine {
    config: GameConfig,
    state: GameState,
    stats: SessionStats,
    next_attack_at: Option<Duration>,
    last_tick: Option<Duration>,
}

impl GameMachine {
    pub fn new(config: GameConfig, mode: ExerciseMode) -> Self {
        let state = GameState::fresh(config.max_hp, mode);
        let next_attack_at = Self::attack_interval(&config);
        Self {
            config,
            state,
            stats: SessionStats::default(),
            next_attack_at,
            last_tick: None,
        }
    }

    fn attack_interval(config: &GameConfig) -> Option<Duration> {
        (config.opponent_attack_interval_ms > 0).then(|| Duration::from_millis(config.opponent_attack_interval_ms))
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// プレイ中かつ現在のモードの反復だけが HP を動かす
    pub fn accepts(&self, event: &RepEvent) -> bool {
        self.state.status == GameStatus::Playing && event.mode == self.state.active_mode
    }

    pub fn apply_rep(&mut self, event: &RepEvent) -> Transition {
        if !self.accepts(event) {
            debug!(status = ?self.state.status, mode = ?event.mode, "repetition ignored");
            return Transition::Ignored;
        }
        self.stats.reps[event.mode] += 1;
        let delta = self.config.hp[event.mode].hp_delta(event.magnitude);

        match event.mode.role() {
            ModeRole::Attack => {
                let damage = delta.min(self.state.opponent_hp);
                self.state.opponent_hp -= damage;
                self.stats.damage_dealt += damage;
                if self.state.opponent_hp == 0 {
                    self.state.status = GameStatus::Won;
                    self.stats.wins += 1;
                    info!(damage, "opponent defeated");
                    Transition::Won { damage }
                } else {
                    info!(damage, opponent_hp = self.state.opponent_hp, "attack");
                    Transition::Attacked {
                        damage,
                        opponent_hp: self.state.opponent_hp,
                    }
                }
            }
            ModeRole::Heal => {
                let amount = delta.min(self.state.max_hp - self.state.player_hp);
                self.state.player_hp += amount;
                self.stats.healing += amount;
                info!(amount, player_hp = self.state.player_hp, "heal");
                Transition::Healed {
                    amount,
                    player_hp: self.state.player_hp,
                }
            }
        }
    }

    /// プレイ中のみ有効
    pub fn select_mode(&mut self, mode: ExerciseMode) -> Transition {
        if self.state.status != GameStatus::Playing || mode == self.state.active_mode {
            return Transition::Ignored;
        }
        let from = self.state.active_mode;
        self.state.active_mode = mode;
        info!(from = %from, to = %mode, "mode selected");
        Transition::ModeSelected { from, to: mode }
    }

    /// どの状態からでも HP を満タンに戻してプレイ再開
    pub fn restart(&mut self, now: Duration) -> Transition {
        self.state = GameState::fresh(self.config.max_hp, self.state.active_mode);
        self.next_attack_at = Self::attack_interval(&self.config).map(|interval| now + interval);
        self.last_tick = Some(now);
        info!("game restarted");
        Transition::Restarted
    }

    /// 時間経過: 運動時間の集計と相手の定期攻撃
    pub fn tick(&mut self, now: Duration) -> Option<Transition> {
        let elapsed = self.last_tick.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_tick = Some(now);
        if self.state.status != GameStatus::Playing {
            return None;
        }
        self.stats.active_time[self.state.active_mode] += elapsed;

        let due = self.next_attack_at.filter(|&at| now >= at)?;
        let interval = Duration::from_millis(self.config.opponent_attack_interval_ms);
        self.next_attack_at = Some(due + interval);

        let damage = self.config.opponent_attack_damage.min(self.state.player_hp);
        self.state.player_hp -= damage;
        if self.state.player_hp == 0 {
            self.state.status = GameStatus::Lost;
            self.stats.losses += 1;
            info!(damage, "player defeated");
            Some(Transition::Lost { damage })
        } else {
            info!(damage, player_hp = self.state.player_hp, "opponent attack");
            Some(Transition::OpponentAttacked {
                damage,
                player_hp: self.state.player_hp,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::HpMapping;

    fn config() -> GameConfig {
        GameConfig {
            max_hp: 100,
            hp: ModeTable::new(
                HpMapping::Fixed { hp: 20 },
                HpMapping::Fixed { hp: 10 },
                HpMapping::Linear { hp_at_full: 40 },
            ),
            opponent_attack_interval_ms: 0,
            opponent_attack_damage: 5,
        }
    }

    fn rep(mode: ExerciseMode, magnitude: f32, secs: u64) -> RepEvent {
        RepEvent {
            mode,
            magnitude,
            timestamp: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_five_attacks_win() {
        let mut game = GameMachine::new(config(), ExerciseMode::ArmRaise);
        let mut hp = vec![game.state().opponent_hp];
        for i in 0..5 {
            game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, i));
            hp.push(game.state().opponent_hp);
        }
        assert_eq!(hp, vec![100, 80, 60, 40, 20, 0]);
        assert_eq!(game.state().status, GameStatus::Won);
        assert_eq!(game.stats().wins, 1);
        assert_eq!(game.stats().damage_dealt, 100);
    }

    #[test]
    fn test_terminal_state_ignores_reps() {
        let mut game = GameMachine::new(config(), ExerciseMode::ArmRaise);
        for i in 0..5 {
            game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, i));
        }
        let before = *game.state();
        assert!(!game.accepts(&rep(ExerciseMode::ArmRaise, 1.0, 9)));
        assert_eq!(game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, 9)), Transition::Ignored);
        assert_eq!(game.select_mode(ExerciseMode::SideStretch), Transition::Ignored);
        assert_eq!(*game.state(), before);
        assert_eq!(game.stats().reps[ExerciseMode::ArmRaise], 5);
    }

    #[test]
    fn test_heal_is_clamped() {
        let mut config = config();
        config.opponent_attack_interval_ms = 1_000;
        config.opponent_attack_damage = 7;
        let mut game = GameMachine::new(config, ExerciseMode::SideStretch);
        game.tick(Duration::from_secs(1));
        assert_eq!(game.state().player_hp, 93);
        assert_eq!(
            game.apply_rep(&rep(ExerciseMode::SideStretch, 1.0, 2)),
            Transition::Healed { amount: 7, player_hp: 100 }
        );
        assert_eq!(
            game.apply_rep(&rep(ExerciseMode::SideStretch, 1.0, 3)),
            Transition::Healed { amount: 0, player_hp: 100 }
        );
    }

    #[test]
    fn test_passive_attack_loses() {
        let mut config = config();
        config.opponent_attack_interval_ms = 1_000;
        config.opponent_attack_damage = 30;
        let mut game = GameMachine::new(config, ExerciseMode::ArmRaise);
        assert_eq!(game.tick(Duration::from_millis(500)), None);
        let mut last = None;
        for s in 1..=4 {
            last = game.tick(Duration::from_secs(s));
        }
        assert_eq!(last, Some(Transition::Lost { damage: 10 }));
        assert_eq!(game.state().player_hp, 0);
        assert_eq!(game.state().status, GameStatus::Lost);
        assert_eq!(game.tick(Duration::from_secs(5)), None);
    }

    #[test]
    fn test_restart_from_any_state() {
        let mut game = GameMachine::new(config(), ExerciseMode::ArmRaise);
        for i in 0..5 {
            game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, i));
        }
        assert_eq!(game.restart(Duration::from_secs(10)), Transition::Restarted);
        let state = game.state();
        assert_eq!((state.player_hp, state.opponent_hp, state.status), (100, 100, GameStatus::Playing));

        game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, 11));
        game.restart(Duration::from_secs(12));
        assert_eq!(game.state().opponent_hp, 100);
        assert_eq!(game.stats().wins, 1);
    }

    #[test]
    fn test_hp_never_leaves_range() {
        let mut config = config();
        config.hp.arm_raise = HpMapping::Fixed { hp: 1_000 };
        config.hp.chair_squat = HpMapping::Fixed { hp: 1_000 };
        let mut game = GameMachine::new(config, ExerciseMode::ChairSquat);
        game.apply_rep(&rep(ExerciseMode::ChairSquat, 1.0, 0));
        assert_eq!(game.state().player_hp, 100);
        game.select_mode(ExerciseMode::ArmRaise);
        assert_eq!(game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, 1)), Transition::Won { damage: 100 });
        assert_eq!(game.state().opponent_hp, 0);
    }

    #[test]
    fn test_select_mode() {
        let mut game = GameMachine::new(config(), ExerciseMode::ArmRaise);
        assert_eq!(game.select_mode(ExerciseMode::ArmRaise), Transition::Ignored);
        assert_eq!(
            game.select_mode(ExerciseMode::ChairSquat),
            Transition::ModeSelected { from: ExerciseMode::ArmRaise, to: ExerciseMode::ChairSquat }
        );
        // 別モードのイベントは数えない
        assert!(!game.accepts(&rep(ExerciseMode::ArmRaise, 1.0, 0)));
        assert!(game.accepts(&rep(ExerciseMode::ChairSquat, 1.0, 0)));
        assert_eq!(game.apply_rep(&rep(ExerciseMode::ArmRaise, 1.0, 0)), Transition::Ignored);
    }

    #[test]
    fn test_active_time_per_mode() {
        let mut game = GameMachine::new(config(), ExerciseMode::ArmRaise);
        game.tick(Duration::ZERO);
        game.tick(Duration::from_secs(3));
        game.select_mode(ExerciseMode::SideStretch);
        game.tick(Duration::from_secs(5));
        assert_eq!(game.stats().active_time[ExerciseMode::ArmRaise], Duration::from_secs(3));
        assert_eq!(game.stats().active_time[ExerciseMode::SideStretch], Duration::from_secs(2));
    }
}
