use serde::Deserialize;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Exercise the player is currently performing. Selected by command only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseMode {
    #[default]
    ArmRaise,
    SideStretch,
    ChairSquat,
}

/// What a completed repetition does in the battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRole {
    Attack,
    Heal,
}

impl ExerciseMode {
    pub const ALL: [ExerciseMode; 3] = [
        ExerciseMode::ArmRaise,
        ExerciseMode::SideStretch,
        ExerciseMode::ChairSquat,
    ];

    pub fn role(self) -> ModeRole {
        match self {
            ExerciseMode::ArmRaise => ModeRole::Attack,
            ExerciseMode::SideStretch | ExerciseMode::ChairSquat => ModeRole::Heal,
        }
    }

    /// Display name shown to the player
    pub fn name(self) -> &'static str {
        match self {
            ExerciseMode::ArmRaise => "Arm Raising",
            ExerciseMode::SideStretch => "Side Stretch",
            ExerciseMode::ChairSquat => "Chair Squat",
        }
    }
}

impl fmt::Display for ExerciseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per exercise mode, indexed by `ExerciseMode`.
///
/// Every mode always has an entry, so lookups are total.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModeTable<T> {
    pub arm_raise: T,
    pub side_stretch: T,
    pub chair_squat: T,
}

impl<T> ModeTable<T> {
    pub fn new(arm_raise: T, side_stretch: T, chair_squat: T) -> Self {
        Self {
            arm_raise,
            side_stretch,
            chair_squat,
        }
    }

    pub fn from_fn(mut f: impl FnMut(ExerciseMode) -> T) -> Self {
        Self {
            arm_raise: f(ExerciseMode::ArmRaise),
            side_stretch: f(ExerciseMode::SideStretch),
            chair_squat: f(ExerciseMode::ChairSquat),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExerciseMode, &T)> {
        ExerciseMode::ALL.iter().map(move |&mode| (mode, &self[mode]))
    }
}

impl<T> Index<ExerciseMode> for ModeTable<T> {
    type Output = T;

    fn index(&self, mode: ExerciseMode) -> &T {
        match mode {
            ExerciseMode::ArmRaise => &self.arm_raise,
            ExerciseMode::SideStretch => &self.side_stretch,
            ExerciseMode::ChairSquat => &self.chair_squat,
        }
    }
}

impl<T> IndexMut<ExerciseMode> for ModeTable<T> {
    fn index_mut(&mut self, mode: ExerciseMode) -> &mut T {
        match mode {
            ExerciseMode::ArmRaise => &mut self.arm_raise,
            ExerciseMode::SideStretch => &mut self.side_stretch,
            ExerciseMode::ChairSquat => &mut self.chair_squat,
        }
    }
}
