use serde::Deserialize;

/// Maps a repetition magnitude (0.0〜1.0) to an HP delta.
///
/// ```toml
/// [game.hp.arm_raise]
/// kind = "levels"
/// levels = 5
/// hp_per_level = 4
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HpMapping {
    /// Same amount for every accepted repetition
    Fixed { hp: u32 },
    /// Proportional to magnitude, rounded
    Linear { hp_at_full: u32 },
    /// Magnitude quantised into levels, each worth `hp_per_level`
    Levels { levels: u32, hp_per_level: u32 },
}

impl HpMapping {
    pub fn hp_delta(&self, magnitude: f32) -> u32 {
        let magnitude = if magnitude.is_finite() {
            magnitude.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match *self {
            HpMapping::Fixed { hp } => hp,
            HpMapping::Linear { hp_at_full } => (magnitude * hp_at_full as f32).round() as u32,
            HpMapping::Levels { levels, hp_per_level } => {
                let level = (magnitude * levels as f32).round() as u32;
                level.min(levels) * hp_per_level
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ignores_magnitude() {
        let m = HpMapping::Fixed { hp: 20 };
        assert_eq!(m.hp_delta(0.1), 20);
        assert_eq!(m.hp_delta(1.0), 20);
    }

    #[test]
    fn test_linear() {
        let m = HpMapping::Linear { hp_at_full: 30 };
        assert_eq!(m.hp_delta(0.5), 15);
        assert_eq!(m.hp_delta(2.0), 30);
        assert_eq!(m.hp_delta(-1.0), 0);
        assert_eq!(m.hp_delta(f32::NAN), 0);
    }

    #[test]
    fn test_levels_full_arm_raise_is_twenty() {
        let m = HpMapping::Levels { levels: 5, hp_per_level: 4 };
        assert_eq!(m.hp_delta(1.0), 20);
        assert_eq!(m.hp_delta(0.6), 12);
        assert_eq!(m.hp_delta(0.05), 0);
    }

    #[test]
    fn test_deserialize_tagged() {
        let m: HpMapping = toml::from_str("kind = \"levels\"\nlevels = 3\nhp_per_level = 10").unwrap();
        assert_eq!(m, HpMapping::Levels { levels: 3, hp_per_level: 10 });
        let m: HpMapping = toml::from_str("kind = \"fixed\"\nhp = 7").unwrap();
        assert_eq!(m, HpMapping::Fixed { hp: 7 });
    }
}
