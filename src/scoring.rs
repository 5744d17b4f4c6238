//! Per-round precision scoring and per-level success rules.

use crate::level::LevelId;
use crate::util::non_negative_round;

/// Scoring constants for one level variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRule {
    /// Multiplier applied to the difficulty tolerance to get the window.
    pub window_scale: f64,
    pub max_points: f64,
    /// Minimum average per-round score for the level to count as passed.
    pub threshold: f64,
}

impl ScoreRule {
    pub fn for_level(id: LevelId) -> Self {
        match id {
            LevelId::Lamp => ScoreRule {
                window_scale: 2.0,
                max_points: 120.0,
                threshold: 60.0,
            },
            LevelId::Runner => ScoreRule {
                window_scale: 1.5,
                max_points: 150.0,
                threshold: 65.0,
            },
            LevelId::Pulse => ScoreRule {
                window_scale: 1.2,
                max_points: 180.0,
                threshold: 70.0,
            },
        }
    }

    pub fn window(&self, tolerance_ms: f64) -> f64 {
        tolerance_ms * self.window_scale
    }

    /// Linear falloff: 1 at zero error, 0 at the edge of the window and beyond.
    pub fn precision(&self, error_ms: f64, tolerance_ms: f64) -> f64 {
        precision(error_ms, self.window(tolerance_ms))
    }

    pub fn round_score(&self, error_ms: f64, tolerance_ms: f64) -> u32 {
        non_negative_round(self.precision(error_ms, tolerance_ms) * self.max_points)
    }

    /// A level passes only when every round was played and the average holds.
    pub fn passed(&self, completed: u32, rounds: u32, level_score: u32) -> bool {
        if rounds == 0 || completed != rounds {
            return false;
        }
        level_score as f64 / rounds as f64 >= self.threshold
    }
}

pub fn precision(error_ms: f64, window_ms: f64) -> f64 {
    if window_ms <= 0.0 || !error_ms.is_finite() {
        return 0.0;
    }
    (1.0 - error_ms.abs() / window_ms).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_falloff() {
        assert_eq!(precision(0.0, 1500.0), 1.0);
        assert_eq!(precision(750.0, 1500.0), 0.5);
        assert_eq!(precision(-750.0, 1500.0), 0.5);
        assert_eq!(precision(1500.0, 1500.0), 0.0);
        assert_eq!(precision(9000.0, 1500.0), 0.0);
        assert_eq!(precision(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_lamp_exact_press_scores_max() {
        let rule = ScoreRule::for_level(LevelId::Lamp);
        assert_eq!(rule.round_score(0.0, 750.0), 120);
    }

    #[test]
    fn test_windows_per_level() {
        assert_eq!(ScoreRule::for_level(LevelId::Lamp).window(750.0), 1500.0);
        assert_eq!(ScoreRule::for_level(LevelId::Runner).window(600.0), 900.0);
        assert!((ScoreRule::for_level(LevelId::Pulse).window(750.0) - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_scores_round_half_up() {
        let rule = ScoreRule::for_level(LevelId::Runner);
        // 1 - 100/1125 = 0.9111.. * 150 = 136.67
        assert_eq!(rule.round_score(100.0, 750.0), 137);
        let pulse = ScoreRule::for_level(LevelId::Pulse);
        // half window -> 90 exactly
        assert_eq!(pulse.round_score(450.0, 750.0), 90);
    }

    #[test]
    fn test_passed_requires_all_rounds_and_average() {
        let lamp = ScoreRule::for_level(LevelId::Lamp);
        assert!(lamp.passed(4, 4, 240));
        // 80 + 70 + 50 + 40 over four rounds
        assert!(lamp.passed(4, 4, [80u32, 70, 50, 40].iter().sum()));
        assert!(!lamp.passed(4, 4, 239));
        assert!(!lamp.passed(3, 4, 400));
        assert!(!lamp.passed(0, 0, 0));
    }

    #[test]
    fn test_thresholds() {
        assert!(ScoreRule::for_level(LevelId::Runner).passed(3, 3, 195));
        assert!(!ScoreRule::for_level(LevelId::Runner).passed(3, 3, 194));
        assert!(ScoreRule::for_level(LevelId::Pulse).passed(5, 5, 350));
        assert!(!ScoreRule::for_level(LevelId::Pulse).passed(5, 5, 349));
    }
}
