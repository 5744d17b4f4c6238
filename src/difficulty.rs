use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Difficulty picked at setup; fixed for the whole session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Calm,
    #[default]
    Steady,
    Rush,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Calm, Difficulty::Steady, Difficulty::Rush];

    pub fn profile(self) -> &'static DifficultyProfile {
        match self {
            Difficulty::Calm => &CALM,
            Difficulty::Steady => &STEADY,
            Difficulty::Rush => &RUSH,
        }
    }

    /// Lenient parse for stored values; anything unknown plays as steady.
    pub fn from_stored(value: &str) -> Self {
        <Difficulty as ValueEnum>::from_str(value.trim(), true).unwrap_or_default()
    }

    pub fn next(self) -> Self {
        match self {
            Difficulty::Calm => Difficulty::Steady,
            Difficulty::Steady => Difficulty::Rush,
            Difficulty::Rush => Difficulty::Calm,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Difficulty::Calm => Difficulty::Rush,
            Difficulty::Steady => Difficulty::Calm,
            Difficulty::Rush => Difficulty::Steady,
        }
    }
}

/// Static tuning bundle for one difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    pub difficulty: Difficulty,
    pub label: &'static str,
    pub global_time_secs: u64,
    pub tolerance_ms: f64,
    pub penalty_factor: f64,
    pub distraction: usize,
}

const CALM: DifficultyProfile = DifficultyProfile {
    difficulty: Difficulty::Calm,
    label: "Warm-up",
    global_time_secs: 210,
    tolerance_ms: 900.0,
    penalty_factor: 15.0,
    distraction: 3,
};

const STEADY: DifficultyProfile = DifficultyProfile {
    difficulty: Difficulty::Steady,
    label: "Standard",
    global_time_secs: 180,
    tolerance_ms: 750.0,
    penalty_factor: 20.0,
    distraction: 5,
};

const RUSH: DifficultyProfile = DifficultyProfile {
    difficulty: Difficulty::Rush,
    label: "Assault",
    global_time_secs: 150,
    tolerance_ms: 600.0,
    penalty_factor: 25.0,
    distraction: 7,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_table() {
        let steady = Difficulty::Steady.profile();
        assert_eq!(steady.global_time_secs, 180);
        assert_eq!(steady.tolerance_ms, 750.0);
        assert_eq!(steady.penalty_factor, 20.0);
        assert_eq!(steady.distraction, 5);

        assert_eq!(Difficulty::Calm.profile().global_time_secs, 210);
        assert_eq!(Difficulty::Rush.profile().tolerance_ms, 600.0);
        assert_eq!(Difficulty::Rush.profile().penalty_factor, 25.0);
    }

    #[test]
    fn test_from_stored_falls_back_to_steady() {
        assert_eq!(Difficulty::from_stored("rush"), Difficulty::Rush);
        assert_eq!(Difficulty::from_stored(" Calm "), Difficulty::Calm);
        assert_eq!(Difficulty::from_stored("RUSH"), Difficulty::Rush);
        assert_eq!(Difficulty::from_stored("nightmare"), Difficulty::Steady);
        assert_eq!(Difficulty::from_stored(""), Difficulty::Steady);
    }

    #[test]
    fn test_display_and_serde_agree() {
        for d in Difficulty::ALL {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{}\"", d));
        }
    }

    #[test]
    fn test_cycle() {
        assert_eq!(Difficulty::Rush.next(), Difficulty::Calm);
        assert_eq!(Difficulty::Calm.previous(), Difficulty::Rush);
        assert_eq!(Difficulty::Steady.next().previous(), Difficulty::Steady);
    }
}
