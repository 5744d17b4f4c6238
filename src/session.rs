use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::Millis;
use crate::difficulty::Difficulty;
use crate::level::LevelResult;
use crate::player::{lenient_difficulty, PlayerProfile};
use crate::util::non_negative_round;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
    Timeout,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }

    /// Short label for the results screen.
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in progress",
            SessionStatus::Completed => "victory",
            SessionStatus::Timeout => "time is up",
            SessionStatus::Aborted => "stopped",
        }
    }
}

/// One play-through, as persisted for the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub player_name: String,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub total_score: u32,
    #[serde(default)]
    pub penalties: u32,
    #[serde(default)]
    pub started_at: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Millis>,
    #[serde(default, deserialize_with = "skip_null_results")]
    pub level_results: Vec<LevelResult>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Session {
    pub fn new(player: &PlayerProfile, started_at: Millis) -> Self {
        Self {
            player_name: player.name.clone(),
            difficulty: player.difficulty,
            total_score: 0,
            penalties: 0,
            started_at,
            finished_at: None,
            level_results: Vec::new(),
            status: SessionStatus::InProgress,
            message: None,
        }
    }

    /// Book points: `max(0, round(points))`. Returns what was added.
    pub fn award(&mut self, points: f64) -> u32 {
        let awarded = non_negative_round(points);
        self.total_score += awarded;
        awarded
    }

    /// Book a penalty: the rounded value is added to `penalties` and half of
    /// it, rounded again, comes off the score. Returns the booked penalty.
    pub fn apply_penalty(&mut self, value: f64) -> u32 {
        let penalty = non_negative_round(value);
        self.penalties += penalty;
        let deduction = non_negative_round(penalty as f64 / 2.0);
        self.total_score = self.total_score.saturating_sub(deduction);
        penalty
    }

    /// Take back points awarded by a failed level.
    pub fn refund(&mut self, points: u32) {
        self.total_score = self.total_score.saturating_sub(points);
    }

    /// Whole seconds from start to finish, zero while unfinished.
    pub fn duration_secs(&self) -> u64 {
        match self.finished_at {
            Some(end) if end > self.started_at => {
                crate::util::round_half_up((end - self.started_at) as f64 / 1000.0) as u64
            }
            _ => 0,
        }
    }

    pub fn levels_cleared(&self) -> usize {
        self.level_results.iter().filter(|r| r.success).count()
    }

    pub fn last_level_result(&self) -> Option<&LevelResult> {
        self.level_results.last()
    }
}

/// Older records kept results by level index and can contain holes.
fn skip_null_results<'de, D>(deserializer: D) -> Result<Vec<LevelResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<LevelResult>>>::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}
