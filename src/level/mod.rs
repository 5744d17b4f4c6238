//! Level engines: the three timing challenges and the contract they share.
//!
//! An engine is created for one attempt, fed inputs and clock ticks by the
//! session controller, and reports through [`LevelHooks`]. It never keeps a
//! reference to the session; the hooks are passed into every call.

pub mod lamp;
pub mod pulse;
pub mod runner;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::clock::Millis;
use crate::difficulty::DifficultyProfile;
use crate::scoring::ScoreRule;

pub use lamp::LampEngine;
pub use pulse::PulseEngine;
pub use runner::{RunnerEngine, TrackPoint};

pub const MIN_ROUNDS: u32 = 3;
pub const MAX_ROUNDS: u32 = 5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LevelId {
    Lamp,
    Runner,
    Pulse,
}

impl LevelId {
    /// Play order.
    pub const ORDER: [LevelId; 3] = [LevelId::Lamp, LevelId::Runner, LevelId::Pulse];

    pub fn title(self) -> &'static str {
        match self {
            LevelId::Lamp => "Lamp Impulse",
            LevelId::Runner => "Mouse and Tunnel",
            LevelId::Pulse => "Timer Jumper",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LevelId::Lamp => {
                "Memorise the delay and stop the lamp with Space right on the flash."
            }
            LevelId::Runner => {
                "Drag the mouse along the track into its burrow in exactly the shown time."
            }
            LevelId::Pulse => {
                "Remember the interval between two flashes and double-click on the next one."
            }
        }
    }
}

/// Player input routed to the active engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelInput {
    /// Arm the next round (lamp attempt button, pulse "show intervals").
    StartRound,
    /// The action key (Space) for the lamp.
    Action,
    PointerDown(TrackPoint),
    PointerMove(TrackPoint),
    PointerUp(TrackPoint),
    /// Ask the runner for a fresh goal and duration.
    Reposition,
    DoubleClick,
}

/// Callbacks an engine reports through. Score and penalty hooks return the
/// amount actually booked after rounding and clamping.
pub trait LevelHooks {
    fn on_score(&mut self, points: f64) -> u32;
    fn on_penalty(&mut self, value: f64) -> u32;
    fn on_round_progress(&mut self, done: u32, total: u32);
    fn on_complete(&mut self, result: LevelResult);
    fn announce(&mut self, _text: &str) {}
}

/// Outcome of a single level attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelResult {
    pub id: LevelId,
    pub success: bool,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub penalty: u32,
    #[serde(default)]
    pub rounds: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub rounds_log: Vec<String>,
}

/// What the UI needs to draw the playground.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelView {
    Lamp {
        armed: bool,
        lit: bool,
        target_ms: Option<f64>,
        hint: String,
    },
    Runner {
        ready: bool,
        dragging: bool,
        token: TrackPoint,
        goal: TrackPoint,
        goal_radius: f64,
        target_ms: f64,
        hint: String,
    },
    Pulse {
        flash: bool,
        ready: bool,
        hint: String,
    },
}

/// One attempt at a level, regardless of variant.
pub trait LevelEngine {
    fn id(&self) -> LevelId;
    fn handle(&mut self, input: LevelInput, now: Millis, hooks: &mut dyn LevelHooks);
    /// Fire any timer whose deadline has passed.
    fn tick(&mut self, now: Millis, hooks: &mut dyn LevelHooks);
    /// End the attempt at once, reporting what was earned with `success = false`.
    fn abort(&mut self, reason: &str, hooks: &mut dyn LevelHooks);
    fn is_finished(&self) -> bool;
    /// `(completed, total)` rounds.
    fn progress(&self) -> (u32, u32);
    fn round_log(&self) -> &[String];
    fn view(&self, now: Millis) -> LevelView;
}

pub fn build_engine(
    id: LevelId,
    profile: &DifficultyProfile,
    rng: &mut impl Rng,
    hooks: &mut dyn LevelHooks,
) -> Box<dyn LevelEngine> {
    let engine_rng = StdRng::seed_from_u64(rng.gen());
    match id {
        LevelId::Lamp => Box::new(LampEngine::new(*profile, engine_rng, hooks)),
        LevelId::Runner => Box::new(RunnerEngine::new(*profile, engine_rng, hooks)),
        LevelId::Pulse => Box::new(PulseEngine::new(*profile, engine_rng, hooks)),
    }
}

/// Bookkeeping shared by every engine: round counts, level totals, the
/// round log and the finished guard.
#[derive(Debug, Clone)]
pub(crate) struct Attempt {
    pub id: LevelId,
    pub rule: ScoreRule,
    pub rounds: u32,
    pub completed: u32,
    pub level_score: u32,
    pub level_penalty: u32,
    pub finished: bool,
    pub log: Vec<String>,
}

impl Attempt {
    pub fn start(id: LevelId, rng: &mut impl Rng, hooks: &mut dyn LevelHooks) -> Self {
        let rounds = rng.gen_range(MIN_ROUNDS..=MAX_ROUNDS);
        hooks.on_round_progress(0, rounds);
        Self {
            id,
            rule: ScoreRule::for_level(id),
            rounds,
            completed: 0,
            level_score: 0,
            level_penalty: 0,
            finished: false,
            log: Vec::new(),
        }
    }

    pub fn score(&mut self, points: f64, hooks: &mut dyn LevelHooks) -> u32 {
        let awarded = hooks.on_score(points);
        self.level_score += awarded;
        awarded
    }

    pub fn penalize(&mut self, value: f64, hooks: &mut dyn LevelHooks) -> u32 {
        let booked = hooks.on_penalty(value);
        self.level_penalty += booked;
        booked
    }

    /// Count a finished round; completes the level once all rounds are in.
    /// Returns true when the attempt is over.
    pub fn round_done(&mut self, entry: String, hooks: &mut dyn LevelHooks) -> bool {
        self.completed += 1;
        hooks.on_round_progress(self.completed, self.rounds);
        self.log.push(entry);
        if self.completed >= self.rounds {
            let success = self
                .rule
                .passed(self.completed, self.rounds, self.level_score);
            self.complete(success, hooks);
            return true;
        }
        false
    }

    pub fn abort(&mut self, entry: String, hooks: &mut dyn LevelHooks) {
        if self.finished {
            return;
        }
        self.log.push(entry);
        self.complete(false, hooks);
    }

    fn complete(&mut self, success: bool, hooks: &mut dyn LevelHooks) {
        if self.finished {
            return;
        }
        self.finished = true;
        hooks.on_complete(self.result(success));
    }

    pub fn result(&self, success: bool) -> LevelResult {
        LevelResult {
            id: self.id,
            success,
            score: self.level_score,
            penalty: self.level_penalty,
            rounds: self.rounds,
            completed: self.completed,
            rounds_log: self.log.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::util::non_negative_round;

    /// Hooks that apply the session accounting rules to local counters.
    #[derive(Debug, Default)]
    pub struct RecordingHooks {
        pub total: u32,
        pub penalties: u32,
        pub progress: Vec<(u32, u32)>,
        pub completed: Vec<LevelResult>,
        pub notices: Vec<String>,
    }

    impl LevelHooks for RecordingHooks {
        fn on_score(&mut self, points: f64) -> u32 {
            let awarded = non_negative_round(points);
            self.total += awarded;
            awarded
        }

        fn on_penalty(&mut self, value: f64) -> u32 {
            let penalty = non_negative_round(value);
            self.penalties += penalty;
            self.total = self
                .total
                .saturating_sub(non_negative_round(penalty as f64 / 2.0));
            penalty
        }

        fn on_round_progress(&mut self, done: u32, total: u32) {
            self.progress.push((done, total));
        }

        fn on_complete(&mut self, result: LevelResult) {
            self.completed.push(result);
        }

        fn announce(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
    }

    pub fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }
}
