use rand::rngs::StdRng;
use rand::Rng;

use super::{Attempt, LevelEngine, LevelHooks, LevelId, LevelInput, LevelView};
use crate::clock::Millis;
use crate::difficulty::{Difficulty, DifficultyProfile};
use crate::util::format_ms;

/// Track length in abstract units; the UI scales it to whatever it has.
pub const TRACK_LENGTH: f64 = 1000.0;
/// Half the lateral width of the track.
pub const TRACK_HALF_WIDTH: f64 = 50.0;
/// Margin kept between the token and the track ends.
pub const TRACK_MARGIN: f64 = 30.0;
pub const GOAL_RADIUS: f64 = 60.0;
pub const MIN_HOLD_MS: f64 = 2000.0;
pub const MAX_HOLD_MS: f64 = 4500.0;
pub const RUSH_HOLD_SCALE: f64 = 0.8;
pub const TOKEN_START: f64 = 0.1;

/// A position on the runner track: `x` along it, `y` across it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackPoint {
    pub x: f64,
    pub y: f64,
}

impl TrackPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn at_progress(progress: f64, y: f64) -> Self {
        Self::new(progress * TRACK_LENGTH, y)
    }

    pub fn distance(&self, other: &TrackPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Keep the point on the track.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(TRACK_MARGIN, TRACK_LENGTH - TRACK_MARGIN),
            y: self.y.clamp(-TRACK_HALF_WIDTH, TRACK_HALF_WIDTH),
        }
    }
}

/// Drag the token for a set time and drop it inside the goal.
#[derive(Debug)]
pub struct RunnerEngine {
    profile: DifficultyProfile,
    rng: StdRng,
    attempt: Attempt,
    ready: bool,
    drag_started: Option<Millis>,
    target_ms: f64,
    token: TrackPoint,
    goal: TrackPoint,
}

impl RunnerEngine {
    pub fn new(profile: DifficultyProfile, mut rng: StdRng, hooks: &mut dyn LevelHooks) -> Self {
        let attempt = Attempt::start(LevelId::Runner, &mut rng, hooks);
        let mut engine = Self {
            profile,
            rng,
            attempt,
            ready: false,
            drag_started: None,
            target_ms: 0.0,
            token: TrackPoint::at_progress(TOKEN_START, 0.0),
            goal: TrackPoint::default(),
        };
        engine.prepare_round();
        engine
    }

    /// Replace the prepared round with fixed values.
    pub fn prepare_with(&mut self, target_ms: f64, goal: TrackPoint) {
        if self.drag_started.is_some() || self.attempt.finished {
            return;
        }
        self.ready = true;
        self.target_ms = target_ms;
        self.goal = goal;
        self.token = TrackPoint::at_progress(TOKEN_START, 0.0);
    }

    pub fn goal(&self) -> TrackPoint {
        self.goal
    }

    pub fn target_ms(&self) -> f64 {
        self.target_ms
    }

    pub fn rounds(&self) -> u32 {
        self.attempt.rounds
    }

    fn prepare_round(&mut self) {
        let scale = if self.profile.difficulty == Difficulty::Rush {
            RUSH_HOLD_SCALE
        } else {
            1.0
        };
        let target = self.rng.gen_range(MIN_HOLD_MS..MAX_HOLD_MS) * scale;
        let progress = self.rng.gen_range(0.3..0.9);
        let offset = self.rng.gen_range(-20.0..=20.0);
        self.prepare_with(target, TrackPoint::at_progress(progress, offset));
    }

    fn conclude(&mut self, started: Millis, now: Millis, hooks: &mut dyn LevelHooks) {
        self.drag_started = None;
        self.ready = false;

        let duration = (now - started) as f64;
        let diff = (duration - self.target_ms).abs();
        let within_goal = self.token.distance(&self.goal) < GOAL_RADIUS;
        let score = if within_goal {
            self.attempt.rule.round_score(diff, self.profile.tolerance_ms)
        } else {
            0
        };
        if !within_goal {
            self.attempt.penalize(self.profile.penalty_factor, hooks);
        }
        self.attempt.score(score as f64, hooks);

        let round = self.attempt.completed + 1;
        let entry = format!(
            "Run {round}: {}, off by {} s, {score} pts",
            if within_goal {
                "reached the burrow"
            } else {
                "missed the burrow"
            },
            format_ms(diff)
        );
        if !self.attempt.round_done(entry, hooks) {
            self.prepare_round();
        }
    }
}

impl LevelEngine for RunnerEngine {
    fn id(&self) -> LevelId {
        LevelId::Runner
    }

    fn handle(&mut self, input: LevelInput, now: Millis, hooks: &mut dyn LevelHooks) {
        if self.attempt.finished {
            return;
        }
        match input {
            LevelInput::PointerDown(point) => {
                if self.ready && self.drag_started.is_none() {
                    self.drag_started = Some(now);
                    self.token = point.clamped();
                }
            }
            LevelInput::PointerMove(point) => {
                if self.drag_started.is_some() {
                    self.token = point.clamped();
                }
            }
            LevelInput::PointerUp(point) => {
                if let Some(started) = self.drag_started {
                    self.token = point.clamped();
                    self.conclude(started, now, hooks);
                }
            }
            LevelInput::Reposition | LevelInput::StartRound => {
                if self.drag_started.is_none() {
                    self.prepare_round();
                    hooks.announce("The burrow moved!");
                }
            }
            _ => {}
        }
    }

    fn tick(&mut self, _now: Millis, _hooks: &mut dyn LevelHooks) {}

    fn abort(&mut self, reason: &str, hooks: &mut dyn LevelHooks) {
        self.drag_started = None;
        self.ready = false;
        self.attempt.abort(format!("Run cancelled: {reason}"), hooks);
    }

    fn is_finished(&self) -> bool {
        self.attempt.finished
    }

    fn progress(&self) -> (u32, u32) {
        (self.attempt.completed, self.attempt.rounds)
    }

    fn round_log(&self) -> &[String] {
        &self.attempt.log
    }

    fn view(&self, _now: Millis) -> LevelView {
        LevelView::Runner {
            ready: self.ready,
            dragging: self.drag_started.is_some(),
            token: self.token,
            goal: self.goal,
            goal_radius: GOAL_RADIUS,
            target_ms: self.target_ms,
            hint: format!(
                "Hold the mouse for {} s and drop it in the burrow.",
                format_ms(self.target_ms)
            ),
        }
    }
}
