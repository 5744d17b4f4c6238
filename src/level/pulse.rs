use rand::rngs::StdRng;
use rand::Rng;

use super::{Attempt, LevelEngine, LevelHooks, LevelId, LevelInput, LevelView};
use crate::clock::Millis;
use crate::difficulty::DifficultyProfile;
use crate::util::format_ms;

pub const MIN_INTERVAL_MS: f64 = 1200.0;
pub const MAX_INTERVAL_MS: f64 = 2600.0;
pub const FLASH_MS: Millis = 450;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// First flash shown, second one due at `second_at`.
    Listening { first_at: Millis, second_at: Millis },
    /// Both flashes seen; the player predicts the third.
    Ready { second_at: Millis, expected_at: Millis },
}

/// Two flashes set an interval; double-click where the third one would be.
#[derive(Debug)]
pub struct PulseEngine {
    profile: DifficultyProfile,
    rng: StdRng,
    attempt: Attempt,
    phase: Phase,
    last_error: Option<(f64, u32)>,
}

impl PulseEngine {
    pub fn new(profile: DifficultyProfile, mut rng: StdRng, hooks: &mut dyn LevelHooks) -> Self {
        let attempt = Attempt::start(LevelId::Pulse, &mut rng, hooks);
        Self {
            profile,
            rng,
            attempt,
            phase: Phase::Idle,
            last_error: None,
        }
    }

    /// Start a pulse with an explicit interval.
    pub fn start_with_interval(&mut self, now: Millis, interval_ms: f64) {
        if self.attempt.finished {
            return;
        }
        self.phase = Phase::Listening {
            first_at: now,
            second_at: now + interval_ms.round() as Millis,
        };
    }

    /// When the third flash would land, once it is known.
    pub fn expected_at(&self) -> Option<Millis> {
        match self.phase {
            Phase::Ready { expected_at, .. } => Some(expected_at),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready { .. })
    }

    pub fn rounds(&self) -> u32 {
        self.attempt.rounds
    }

    fn start_pulse(&mut self, now: Millis) {
        let interval = self.rng.gen_range(MIN_INTERVAL_MS..MAX_INTERVAL_MS);
        self.start_with_interval(now, interval);
    }

    fn advance(&mut self, now: Millis) {
        if let Phase::Listening {
            first_at,
            second_at,
        } = self.phase
        {
            if now >= second_at {
                self.phase = Phase::Ready {
                    second_at,
                    expected_at: second_at + (second_at - first_at),
                };
            }
        }
    }

    fn double_click(&mut self, now: Millis, hooks: &mut dyn LevelHooks) {
        let Phase::Ready { expected_at, .. } = self.phase else {
            self.attempt
                .penalize(self.profile.penalty_factor / 2.0, hooks);
            self.attempt.log.push("Double-click too early.".to_string());
            return;
        };

        self.phase = Phase::Idle;
        let diff = (now - expected_at).abs() as f64;
        let score = self.attempt.rule.round_score(diff, self.profile.tolerance_ms);
        self.attempt.score(score as f64, hooks);
        self.last_error = Some((diff, score));

        let round = self.attempt.completed + 1;
        let entry = format!("Jump {round}: off by {} s, {score} pts", format_ms(diff));
        if !self.attempt.round_done(entry, hooks) {
            self.start_pulse(now);
        }
    }
}

impl LevelEngine for PulseEngine {
    fn id(&self) -> LevelId {
        LevelId::Pulse
    }

    fn handle(&mut self, input: LevelInput, now: Millis, hooks: &mut dyn LevelHooks) {
        if self.attempt.finished {
            return;
        }
        self.advance(now);
        match input {
            LevelInput::StartRound => {
                if !self.is_ready() {
                    self.start_pulse(now);
                }
            }
            LevelInput::DoubleClick => self.double_click(now, hooks),
            _ => {}
        }
    }

    fn tick(&mut self, now: Millis, _hooks: &mut dyn LevelHooks) {
        if self.attempt.finished {
            return;
        }
        self.advance(now);
    }

    fn abort(&mut self, reason: &str, hooks: &mut dyn LevelHooks) {
        self.phase = Phase::Idle;
        self.attempt.abort(format!("Series stopped: {reason}"), hooks);
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

    fn view(&self, now: Millis) -> LevelView {
        let flashing = |at: Millis| now >= at && now < at + FLASH_MS;
        match self.phase {
            Phase::Idle => LevelView::Pulse {
                flash: false,
                ready: false,
                hint: match self.last_error {
                    Some((diff, score)) => format!("Off by {} s · {score} pts", format_ms(diff)),
                    None => "Watch the flashes, then double-click.".to_string(),
                },
            },
            Phase::Listening {
                first_at,
                second_at,
            } => LevelView::Pulse {
                flash: flashing(first_at) || flashing(second_at),
                ready: false,
                hint: "Feel the rhythm: two flashes set the interval.".to_string(),
            },
            Phase::Ready { second_at, .. } => LevelView::Pulse {
                flash: flashing(second_at),
                ready: true,
                hint: "Predict the next flash and double-click.".to_string(),
            },
        }
    }
}
