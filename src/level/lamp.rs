use rand::rngs::StdRng;
use rand::Rng;

use super::{Attempt, LevelEngine, LevelHooks, LevelId, LevelInput, LevelView};
use crate::clock::Millis;
use crate::difficulty::DifficultyProfile;
use crate::util::format_ms;

pub const MIN_DELAY_MS: f64 = 1500.0;
pub const MAX_DELAY_MS: f64 = 3500.0;
/// How long the bulb stays lit after the flash.
pub const FLASH_MS: f64 = 800.0;
/// Presses before this share of the delay are penalised as too early.
pub const EARLY_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Armed {
    started_at: Millis,
    target_delay: f64,
}

/// Press Space as close as possible to a randomly delayed flash.
#[derive(Debug)]
pub struct LampEngine {
    profile: DifficultyProfile,
    rng: StdRng,
    attempt: Attempt,
    armed: Option<Armed>,
    last_target: Option<f64>,
}

impl LampEngine {
    pub fn new(profile: DifficultyProfile, mut rng: StdRng, hooks: &mut dyn LevelHooks) -> Self {
        let attempt = Attempt::start(LevelId::Lamp, &mut rng, hooks);
        Self {
            profile,
            rng,
            attempt,
            armed: None,
            last_target: None,
        }
    }

    /// Arm a round with an explicit delay.
    pub fn arm_with_delay(&mut self, now: Millis, target_delay: f64) {
        if self.armed.is_some() || self.attempt.finished {
            return;
        }
        self.armed = Some(Armed {
            started_at: now,
            target_delay,
        });
        self.last_target = Some(target_delay);
    }

    pub fn rounds(&self) -> u32 {
        self.attempt.rounds
    }

    fn deadline(&self, armed: &Armed) -> f64 {
        armed.started_at as f64 + armed.target_delay + self.profile.tolerance_ms * 2.0
    }

    fn check_deadline(&mut self, now: Millis, hooks: &mut dyn LevelHooks) {
        if let Some(armed) = self.armed {
            let deadline = self.deadline(&armed);
            if now as f64 >= deadline {
                self.conclude(armed, deadline - armed.started_at as f64, false, hooks);
            }
        }
    }

    fn conclude(&mut self, armed: Armed, elapsed: f64, pressed: bool, hooks: &mut dyn LevelHooks) {
        self.armed = None;
        let diff = (elapsed - armed.target_delay).abs();
        let score = self.attempt.rule.round_score(diff, self.profile.tolerance_ms);

        let penalty = if pressed && elapsed < armed.target_delay * EARLY_SHARE {
            self.attempt.penalize(self.profile.penalty_factor, hooks)
        } else {
            0
        };
        self.attempt.score(score as f64, hooks);

        let round = self.attempt.completed + 1;
        let mut entry = if pressed {
            format!("Round {round}: off by {} s, {score} pts", format_ms(diff))
        } else {
            format!("Round {round}: no press, off by {} s, {score} pts", format_ms(diff))
        };
        if penalty > 0 {
            entry.push_str(&format!(", penalty {penalty}"));
        }
        self.attempt.round_done(entry, hooks);
    }
}

impl LevelEngine for LampEngine {
    fn id(&self) -> LevelId {
        LevelId::Lamp
    }

    fn handle(&mut self, input: LevelInput, now: Millis, hooks: &mut dyn LevelHooks) {
        if self.attempt.finished {
            return;
        }
        self.check_deadline(now, hooks);
        if self.attempt.finished {
            return;
        }

        match input {
            LevelInput::StartRound => {
                if self.armed.is_none() {
                    let delay = self.rng.gen_range(MIN_DELAY_MS..MAX_DELAY_MS);
                    self.arm_with_delay(now, delay);
                }
            }
            LevelInput::Action => {
                if let Some(armed) = self.armed {
                    let elapsed = (now - armed.started_at) as f64;
                    self.conclude(armed, elapsed, true, hooks);
                }
            }
            _ => {}
        }
    }

    fn tick(&mut self, now: Millis, hooks: &mut dyn LevelHooks) {
        if self.attempt.finished {
            return;
        }
        self.check_deadline(now, hooks);
    }

    fn abort(&mut self, reason: &str, hooks: &mut dyn LevelHooks) {
        self.armed = None;
        self.attempt.abort(format!("Round stopped: {reason}"), hooks);
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
        match self.armed {
            Some(armed) => {
                let since = (now - armed.started_at) as f64;
                let lit = since >= armed.target_delay && since < armed.target_delay + FLASH_MS;
                LevelView::Lamp {
                    armed: true,
                    lit,
                    target_ms: Some(armed.target_delay),
                    hint: "Focus. The flash is coming soon.".to_string(),
                }
            }
            None => LevelView::Lamp {
                armed: false,
                lit: false,
                target_ms: self.last_target,
                hint: "Start an attempt, wait for the flash and hit Space.".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::Difficulty;
    use crate::level::test_support::{seeded, RecordingHooks};

    fn engine(hooks: &mut RecordingHooks) -> LampEngine {
        LampEngine::new(*Difficulty::Steady.profile(), seeded(42), hooks)
    }

    #[test]
    fn exact_press_scores_full_points() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);
        lamp.handle(LevelInput::Action, 2000, &mut hooks);

        assert_eq!(hooks.total, 120);
        assert_eq!(lamp.progress().0, 1);
        assert_eq!(lamp.round_log()[0], "Round 1: off by 0.00 s, 120 pts");
    }

    #[test]
    fn early_press_is_penalised() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);
        // 1000ms < 60% of 2000ms; diff 1000 -> precision 1/3 -> 40 pts
        lamp.handle(LevelInput::Action, 1000, &mut hooks);

        assert_eq!(hooks.penalties, 20);
        // penalty first (total floored at 0), then 40 awarded
        assert_eq!(hooks.total, 40);
        assert!(lamp.round_log()[0].ends_with("penalty 20"));
    }

    #[test]
    fn press_after_sixty_percent_is_not_penalised() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);
        lamp.handle(LevelInput::Action, 1200, &mut hooks);
        assert_eq!(hooks.penalties, 0);
    }

    #[test]
    fn missed_window_concludes_as_miss() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);

        lamp.tick(3499, &mut hooks);
        assert_eq!(lamp.progress().0, 0);

        lamp.tick(3500, &mut hooks);
        assert_eq!(lamp.progress().0, 1);
        assert_eq!(hooks.total, 0);
        assert_eq!(hooks.penalties, 0);
        // measured at the deadline itself: off by the whole 1.5 s window
        assert_eq!(lamp.round_log()[0], "Round 1: no press, off by 1.50 s, 0 pts");

        // a late press does nothing once the round is gone
        lamp.handle(LevelInput::Action, 3600, &mut hooks);
        assert_eq!(lamp.progress().0, 1);
    }

    #[test]
    fn action_without_armed_round_is_ignored() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.handle(LevelInput::Action, 500, &mut hooks);
        assert_eq!(lamp.progress().0, 0);
        assert_eq!(hooks.total, 0);
    }

    #[test]
    fn start_round_draws_delay_in_range() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.handle(LevelInput::StartRound, 0, &mut hooks);
        match lamp.view(0) {
            LevelView::Lamp {
                armed, target_ms, ..
            } => {
                assert!(armed);
                let t = target_ms.unwrap();
                assert!((MIN_DELAY_MS..MAX_DELAY_MS).contains(&t));
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn bulb_lit_only_during_flash() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);
        let lit = |v: LevelView| matches!(v, LevelView::Lamp { lit: true, .. });
        assert!(!lit(lamp.view(1999)));
        assert!(lit(lamp.view(2000)));
        assert!(lit(lamp.view(2799)));
        assert!(!lit(lamp.view(2800)));
    }

    #[test]
    fn perfect_level_succeeds() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        let rounds = lamp.rounds();
        let mut t = 0;
        for _ in 0..rounds {
            lamp.arm_with_delay(t, 2000.0);
            t += 2000;
            lamp.handle(LevelInput::Action, t, &mut hooks);
            t += 100;
        }
        assert!(lamp.is_finished());
        assert_eq!(hooks.completed.len(), 1);
        let result = &hooks.completed[0];
        assert!(result.success);
        assert_eq!(result.score, 120 * rounds);
        assert_eq!(hooks.progress.last(), Some(&(rounds, rounds)));
    }

    #[test]
    fn sloppy_level_fails() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        let rounds = lamp.rounds();
        let mut t = 0;
        for _ in 0..rounds {
            lamp.arm_with_delay(t, 2000.0);
            // 1000ms late -> 40 pts, below the 60 average
            t += 3000;
            lamp.handle(LevelInput::Action, t, &mut hooks);
        }
        let result = &hooks.completed[0];
        assert!(!result.success);
        assert_eq!(result.completed, rounds);
    }

    #[test]
    fn abort_is_final() {
        let mut hooks = RecordingHooks::default();
        let mut lamp = engine(&mut hooks);
        lamp.arm_with_delay(0, 2000.0);
        lamp.handle(LevelInput::Action, 2000, &mut hooks);
        lamp.abort("player stopped", &mut hooks);
        lamp.abort("twice", &mut hooks);
        lamp.handle(LevelInput::StartRound, 3000, &mut hooks);

        assert_eq!(hooks.completed.len(), 1);
        let result = &hooks.completed[0];
        assert!(!result.success);
        assert_eq!(result.score, 120);
        assert_eq!(result.completed, 1);
        assert_eq!(
            result.rounds_log.last().unwrap(),
            "Round stopped: player stopped"
        );
    }
}
