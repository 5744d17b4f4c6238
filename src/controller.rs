//! The session state machine: level progression, accounting, the global
//! countdown and everything that happens when a session ends.

use chrono::{DateTime, TimeZone, Utc};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::clock::{Clock, Millis};
use crate::countdown::{Countdown, CountdownStatus};
use crate::difficulty::DifficultyProfile;
use crate::error::SessionError;
use crate::history::{HistoryLog, HistoryRow};
use crate::level::{build_engine, LevelEngine, LevelHooks, LevelId, LevelInput, LevelResult, LevelView};
use crate::player::PlayerProfile;
use crate::rating::{RatingEntry, RatingScheme, OVERALL_BUCKET};
use crate::session::{Session, SessionStatus};
use crate::storage::{GameStore, KvStore};

/// What happens to a failed level's points.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RefundPolicy {
    /// Subtract the level's points from the total again.
    #[default]
    Refund,
    /// Let the player keep them.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    LevelActive,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStart {
    Started(LevelId),
    /// There was no level left; the session is now completed.
    SessionCompleted,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub refund_policy: RefundPolicy,
    pub rating_scheme: RatingScheme,
    /// Fixed seed for reproducible rounds.
    pub seed: Option<u64>,
    pub history: Option<HistoryLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Played,
    Aborted,
}

/// Hooks handed to the active engine: the session ledger plus the bits of
/// UI state the engine reports into.
struct SessionHost<'a> {
    session: &'a mut Session,
    progress: &'a mut (u32, u32),
    notices: &'a mut VecDeque<String>,
    completed: Option<LevelResult>,
}

impl LevelHooks for SessionHost<'_> {
    fn on_score(&mut self, points: f64) -> u32 {
        self.session.award(points)
    }

    fn on_penalty(&mut self, value: f64) -> u32 {
        self.session.apply_penalty(value)
    }

    fn on_round_progress(&mut self, done: u32, total: u32) {
        *self.progress = (done, total);
    }

    fn on_complete(&mut self, result: LevelResult) {
        if self.completed.is_none() {
            self.completed = Some(result);
        }
    }

    fn announce(&mut self, text: &str) {
        self.notices.push_back(text.to_string());
    }
}

pub struct SessionController<S: KvStore, C: Clock> {
    store: GameStore<S>,
    clock: C,
    rng: StdRng,
    profile: &'static DifficultyProfile,
    session: Session,
    countdown: Countdown,
    /// Index into `LevelId::ORDER` of the current (or last started) level.
    level_index: Option<usize>,
    engine: Option<Box<dyn LevelEngine>>,
    progress: (u32, u32),
    last_outcome: Option<bool>,
    notices: VecDeque<String>,
    refund_policy: RefundPolicy,
    rating_scheme: RatingScheme,
    history: Option<HistoryLog>,
}

impl<S: KvStore, C: Clock> SessionController<S, C> {
    /// Start a session for `player`; the countdown runs from now.
    pub fn new(player: &PlayerProfile, store: GameStore<S>, clock: C, options: ControllerOptions) -> Self {
        let now = clock.now_ms();
        let profile = player.difficulty.profile();
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(player = %player.name, difficulty = %player.difficulty, "session started");
        Self {
            store,
            clock,
            rng,
            profile,
            session: Session::new(player, now),
            countdown: Countdown::start(profile.global_time_secs, now),
            level_index: None,
            engine: None,
            progress: (0, 0),
            last_outcome: None,
            notices: VecDeque::new(),
            refund_policy: options.refund_policy,
            rating_scheme: options.rating_scheme,
            history: options.history,
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.session.status.is_terminal() {
            ControllerState::Finished
        } else if self.engine.is_some() {
            ControllerState::LevelActive
        } else {
            ControllerState::Idle
        }
    }

    pub fn start_next_level(&mut self) -> Result<LevelStart, SessionError> {
        self.tick();
        match self.state() {
            ControllerState::Finished => return Err(SessionError::Finished),
            ControllerState::LevelActive => return Err(SessionError::LevelActive),
            ControllerState::Idle => {}
        }

        let index = self.level_index.map_or(0, |i| i + 1);
        let Some(&id) = LevelId::ORDER.get(index) else {
            self.finalize(SessionStatus::Completed, "All levels completed.");
            return Ok(LevelStart::SessionCompleted);
        };
        self.level_index = Some(index);

        let mut host = SessionHost {
            session: &mut self.session,
            progress: &mut self.progress,
            notices: &mut self.notices,
            completed: None,
        };
        let engine = build_engine(id, self.profile, &mut self.rng, &mut host);
        debug!(level = %id, rounds = engine.progress().1, "level started");
        self.engine = Some(engine);
        Ok(LevelStart::Started(id))
    }

    /// Route player input to the active level.
    pub fn handle(&mut self, input: LevelInput) -> Result<(), SessionError> {
        self.tick();
        match self.state() {
            ControllerState::Finished => return Err(SessionError::Finished),
            ControllerState::Idle => return Err(SessionError::NoActiveLevel),
            ControllerState::LevelActive => {}
        }
        let now = self.clock.now_ms();
        if let Some(result) = self.with_engine(|engine, host| engine.handle(input, now, host)) {
            self.level_complete(result, Completion::Played);
        }
        Ok(())
    }

    /// Advance the countdown and fire level timers.
    pub fn tick(&mut self) {
        if self.session.status.is_terminal() {
            return;
        }
        let now = self.clock.now_ms();
        if self.countdown.advance(now) == CountdownStatus::Expired {
            self.finalize(SessionStatus::Timeout, "The global timer ran out.");
            return;
        }
        if let Some(result) = self.with_engine(|engine, host| engine.tick(now, host)) {
            self.level_complete(result, Completion::Played);
        }
    }

    /// Stop the current level. Costs twice the difficulty's penalty factor.
    pub fn abort_level(&mut self, reason: &str) -> Result<(), SessionError> {
        self.tick();
        match self.state() {
            ControllerState::Finished => return Err(SessionError::Finished),
            ControllerState::Idle => return Err(SessionError::NoActiveLevel),
            ControllerState::LevelActive => {}
        }
        let title = self.current_level().map(LevelId::title).unwrap_or_default();
        if let Some(result) = self.with_engine(|engine, host| engine.abort(reason, host)) {
            self.level_complete(result, Completion::Aborted);
        }
        self.session.apply_penalty(self.profile.penalty_factor * 2.0);
        self.notices.push_back(format!("Level {title} stopped."));
        Ok(())
    }

    /// The player quits the game.
    pub fn exit(&mut self) {
        self.finalize(SessionStatus::Aborted, "The player ended the game early.");
    }

    /// Persist an unfinished session as aborted, for when the program is
    /// closed mid-game. Finished sessions are already saved.
    pub fn suspend(&mut self) {
        if self.session.status.is_terminal() {
            return;
        }
        let mut snapshot = self.session.clone();
        snapshot.status = SessionStatus::Aborted;
        snapshot.finished_at = Some(self.clock.now_ms());
        snapshot.message = Some("The game was closed before the end.".to_string());
        if let Err(err) = self.store.save_session(Some(&snapshot)) {
            warn!(error = %err, "could not save suspended session");
        }
    }

    fn with_engine<F>(&mut self, f: F) -> Option<LevelResult>
    where
        F: FnOnce(&mut dyn LevelEngine, &mut SessionHost<'_>),
    {
        let engine = self.engine.as_mut()?;
        let mut host = SessionHost {
            session: &mut self.session,
            progress: &mut self.progress,
            notices: &mut self.notices,
            completed: None,
        };
        f(engine.as_mut(), &mut host);
        host.completed.take()
    }

    fn level_complete(&mut self, result: LevelResult, completion: Completion) {
        self.engine = None;
        let index = self.level_index.unwrap_or(0);
        let title = result.id.title();
        let success = result.success;
        let score = result.score;
        info!(level = %result.id, success, score, penalty = result.penalty, "level finished");
        self.session.level_results.push(result);
        self.last_outcome = Some(success);

        if success {
            self.notices.push_back(format!("Level «{title}» passed."));
            if index + 1 >= LevelId::ORDER.len() {
                self.finalize(SessionStatus::Completed, "All levels passed.");
            }
            return;
        }

        if self.refund_policy == RefundPolicy::Refund && score > 0 {
            self.session.refund(score);
        }
        if completion == Completion::Played {
            self.notices
                .push_back(format!("Not enough points on «{title}». Try again."));
        }
        self.level_index = index.checked_sub(1);
    }

    fn finalize(&mut self, status: SessionStatus, message: &str) {
        if self.session.status.is_terminal() {
            return;
        }
        self.countdown.stop();

        let now = self.clock.now_ms();
        // A level still running is cut off where it stands.
        if let Some(result) = self.with_engine(|engine, host| engine.abort(message, host)) {
            self.session.level_results.push(result);
        }
        self.engine = None;

        self.session.status = status;
        self.session.finished_at = Some(now);
        self.session.message = Some(message.to_string());
        info!(
            status = %status,
            score = self.session.total_score,
            penalties = self.session.penalties,
            "session finished"
        );

        if let Err(err) = self.store.save_session(Some(&self.session)) {
            warn!(error = %err, "could not save session");
        }
        if let Some(history) = &self.history {
            let row = HistoryRow::from_session(&self.session, to_datetime(now));
            if let Err(err) = history.append(&row) {
                warn!(error = %err, "could not append session history");
            }
        }
        if status == SessionStatus::Completed {
            self.push_ratings(now);
        }
        self.notices.push_back(format!("Game over: {message}"));
    }

    fn push_ratings(&mut self, now: Millis) {
        let duration = self.session.duration_secs();
        let base = RatingEntry {
            name: self.session.player_name.clone(),
            score: self.session.total_score,
            penalty: self.session.penalties,
            duration,
            date: to_datetime(now),
            difficulty: Some(self.session.difficulty),
            level: None,
        };

        let entries: Vec<(String, RatingEntry)> = match self.rating_scheme {
            RatingScheme::Flat => vec![(OVERALL_BUCKET.to_string(), base)],
            RatingScheme::PerDifficulty => vec![(self.session.difficulty.to_string(), base)],
            RatingScheme::PerLevel => self
                .session
                .level_results
                .iter()
                .filter(|r| r.success)
                .map(|r| {
                    let entry = RatingEntry {
                        score: r.score,
                        penalty: r.penalty,
                        level: Some(r.id),
                        ..base.clone()
                    };
                    (r.id.to_string(), entry)
                })
                .collect(),
        };

        for (bucket, entry) in entries {
            match self.store.push_rating(&bucket, entry) {
                Ok(Some(place)) => {
                    self.notices
                        .push_back(format!("New rating entry: #{place} in {bucket}."));
                }
                Ok(None) => {}
                Err(err) => warn!(bucket, error = %err, "could not save rating"),
            }
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn profile(&self) -> &'static DifficultyProfile {
        self.profile
    }

    pub fn store(&self) -> &GameStore<S> {
        &self.store
    }

    /// The level being played, if any.
    pub fn current_level(&self) -> Option<LevelId> {
        self.engine.as_ref().map(|e| e.id())
    }

    /// The level the start button would open.
    pub fn upcoming_level(&self) -> Option<LevelId> {
        if self.engine.is_some() {
            return None;
        }
        LevelId::ORDER
            .get(self.level_index.map_or(0, |i| i + 1))
            .copied()
    }

    /// `"2 / 3"`, or `None` before the first level.
    pub fn level_label(&self) -> Option<String> {
        self.level_index
            .map(|i| format!("{} / {}", i + 1, LevelId::ORDER.len()))
    }

    pub fn start_label(&self) -> &'static str {
        match (self.last_outcome, self.upcoming_level()) {
            (_, None) => "Finish",
            (None, Some(_)) => "Start level",
            (Some(false), Some(_)) => "Retry level",
            (Some(true), Some(_)) => "Next level",
        }
    }

    pub fn progress(&self) -> (u32, u32) {
        self.progress
    }

    /// Round progress as a percentage, capped at 100.
    pub fn progress_percent(&self) -> u16 {
        let (done, total) = self.progress;
        if total == 0 {
            return 0;
        }
        (crate::util::round_half_up(done as f64 / total as f64 * 100.0) as u16).min(100)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining_secs()
    }

    pub fn timer_display(&self) -> String {
        self.countdown.display()
    }

    pub fn level_view(&self) -> Option<LevelView> {
        let now = self.clock.now_ms();
        self.engine.as_ref().map(|e| e.view(now))
    }

    /// Round log of the running level, or of the last finished one.
    pub fn round_log(&self) -> Vec<String> {
        match &self.engine {
            Some(engine) => engine.round_log().to_vec(),
            None => self
                .session
                .last_level_result()
                .map(|r| r.rounds_log.clone())
                .unwrap_or_default(),
        }
    }

    pub fn drain_notices(&mut self) -> Vec<String> {
        self.notices.drain(..).collect()
    }
}

fn to_datetime(ms: Millis) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::difficulty::Difficulty;
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;

    fn controller(difficulty: Difficulty) -> (SessionController<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let player = PlayerProfile::new("ada", difficulty, 0).unwrap();
        let options = ControllerOptions {
            seed: Some(17),
            ..Default::default()
        };
        let ctl = SessionController::new(&player, GameStore::new(MemoryStore::new()), clock.clone(), options);
        (ctl, clock)
    }

    #[test]
    fn starts_idle_with_full_budget() {
        let (ctl, _) = controller(Difficulty::Steady);
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.remaining_secs(), 180);
        assert_eq!(ctl.timer_display(), "03:00");
        assert_eq!(ctl.upcoming_level(), Some(LevelId::Lamp));
        assert_eq!(ctl.start_label(), "Start level");
        assert!(ctl.level_label().is_none());
    }

    #[test]
    fn refuses_second_level_while_active() {
        let (mut ctl, _) = controller(Difficulty::Steady);
        assert_matches!(ctl.start_next_level(), Ok(LevelStart::Started(LevelId::Lamp)));
        assert_eq!(ctl.state(), ControllerState::LevelActive);
        assert_eq!(ctl.start_next_level(), Err(SessionError::LevelActive));
        assert_eq!(ctl.level_label().as_deref(), Some("1 / 3"));
        let (done, total) = ctl.progress();
        assert_eq!(done, 0);
        assert!((3..=5).contains(&total));
    }

    #[test]
    fn input_without_level_is_rejected() {
        let (mut ctl, _) = controller(Difficulty::Steady);
        assert_eq!(ctl.handle(LevelInput::Action), Err(SessionError::NoActiveLevel));
        assert_eq!(ctl.abort_level("x"), Err(SessionError::NoActiveLevel));
    }

    #[test]
    fn abort_applies_double_penalty_and_retries_same_level() {
        let (mut ctl, _) = controller(Difficulty::Steady);
        ctl.start_next_level().unwrap();
        ctl.abort_level("player stopped the level").unwrap();

        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.session().penalties, 40);
        assert_eq!(ctl.session().total_score, 0);
        let result = ctl.session().last_level_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.id, LevelId::Lamp);
        assert_eq!(ctl.upcoming_level(), Some(LevelId::Lamp));
        assert_eq!(ctl.start_label(), "Retry level");

        let notices = ctl.drain_notices();
        assert!(notices.iter().any(|n| n.contains("stopped")));
        assert!(!notices.iter().any(|n| n.contains("Not enough points")));
    }

    #[test]
    fn timeout_mid_level_finishes_session() {
        let (mut ctl, clock) = controller(Difficulty::Rush);
        ctl.start_next_level().unwrap();
        ctl.handle(LevelInput::StartRound).unwrap();

        clock.advance(149_999);
        ctl.tick();
        assert_eq!(ctl.session().status, SessionStatus::InProgress);

        clock.advance(1);
        ctl.tick();
        assert_eq!(ctl.state(), ControllerState::Finished);
        assert_eq!(ctl.session().status, SessionStatus::Timeout);
        assert_eq!(ctl.remaining_secs(), 0);
        assert!(ctl.current_level().is_none());
        // the cut-off attempt is kept
        assert_eq!(ctl.session().level_results.len(), 1);
        assert!(!ctl.session().level_results[0].success);
        // persisted, but no rating for a timeout
        assert_eq!(ctl.store().last_session().unwrap().status, SessionStatus::Timeout);
        assert!(ctl.store().rating().is_empty());
        assert_eq!(ctl.handle(LevelInput::Action), Err(SessionError::Finished));
    }

    #[test]
    fn exit_is_terminal_and_idempotent() {
        let (mut ctl, clock) = controller(Difficulty::Calm);
        clock.advance(5_000);
        ctl.exit();
        let finished_at = ctl.session().finished_at;
        clock.advance(5_000);
        ctl.exit();
        ctl.tick();

        assert_eq!(ctl.session().status, SessionStatus::Aborted);
        assert_eq!(ctl.session().finished_at, finished_at);
        assert_eq!(ctl.start_next_level(), Err(SessionError::Finished));
    }

    #[test]
    fn suspend_saves_aborted_copy_without_finishing() {
        let (mut ctl, _) = controller(Difficulty::Steady);
        ctl.suspend();
        assert_eq!(ctl.session().status, SessionStatus::InProgress);
        let saved = ctl.store().last_session().unwrap();
        assert_eq!(saved.status, SessionStatus::Aborted);
    }

    #[test]
    fn progress_percent_caps_and_rounds() {
        let (mut ctl, _) = controller(Difficulty::Steady);
        ctl.progress = (1, 3);
        assert_eq!(ctl.progress_percent(), 33);
        ctl.progress = (2, 3);
        assert_eq!(ctl.progress_percent(), 67);
        ctl.progress = (7, 5);
        assert_eq!(ctl.progress_percent(), 100);
        ctl.progress = (0, 0);
        assert_eq!(ctl.progress_percent(), 0);
    }

    #[test]
    fn refund_policy_defaults_to_refund() {
        assert_eq!(RefundPolicy::default(), RefundPolicy::Refund);
        assert_eq!(RefundPolicy::Keep.to_string(), "keep");
    }
}
