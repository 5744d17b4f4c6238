// Headless sessions: the controller driven by a ManualClock over an
// in-memory store, with inputs computed from what the level shows.

use assert_matches::assert_matches;
use tempfile::tempdir;

use tock::clock::ManualClock;
use tock::controller::{
    ControllerOptions, ControllerState, LevelStart, RefundPolicy, SessionController,
};
use tock::difficulty::Difficulty;
use tock::error::SessionError;
use tock::history::HistoryLog;
use tock::level::runner::TOKEN_START;
use tock::level::{LevelId, LevelInput, LevelView, TrackPoint};
use tock::player::PlayerProfile;
use tock::rating::RatingScheme;
use tock::session::SessionStatus;
use tock::storage::{GameStore, KvStore, MemoryStore, SqliteStore, LAST_SESSION_KEY, RATING_KEY};

type Controller = SessionController<MemoryStore, ManualClock>;

fn controller(difficulty: Difficulty, options: ControllerOptions) -> (Controller, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    let player = PlayerProfile::new("ada", difficulty, 0).unwrap();
    let ctl = SessionController::new(
        &player,
        GameStore::new(MemoryStore::new()),
        clock.clone(),
        options,
    );
    (ctl, clock)
}

fn seeded(seed: u64) -> ControllerOptions {
    ControllerOptions {
        seed: Some(seed),
        ..Default::default()
    }
}

/// Press the lamp `late_ms` after each flash.
fn play_lamp<S: KvStore>(ctl: &mut SessionController<S, ManualClock>, clock: &ManualClock, late_ms: i64) {
    while ctl.current_level() == Some(LevelId::Lamp) {
        ctl.handle(LevelInput::StartRound).unwrap();
        let Some(LevelView::Lamp {
            target_ms: Some(delay),
            ..
        }) = ctl.level_view()
        else {
            panic!("lamp not armed");
        };
        clock.advance(delay.round() as i64 + late_ms);
        ctl.handle(LevelInput::Action).unwrap();
    }
}

fn play_runner<S: KvStore>(ctl: &mut SessionController<S, ManualClock>, clock: &ManualClock) {
    while ctl.current_level() == Some(LevelId::Runner) {
        let Some(LevelView::Runner {
            goal, target_ms, ..
        }) = ctl.level_view()
        else {
            panic!("runner view expected");
        };
        ctl.handle(LevelInput::PointerDown(TrackPoint::at_progress(TOKEN_START, 0.0)))
            .unwrap();
        clock.advance(target_ms.round() as i64 / 2);
        ctl.handle(LevelInput::PointerMove(goal)).unwrap();
        clock.advance(target_ms.round() as i64 - target_ms.round() as i64 / 2);
        ctl.handle(LevelInput::PointerUp(goal)).unwrap();
    }
}

fn play_pulse<S: KvStore>(ctl: &mut SessionController<S, ManualClock>, clock: &ManualClock) {
    ctl.handle(LevelInput::StartRound).unwrap();
    let mut first = clock.advance(0);
    while ctl.current_level() == Some(LevelId::Pulse) {
        // listen until the second flash makes the rhythm known
        while !matches!(ctl.level_view(), Some(LevelView::Pulse { ready: true, .. })) {
            clock.advance(1);
            ctl.tick();
        }
        let interval = clock.advance(0) - first;
        first = clock.advance(interval);
        ctl.handle(LevelInput::DoubleClick).unwrap();
    }
}

#[test]
fn perfect_run_completes_and_is_rated() {
    let dir = tempdir().unwrap();
    let history = HistoryLog::new(dir.path().join("history.csv"));
    let options = ControllerOptions {
        history: Some(history.clone()),
        ..seeded(11)
    };
    let (mut ctl, clock) = controller(Difficulty::Steady, options);

    assert_matches!(ctl.start_next_level(), Ok(LevelStart::Started(LevelId::Lamp)));
    play_lamp(&mut ctl, &clock, 0);
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert_eq!(ctl.start_label(), "Next level");

    assert_matches!(ctl.start_next_level(), Ok(LevelStart::Started(LevelId::Runner)));
    play_runner(&mut ctl, &clock);

    assert_matches!(ctl.start_next_level(), Ok(LevelStart::Started(LevelId::Pulse)));
    play_pulse(&mut ctl, &clock);

    let session = ctl.session();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.levels_cleared(), 3);
    assert!(session.level_results.iter().all(|r| r.success));
    assert_eq!(session.penalties, 0);
    let earned: u32 = session.level_results.iter().map(|r| r.score).sum();
    assert_eq!(session.total_score, earned);
    assert!(session.finished_at.is_some());
    assert_eq!(ctl.start_next_level(), Err(SessionError::Finished));

    let store = ctl.store();
    assert_eq!(store.last_session().unwrap().status, SessionStatus::Completed);
    let book = store.rating();
    assert_eq!(book.bucket("steady").len(), 1);
    assert_eq!(book.bucket("steady")[0].name, "ada");
    assert_eq!(book.bucket("steady")[0].score, earned);

    let rows = history.read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "completed");
    assert_eq!(rows[0].levels_cleared, 3);
}

#[test]
fn per_level_scheme_rates_each_cleared_level() {
    let options = ControllerOptions {
        rating_scheme: RatingScheme::PerLevel,
        ..seeded(5)
    };
    let (mut ctl, clock) = controller(Difficulty::Calm, options);
    ctl.start_next_level().unwrap();
    play_lamp(&mut ctl, &clock, 0);
    ctl.start_next_level().unwrap();
    play_runner(&mut ctl, &clock);
    ctl.start_next_level().unwrap();
    play_pulse(&mut ctl, &clock);

    let book = ctl.store().rating();
    for id in LevelId::ORDER {
        let entries = book.bucket(&id.to_string());
        assert_eq!(entries.len(), 1, "bucket {id}");
        assert_eq!(entries[0].level, Some(id));
    }
    let lamp = &ctl.session().level_results[0];
    assert_eq!(book.bucket("lamp")[0].score, lamp.score);
}

#[test]
fn failed_level_is_refunded_and_retried() {
    let (mut ctl, clock) = controller(Difficulty::Steady, seeded(3));
    ctl.start_next_level().unwrap();
    // a second late every time: 40 points a round, below the 60 average
    play_lamp(&mut ctl, &clock, 1000);

    let result = ctl.session().last_level_result().unwrap().clone();
    assert!(!result.success);
    assert_eq!(result.score, 40 * result.rounds);
    assert_eq!(ctl.session().total_score, 0);
    assert_eq!(ctl.upcoming_level(), Some(LevelId::Lamp));
    assert_eq!(ctl.start_label(), "Retry level");
    assert!(ctl
        .drain_notices()
        .iter()
        .any(|n| n.contains("Not enough points")));
}

#[test]
fn keep_policy_leaves_failed_points() {
    let options = ControllerOptions {
        refund_policy: RefundPolicy::Keep,
        ..seeded(3)
    };
    let (mut ctl, clock) = controller(Difficulty::Steady, options);
    ctl.start_next_level().unwrap();
    play_lamp(&mut ctl, &clock, 1000);

    let result = ctl.session().last_level_result().unwrap();
    assert!(!result.success);
    assert_eq!(ctl.session().total_score, result.score);
}

#[test]
fn timeout_is_not_rated() {
    let (mut ctl, clock) = controller(Difficulty::Calm, seeded(8));
    ctl.start_next_level().unwrap();
    play_lamp(&mut ctl, &clock, 0);
    ctl.start_next_level().unwrap();

    clock.advance(210_000);
    ctl.tick();
    assert_eq!(ctl.session().status, SessionStatus::Timeout);
    assert_eq!(ctl.timer_display(), "00:00");
    // lamp result plus the cut-off runner attempt
    assert_eq!(ctl.session().level_results.len(), 2);
    assert!(ctl.store().rating().is_empty());
    assert_eq!(ctl.handle(LevelInput::Reposition), Err(SessionError::Finished));
}

#[test]
fn quitting_mid_session_is_saved_as_aborted() {
    let (mut ctl, clock) = controller(Difficulty::Rush, seeded(2));
    ctl.start_next_level().unwrap();
    clock.advance(4_400);
    ctl.exit();

    let saved = ctl.store().last_session().unwrap();
    assert_eq!(saved.status, SessionStatus::Aborted);
    // 4.4 s rounds to 4
    assert_eq!(saved.duration_secs(), 4);
    assert!(ctl.store().rating().is_empty());
}

#[test]
fn legacy_records_survive_a_new_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tock.sqlite");
    {
        let mut kv = SqliteStore::open(&path).unwrap();
        kv.set(
            RATING_KEY,
            r#"[{"name":"old","score":500,"penalty":0,"timestamp":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        kv.set(
            LAST_SESSION_KEY,
            r#"{"playerName":"old","difficulty":"nightmare","levelResults":[null,{"id":"lamp","success":true,"score":300}],"status":"completed"}"#,
        )
        .unwrap();
    }

    let store = GameStore::new(SqliteStore::open(&path).unwrap());
    let legacy = store.last_session().unwrap();
    assert_eq!(legacy.difficulty, Difficulty::Steady);
    assert_eq!(legacy.level_results.len(), 1);
    assert_eq!(store.rating().bucket("overall").len(), 1);

    let clock = ManualClock::new(1_700_000_000_000);
    let player = PlayerProfile::new("ada", Difficulty::Steady, 0).unwrap();
    let mut ctl = SessionController::new(&player, store, clock.clone(), seeded(21));
    ctl.start_next_level().unwrap();
    play_lamp(&mut ctl, &clock, 0);
    ctl.start_next_level().unwrap();
    play_runner(&mut ctl, &clock);
    ctl.start_next_level().unwrap();
    play_pulse(&mut ctl, &clock);
    drop(ctl);

    let reopened = GameStore::new(SqliteStore::open(&path).unwrap());
    let book = reopened.rating();
    assert_eq!(book.bucket("overall")[0].name, "old");
    assert_eq!(book.bucket("steady")[0].name, "ada");
    let shown: Vec<&str> = book
        .shown_buckets(RatingScheme::default())
        .iter()
        .flat_map(|key| book.bucket(key).iter().map(|e| e.name.as_str()).collect::<Vec<_>>())
        .collect();
    assert!(shown.contains(&"old"));
    assert!(shown.contains(&"ada"));
    assert_eq!(reopened.last_session().unwrap().player_name, "ada");
}
