pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Position, Rect},
    Terminal,
};
use std::{
    cell::Cell,
    collections::VecDeque,
    error::Error,
    io::{self, stdin},
    time::Duration,
};
use tracing::{debug, info, warn};

use tock::{
    app_dirs::AppDirs,
    clock::{Clock, Millis, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    controller::{ControllerOptions, ControllerState, LevelStart, RefundPolicy, SessionController},
    difficulty::Difficulty,
    distraction::Distractions,
    history::HistoryLog,
    level::{LevelId, LevelInput, LevelView, TrackPoint},
    logging,
    player::PlayerProfile,
    rating::RatingScheme,
    runtime::{CrosstermEventSource, FixedTicker, Runner, Ticker, TockEvent, TockEventSource},
    storage::{shared, GameStore, MemoryStore, SharedStore, SqliteStore},
};

/// How long a toast stays on screen.
const TOAST_MS: Millis = 3000;
const MAX_TOASTS: usize = 4;
/// Two clicks closer than this count as a double-click.
const DOUBLE_CLICK_MS: Millis = 400;
/// Keyboard drag step along the runner track.
const KEY_STEP_X: f64 = 25.0;
const KEY_STEP_Y: f64 = 10.0;
pub const MAX_NAME_LEN: usize = 24;

/// reflex and timing minigame for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Three timing challenges against a global countdown: stop a lamp on its flash, drag a runner into its burrow in a set time, and double-click on the beat of a pulse."
)]
pub struct Cli {
    /// play as this player (skips the setup form)
    #[clap(short = 'n', long)]
    name: Option<String>,

    /// difficulty for the player created with --name
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// open the setup form even when a player exists
    #[clap(long)]
    setup: bool,

    /// show the rating tables and exit to setup from there
    #[clap(long)]
    results: bool,

    /// delete every rating entry before starting
    #[clap(long)]
    clear_rating: bool,

    /// keep everything in memory; nothing is written to disk
    #[clap(long)]
    ephemeral: bool,

    /// seed for reproducible rounds
    #[clap(long)]
    seed: Option<u64>,

    /// what happens to a failed level's points
    #[clap(long, value_enum)]
    refund_policy: Option<RefundPolicy>,

    /// how rating entries are grouped
    #[clap(long, value_enum)]
    rating_scheme: Option<RatingScheme>,

    /// do not capture the mouse; play with the keyboard only
    #[clap(long)]
    no_mouse: bool,
}

/// Per-run settings: the config file with CLI flags on top.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub refund_policy: RefundPolicy,
    pub rating_scheme: RatingScheme,
    pub seed: Option<u64>,
    pub mouse: bool,
    pub tick_rate_ms: u64,
    pub history: Option<HistoryLog>,
}

impl GameSettings {
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        let history = if cli.ephemeral {
            None
        } else {
            AppDirs::history_path().map(HistoryLog::new)
        };
        Self {
            refund_policy: cli.refund_policy.unwrap_or(config.refund_policy),
            rating_scheme: cli.rating_scheme.unwrap_or(config.rating_scheme),
            seed: cli.seed,
            mouse: config.mouse && !cli.no_mouse,
            tick_rate_ms: config.tick_rate_ms.max(1),
            history,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Setup,
    Playing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupFocus {
    #[default]
    Name,
    Difficulty,
}

#[derive(Debug, Clone, Default)]
pub struct SetupForm {
    pub name: String,
    pub difficulty: Difficulty,
    pub focus: SetupFocus,
    pub error: Option<String>,
}

impl SetupForm {
    /// Form prefilled from an existing player.
    pub fn prefilled(player: Option<&PlayerProfile>) -> Self {
        match player {
            Some(p) => Self {
                name: p.name.clone(),
                difficulty: p.difficulty,
                ..Self::default()
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultsState {
    /// Show the last-session summary (only when arriving from a game).
    pub from_game: bool,
    pub confirm_clear: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub text: String,
    pub shown_at: Millis,
}

#[derive(Debug, Default)]
pub struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    pub fn push(&mut self, text: impl Into<String>, now: Millis) {
        self.items.push_back(Toast {
            text: text.into(),
            shown_at: now,
        });
        while self.items.len() > MAX_TOASTS {
            self.items.pop_front();
        }
    }

    pub fn expire(&mut self, now: Millis) {
        self.items.retain(|t| now - t.shown_at < TOAST_MS);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A running session plus the bits of presentation state around it.
pub struct Game<C: Clock> {
    pub controller: SessionController<SharedStore, C>,
    pub distractions: Distractions,
    last_click: Option<Millis>,
}

pub struct App<C: Clock + Clone> {
    pub state: AppState,
    pub store: GameStore<SharedStore>,
    handle: SharedStore,
    clock: C,
    rng: StdRng,
    pub settings: GameSettings,
    pub setup: SetupForm,
    pub game: Option<Game<C>>,
    pub results: ResultsState,
    pub toasts: Toasts,
    /// Where the playground was last drawn, for mapping mouse cells back.
    pub playground: Cell<Rect>,
    last_tick: Millis,
    pub should_quit: bool,
}

impl<C: Clock + Clone> App<C> {
    pub fn new(handle: SharedStore, clock: C, settings: GameSettings) -> Self {
        let store = GameStore::new(handle.clone());
        let player = store.current_player();
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = clock.now_ms();
        let state = if player.is_some() {
            AppState::Results
        } else {
            AppState::Setup
        };
        Self {
            state,
            setup: SetupForm::prefilled(player.as_ref()),
            store,
            handle,
            clock,
            rng,
            settings,
            game: None,
            results: ResultsState::default(),
            toasts: Toasts::default(),
            playground: Cell::new(Rect::default()),
            last_tick: now,
            should_quit: false,
        }
    }

    /// Decide the first screen from the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.clear_rating {
            match self.store.clear_rating() {
                Ok(()) => self.toast("Rating cleared."),
                Err(err) => warn!(error = %err, "could not clear rating"),
            }
        }

        if let Some(name) = cli.name.as_deref() {
            self.setup.name = name.to_string();
            if let Some(difficulty) = cli.difficulty {
                self.setup.difficulty = difficulty;
            }
            if !cli.setup && !cli.results {
                self.submit_setup();
                return;
            }
        } else if let Some(difficulty) = cli.difficulty {
            self.setup.difficulty = difficulty;
        }

        if cli.setup || self.store.current_player().is_none() {
            self.state = AppState::Setup;
        } else if cli.results {
            self.show_results(false);
        } else {
            self.start_game();
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    fn toast(&mut self, text: impl Into<String>) {
        let now = self.now();
        self.toasts.push(text, now);
    }

    pub fn start_game(&mut self) {
        let Some(player) = self.store.current_player() else {
            self.state = AppState::Setup;
            return;
        };
        let options = ControllerOptions {
            refund_policy: self.settings.refund_policy,
            rating_scheme: self.settings.rating_scheme,
            seed: self.settings.seed,
            history: self.settings.history.clone(),
        };
        let controller = SessionController::new(
            &player,
            GameStore::new(self.handle.clone()),
            self.clock.clone(),
            options,
        );
        let mut distractions = Distractions::new();
        distractions.spawn(controller.profile().distraction + 2, &mut self.rng);
        self.game = Some(Game {
            controller,
            distractions,
            last_click: None,
        });
        self.last_tick = self.now();
        self.state = AppState::Playing;
    }

    fn show_results(&mut self, from_game: bool) {
        self.results = ResultsState {
            from_game,
            confirm_clear: false,
        };
        self.state = AppState::Results;
    }

    fn open_setup(&mut self) {
        self.setup = SetupForm::prefilled(self.store.current_player().as_ref());
        self.state = AppState::Setup;
    }

    pub fn submit_setup(&mut self) {
        let now = self.now();
        let Some(player) = PlayerProfile::new(&self.setup.name, self.setup.difficulty, now) else {
            self.setup.error = Some("Enter a player name.".to_string());
            self.setup.focus = SetupFocus::Name;
            return;
        };
        let saved = self
            .store
            .save_current_player(&player)
            .and_then(|()| self.store.save_session(None));
        if let Err(err) = saved {
            warn!(error = %err, "could not save player");
            self.setup.error = Some(format!("Could not save the player: {err}"));
            return;
        }
        info!(player = %player.name, difficulty = %player.difficulty, "player saved");
        self.setup.error = None;
        self.start_game();
    }

    /// Store an unfinished session as aborted before the program exits.
    pub fn suspend(&mut self) {
        if let Some(game) = self.game.as_mut() {
            game.controller.suspend();
        }
    }

    pub fn on_tick(&mut self) {
        let now = self.now();
        let dt = (now - self.last_tick).max(0) as f64 / 1000.0;
        self.last_tick = now;
        if let Some(game) = self.game.as_mut() {
            game.controller.tick();
            game.distractions.update(dt);
        }
        self.sync_game();
        self.toasts.expire(now);
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.state {
            AppState::Setup => self.on_setup_key(key),
            AppState::Playing => self.on_game_key(key),
            AppState::Results => self.on_results_key(key),
        }
    }

    fn on_setup_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => self.submit_setup(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.setup.focus = match self.setup.focus {
                    SetupFocus::Name => SetupFocus::Difficulty,
                    SetupFocus::Difficulty => SetupFocus::Name,
                };
            }
            KeyCode::Left if self.setup.focus == SetupFocus::Difficulty => {
                self.setup.difficulty = self.setup.difficulty.previous();
            }
            KeyCode::Right if self.setup.focus == SetupFocus::Difficulty => {
                self.setup.difficulty = self.setup.difficulty.next();
            }
            KeyCode::Backspace if self.setup.focus == SetupFocus::Name => {
                self.setup.name.pop();
            }
            KeyCode::Char(c) if self.setup.focus == SetupFocus::Name => {
                if self.setup.name.chars().count() < MAX_NAME_LEN {
                    self.setup.name.push(c);
                    self.setup.error = None;
                }
            }
            _ => {}
        }
    }

    fn on_results_key(&mut self, key: KeyEvent) {
        if self.results.confirm_clear {
            self.results.confirm_clear = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                match self.store.clear_rating() {
                    Ok(()) => self.toast("Rating cleared."),
                    Err(err) => warn!(error = %err, "could not clear rating"),
                }
            }
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') | KeyCode::Enter => self.open_setup(),
            KeyCode::Char('n') => self.start_game(),
            KeyCode::Char('c') => self.results.confirm_clear = true,
            _ => {}
        }
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        let Some(game) = self.game.as_mut() else {
            self.open_setup();
            return;
        };
        let level = game.controller.current_level();
        let outcome = match (key.code, level) {
            (KeyCode::Esc | KeyCode::Char('q'), _) => {
                game.controller.exit();
                Ok(())
            }
            (KeyCode::Enter, None) => match game.controller.start_next_level() {
                Ok(LevelStart::Started(_)) => {
                    let count = game.controller.profile().distraction;
                    game.distractions.spawn(count, &mut self.rng);
                    Ok(())
                }
                Ok(LevelStart::SessionCompleted) => Ok(()),
                Err(err) => Err(err),
            },
            (KeyCode::Enter, Some(_)) => game.controller.handle(LevelInput::StartRound),
            (KeyCode::Char('x'), Some(_)) => game
                .controller
                .abort_level("the player stopped the level"),
            (KeyCode::Char(' '), Some(LevelId::Lamp)) => game.controller.handle(LevelInput::Action),
            (KeyCode::Char(' ') | KeyCode::Char('d'), Some(LevelId::Pulse)) => {
                game.controller.handle(LevelInput::DoubleClick)
            }
            (KeyCode::Char('r'), Some(LevelId::Runner)) => {
                game.controller.handle(LevelInput::Reposition)
            }
            (KeyCode::Char(' '), Some(LevelId::Runner)) => match game.controller.level_view() {
                Some(LevelView::Runner {
                    dragging: false,
                    token,
                    ..
                }) => game.controller.handle(LevelInput::PointerDown(token)),
                Some(LevelView::Runner {
                    dragging: true,
                    token,
                    ..
                }) => game.controller.handle(LevelInput::PointerUp(token)),
                _ => Ok(()),
            },
            (KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down, Some(LevelId::Runner)) => {
                match game.controller.level_view() {
                    Some(LevelView::Runner {
                        dragging: true,
                        token,
                        ..
                    }) => {
                        let (dx, dy) = match key.code {
                            KeyCode::Left => (-KEY_STEP_X, 0.0),
                            KeyCode::Right => (KEY_STEP_X, 0.0),
                            KeyCode::Up => (0.0, -KEY_STEP_Y),
                            _ => (0.0, KEY_STEP_Y),
                        };
                        let moved = TrackPoint::new(token.x + dx, token.y + dy);
                        game.controller.handle(LevelInput::PointerMove(moved))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            debug!(error = %err, "input ignored");
        }
        self.sync_game();
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        if !self.settings.mouse || self.state != AppState::Playing {
            return;
        }
        let area = self.playground.get();
        let now = self.now();
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let inside = area.contains(Position::new(mouse.column, mouse.row));
        let point = ui::game::cell_to_track(area, mouse.column, mouse.row);

        let input = match (game.controller.current_level(), mouse.kind) {
            (Some(LevelId::Lamp), MouseEventKind::Down(MouseButton::Left)) if inside => {
                Some(LevelInput::Action)
            }
            (Some(LevelId::Runner), MouseEventKind::Down(MouseButton::Left)) if inside => {
                Some(LevelInput::PointerDown(point))
            }
            (Some(LevelId::Runner), MouseEventKind::Drag(MouseButton::Left)) => {
                Some(LevelInput::PointerMove(point))
            }
            (Some(LevelId::Runner), MouseEventKind::Up(MouseButton::Left)) => {
                Some(LevelInput::PointerUp(point))
            }
            (Some(LevelId::Pulse), MouseEventKind::Down(MouseButton::Left)) if inside => {
                match game.last_click.take() {
                    Some(at) if now - at <= DOUBLE_CLICK_MS => Some(LevelInput::DoubleClick),
                    _ => {
                        game.last_click = Some(now);
                        None
                    }
                }
            }
            _ => None,
        };
        if let Some(input) = input {
            if let Err(err) = game.controller.handle(input) {
                debug!(error = %err, "mouse input ignored");
            }
        }
        self.sync_game();
    }

    /// Move controller notices into toasts and leave for the results once
    /// the session is over.
    fn sync_game(&mut self) {
        let now = self.now();
        let Some(game) = self.game.as_mut() else {
            return;
        };
        for notice in game.controller.drain_notices() {
            self.toasts.push(notice, now);
        }
        if game.controller.state() == ControllerState::Finished {
            self.game = None;
            self.show_results(true);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if !cli.ephemeral {
        if let Some(path) = AppDirs::log_path() {
            logging::init(&path)?;
        }
    }

    let config = FileConfigStore::new().load();
    let settings = GameSettings::resolve(&cli, &config);
    let handle = if cli.ephemeral {
        shared(MemoryStore::new())
    } else {
        shared(SqliteStore::open_default()?)
    };

    let mut app = App::new(handle, SystemClock, settings);
    app.apply_cli(&cli);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    if app.settings.mouse {
        execute!(stdout, EnableMouseCapture)?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let ticker = FixedTicker::new(Duration::from_millis(app.settings.tick_rate_ms));
    let runner = Runner::new(CrosstermEventSource::new(), ticker);
    let result = start_tui(&mut terminal, &mut app, &runner);
    app.suspend();

    disable_raw_mode()?;
    if app.settings.mouse {
        execute!(terminal.backend_mut(), DisableMouseCapture)?;
    }
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, C: Clock + Clone, E: TockEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App<C>,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    while !app.should_quit {
        match runner.step() {
            TockEvent::Tick => app.on_tick(),
            TockEvent::Key(key) => app.on_key(key),
            TockEvent::Mouse(mouse) => app.on_mouse(mouse),
            TockEvent::Resize => {}
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }
    Ok(())
}
