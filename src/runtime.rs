use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind, MouseEvent};

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum TockEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, mouse, resize)
pub trait TockEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<TockEvent, RecvTimeoutError>;
}

/// Production event source reading crossterm events on a helper thread
pub struct CrosstermEventSource {
    rx: Receiver<TockEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // Windows reports releases too; the game only reacts to presses
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(TockEvent::Key(key)),
                Ok(CtEvent::Mouse(mouse)) => Some(TockEvent::Mouse(mouse)),
                Ok(CtEvent::Resize(_, _)) => Some(TockEvent::Resize),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(ev) = forwarded {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TockEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TockEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    rx: Receiver<TockEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TockEvent>) -> Self {
        Self { rx }
    }
}

impl TockEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TockEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the app one event at a time, yielding `Tick` when the interval
/// passes quietly. Level timers and the countdown are driven from ticks.
pub struct Runner<E: TockEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: TockEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn step(&self) -> TockEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => TockEvent::Tick,
        }
    }
}
