// Library surface: the game core, persistence and the terminal runtime.
// The TUI shell (App, screens) lives in the binary.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod difficulty;
pub mod distraction;
pub mod error;
pub mod history;
pub mod level;
pub mod logging;
pub mod player;
pub mod rating;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod util;
