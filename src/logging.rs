use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::EnvFilter;

/// Environment variable holding the log filter, e.g. `TOCK_LOG=tock=debug`.
pub const LOG_ENV: &str = "TOCK_LOG";

/// Route tracing output to `path`. The terminal belongs to the TUI, so
/// nothing is ever written to stdout or stderr.
pub fn init(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    // a subscriber may already be installed (tests, repeated init)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
