use std::{fs::File, io, path::Path, sync::Mutex};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`)
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        .try_init();
}

/// Install a subscriber appending to `path`
///
/// Used by the terminal UI, where stderr output would corrupt the alternate screen.
pub fn init_file_logging(path: impl AsRef<Path>) -> io::Result<()> {
    let file = File::options().create(true).append(true).open(path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
