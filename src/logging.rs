//! Logger construction for embedding applications.
//!
//! Every engine component takes a `slog::Logger` explicitly; nothing logs
//! through a global. Embedders that do not care pass `discard_logger()`.

use slog::{o, Discard, Drain, Logger};
use std::sync::Mutex;

/// Create a slog logger that outputs to the terminal (stderr)
pub fn terminal_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = Mutex::new(drain).fuse();
    Logger::root(drain, o!())
}

/// A logger that drops every record
pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}
