//! Terminal implementations of the session's host capabilities.

use std::sync::atomic::{AtomicUsize, Ordering};

use console::style;
use quire_core::report::{ErrorKind, ErrorReporter};
use quire_core::session::Window;
use tracing::{debug, error};

/// Prints reported errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    reported: AtomicUsize,
}

impl ConsoleReporter {
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::SeqCst)
    }
}

impl ErrorReporter for ConsoleReporter {
    fn report(&self, kind: ErrorKind, context: &str) {
        self.reported.fetch_add(1, Ordering::SeqCst);
        error!(%kind, "{}", context);
        let label = match kind {
            ErrorKind::Blank | ErrorKind::Conflict => style("warning").yellow().bold(),
            ErrorKind::Failure | ErrorKind::ParseFailure => style("error").red().bold(),
        };
        eprintln!("{}: {}", label, context);
    }
}

/// The "window" of a one-shot CLI edit: the command itself.
///
/// The command exits once the session has closed, so both operations only need to be
/// observable afterwards.
#[derive(Debug, Default)]
pub struct TerminalWindow {
    suppressed: AtomicUsize,
    closed: AtomicUsize,
}

impl TerminalWindow {
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) > 0
    }
}

impl Window for TerminalWindow {
    fn suppress_close(&self) {
        debug!("Close suppressed");
        self.suppressed.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        debug!("Window closed");
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
