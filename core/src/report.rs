//! Boundary to the host's error presentation and string lookup.
//!
//! The core never renders anything itself. When a save outcome needs the user's attention it
//! looks up a message through [`Translate`] and hands it to the [`ErrorReporter`] together with
//! an [`ErrorKind`]. Every reportable outcome produces exactly one `report` call.

use std::fmt;

use tracing::error;

/// What went wrong, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The proposed title was empty or whitespace only. Reverted locally, nothing was stored.
    Blank,
    /// The store rejected a title, typically because another document already uses it.
    Conflict,
    /// The store failed to read or write. Local edits are kept.
    Failure,
    /// Stored content could not be read back into a body. The editor starts empty.
    ParseFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Blank => "blank",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Failure => "failure",
            ErrorKind::ParseFailure => "parse failure",
        };
        f.write_str(name)
    }
}

/// Requests that an error be shown to the user.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, kind: ErrorKind, context: &str);
}

/// Looks up user-facing strings by key.
pub trait Translate: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// Message keys passed to [`Translate::translate`].
pub mod keys {
    pub const TITLE_BLANK: &str = "document.title.blank";
    pub const TITLE_CONFLICT: &str = "document.title.conflict";
    pub const TITLE_FAILURE: &str = "document.title.failure";
    pub const CONTENT_FAILURE: &str = "document.content.failure";
    pub const CONTENT_PARSE: &str = "document.content.parse";
    pub const FLUSH_FAILURE: &str = "document.flush.failure";
    pub const LOAD_FAILURE: &str = "document.load.failure";
}

/// Built-in English messages. Unknown keys are returned as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Untranslated;

impl Translate for Untranslated {
    fn translate(&self, key: &str) -> String {
        let message = match key {
            keys::TITLE_BLANK => "The title cannot be empty.",
            keys::TITLE_CONFLICT => "Another document already uses this title.",
            keys::TITLE_FAILURE => "The document could not be renamed.",
            keys::CONTENT_FAILURE => "Your changes could not be saved.",
            keys::CONTENT_PARSE => "The document content could not be loaded.",
            keys::FLUSH_FAILURE => "Your last changes could not be saved before closing.",
            keys::LOAD_FAILURE => "The document could not be opened.",
            other => other,
        };
        message.to_string()
    }
}

/// Reporter that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, kind: ErrorKind, context: &str) {
        error!(%kind, "{}", context);
    }
}
