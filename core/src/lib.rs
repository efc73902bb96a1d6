//! Core library for Quire.
//!
//! The centre of the crate is [`session::Session`]: the dirty-tracking, debounced-save and
//! deferred-close coordinator for one editable document view. It talks to the outside only
//! through capabilities:
//!
//! * [`storage::DocumentStore`] for durable storage, with [`storage::FsStore`] as a
//!   filesystem implementation,
//! * [`report::ErrorReporter`] and [`report::Translate`] for user-facing errors,
//! * [`session::Window`] for the host's close signal.

pub mod body;
pub mod config;
pub mod debounce;
pub mod event;
pub mod report;
pub mod session;
pub mod storage;

pub use body::{Block, Body};
pub use config::SessionConfig;
pub use session::{CloseDecision, CloseState, Session, SessionContext, Window};
