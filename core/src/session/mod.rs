//! The editing session for one open document.
//!
//! A [`Session`] sits between an editing surface and a [`DocumentStore`]. The surface reports
//! edits through [`Session::edit_title`] and [`Session::edit_body`]; the session marks the
//! edited field dirty and (re)starts that field's debounce timer. When a field has been quiet
//! for [`SessionConfig::quiet_period`], its save runs:
//!
//! * title: [`rename::resolve`] against the last title the store accepted. Blank, conflicting
//!   or failed renames put the local title back.
//! * body: both projections go to [`DocumentStore::update_content`]. On failure the local body
//!   is kept.
//!
//! Closing is synchronous on the host side. [`Session::request_close`] answers within the same
//! call: if nothing is dirty the close proceeds; otherwise the host is told to suppress it,
//! both flags are cleared, and after [`SessionConfig::grace_delay`] one `update_all` writes
//! everything before the session closes the [`Window`] itself.
//!
//! Store writes from one session never overlap: a save that is still running delays the next
//! save and the close flush until it returns.
//!
//! Every save outcome that needs the user's attention results in exactly one
//! [`ErrorReporter::report`] call. No error escapes from a background save.

pub mod close;
pub mod dirty;
pub mod rename;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use self::close::{CloseDecision, CloseInterceptor, CloseState};
pub use self::dirty::{Channel, DirtyState, DirtyTracker};
pub use self::rename::RenameOutcome;

use crate::body::Body;
use crate::config::{ConfigError, SessionConfig};
use crate::debounce::Debouncer;
use crate::event::{define_event_listeners, Event};
use crate::report::{keys, ErrorKind, ErrorReporter, Translate, Untranslated};
use crate::storage::{self, DocumentStore, OperationResult};

/// The host window's close capability.
pub trait Window: Send + Sync {
    /// Cancels the close currently being delivered. Only meaningful during
    /// [`Session::request_close`].
    fn suppress_close(&self);

    /// Closes the window for real.
    fn close(&self);
}

/// Capabilities a session is built from.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn DocumentStore>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub translator: Arc<dyn Translate>,
    pub window: Arc<dyn Window>,
    pub config: SessionConfig,
}

impl SessionContext {
    /// Uses built-in messages and default timing.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reporter: Arc<dyn ErrorReporter>,
        window: Arc<dyn Window>,
    ) -> Self {
        SessionContext {
            store,
            reporter,
            translator: Arc::new(Untranslated),
            window,
            config: SessionConfig::default(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translate>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Invalid session timing: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load document: {0}")]
    Store(#[from] storage::Error),
}

/// A title save was accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSaved {
    pub title: String,
}

/// A body save was accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSaved;

/// The session reached `Closed` and finished its close work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    /// Whether unsaved edits were flushed before closing.
    pub flushed: bool,
}

impl Event for TitleSaved {}
impl Event for ContentSaved {}
impl Event for SessionClosed {}

define_event_listeners! { SessionEvents {
    title_saved: TitleSaved,
    content_saved: ContentSaved,
    closed: SessionClosed,
}}

#[derive(Debug)]
struct Local {
    title: String,
    // Last title the store accepted
    last_good_title: String,
    body: Body,
}

struct Shared {
    id: String,
    ctx: SessionContext,
    local: Mutex<Local>,
    dirty: DirtyTracker,
    debouncer: Debouncer<Channel>,
    close: CloseInterceptor,
    // Held around every store mutation so saves and the flush never overlap.
    writes: tokio::sync::Mutex<()>,
    on: SessionEvents,
}

/// An open document. Cheap to clone; clones share state.
///
/// All methods that start timers or background work must be called within a Tokio runtime.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Loads document `id` and marks it open in the store.
    ///
    /// Structured content that cannot be parsed is reported once as
    /// [`ErrorKind::ParseFailure`] and the body starts empty. A store error while loading is
    /// reported once as [`ErrorKind::Failure`] and returned.
    #[instrument(skip(ctx))]
    pub async fn open(id: &str, ctx: SessionContext) -> Result<Session, OpenError> {
        ctx.config.validate()?;
        let report = |kind: ErrorKind, key: &str| {
            ctx.reporter.report(kind, &ctx.translator.translate(key));
        };
        let loaded = async {
            let document = ctx.store.get_document(id).await?;
            let content = ctx.store.get_document_content(id).await?;
            Ok::<_, storage::Error>((document, content))
        }
        .await;
        let (document, content) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load {}: {}", id, e);
                report(ErrorKind::Failure, keys::LOAD_FAILURE);
                return Err(e.into());
            }
        };

        let body = match content.content.as_deref() {
            Some(raw) => match Body::from_structured(raw) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Unreadable content for {}: {}", id, e);
                    report(ErrorKind::ParseFailure, keys::CONTENT_PARSE);
                    Body::default()
                }
            },
            None => Body::from_plain_text(&document.text_content),
        };

        ctx.store.set_open(id, true).await;
        debug!(title = %document.title, blocks = body.blocks().len(), "Session opened");

        let shared = Shared {
            id: document.id,
            local: Mutex::new(Local {
                title: document.title.clone(),
                last_good_title: document.title,
                body,
            }),
            ctx,
            dirty: DirtyTracker::new(),
            debouncer: Debouncer::new(),
            close: CloseInterceptor::new(),
            writes: tokio::sync::Mutex::new(()),
            on: SessionEvents::new(),
        };
        Ok(Session { shared: Arc::new(shared) })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Event listener lists for this session.
    pub fn on(&self) -> &SessionEvents {
        &self.shared.on
    }

    pub fn title(&self) -> String {
        self.shared.local.lock().title.clone()
    }

    pub fn body(&self) -> Body {
        self.shared.local.lock().body.clone()
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.shared.dirty.state()
    }

    pub fn close_state(&self) -> CloseState {
        self.shared.close.state()
    }

    pub fn config(&self) -> SessionConfig {
        self.shared.ctx.config
    }

    /// Records a title edit.
    ///
    /// Once a close is underway the edit is still kept locally, and the pending flush
    /// picks it up, but no new save is scheduled.
    pub fn edit_title(&self, title: impl Into<String>) {
        let title = title.into();
        {
            let mut local = self.shared.local.lock();
            local.title = title;
            if !self.shared.close.is_open() {
                return;
            }
            self.shared.dirty.mark(Channel::Title);
        }
        self.schedule_save(Channel::Title);
    }

    /// Records a body edit. See [`edit_title`](Self::edit_title).
    pub fn edit_body(&self, body: Body) {
        {
            let mut local = self.shared.local.lock();
            local.body = body;
            if !self.shared.close.is_open() {
                return;
            }
            self.shared.dirty.mark(Channel::Content);
        }
        self.schedule_save(Channel::Content);
    }

    /// Runs any pending saves immediately instead of waiting for the quiet period.
    pub async fn save_now(&self) {
        for channel in [Channel::Title, Channel::Content] {
            if self.shared.debouncer.cancel_and_fire_now(&channel).await {
                debug!(%channel, "Saved on request");
            }
        }
    }

    /// Handles the host's synchronous "about to close" signal.
    ///
    /// When the result [suppresses](CloseDecision::suppresses) the close,
    /// [`Window::suppress_close`] has already been called.
    #[instrument(skip(self), fields(id = %self.shared.id))]
    pub fn request_close(&self) -> CloseDecision {
        let shared = &self.shared;
        let decision = shared.close.on_close_signal(shared.dirty.is_any_dirty());
        match decision {
            CloseDecision::Proceed => {
                shared.debouncer.cancel_all();
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    {
                        let _writing = shared.writes.lock().await;
                        shared.ctx.store.set_open(&shared.id, false).await;
                    }
                    shared.on.closed.dispatch(&SessionClosed { flushed: false });
                    shared.close.settle();
                });
            }
            CloseDecision::Suppressed => {
                shared.ctx.window.suppress_close();
                shared.dirty.clear_all();
                shared.debouncer.cancel_all();
                let grace_delay = shared.ctx.config.grace_delay;
                debug!(?grace_delay, "Close suppressed, flushing after grace delay");
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    tokio::time::sleep(grace_delay).await;
                    shared.flush_and_close().await;
                });
            }
            CloseDecision::AlreadyClosing => shared.ctx.window.suppress_close(),
            CloseDecision::AlreadyClosed => {}
        }
        decision
    }

    /// Waits until the session has closed and finished its close work.
    pub async fn closed(&self) {
        self.shared.close.settled().await
    }

    fn schedule_save(&self, channel: Channel) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let quiet_period = self.shared.ctx.config.quiet_period;
        self.shared.debouncer.schedule(channel, quiet_period, move || async move {
            if let Some(shared) = weak.upgrade() {
                shared.save(channel).await;
            }
        });
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("dirty", &self.shared.dirty.state())
            .field("close", &self.shared.close.state())
            .finish()
    }
}

fn project(body: &Body) -> Result<(String, String), serde_json::Error> {
    Ok((body.to_text(), body.to_structured()?))
}

impl Shared {
    fn report(&self, kind: ErrorKind, key: &str) {
        self.ctx.reporter.report(kind, &self.ctx.translator.translate(key));
    }

    async fn save(&self, channel: Channel) {
        // Waits out a save still running for either channel.
        let _writing = self.writes.lock().await;
        if !self.close.is_open() {
            debug!(%channel, "Skipping save, session is closing");
            return;
        }
        match channel {
            Channel::Title => self.save_title().await,
            Channel::Content => self.save_content().await,
        }
    }

    #[instrument(skip(self), fields(id = %self.id))]
    async fn save_title(&self) {
        let (proposed, last_good, revision) = {
            let local = self.local.lock();
            let revision = self.dirty.revision(Channel::Title);
            (local.title.clone(), local.last_good_title.clone(), revision)
        };
        if !self.dirty.is_dirty(Channel::Title) {
            return;
        }

        let store = self.ctx.store.as_ref();
        let outcome = rename::resolve(store, &self.id, &last_good, &proposed).await;

        {
            let mut local = self.local.lock();
            // A newer edit keeps its own title and dirty flag; its save comes next.
            let current = self.dirty.clear_if_current(Channel::Title, revision);
            if let RenameOutcome::Success(title) = &outcome {
                local.last_good_title = title.clone();
            }
            if current {
                local.title = local.last_good_title.clone();
            }
        }

        match outcome {
            RenameOutcome::Success(title) => {
                debug!(%title, "Title saved");
                self.on.title_saved.dispatch(&TitleSaved { title });
            }
            RenameOutcome::Blank => self.report(ErrorKind::Blank, keys::TITLE_BLANK),
            RenameOutcome::Conflict => self.report(ErrorKind::Conflict, keys::TITLE_CONFLICT),
            RenameOutcome::Failure => self.report(ErrorKind::Failure, keys::TITLE_FAILURE),
        }
    }

    #[instrument(skip(self), fields(id = %self.id))]
    async fn save_content(&self) {
        let (body, revision) = {
            let local = self.local.lock();
            (local.body.clone(), self.dirty.revision(Channel::Content))
        };
        if !self.dirty.is_dirty(Channel::Content) {
            return;
        }

        let result = match project(&body) {
            Ok((text, structured)) => {
                self.ctx.store.update_content(&self.id, &text, &structured).await
            }
            Err(e) => {
                warn!("Failed to serialize body: {}", e);
                OperationResult::Failure
            }
        };
        self.dirty.clear_if_current(Channel::Content, revision);

        if result.is_success() {
            debug!("Content saved");
            self.on.content_saved.dispatch(&ContentSaved);
        } else {
            self.report(ErrorKind::Failure, keys::CONTENT_FAILURE);
        }
    }

    #[instrument(skip(self), fields(id = %self.id))]
    async fn flush_and_close(&self) {
        if !self.close.begin_flush() {
            return;
        }
        self.debouncer.cancel_all();
        // A save that fired before the close finishes first; the flush then overwrites it.
        let writing = self.writes.lock().await;

        let (title, body) = {
            let local = self.local.lock();
            let title = if local.title.trim().is_empty() {
                local.last_good_title.clone()
            } else {
                local.title.clone()
            };
            (title, local.body.clone())
        };

        let result = match project(&body) {
            Ok((text, structured)) => {
                self.ctx.store.update_all(&self.id, &title, &text, &structured).await
            }
            Err(e) => {
                warn!("Failed to serialize body: {}", e);
                OperationResult::Failure
            }
        };
        match result {
            OperationResult::Success(()) => debug!("Flushed before close"),
            OperationResult::Conflict => self.report(ErrorKind::Conflict, keys::TITLE_CONFLICT),
            OperationResult::Blank | OperationResult::Failure => {
                self.report(ErrorKind::Failure, keys::FLUSH_FAILURE)
            }
        }

        self.ctx.store.set_open(&self.id, false).await;
        drop(writing);
        // Closed before the real close, so a re-delivered close signal passes through.
        self.close.finish();
        self.ctx.window.close();
        self.on.closed.dispatch(&SessionClosed { flushed: true });
        self.close.settle();
    }
}
