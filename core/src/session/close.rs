use tokio::sync::watch;
use tracing::debug;

/// Where a session is in its close sequence. Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Open,
    /// A close was suppressed because of unsaved edits; the flush is waiting for the grace delay.
    InterceptedDirty,
    /// The final `update_all` is running.
    Flushing,
    Closed,
}

/// What the host should do with the close signal it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Nothing was dirty; let the close happen.
    Proceed,
    /// The close was suppressed. The session will close the window itself after flushing.
    Suppressed,
    /// A flush is already scheduled or running. The close was suppressed again.
    AlreadyClosing,
    /// The session has already closed; the signal is ignored.
    AlreadyClosed,
}

impl CloseDecision {
    /// Whether the host's close was (or must be) suppressed.
    pub fn suppresses(&self) -> bool {
        matches!(self, CloseDecision::Suppressed | CloseDecision::AlreadyClosing)
    }
}

/// The close state machine.
///
/// `settled` turns true once all work following the transition to `Closed` is done, which
/// lets callers wait for a clean close's fire-and-forget store notification too.
#[derive(Debug)]
pub struct CloseInterceptor {
    state: watch::Sender<CloseState>,
    settled: watch::Sender<bool>,
}

impl CloseInterceptor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CloseState::Open);
        let (settled, _) = watch::channel(false);
        CloseInterceptor { state, settled }
    }

    pub fn state(&self) -> CloseState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == CloseState::Open
    }

    /// Handles a close signal. `any_dirty` is the tracker's answer at the time of the signal.
    pub fn on_close_signal(&self, any_dirty: bool) -> CloseDecision {
        let mut decision = CloseDecision::AlreadyClosed;
        self.state.send_if_modified(|state| {
            let (next, outcome) = match *state {
                CloseState::Open if any_dirty => {
                    (CloseState::InterceptedDirty, CloseDecision::Suppressed)
                }
                CloseState::Open => (CloseState::Closed, CloseDecision::Proceed),
                CloseState::InterceptedDirty | CloseState::Flushing => {
                    (*state, CloseDecision::AlreadyClosing)
                }
                CloseState::Closed => (CloseState::Closed, CloseDecision::AlreadyClosed),
            };
            decision = outcome;
            let changed = next != *state;
            *state = next;
            changed
        });
        debug!(?decision, state = ?self.state(), "Close signal handled");
        decision
    }

    /// Moves `InterceptedDirty` to `Flushing`. Returns `false` from any other state.
    pub fn begin_flush(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == CloseState::InterceptedDirty {
                *state = CloseState::Flushing;
                true
            } else {
                false
            }
        })
    }

    pub fn finish(&self) {
        self.state.send_replace(CloseState::Closed);
    }

    pub fn settle(&self) {
        self.settled.send_replace(true);
    }

    pub fn is_settled(&self) -> bool {
        *self.settled.borrow()
    }

    /// Waits until [`settle`](Self::settle) has been called.
    pub async fn settled(&self) {
        let mut rx = self.settled.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|settled| *settled).await;
    }
}

impl Default for CloseInterceptor {
    fn default() -> Self {
        Self::new()
    }
}
