//! Keyed debouncing of asynchronous actions.
//!
//! A [`Debouncer`] holds at most one pending timer per key. Scheduling again for a key that
//! already has a timer cancels the old timer and drops its action, so a burst of signals
//! collapses into a single action that runs once the key has been quiet for the requested
//! delay. Keys never affect each other.
//!
//! Timers are Tokio tasks, so every method that starts one must be called from within a
//! Tokio runtime.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::trace;

type Action = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + Sync>;

struct Pending {
    generation: u64,
    action: Action,
    timer: Option<JoinHandle<()>>,
}

impl Pending {
    fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

/// Per-key debounce timers.
pub struct Debouncer<K: Eq + Hash> {
    pending: Arc<DashMap<K, Pending>>,
    generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Debouncer {
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs `action` once `key` has been quiet for `delay`.
    ///
    /// Replaces (and never runs) any action still pending for the same key.
    pub fn schedule<F, Fut>(&self, key: K, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let action: Action = Box::new(move || Box::pin(action()));

        // Register before spawning so the timer always finds its own entry.
        let replaced = self.pending.insert(
            key.clone(),
            Pending { generation, action, timer: None },
        );
        if let Some(previous) = replaced {
            previous.abort_timer();
            trace!(?key, "Restarted pending timer");
        }

        let pending = Arc::clone(&self.pending);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A newer schedule for the key owns the entry now; only fire our own.
            let fired = pending.remove_if(&timer_key, |_, p| p.generation == generation);
            if let Some((_, p)) = fired {
                trace!(key = ?timer_key, "Quiet period elapsed");
                (p.action)().await;
            }
        });

        if let Some(mut entry) = self.pending.get_mut(&key) {
            if entry.generation == generation {
                entry.timer = Some(timer);
            }
        }
    }

    /// Cancels the pending timer for `key` and runs its action right away.
    ///
    /// Returns `false` if nothing was pending.
    pub async fn cancel_and_fire_now(&self, key: &K) -> bool {
        let Some((_, pending)) = self.pending.remove(key) else {
            return false;
        };
        pending.abort_timer();
        trace!(?key, "Firing pending action early");
        (pending.action)().await;
        true
    }

    /// Drops the pending timer for `key` without running its action.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, pending)) => {
                pending.abort_timer();
                trace!(?key, "Cancelled pending timer");
                true
            }
            None => false,
        }
    }

    /// Drops every pending timer without running any action.
    pub fn cancel_all(&self) {
        self.pending.retain(|_, pending| {
            pending.abort_timer();
            false
        });
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.abort_timer();
        }
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending.len())
            .finish()
    }
}
