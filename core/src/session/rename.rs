use tracing::{debug, instrument, warn};

use crate::storage::{DocumentStore, OperationResult};

/// Result of reconciling a proposed title with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The store accepted the rename. Carries the title as stored.
    Success(String),
    /// The proposed title was blank. The store was not called.
    Blank,
    /// The store rejected the title as a duplicate.
    Conflict,
    /// The store failed or returned an outcome that makes no sense for a rename.
    Failure,
}

/// Renames document `id` from `last_good` to `proposed`.
#[instrument(skip(store))]
pub async fn resolve(
    store: &dyn DocumentStore,
    id: &str,
    last_good: &str,
    proposed: &str,
) -> RenameOutcome {
    if proposed.trim().is_empty() {
        debug!("Blank title, keeping {:?}", last_good);
        return RenameOutcome::Blank;
    }

    match store.rename_document(id, last_good, proposed).await {
        OperationResult::Success(title) => RenameOutcome::Success(title),
        OperationResult::Conflict => RenameOutcome::Conflict,
        OperationResult::Failure => RenameOutcome::Failure,
        OperationResult::Blank => {
            warn!("Store reported a blank title for {:?}", proposed);
            RenameOutcome::Failure
        }
    }
}
