//! The durable document store, as seen by a session.
//!
//! # Capability contract
//!
//! A session talks to storage only through [`DocumentStore`]. Reads return
//! [`Result`]s; every mutating operation returns an [`OperationResult`] instead, so that the
//! session can map each outcome to exactly one user-visible report without any error escaping
//! from a background save:
//!
//! | operation | result |
//! |---|---|
//! | [`get_document`](DocumentStore::get_document) | `Result<Document>`, `Error::NotFound` |
//! | [`get_document_content`](DocumentStore::get_document_content) | `Result<DocumentContent>` |
//! | [`rename_document`](DocumentStore::rename_document) | `OperationResult<String>` |
//! | [`update_content`](DocumentStore::update_content) | `OperationResult` |
//! | [`update_all`](DocumentStore::update_all) | `OperationResult` |
//! | [`set_open`](DocumentStore::set_open) | nothing, fire-and-forget |
//!
//! # Filesystem store
//!
//! [`FsStore`] keeps documents in a workspace directory:
//!
//! ```text
//! notes/
//!   .quire/
//!     config.json          workspace id, format version, session timing
//!   3f2c….quire            metadata: id, title, open flag
//!   3f2c….txt              plain-text projection of the body
//!   3f2c….json             structured body
//! ```
//!
//! All three files of a document share its id as base name, in the spirit of one logical
//! document spread over several files. Titles are unique within a workspace (compared after
//! trimming, collapsing inner whitespace and ignoring case); a rename or full update that would
//! duplicate a title yields [`OperationResult::Conflict`].
//!
//! ```rust,no_run
//! use quire_core::storage::{DocumentStore, FsStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FsStore::create("notes").await?;
//!     let doc = store.create_document("Groceries").await?;
//!     let loaded = store.get_document(&doc.id).await?;
//!     assert_eq!(loaded.title, "Groceries");
//!     Ok(())
//! }
//! ```

pub use self::workspace::FsStore;

mod document;
mod metadata;
mod workspace;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const QUIRE_EXTENSION: &str = "quire";
pub const TEXT_EXTENSION: &str = "txt";
pub const STRUCTURED_EXTENSION: &str = "json";
pub const INTERNAL_DIR_NAME: &str = ".quire";
pub const WORKSPACE_CONFIG_FILENAME: &str = "config.json";

/// A document as loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Plain-text projection of the body.
    pub text_content: String,
    /// Serialized structured body; opaque to the store.
    pub structured_content: String,
    pub is_open: bool,
}

/// The structured body of a document, if it has ever been saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContent {
    pub content: Option<String>,
}

/// Outcome of a mutating store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult<T = ()> {
    /// Applied. Carries the resulting value, e.g. the title as the store accepted it.
    Success(T),
    /// The proposed title was empty or whitespace only.
    Blank,
    /// The proposed title collides with another document or was otherwise rejected.
    Conflict,
    /// The store could not complete the operation.
    Failure,
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        match self {
            OperationResult::Success(value) => OperationResult::Success(f(value)),
            OperationResult::Blank => OperationResult::Blank,
            OperationResult::Conflict => OperationResult::Conflict,
            OperationResult::Failure => OperationResult::Failure,
        }
    }
}

/// Capabilities a session needs from durable storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Document>;

    async fn get_document_content(&self, id: &str) -> Result<DocumentContent>;

    async fn rename_document(
        &self,
        id: &str,
        old_title: &str,
        new_title: &str,
    ) -> OperationResult<String>;

    /// Replaces the body only.
    async fn update_content(
        &self,
        id: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult;

    /// Replaces title and body in one operation.
    async fn update_all(
        &self,
        id: &str,
        title: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult;

    /// Marks the document as open or closed. Failures are logged, never returned.
    async fn set_open(&self, id: &str, is_open: bool);
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    #[error("Metadata serialization/deserialization error")]
    Metadata(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Path is not a valid workspace (missing '.quire' subdirectory): {0}")]
    NotAWorkspace(PathBuf),

    #[error("Cannot create workspace: path exists and is not an empty directory: {0}")]
    WorkspaceCreationConflict(PathBuf),

    #[error("Cannot create workspace: path exists and is a file: {0}")]
    PathIsFile(PathBuf),

    #[error("Workspace configuration file is missing or invalid: {0}")]
    InvalidWorkspaceConfig(PathBuf),

    #[error("A document titled {0:?} already exists")]
    TitleConflict(String),

    #[error("Document title cannot be blank")]
    BlankTitle,
}

pub type Result<T> = std::result::Result<T, Error>;
