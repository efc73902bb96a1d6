use crate::config::SessionConfig;
use crate::storage::document::{find_title_conflict, list_ids, normalize_title, DocumentFiles};
use crate::storage::metadata::{
    read_workspace_config, write_workspace_config, DocumentMetadata, WorkspaceConfig,
};
use crate::storage::{
    Document, DocumentContent, DocumentStore, Error, OperationResult, Result, INTERNAL_DIR_NAME,
    WORKSPACE_CONFIG_FILENAME,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A workspace directory of documents, usable as a [`DocumentStore`].
#[derive(Debug)]
pub struct FsStore {
    // Absolute path to the workspace root
    absolute_path: PathBuf,
    internal_dir: PathBuf,
    config: WorkspaceConfig,
    // Title checks and the writes they guard must not interleave
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Returns the root path of the workspace.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// Returns the path to the internal `.quire` directory.
    pub fn internal_dir_path(&self) -> &Path {
        &self.internal_dir
    }

    /// Session timing stored in the workspace config.
    pub fn session_config(&self) -> SessionConfig {
        self.config.session
    }

    /// Opens an existing workspace directory.
    ///
    /// Checks that the directory exists, contains the `.quire` subdirectory and a readable
    /// `config.json`.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<FsStore> {
        let path = path.as_ref();
        debug!("Attempting to open workspace");

        // Check if the path exists (necessary prior to canonicalization)
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let absolute_path = fs::canonicalize(path).await?;
        let internal_dir = absolute_path.join(INTERNAL_DIR_NAME);
        let internal_meta = fs::metadata(&internal_dir).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotAWorkspace(absolute_path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        if !internal_meta.is_dir() {
            return Err(Error::NotAWorkspace(absolute_path));
        }

        let config = read_workspace_config(&internal_dir.join(WORKSPACE_CONFIG_FILENAME)).await?;
        debug!(workspace_id = %config.id, "Workspace opened");

        Ok(FsStore {
            absolute_path,
            internal_dir,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Creates a new workspace at the specified path.
    ///
    /// - If the path does not exist, creates the directory and the `.quire` subdirectory.
    /// - If the path exists and is an empty directory, creates the `.quire` subdirectory.
    /// - Fails if the path exists and is a file, is a non-empty directory,
    ///   or already contains a `.quire` file/directory.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> Result<FsStore> {
        let path = path.as_ref();
        debug!("Attempting to create workspace");

        let internal_dir = path.join(INTERNAL_DIR_NAME);
        match fs::metadata(path).await {
            Ok(meta) => {
                if !meta.is_dir() {
                    debug!("Workspace creation failed: path exists and is a file");
                    return Err(Error::PathIsFile(path.to_path_buf()));
                }
                if fs::metadata(&internal_dir).await.is_ok() {
                    debug!("Workspace creation failed: '.quire' already exists");
                    return Err(Error::WorkspaceCreationConflict(path.to_path_buf()));
                }
                let mut read_dir = fs::read_dir(path).await?;
                if read_dir.next_entry().await?.is_some() {
                    debug!("Workspace creation failed: directory is not empty");
                    return Err(Error::WorkspaceCreationConflict(path.to_path_buf()));
                }
                fs::create_dir(&internal_dir).await?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Path does not exist. Creating workspace directory and internal directory.");
                fs::create_dir_all(&internal_dir).await?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let config = WorkspaceConfig::new();
        write_workspace_config(&internal_dir.join(WORKSPACE_CONFIG_FILENAME), &config).await?;

        let absolute_path = fs::canonicalize(path).await?;
        debug!("Workspace created at {}", absolute_path.display());

        Ok(FsStore {
            internal_dir: absolute_path.join(INTERNAL_DIR_NAME),
            absolute_path,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Stores `session` as the workspace's timing config.
    pub async fn set_session_config(&mut self, session: SessionConfig) -> Result<()> {
        self.config.session = session;
        let path = self.internal_dir.join(WORKSPACE_CONFIG_FILENAME);
        write_workspace_config(&path, &self.config).await
    }

    /// Creates an empty document with a fresh id.
    #[instrument(skip(self))]
    pub async fn create_document(&self, title: &str) -> Result<Document> {
        let title = normalize_title(title);
        if title.is_empty() {
            return Err(Error::BlankTitle);
        }

        let _guard = self.write_lock.lock().await;
        if find_title_conflict(&self.absolute_path, "", &title).await?.is_some() {
            return Err(Error::TitleConflict(title));
        }

        let id = Uuid::new_v4().to_string();
        let files = self.files(&id)?;
        files.write_content("", "").await?;
        files.write_metadata(&DocumentMetadata::new(id.clone(), title.clone())).await?;
        debug!(%id, "Document created");

        Ok(Document {
            id,
            title,
            text_content: String::new(),
            structured_content: String::new(),
            is_open: false,
        })
    }

    /// Lists all documents, ordered by title. Documents whose files cannot be read are skipped.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for id in list_ids(&self.absolute_path).await? {
            match self.files(&id)?.load().await {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping document {}: {}", id, e),
            }
        }
        documents.sort_by_key(|doc| doc.title.to_lowercase());
        Ok(documents)
    }

    fn files(&self, id: &str) -> Result<DocumentFiles> {
        DocumentFiles::new(&self.absolute_path, id)
    }

    /// Validates `title` for document `id`. `Ok(Err(..))` carries a rejection outcome.
    async fn check_title(
        &self,
        id: &str,
        title: &str,
    ) -> Result<std::result::Result<String, OperationResult<String>>> {
        let title = normalize_title(title);
        if title.is_empty() {
            return Ok(Err(OperationResult::Blank));
        }
        if find_title_conflict(&self.absolute_path, id, &title).await?.is_some() {
            return Ok(Err(OperationResult::Conflict));
        }
        Ok(Ok(title))
    }

    async fn try_rename(
        &self,
        id: &str,
        old_title: &str,
        new_title: &str,
    ) -> Result<OperationResult<String>> {
        let _guard = self.write_lock.lock().await;
        let files = self.files(id)?;
        let mut metadata = files.read_metadata().await?;
        if metadata.title != old_title {
            debug!(
                stored = %metadata.title,
                expected = %old_title,
                "Renaming from an unexpected title"
            );
        }

        let title = match self.check_title(id, new_title).await? {
            Ok(title) => title,
            Err(rejected) => return Ok(rejected),
        };
        metadata.title = title.clone();
        metadata.touch();
        files.write_metadata(&metadata).await?;
        Ok(OperationResult::Success(title))
    }

    async fn try_update_content(
        &self,
        id: &str,
        text_content: &str,
        structured_content: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let files = self.files(id)?;
        if !files.exists().await? {
            return Err(Error::NotFound(id.to_string()));
        }
        files.write_content(text_content, structured_content).await
    }

    async fn try_update_all(
        &self,
        id: &str,
        title: &str,
        text_content: &str,
        structured_content: &str,
    ) -> Result<OperationResult> {
        let _guard = self.write_lock.lock().await;
        let files = self.files(id)?;
        let mut metadata = files.read_metadata().await?;

        let title = match self.check_title(id, title).await? {
            Ok(title) => title,
            Err(rejected) => return Ok(rejected.map(|_| ())),
        };
        files.write_content(text_content, structured_content).await?;
        if metadata.title != title {
            metadata.title = title;
            metadata.touch();
            files.write_metadata(&metadata).await?;
        }
        Ok(OperationResult::Success(()))
    }

    async fn try_set_open(&self, id: &str, is_open: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let files = self.files(id)?;
        let mut metadata = files.read_metadata().await?;
        if metadata.is_open != is_open {
            metadata.is_open = is_open;
            files.write_metadata(&metadata).await?;
        }
        Ok(())
    }
}

fn failure<T>(operation: &str, id: &str, error: Error) -> OperationResult<T> {
    warn!(%id, "{} failed: {}", operation, error);
    OperationResult::Failure
}

#[async_trait]
impl DocumentStore for FsStore {
    #[instrument(skip(self))]
    async fn get_document(&self, id: &str) -> Result<Document> {
        self.files(id)?.load().await
    }

    #[instrument(skip(self))]
    async fn get_document_content(&self, id: &str) -> Result<DocumentContent> {
        let files = self.files(id)?;
        if !files.exists().await? {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(DocumentContent { content: files.read_structured().await? })
    }

    #[instrument(skip(self))]
    async fn rename_document(
        &self,
        id: &str,
        old_title: &str,
        new_title: &str,
    ) -> OperationResult<String> {
        self.try_rename(id, old_title, new_title)
            .await
            .unwrap_or_else(|e| failure("Rename", id, e))
    }

    #[instrument(skip(self, text_content, structured_content))]
    async fn update_content(
        &self,
        id: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult {
        match self.try_update_content(id, text_content, structured_content).await {
            Ok(()) => OperationResult::Success(()),
            Err(e) => failure("Content update", id, e),
        }
    }

    #[instrument(skip(self, text_content, structured_content))]
    async fn update_all(
        &self,
        id: &str,
        title: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult {
        self.try_update_all(id, title, text_content, structured_content)
            .await
            .unwrap_or_else(|e| failure("Update", id, e))
    }

    #[instrument(skip(self))]
    async fn set_open(&self, id: &str, is_open: bool) {
        if let Err(e) = self.try_set_open(id, is_open).await {
            warn!(%id, "Failed to mark document open={}: {}", is_open, e);
        }
    }
}
