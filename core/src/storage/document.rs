use crate::storage::metadata::DocumentMetadata;
use crate::storage::{
    Document, Error, Result, QUIRE_EXTENSION, STRUCTURED_EXTENSION, TEXT_EXTENSION,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

static VALID_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// The files making up one document inside a workspace directory.
#[derive(Debug, Clone)]
pub(crate) struct DocumentFiles {
    dir: PathBuf,
    id: String,
}

impl DocumentFiles {
    /// Locates the files for `id` in `dir`. Fails for ids that are not plain file names.
    pub(crate) fn new(dir: &Path, id: &str) -> Result<Self> {
        validate_id(id)?;
        Ok(DocumentFiles { dir: dir.to_path_buf(), id: id.to_string() })
    }

    pub(crate) fn metadata_path(&self) -> PathBuf {
        self.path_with(QUIRE_EXTENSION)
    }

    pub(crate) fn text_path(&self) -> PathBuf {
        self.path_with(TEXT_EXTENSION)
    }

    pub(crate) fn structured_path(&self) -> PathBuf {
        self.path_with(STRUCTURED_EXTENSION)
    }

    fn path_with(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.id, extension))
    }

    pub(crate) async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(self.metadata_path()).await?)
    }

    #[instrument(skip(self), fields(id = %self.id))]
    pub(crate) async fn read_metadata(&self) -> Result<DocumentMetadata> {
        let path = self.metadata_path();
        let content = fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(self.id.clone())
            } else {
                Error::Io(e)
            }
        })?;
        let metadata: DocumentMetadata = serde_json::from_slice(&content)?;
        Ok(metadata)
    }

    #[instrument(skip(self, metadata), fields(id = %self.id))]
    pub(crate) async fn write_metadata(&self, metadata: &DocumentMetadata) -> Result<()> {
        let content = serde_json::to_string_pretty(metadata)?;
        write_atomic(&self.metadata_path(), content.as_bytes()).await?;
        debug!("Metadata saved");
        Ok(())
    }

    /// Reads the structured body. `None` if the document has never been saved with content.
    pub(crate) async fn read_structured(&self) -> Result<Option<String>> {
        read_optional(&self.structured_path()).await
    }

    pub(crate) async fn read_text(&self) -> Result<String> {
        Ok(read_optional(&self.text_path()).await?.unwrap_or_default())
    }

    #[instrument(skip(self, text_content, structured_content), fields(id = %self.id))]
    pub(crate) async fn write_content(
        &self,
        text_content: &str,
        structured_content: &str,
    ) -> Result<()> {
        write_atomic(&self.text_path(), text_content.as_bytes()).await?;
        write_atomic(&self.structured_path(), structured_content.as_bytes()).await?;
        debug!(bytes = text_content.len() + structured_content.len(), "Content saved");
        Ok(())
    }

    pub(crate) async fn load(&self) -> Result<Document> {
        let metadata = self.read_metadata().await?;
        let text_content = self.read_text().await?;
        let structured_content = self.read_structured().await?.unwrap_or_default();
        Ok(Document {
            id: metadata.id,
            title: metadata.title,
            text_content,
            structured_content,
            is_open: metadata.is_open,
        })
    }
}

/// Document ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn validate_id(id: &str) -> Result<()> {
    if VALID_ID.is_match(id) {
        Ok(())
    } else {
        Err(Error::InvalidId(id.to_string()))
    }
}

/// Trims a title and collapses inner whitespace runs into single spaces.
pub(crate) fn normalize_title(title: &str) -> String {
    WHITESPACE_RUN.replace_all(title.trim(), " ").into_owned()
}

fn same_title(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Lists the ids of all documents in `dir`.
pub(crate) async fn list_ids(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut read_dir = fs::read_dir(dir).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::DirectoryNotFound(dir.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(OsStr::to_str) != Some(QUIRE_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(OsStr::to_str) else { continue };
        if validate_id(stem).is_ok() && entry.file_type().await?.is_file() {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Finds another document in `dir` whose title equals `normalized_title`.
///
/// Unreadable metadata files are skipped with a warning rather than failing the check.
pub(crate) async fn find_title_conflict(
    dir: &Path,
    except_id: &str,
    normalized_title: &str,
) -> Result<Option<String>> {
    for id in list_ids(dir).await? {
        if id == except_id {
            continue;
        }
        match DocumentFiles::new(dir, &id)?.read_metadata().await {
            Ok(metadata) if same_title(&normalize_title(&metadata.title), normalized_title) => {
                debug!("Title {:?} already used by document {}", normalized_title, id);
                return Ok(Some(id));
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable metadata for {}: {}", id, e),
        }
    }
    Ok(None)
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Writes to a sibling temp file, then renames it over `path`.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        warn!("Failed to move {} into place: {}", tmp.display(), e);
        let _ = fs::remove_file(&tmp).await;
        return Err(Error::Io(e));
    }
    Ok(())
}
