//! External storage facade.
//!
//! Backups are written to and read from a folder tree the user picked, which
//! may live behind a document provider rather than a plain filesystem. The
//! [`ExternalStorage`] trait addresses files and folders through opaque
//! [`DocumentHandle`]s only; [`LocalDocumentTree`] implements it over a local
//! directory.

mod local;

pub use local::LocalDocumentTree;

use std::fmt;

use async_trait::async_trait;
use carfault_common::{paths::FOLDER_MIME_TYPE, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte source returned by [`ExternalStorage::open_read`].
pub type DocumentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed byte sink returned by [`ExternalStorage::open_write`].
pub type DocumentWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ---------------------------------------------------------------------------
// Handles and entries
// ---------------------------------------------------------------------------

/// Opaque handle to a file or folder in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentHandle(String);

impl DocumentHandle {
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentHandle {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl From<&str> for DocumentHandle {
    fn from(uri: &str) -> Self {
        Self(uri.to_string())
    }
}

/// Whether a document is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    File,
    Folder,
}

/// A file or folder as reported by the storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub handle: DocumentHandle,
    /// Display name (a single path component).
    pub name: String,
    pub kind: DocumentKind,
    pub mime_type: String,
    /// Size in bytes, when the provider knows it. Folders report `None`.
    pub size: Option<u64>,
}

impl DocumentEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == DocumentKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == DocumentKind::File
    }
}

// ---------------------------------------------------------------------------
// Facade trait
// ---------------------------------------------------------------------------

/// Async access to a user-granted document tree.
///
/// Failures are reported as `Error::Io`, or `Error::NotFound` for handles
/// that do not name an existing document. Calls are independent; nothing is
/// atomic across calls.
#[async_trait]
pub trait ExternalStorage: Send + Sync {
    /// Check that `handle` names an existing, writable folder.
    async fn resolve_folder(&self, handle: &DocumentHandle) -> Result<DocumentEntry>;

    /// Describe the document behind `handle`.
    async fn metadata(&self, handle: &DocumentHandle) -> Result<DocumentEntry>;

    /// List the direct children of a folder, ordered by name.
    async fn list_children(&self, folder: &DocumentHandle) -> Result<Vec<DocumentEntry>>;

    /// Create a file in `folder`, truncating an existing file of that name.
    async fn create_file(
        &self,
        folder: &DocumentHandle,
        mime_type: &str,
        name: &str,
    ) -> Result<DocumentHandle>;

    /// Create a subfolder, or return the existing one of that name.
    async fn create_folder(&self, folder: &DocumentHandle, name: &str) -> Result<DocumentHandle>;

    /// Open a file for reading.
    async fn open_read(&self, file: &DocumentHandle) -> Result<DocumentReader>;

    /// Open a file for writing from the start.
    async fn open_write(&self, file: &DocumentHandle) -> Result<DocumentWriter>;

    /// Find a direct child of `folder` by exact name.
    async fn find_child_by_name(
        &self,
        folder: &DocumentHandle,
        name: &str,
    ) -> Result<Option<DocumentEntry>> {
        let children = self.list_children(folder).await?;
        Ok(children.into_iter().find(|child| child.name == name))
    }

    /// Find the first direct child of `folder` with the given MIME type.
    ///
    /// Passing the folder MIME type matches subfolders.
    async fn find_first_of_type(
        &self,
        folder: &DocumentHandle,
        mime_type: &str,
    ) -> Result<Option<DocumentEntry>> {
        let children = self.list_children(folder).await?;
        Ok(children.into_iter().find(|child| {
            if mime_type == FOLDER_MIME_TYPE {
                child.is_folder()
            } else {
                child.is_file() && child.mime_type == mime_type
            }
        }))
    }
}
