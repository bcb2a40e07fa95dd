//! Local-filesystem document tree.
//!
//! Handles are `content://tree/<relative path>` URIs below a root directory.
//! Relative paths are made of plain names only; `.`/`..` segments and
//! separators inside names are rejected so no handle can leave the root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use carfault_common::paths::{is_plain_file_name, mime_type_for, FOLDER_MIME_TYPE};
use carfault_common::{Error, Result};

use super::{
    DocumentEntry, DocumentHandle, DocumentKind, DocumentReader, DocumentWriter, ExternalStorage,
};

const TREE_PREFIX: &str = "content://tree/";

/// [`ExternalStorage`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDocumentTree {
    root: PathBuf,
}

impl LocalDocumentTree {
    /// Create a tree rooted at `root`. The directory is not touched until used.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory on disk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle of the tree root folder.
    pub fn root_handle(&self) -> DocumentHandle {
        DocumentHandle::new(TREE_PREFIX)
    }

    /// Handle for a path relative to the root, e.g. `"images/7/a.jpg"`.
    pub fn handle_for(&self, relative: &str) -> Result<DocumentHandle> {
        let segments = split_relative(relative)?;
        Ok(DocumentHandle::new(format!(
            "{}{}",
            TREE_PREFIX,
            segments.join("/")
        )))
    }

    /// Filesystem path behind a handle.
    pub fn path_of(&self, handle: &DocumentHandle) -> Result<PathBuf> {
        let relative = handle
            .as_str()
            .strip_prefix(TREE_PREFIX)
            .ok_or_else(|| Error::not_found(format!("Unknown document handle: {}", handle)))?;

        let mut path = self.root.clone();
        for segment in split_relative(relative)? {
            path.push(segment);
        }
        Ok(path)
    }

    fn child_handle(&self, folder: &DocumentHandle, name: &str) -> Result<DocumentHandle> {
        if !is_plain_file_name(name) {
            return Err(Error::io(format!("Invalid document name: {:?}", name)));
        }

        let base = folder.as_str().trim_end_matches('/');
        Ok(DocumentHandle::new(format!("{}/{}", base, name)))
    }

    async fn entry_for(&self, handle: DocumentHandle, path: &Path) -> Result<DocumentEntry> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_io(e, &handle))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(if meta.is_dir() {
            DocumentEntry {
                handle,
                name,
                kind: DocumentKind::Folder,
                mime_type: FOLDER_MIME_TYPE.to_string(),
                size: None,
            }
        } else {
            DocumentEntry {
                handle,
                mime_type: mime_type_for(&name).to_string(),
                name,
                kind: DocumentKind::File,
                size: Some(meta.len()),
            }
        })
    }

    async fn folder_path(&self, folder: &DocumentHandle) -> Result<PathBuf> {
        let path = self.path_of(folder)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(e, folder))?;
        if !meta.is_dir() {
            return Err(Error::io(format!("Not a folder: {}", folder)));
        }
        Ok(path)
    }
}

fn split_relative(relative: &str) -> Result<Vec<&str>> {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if is_plain_file_name(segment) {
                Ok(segment)
            } else {
                Err(Error::io(format!(
                    "Path segment {:?} escapes the document tree",
                    segment
                )))
            }
        })
        .collect()
}

fn map_io(err: std::io::Error, handle: &DocumentHandle) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::not_found(format!("Document not found: {}", handle))
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl ExternalStorage for LocalDocumentTree {
    async fn resolve_folder(&self, handle: &DocumentHandle) -> Result<DocumentEntry> {
        let path = self.folder_path(handle).await?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(e, handle))?;
        if meta.permissions().readonly() {
            return Err(Error::io(format!("Folder is not writable: {}", handle)));
        }

        self.entry_for(handle.clone(), &path).await
    }

    async fn metadata(&self, handle: &DocumentHandle) -> Result<DocumentEntry> {
        let path = self.path_of(handle)?;
        self.entry_for(handle.clone(), &path).await
    }

    async fn list_children(&self, folder: &DocumentHandle) -> Result<Vec<DocumentEntry>> {
        let path = self.folder_path(folder).await?;
        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| map_io(e, folder))?;

        let mut children = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!("Skipping non UTF-8 name in {:?}", path);
                continue;
            };
            let handle = self.child_handle(folder, &name)?;
            children.push(self.entry_for(handle, &entry.path()).await?);
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn create_file(
        &self,
        folder: &DocumentHandle,
        mime_type: &str,
        name: &str,
    ) -> Result<DocumentHandle> {
        let handle = self.child_handle(folder, name)?;
        let path = self.folder_path(folder).await?.join(name);

        tokio::fs::File::create(&path).await?;
        tracing::trace!(%handle, mime_type, "Created document");

        Ok(handle)
    }

    async fn create_folder(&self, folder: &DocumentHandle, name: &str) -> Result<DocumentHandle> {
        let handle = self.child_handle(folder, name)?;
        let path = self.folder_path(folder).await?.join(name);

        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(handle),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(handle),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn open_read(&self, file: &DocumentHandle) -> Result<DocumentReader> {
        let path = self.path_of(file)?;
        let reader = tokio::fs::File::open(&path)
            .await
            .map_err(|e| map_io(e, file))?;
        Ok(Box::new(reader))
    }

    async fn open_write(&self, file: &DocumentHandle) -> Result<DocumentWriter> {
        let path = self.path_of(file)?;
        let writer = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| map_io(e, file))?;
        Ok(Box::new(writer))
    }
}
