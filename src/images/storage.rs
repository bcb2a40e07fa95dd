//! Managed image directory and image source resolution.
//!
//! Images attached to entries are stored under `{base_dir}/{entry_id}/` by
//! their original file name and referenced as `"{entry_id}/{name}"`. Every
//! other reference shape is opened through [`ImageStorage::open_read`], the
//! one place that knows how each [`ImageRef`] variant maps to bytes.

use std::path::{Path, PathBuf};

use carfault_common::paths::is_plain_file_name;
use carfault_common::{EntryId, Error, ImageRef, Result};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::storage::{DocumentHandle, DocumentReader, ExternalStorage};

/// Result of copying an image into the managed directory.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Reference to record on the entry.
    pub reference: ImageRef,
    /// Absolute path of the stored file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// An opened image ready to be copied.
pub struct ImageSource {
    /// File name to store or export the image under.
    pub name: String,
    /// Size in bytes, if known up front.
    pub size: Option<u64>,
    pub reader: DocumentReader,
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Filesystem manager for the app's image directory.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    base_dir: PathBuf,
}

impl ImageStorage {
    /// Create a new `ImageStorage` with the given base directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the images of one entry.
    pub fn entry_dir(&self, entry_id: EntryId) -> PathBuf {
        self.base_dir.join(entry_id.to_string())
    }

    /// Filesystem path of a path-shaped reference.
    ///
    /// Returns `None` for content handles and for relative references that
    /// would leave the managed directory.
    pub fn resolve(&self, image: &ImageRef) -> Option<PathBuf> {
        match image {
            ImageRef::AbsolutePath(path) => Some(path.clone()),
            ImageRef::RelativePath(relative) => {
                let mut path = self.base_dir.clone();
                let segments = relative
                    .split(|c: char| c == '/' || c == '\\')
                    .filter(|s| !s.is_empty());
                for segment in segments {
                    if !is_plain_file_name(segment) {
                        return None;
                    }
                    path.push(segment);
                }
                Some(path)
            }
            ImageRef::ContentHandle(_) => None,
        }
    }

    /// Copy an image into `{base_dir}/{entry_id}/{file_name}`.
    ///
    /// An existing file of the same name is overwritten.
    pub async fn store<R>(
        &self,
        entry_id: EntryId,
        file_name: &str,
        reader: &mut R,
    ) -> Result<StoredImage>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if !is_plain_file_name(file_name) {
            return Err(Error::validation(format!(
                "Invalid image file name: {:?}",
                file_name
            )));
        }

        let entry_dir = self.entry_dir(entry_id);
        tokio::fs::create_dir_all(&entry_dir).await?;

        let path = entry_dir.join(file_name);
        let mut file = tokio::fs::File::create(&path).await?;
        let bytes = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;

        tracing::debug!(entry_id = %entry_id, file_name, bytes, "Stored image");

        Ok(StoredImage {
            reference: ImageRef::RelativePath(format!("{}/{}", entry_id, file_name)),
            path,
            bytes,
        })
    }

    /// Open the bytes behind any reference shape.
    ///
    /// Path references are read from disk, content handles through the
    /// external storage facade. A source that does not exist is
    /// `Error::NotFound`.
    pub async fn open_read(
        &self,
        external: &dyn ExternalStorage,
        image: &ImageRef,
    ) -> Result<ImageSource> {
        match image {
            ImageRef::AbsolutePath(_) | ImageRef::RelativePath(_) => {
                let path = self
                    .resolve(image)
                    .ok_or_else(|| Error::not_found(format!("Unresolvable image: {}", image)))?;
                let name = image
                    .file_name()
                    .ok_or_else(|| Error::not_found(format!("Image has no file name: {}", image)))?;

                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::not_found(format!("Image not found: {}", path.display()))
                    } else {
                        Error::Io(e)
                    }
                })?;
                let size = file.metadata().await.ok().map(|m| m.len());

                Ok(ImageSource {
                    name,
                    size,
                    reader: Box::new(file),
                })
            }
            ImageRef::ContentHandle(uri) => {
                let handle = DocumentHandle::new(uri.as_str());
                let meta = external.metadata(&handle).await?;
                let reader = external.open_read(&handle).await?;

                Ok(ImageSource {
                    name: meta.name,
                    size: meta.size,
                    reader,
                })
            }
        }
    }

    /// Size of the bytes behind a reference, or `None` when it cannot be resolved.
    pub async fn source_size(
        &self,
        external: &dyn ExternalStorage,
        image: &ImageRef,
    ) -> Option<u64> {
        match image {
            ImageRef::AbsolutePath(_) | ImageRef::RelativePath(_) => {
                let path = self.resolve(image)?;
                let meta = tokio::fs::metadata(&path).await.ok()?;
                meta.is_file().then(|| meta.len())
            }
            ImageRef::ContentHandle(uri) => external
                .metadata(&DocumentHandle::new(uri.as_str()))
                .await
                .ok()
                .and_then(|meta| meta.size),
        }
    }

    /// Remove the image directory of an entry, if there is one.
    pub async fn delete_entry(&self, entry_id: EntryId) -> Result<()> {
        let dir = self.entry_dir(entry_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalDocumentTree;
    use tokio::io::AsyncReadExt;

    async fn read_all(source: ImageSource) -> Vec<u8> {
        let mut reader = source.reader;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[test]
    fn test_resolve() {
        let storage = ImageStorage::new("/data/images");

        assert_eq!(
            storage.resolve(&ImageRef::RelativePath("7/a.jpg".to_string())),
            Some(PathBuf::from("/data/images/7/a.jpg"))
        );
        assert_eq!(
            storage.resolve(&ImageRef::AbsolutePath(PathBuf::from("/tmp/b.jpg"))),
            Some(PathBuf::from("/tmp/b.jpg"))
        );
        assert_eq!(
            storage.resolve(&ImageRef::RelativePath("../secret".to_string())),
            None
        );
        assert_eq!(
            storage.resolve(&ImageRef::ContentHandle("content://media/1".to_string())),
            None
        );
    }

    #[tokio::test]
    async fn test_store_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());
        let tree = LocalDocumentTree::new(dir.path());
        let entry_id = EntryId::from(7);

        let stored = storage
            .store(entry_id, "a.jpg", &mut &b"image data"[..])
            .await
            .unwrap();
        assert_eq!(stored.reference, ImageRef::RelativePath("7/a.jpg".to_string()));
        assert_eq!(stored.bytes, 10);
        assert_eq!(stored.path, dir.path().join("7").join("a.jpg"));

        let source = storage.open_read(&tree, &stored.reference).await.unwrap();
        assert_eq!(source.name, "a.jpg");
        assert_eq!(source.size, Some(10));
        assert_eq!(read_all(source).await, b"image data");

        assert_eq!(storage.source_size(&tree, &stored.reference).await, Some(10));
    }

    #[tokio::test]
    async fn test_open_absolute_and_content_handle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path().join("managed"));
        let tree = LocalDocumentTree::new(dir.path());

        std::fs::create_dir_all(dir.path().join("camera")).unwrap();
        std::fs::write(dir.path().join("camera/p.png"), b"png").unwrap();

        let absolute = ImageRef::AbsolutePath(dir.path().join("camera/p.png"));
        let source = storage.open_read(&tree, &absolute).await.unwrap();
        assert_eq!(source.name, "p.png");
        assert_eq!(read_all(source).await, b"png");

        let handle = ImageRef::ContentHandle("content://tree/camera/p.png".to_string());
        let source = storage.open_read(&tree, &handle).await.unwrap();
        assert_eq!(source.name, "p.png");
        assert_eq!(source.size, Some(3));
        assert_eq!(read_all(source).await, b"png");
    }

    #[tokio::test]
    async fn test_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());
        let tree = LocalDocumentTree::new(dir.path());

        let missing = ImageRef::RelativePath("1/gone.jpg".to_string());
        assert!(matches!(
            storage.open_read(&tree, &missing).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(storage.source_size(&tree, &missing).await, None);

        let foreign = ImageRef::ContentHandle("content://media/external/9".to_string());
        assert!(storage.open_read(&tree, &foreign).await.is_err());
        assert_eq!(storage.source_size(&tree, &foreign).await, None);
    }

    #[tokio::test]
    async fn test_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());

        let result = storage
            .store(EntryId::from(1), "../x.jpg", &mut &b""[..])
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::new(dir.path());
        let entry_id = EntryId::from(3);

        storage
            .store(entry_id, "a.jpg", &mut &b"x"[..])
            .await
            .unwrap();
        assert!(storage.entry_dir(entry_id).exists());

        storage.delete_entry(entry_id).await.unwrap();
        assert!(!storage.entry_dir(entry_id).exists());

        // Nothing left to delete is fine
        storage.delete_entry(entry_id).await.unwrap();
    }
}
