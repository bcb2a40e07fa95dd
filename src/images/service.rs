//! Image service coordinating managed storage and entry records.
//!
//! Keeps the image directory and the `entry_images` table in step: a stored
//! file is only referenced once it is fully written, and removing an entry
//! removes its directory as well.

use carfault_common::{EntryId, ImageRef, Result};
use carfault_db::pool::{get_conn, DbPool};
use carfault_db::queries::{entries, images};
use tokio::io::AsyncRead;

use super::storage::ImageStorage;

/// High-level image service that coordinates filesystem storage with database records.
#[derive(Clone)]
pub struct ImageService {
    storage: ImageStorage,
    pool: DbPool,
}

impl ImageService {
    /// Create a new `ImageService`.
    pub fn new(storage: ImageStorage, pool: DbPool) -> Self {
        Self { storage, pool }
    }

    pub fn storage(&self) -> &ImageStorage {
        &self.storage
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Copy an image into the entry's directory and append its reference.
    ///
    /// When the reference cannot be recorded the copied file is removed again.
    pub async fn store_and_attach<R>(
        &self,
        entry_id: EntryId,
        file_name: &str,
        reader: &mut R,
    ) -> Result<ImageRef>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let stored = self.storage.store(entry_id, file_name, reader).await?;

        let attached = get_conn(&self.pool)
            .and_then(|conn| images::add_image_reference(&conn, entry_id, &stored.reference));

        if let Err(e) = attached {
            if let Err(cleanup) = tokio::fs::remove_file(&stored.path).await {
                tracing::warn!("Failed to remove {:?} after error: {}", stored.path, cleanup);
            }
            return Err(e);
        }

        Ok(stored.reference)
    }

    /// Delete an entry together with its managed image directory.
    ///
    /// Returns whether the entry existed.
    pub async fn remove_entry(&self, entry_id: EntryId) -> Result<bool> {
        let existed = {
            let conn = get_conn(&self.pool)?;
            entries::delete_entry(&conn, entry_id)?
        };
        self.storage.delete_entry(entry_id).await?;
        Ok(existed)
    }
}
