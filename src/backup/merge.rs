//! Merge a bundle into a populated store.
//!
//! Every record is checked before anything is written. Records are then
//! inserted in document order under freshly assigned ids, together with the
//! images found in `images/<source id>/`. A failure while writing removes the
//! entries this merge inserted; dictionary values created on the way stay.

use std::collections::HashSet;
use std::sync::Arc;

use carfault_common::paths::{is_plain_file_name, JSON_MIME_TYPE};
use carfault_common::{EntryId, Error, ReconcileStrategy, Result};
use carfault_db::models::validate_text;
use carfault_db::queries::entries;
use tokio::io::AsyncReadExt;

use super::document::{entry_content_hash, ExportDocument, ExportRecord};
use super::progress::{ProgressEvent, ProgressSink};
use super::{
    ensure_record_references, missing_source, present, with_conn, BackupOptions, IMAGES_FOLDER,
};
use crate::images::ImageService;
use crate::storage::{DocumentEntry, DocumentHandle, ExternalStorage};

/// Merges bundles read through external storage.
pub struct MergeEngine {
    images: ImageService,
    storage: Arc<dyn ExternalStorage>,
    options: BackupOptions,
}

/// Records already present, for the non-default reconcile strategies.
enum Seen {
    Nothing,
    Ids,
    Hashes(HashSet<String>),
}

impl MergeEngine {
    pub fn new(
        images: ImageService,
        storage: Arc<dyn ExternalStorage>,
        options: BackupOptions,
    ) -> Self {
        Self {
            images,
            storage,
            options,
        }
    }

    /// Merge the bundle in `source` and return the number of records merged.
    ///
    /// Emits `Merging` before every record and once more when done; on
    /// failure emits `Error` and returns the error.
    pub async fn merge(&self, source: &DocumentHandle, progress: &dyn ProgressSink) -> Result<usize> {
        match self.run(source, progress).await {
            Ok(merged) => {
                tracing::info!(merged, "Merge finished");
                Ok(merged)
            }
            Err(e) => {
                tracing::error!("Merge from {} failed: {}", source, e);
                progress.emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, source: &DocumentHandle, progress: &dyn ProgressSink) -> Result<usize> {
        let document_file = self
            .storage
            .find_first_of_type(source, JSON_MIME_TYPE)
            .await?
            .ok_or_else(|| Error::not_found(format!("No export document in {}", source)))?;
        let images_folder = self
            .storage
            .find_child_by_name(source, IMAGES_FOLDER)
            .await?
            .filter(DocumentEntry::is_folder)
            .ok_or_else(|| Error::not_found(format!("No images folder in {}", source)))?;

        let document = self.read_document(&document_file.handle).await?;
        validate_records(&document.entries)?;

        let total = document.entries.len();
        tracing::info!(
            records = total,
            strategy = ?self.options.reconcile,
            "Merging export document {}",
            document_file.name
        );

        let mut seen = self.load_seen()?;
        let mut inserted = Vec::new();
        let mut merged = 0;

        for (index, record) in document.entries.iter().enumerate() {
            self.options.check_cancelled()?;
            progress.emit(ProgressEvent::Merging {
                current: index,
                total,
            });

            if let Some(reason) = self.already_present(&seen, record)? {
                tracing::info!(record_id = record.id, "Skipping record: {}", reason);
                continue;
            }

            match self
                .merge_record(record, &images_folder.handle, &mut inserted)
                .await
            {
                Ok(()) => {
                    if let Seen::Hashes(hashes) = &mut seen {
                        hashes.insert(record.content_hash());
                    }
                    merged += 1;
                }
                Err(e) => {
                    self.roll_back(&inserted).await;
                    return Err(e);
                }
            }
        }

        progress.emit(ProgressEvent::Merging {
            current: total,
            total,
        });
        Ok(merged)
    }

    async fn read_document(&self, file: &DocumentHandle) -> Result<ExportDocument> {
        let mut reader = self.storage.open_read(file).await?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        ExportDocument::from_slice(&bytes)
    }

    fn load_seen(&self) -> Result<Seen> {
        match self.options.reconcile {
            ReconcileStrategy::AppendAlways => Ok(Seen::Nothing),
            ReconcileStrategy::ById => Ok(Seen::Ids),
            ReconcileStrategy::ByContentHash => {
                let existing = with_conn(self.images.pool(), entries::list_entries)?;
                Ok(Seen::Hashes(
                    existing.iter().map(entry_content_hash).collect(),
                ))
            }
        }
    }

    /// Why a record should be skipped, if it should.
    fn already_present(&self, seen: &Seen, record: &ExportRecord) -> Result<Option<&'static str>> {
        match seen {
            Seen::Nothing => Ok(None),
            Seen::Ids => {
                let id = EntryId::from(record.id);
                let exists = !id.is_new()
                    && with_conn(self.images.pool(), |conn| entries::entry_exists(conn, id))?;
                Ok(exists.then_some("an entry with this id exists"))
            }
            Seen::Hashes(hashes) => Ok(hashes
                .contains(&record.content_hash())
                .then_some("an entry with identical content exists")),
        }
    }

    async fn merge_record(
        &self,
        record: &ExportRecord,
        images_folder: &DocumentHandle,
        inserted: &mut Vec<EntryId>,
    ) -> Result<()> {
        let id = with_conn(self.images.pool(), |conn| {
            let new = ensure_record_references(conn, record)?;
            entries::insert_entry(conn, &new)
        })?;
        inserted.push(id);
        tracing::debug!(record_id = record.id, entry_id = %id, "Merged record");

        if record.images.is_empty() {
            return Ok(());
        }

        let folder = self
            .storage
            .find_child_by_name(images_folder, &record.id.to_string())
            .await?
            .filter(DocumentEntry::is_folder);
        let Some(folder) = folder else {
            return missing_source(
                self.options.on_missing_source,
                format!("no image folder for record {}", record.id),
            );
        };

        let children = self.storage.list_children(&folder.handle).await?;
        for name in &record.images {
            if !is_plain_file_name(name) {
                tracing::warn!(record_id = record.id, "Ignoring image name {:?}", name);
                continue;
            }

            let Some(file) = children
                .iter()
                .find(|child| child.is_file() && child.name == *name)
            else {
                missing_source(
                    self.options.on_missing_source,
                    format!("{}/{}/{}", IMAGES_FOLDER, record.id, name),
                )?;
                continue;
            };

            let mut reader = match self.storage.open_read(&file.handle).await {
                Ok(reader) => reader,
                Err(e) => {
                    missing_source(
                        self.options.on_missing_source,
                        format!("{} ({})", file.handle, e),
                    )?;
                    continue;
                }
            };
            self.images.store_and_attach(id, name, &mut reader).await?;
        }

        Ok(())
    }

    async fn roll_back(&self, inserted: &[EntryId]) {
        tracing::warn!(entries = inserted.len(), "Rolling back merged entries");
        for id in inserted {
            if let Err(e) = self.images.remove_entry(*id).await {
                tracing::error!(entry_id = %id, "Failed to roll back entry: {}", e);
            }
        }
    }
}

/// Check every record before the first write.
fn validate_records(records: &[ExportRecord]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        let missing = [
            ("brand", present(&record.brand).is_none()),
            ("location", present(&record.location).is_none()),
            ("modelName", present(&record.model_name).is_none()),
            ("year", record.year.is_none()),
        ];
        if let Some((field, _)) = missing.iter().find(|(_, missing)| *missing) {
            return Err(Error::validation(format!(
                "record {} (id {}) has no {}",
                index, record.id, field
            )));
        }

        validate_text(&record.title, &record.description).map_err(|e| {
            Error::validation(format!("record {} (id {}): {}", index, record.id, e))
        })?;
    }
    Ok(())
}
