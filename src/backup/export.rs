//! Export the record store to a bundle folder.
//!
//! The document is written first, then every entry's images are copied into
//! `images/<entry id>/` in load order. Progress is reported in bytes after
//! every copied chunk. Output already written stays in place when the
//! export fails.

use std::collections::HashSet;
use std::sync::Arc;

use carfault_common::paths::{is_plain_file_name, mime_type_for, JSON_MIME_TYPE};
use carfault_common::{EntryId, Error, ImageRef, Result};
use carfault_db::queries::entries;
use tokio::io::AsyncWriteExt;

use super::document::{ExportDocument, ExportRecord, FORMAT_VERSION};
use super::progress::{ProgressEvent, ProgressSink};
use super::{
    copy_chunked, missing_source, with_conn, BackupOptions, EXPORT_FILE_NAME, IMAGES_FOLDER,
};
use crate::images::ImageService;
use crate::storage::{DocumentHandle, ExternalStorage};

/// Counts describing a finished export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub entries: usize,
    pub images_copied: usize,
    pub images_skipped: usize,
    /// Entries whose image folder could not be created.
    pub entries_skipped: usize,
    pub bytes_written: u64,
}

/// One image of an entry, resolved before anything is written.
#[derive(Debug)]
struct PlannedImage {
    reference: ImageRef,
    /// Name inside the bundle; `None` when no usable name could be derived.
    name: Option<String>,
    size: Option<u64>,
}

#[derive(Debug)]
struct PlannedEntry {
    id: EntryId,
    images: Vec<PlannedImage>,
}

/// Writes the store out as a bundle.
pub struct ExportEngine {
    images: ImageService,
    storage: Arc<dyn ExternalStorage>,
    options: BackupOptions,
}

impl ExportEngine {
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

    /// Export every entry and its images into `target`.
    ///
    /// Emits `Started`, a `Progress` after every chunk, and `Finished`; on
    /// failure emits `Error` and returns the error.
    pub async fn export(
        &self,
        target: &DocumentHandle,
        progress: &dyn ProgressSink,
    ) -> Result<ExportSummary> {
        match self.run(target, progress).await {
            Ok(summary) => {
                tracing::info!(
                    entries = summary.entries,
                    images = summary.images_copied,
                    skipped = summary.images_skipped,
                    bytes = summary.bytes_written,
                    "Export finished"
                );
                progress.emit(ProgressEvent::Finished);
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Export to {} failed: {}", target, e);
                progress.emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        target: &DocumentHandle,
        progress: &dyn ProgressSink,
    ) -> Result<ExportSummary> {
        let root = self
            .storage
            .resolve_folder(target)
            .await
            .map_err(|e| Error::io(format!("Export folder unavailable: {}", e)))?;

        let entries = with_conn(self.images.pool(), entries::list_entries)?;
        tracing::debug!(count = entries.len(), "Loaded entries for export");

        let mut plan = Vec::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            let images = self.plan_images(&entry.images).await;

            let mut record = ExportRecord::from_entry(entry);
            record.images = images.iter().filter_map(|i| i.name.clone()).collect();
            records.push(record);

            plan.push(PlannedEntry {
                id: entry.id,
                images,
            });
        }

        let document = ExportDocument {
            format_version: FORMAT_VERSION,
            entries: records,
        };
        self.write_document(&root.handle, &document).await?;

        let images_folder = self
            .storage
            .create_folder(&root.handle, IMAGES_FOLDER)
            .await
            .map_err(|e| Error::io(format!("Cannot create images folder: {}", e)))?;

        let total_bytes: u64 = plan
            .iter()
            .flat_map(|entry| entry.images.iter())
            .map(|image| image.size.unwrap_or(0))
            .sum();
        progress.emit(ProgressEvent::Started { total_bytes });

        let mut summary = ExportSummary {
            entries: plan.len(),
            ..ExportSummary::default()
        };

        for entry in &plan {
            self.options.check_cancelled()?;

            let folder = match self
                .storage
                .create_folder(&images_folder, &entry.id.to_string())
                .await
            {
                Ok(folder) => folder,
                Err(e) => {
                    tracing::warn!(entry_id = %entry.id, "Skipping entry images: {}", e);
                    summary.entries_skipped += 1;
                    continue;
                }
            };

            for image in &entry.images {
                let copied = self
                    .copy_image(
                        &folder,
                        image,
                        &mut summary.bytes_written,
                        total_bytes,
                        progress,
                    )
                    .await?;
                if copied {
                    summary.images_copied += 1;
                } else {
                    summary.images_skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Derive bundle names and sizes for an entry's images.
    ///
    /// Content handles are named by what the provider reports, everything
    /// else by the base name of its path. Names are unique within the entry.
    async fn plan_images(&self, images: &[ImageRef]) -> Vec<PlannedImage> {
        let mut planned = Vec::with_capacity(images.len());
        let mut taken = HashSet::new();
        for reference in images {
            let name = match reference {
                ImageRef::ContentHandle(uri) => self
                    .storage
                    .metadata(&DocumentHandle::new(uri.as_str()))
                    .await
                    .ok()
                    .map(|meta| meta.name)
                    .or_else(|| reference.file_name()),
                _ => reference.file_name(),
            }
            .filter(|name| is_plain_file_name(name))
            .map(|name| unique_name(name, &mut taken));

            let size = self
                .images
                .storage()
                .source_size(self.storage.as_ref(), reference)
                .await;

            planned.push(PlannedImage {
                reference: reference.clone(),
                name,
                size,
            });
        }
        planned
    }

    async fn write_document(
        &self,
        root: &DocumentHandle,
        document: &ExportDocument,
    ) -> Result<()> {
        let bytes = document.to_vec()?;

        let file = self
            .storage
            .create_file(root, JSON_MIME_TYPE, EXPORT_FILE_NAME)
            .await
            .map_err(|e| Error::io(format!("Cannot create {}: {}", EXPORT_FILE_NAME, e)))?;
        let mut writer = self.storage.open_write(&file).await?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        writer.shutdown().await?;

        tracing::debug!(bytes = bytes.len(), "Wrote export document");
        Ok(())
    }

    /// Copy one image into its entry folder. Returns `false` when skipped.
    async fn copy_image(
        &self,
        folder: &DocumentHandle,
        image: &PlannedImage,
        written_bytes: &mut u64,
        total_bytes: u64,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        let Some(name) = image.name.as_deref() else {
            missing_source(
                self.options.on_missing_source,
                format!("no usable file name for {}", image.reference),
            )?;
            return Ok(false);
        };

        let mut source = match self
            .images
            .storage()
            .open_read(self.storage.as_ref(), &image.reference)
            .await
        {
            Ok(source) => source,
            Err(e) => {
                missing_source(
                    self.options.on_missing_source,
                    format!("{} ({})", image.reference, e),
                )?;
                return Ok(false);
            }
        };

        let file = self
            .storage
            .create_file(folder, mime_type_for(name), name)
            .await?;
        let mut writer = self.storage.open_write(&file).await?;

        copy_chunked(
            &mut source.reader,
            &mut writer,
            self.options.chunk_size,
            |n| {
                *written_bytes += n;
                progress.emit(ProgressEvent::Progress {
                    written_bytes: *written_bytes,
                    total_bytes,
                });
            },
        )
        .await?;

        Ok(true)
    }
}

/// Return `name`, or `stem (n).ext` when an earlier image already took it.
///
/// Names compare case-insensitively so the result also holds on
/// case-insensitive file systems.
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
