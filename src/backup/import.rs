//! Import a bundle document into the store.
//!
//! Records are imported one at a time and independently: a record that
//! fails is removed again (entry row and copied files) and reported, and the
//! import moves on. Only a document that cannot be read or parsed stops the
//! import before anything is written.

use std::path::{Path, PathBuf};

use carfault_common::paths::is_plain_file_name;
use carfault_common::{EntryId, Error, Result};
use carfault_db::queries::entries;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::document::{ExportDocument, ExportRecord};
use super::{ensure_record_references, missing_source, with_conn, BackupOptions, IMAGES_FOLDER};
use crate::images::ImageService;

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub images_copied: usize,
    /// Ids of the imported entries, in document order.
    pub entry_ids: Vec<EntryId>,
    /// One message per failed record.
    pub warnings: Vec<String>,
}

/// Reads a bundle document and its images into the store.
pub struct ImportEngine {
    images: ImageService,
    options: BackupOptions,
}

impl ImportEngine {
    pub fn new(images: ImageService, options: BackupOptions) -> Self {
        Self { images, options }
    }

    /// Import a bundle document from disk.
    ///
    /// Images are read from `backup.import_images_dir` when configured,
    /// otherwise from the `images/` folder next to the document.
    pub async fn import_file(&self, document_path: &Path) -> Result<ImportReport> {
        let images_dir = self.options.import_images_dir.clone().unwrap_or_else(|| {
            document_path
                .parent()
                .map(|dir| dir.join(IMAGES_FOLDER))
                .unwrap_or_else(|| PathBuf::from(IMAGES_FOLDER))
        });

        let file = tokio::fs::File::open(document_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(format!("Export document not found: {:?}", document_path))
            } else {
                Error::Io(e)
            }
        })?;

        self.import(file, &images_dir).await
    }

    /// Import a document read from `source`, taking images from
    /// `<images_dir>/<original id>/<name>`.
    pub async fn import<R>(&self, mut source: R, images_dir: &Path) -> Result<ImportReport>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).await?;
        let document = ExportDocument::from_slice(&bytes)?;

        tracing::info!(
            records = document.entries.len(),
            version = document.format_version,
            "Importing export document"
        );

        let mut report = ImportReport::default();
        for (index, record) in document.entries.iter().enumerate() {
            self.options.check_cancelled()?;

            match self.import_record(record, images_dir).await {
                Ok((id, copied)) => {
                    report.imported += 1;
                    report.images_copied += copied;
                    report.entry_ids.push(id);
                }
                Err(e) => {
                    tracing::warn!(index, record_id = record.id, "Record not imported: {}", e);
                    report.failed += 1;
                    report
                        .warnings
                        .push(format!("record {} (id {}): {}", index, record.id, e));
                }
            }
        }

        tracing::info!(
            imported = report.imported,
            failed = report.failed,
            images = report.images_copied,
            "Import finished"
        );
        Ok(report)
    }

    async fn import_record(
        &self,
        record: &ExportRecord,
        images_dir: &Path,
    ) -> Result<(EntryId, usize)> {
        let preserve = self.options.preserve_ids_on_import;
        let id = with_conn(self.images.pool(), |conn| {
            let new = ensure_record_references(conn, record)?;

            let source_id = EntryId::from(record.id);
            let reusable = preserve
                && !source_id.is_new()
                && source_id.get() <= EntryId::MAX
                && !entries::entry_exists(conn, source_id)?;

            if reusable {
                entries::insert_entry_with_id(conn, source_id, &new)?;
                Ok(source_id)
            } else {
                entries::insert_entry(conn, &new)
            }
        })?;

        match self.copy_images(id, record, images_dir).await {
            Ok(copied) => Ok((id, copied)),
            Err(e) => {
                if let Err(cleanup) = self.images.remove_entry(id).await {
                    tracing::error!(entry_id = %id, "Failed to roll back record: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn copy_images(
        &self,
        id: EntryId,
        record: &ExportRecord,
        images_dir: &Path,
    ) -> Result<usize> {
        let record_dir = images_dir.join(record.id.to_string());
        if !record.images.is_empty() && !record_dir.is_dir() {
            missing_source(
                self.options.on_missing_source,
                format!("no image folder {:?} for record {}", record_dir, record.id),
            )?;
            return Ok(0);
        }

        let mut copied = 0;
        for name in &record.images {
            if !is_plain_file_name(name) {
                tracing::warn!(record_id = record.id, "Ignoring image name {:?}", name);
                continue;
            }

            let path = record_dir.join(name);
            let mut file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    missing_source(
                        self.options.on_missing_source,
                        format!("{:?} ({})", path, e),
                    )?;
                    continue;
                }
            };

            self.images.store_and_attach(id, name, &mut file).await?;
            copied += 1;
        }

        Ok(copied)
    }
}
