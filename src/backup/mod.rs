//! Backup bundles: export to a folder, import from a JSON stream, and merge
//! a bundle into a populated store.
//!
//! A bundle is a folder holding `carfault_export.json` and an `images/`
//! folder with one subfolder per original entry id:
//!
//! ```text
//! <root>/
//!   carfault_export.json
//!   images/
//!     <entry-id>/
//!       <file name>
//! ```
//!
//! All three engines run one entry at a time and never hold a database
//! connection across an await point.

pub mod document;
pub mod export;
pub mod import;
pub mod merge;
pub mod progress;

pub use document::{ExportDocument, ExportRecord, FORMAT_VERSION};
pub use export::ExportEngine;
pub use import::{ImportEngine, ImportReport};
pub use merge::MergeEngine;
pub use progress::{ProgressEvent, ProgressSink};

use std::path::PathBuf;

use carfault_common::{Error, MissingSourcePolicy, ReconcileStrategy, Result};
use carfault_db::models::{validate_text, NewFaultEntry};
use carfault_db::pool::{get_conn, DbPool};
use carfault_db::queries::dictionary;
use rusqlite::Connection;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::BackupConfig;

/// Name of the JSON document at the bundle root.
pub const EXPORT_FILE_NAME: &str = "carfault_export.json";

/// Name of the image folder at the bundle root.
pub const IMAGES_FOLDER: &str = "images";

/// Knobs shared by the backup engines.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub chunk_size: usize,
    pub on_missing_source: MissingSourcePolicy,
    pub reconcile: ReconcileStrategy,
    pub preserve_ids_on_import: bool,
    pub import_images_dir: Option<PathBuf>,
    /// Checked between entries; a cancelled token stops the operation.
    pub cancel: Option<CancellationToken>,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self::from(&BackupConfig::default())
    }
}

impl From<&BackupConfig> for BackupOptions {
    fn from(config: &BackupConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            on_missing_source: config.on_missing_source,
            reconcile: config.reconcile,
            preserve_ids_on_import: config.preserve_ids_on_import,
            import_images_dir: config.import_images_dir.clone(),
            cancel: None,
        }
    }
}

impl BackupOptions {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Run a short synchronous database step on a pooled connection.
pub(crate) fn with_conn<T>(
    pool: &DbPool,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let conn = get_conn(pool)?;
    f(&conn)
}

/// Apply the missing-source policy to an image that could not be opened.
pub(crate) fn missing_source(policy: MissingSourcePolicy, message: String) -> Result<()> {
    match policy {
        MissingSourcePolicy::Skip => {
            tracing::warn!("Skipping image: {}", message);
            Ok(())
        }
        MissingSourcePolicy::Fail => Err(Error::not_found(message)),
    }
}

/// Non-blank, trimmed dictionary name.
pub(crate) fn present(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|name| !name.is_empty())
}

/// Create the dictionary values a record refers to and build the entry to insert.
///
/// A model needs both a brand and a year; without them the model name is
/// dropped. The returned entry has no images.
pub(crate) fn ensure_record_references(
    conn: &Connection,
    record: &ExportRecord,
) -> Result<NewFaultEntry> {
    validate_text(&record.title, &record.description)?;

    let year_id = record
        .year
        .map(|year| dictionary::ensure_year(conn, year))
        .transpose()?;
    let brand_id = present(&record.brand)
        .map(|brand| dictionary::ensure_brand(conn, brand))
        .transpose()?;
    let location_id = present(&record.location)
        .map(|location| dictionary::ensure_location(conn, location))
        .transpose()?;

    let model_id = match (present(&record.model_name), brand_id, year_id) {
        (Some(model), Some(brand_id), Some(year_id)) => {
            Some(dictionary::ensure_model(conn, model, brand_id, year_id)?)
        }
        (Some(model), _, _) => {
            tracing::debug!(
                record_id = record.id,
                model,
                "Model without brand and year dropped"
            );
            None
        }
        _ => None,
    };

    Ok(NewFaultEntry {
        timestamp: record.timestamp,
        year_id,
        brand_id,
        model_id,
        location_id,
        title: record.title.clone(),
        description: record.description.clone(),
        images: Vec::new(),
    })
}

/// Copy `reader` into `writer` in chunks of at most `chunk_size` bytes,
/// calling `on_chunk` with the size of every chunk written.
pub(crate) async fn copy_chunked<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    mut on_chunk: impl FnMut(u64),
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
        on_chunk(n as u64);
    }

    writer.flush().await?;
    writer.shutdown().await?;
    Ok(total)
}
