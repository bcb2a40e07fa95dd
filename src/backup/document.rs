//! The JSON document at the root of a backup bundle.
//!
//! ```json
//! {
//!   "formatVersion": 1,
//!   "entries": [
//!     {
//!       "id": 123,
//!       "timestamp": 1700000000,
//!       "year": 2018,
//!       "brand": "Toyota",
//!       "modelName": "Camry",
//!       "location": "Engine",
//!       "title": "Coolant leak",
//!       "description": "Visible leak near...",
//!       "images": ["img_1700000000.jpg"]
//!     }
//!   ]
//! }
//! ```
//!
//! Bundles written before versioning have no `formatVersion` and read as
//! version 0. Unknown fields are ignored.

use carfault_common::{Error, Result};
use carfault_db::models::FaultEntry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version written by this build.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default)]
    pub format_version: u32,
    #[serde(default)]
    pub entries: Vec<ExportRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Base file names inside `images/<id>/`.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ExportDocument {
    /// Render stored entries at the current format version.
    pub fn from_entries(entries: &[FaultEntry]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            entries: entries.iter().map(ExportRecord::from_entry).collect(),
        }
    }

    /// Parse a document, rejecting versions newer than this build understands.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: Self = serde_json::from_slice(bytes)?;
        if document.format_version > FORMAT_VERSION {
            return Err(Error::parse(format!(
                "Unsupported export format version {} (newest supported is {})",
                document.format_version, FORMAT_VERSION
            )));
        }
        Ok(document)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::internal(e.to_string()))
    }
}

impl ExportRecord {
    pub fn from_entry(entry: &FaultEntry) -> Self {
        Self {
            id: entry.id.get(),
            timestamp: entry.timestamp,
            year: entry.year.map(|y| y.value),
            brand: entry.brand.as_ref().map(|b| b.name.clone()),
            model_name: entry.model.as_ref().map(|m| m.name.clone()),
            location: entry.location.as_ref().map(|l| l.name.clone()),
            title: entry.title.clone(),
            description: entry.description.clone(),
            images: entry
                .images
                .iter()
                .filter_map(|image| image.file_name())
                .collect(),
        }
    }

    /// SHA-256 over the record's content fields, ignoring id and images.
    ///
    /// Dictionary names are compared case-insensitively, the way the
    /// reference store treats them.
    pub fn content_hash(&self) -> String {
        content_hash(
            self.timestamp,
            self.year,
            self.brand.as_deref(),
            self.model_name.as_deref(),
            self.location.as_deref(),
            &self.title,
            &self.description,
        )
    }
}

/// Content hash of a stored entry, comparable with [`ExportRecord::content_hash`].
pub fn entry_content_hash(entry: &FaultEntry) -> String {
    content_hash(
        entry.timestamp,
        entry.year.map(|y| y.value),
        entry.brand.as_ref().map(|b| b.name.as_str()),
        entry.model.as_ref().map(|m| m.name.as_str()),
        entry.location.as_ref().map(|l| l.name.as_str()),
        &entry.title,
        &entry.description,
    )
}

fn content_hash(
    timestamp: i64,
    year: Option<i32>,
    brand: Option<&str>,
    model: Option<&str>,
    location: Option<&str>,
    title: &str,
    description: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_le_bytes());
    match year {
        Some(year) => {
            hasher.update([1u8]);
            hasher.update(year.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
    for name in [brand, model, location] {
        match name {
            Some(name) => {
                let name = name.trim().to_lowercase();
                hasher.update([1u8]);
                hasher.update((name.len() as u64).to_le_bytes());
                hasher.update(name.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    for text in [title, description] {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hex::encode(hasher.finalize())
}
