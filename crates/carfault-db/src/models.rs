//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed Rust structures that map to database tables.
//! All models use types from carfault-common where appropriate.

use carfault_common::{EntryId, Error, ImageRef, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum length of an entry title, in characters.
pub const TITLE_MAX_CHARS: usize = 50;

/// Maximum length of an entry description, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// A named dictionary value (brand, model, or location).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictionaryValue {
    pub id: i64,
    pub name: String,
}

/// A model year dictionary value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearValue {
    pub id: i64,
    pub value: i32,
}

/// A car model, unique per brand and year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelValue {
    pub id: i64,
    pub name: String,
    pub brand_id: i64,
    pub year_id: i64,
}

/// A stored fault entry with its dictionary references resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultEntry {
    pub id: EntryId,
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: i64,
    pub year: Option<YearValue>,
    pub brand: Option<DictionaryValue>,
    pub model: Option<DictionaryValue>,
    pub location: Option<DictionaryValue>,
    pub title: String,
    pub description: String,
    /// Image references in display order.
    pub images: Vec<ImageRef>,
}

/// Field values for creating or fully replacing an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewFaultEntry {
    pub timestamp: i64,
    pub year_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub location_id: Option<i64>,
    pub title: String,
    pub description: String,
    /// Image references in display order.
    pub images: Vec<ImageRef>,
}

impl NewFaultEntry {
    /// Empty entry stamped with the current time.
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            ..Self::default()
        }
    }

    /// Check the text length limits.
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.title, &self.description)
    }
}

/// Check title and description against their length limits.
pub fn validate_text(title: &str, description: &str) -> Result<()> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(Error::validation(format!(
            "title exceeds {} characters",
            TITLE_MAX_CHARS
        )));
    }
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(Error::validation(format!(
            "description exceeds {} characters",
            DESCRIPTION_MAX_CHARS
        )));
    }
    Ok(())
}
