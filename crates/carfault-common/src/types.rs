//! Core type definitions shared by the store and the backup engines.
//!
//! [`ImageRef`] replaces string-prefix sniffing of stored image references
//! with a tagged variant that is parsed once when a row is read. The policy
//! enums are serialized in snake_case so they can be written in config files
//! and passed on the command line.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::paths::base_name;

/// URI scheme prefix of external content handles.
pub const CONTENT_SCHEME: &str = "content://";

/// Reference to the bytes of an image attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageRef {
    /// Absolute filesystem path outside the managed image directory.
    AbsolutePath(PathBuf),
    /// Path relative to the managed image directory (e.g. `"42/a.jpg"`).
    RelativePath(String),
    /// Opaque handle resolved through the external storage facade.
    ContentHandle(String),
}

impl ImageRef {
    /// File name the image is exported under.
    ///
    /// Content handles are opaque, so their name is only a best guess from
    /// the last URI segment; callers that can ask the facade should prefer
    /// the display name it reports.
    pub fn file_name(&self) -> Option<String> {
        let name = match self {
            Self::AbsolutePath(path) => path.file_name()?.to_str()?,
            Self::RelativePath(path) => base_name(path),
            Self::ContentHandle(uri) => base_name(uri.trim_end_matches('/')),
        };

        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Whether the reference points into the managed image directory.
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::RelativePath(_))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsolutePath(path) => write!(f, "{}", path.display()),
            Self::RelativePath(path) => write!(f, "{}", path),
            Self::ContentHandle(uri) => write!(f, "{}", uri),
        }
    }
}

impl std::str::FromStr for ImageRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty image reference".to_string());
        }

        if s.starts_with(CONTENT_SCHEME) {
            Ok(Self::ContentHandle(s.to_string()))
        } else if s.starts_with('/') || Path::new(s).is_absolute() {
            Ok(Self::AbsolutePath(PathBuf::from(s)))
        } else {
            Ok(Self::RelativePath(s.to_string()))
        }
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What to do when an image source cannot be resolved during a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// Log the image and continue with the next one.
    #[default]
    Skip,
    /// Abort the whole operation.
    Fail,
}

impl fmt::Display for MissingSourcePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for MissingSourcePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            _ => Err(format!("Invalid missing source policy: {}", s)),
        }
    }
}

/// How a merge treats incoming records that may already exist locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// Insert every record as a new entry. Merging twice duplicates.
    #[default]
    AppendAlways,
    /// Skip records whose source id already exists in the store.
    ById,
    /// Skip records whose content hash matches an existing entry.
    ByContentHash,
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppendAlways => write!(f, "append_always"),
            Self::ById => write!(f, "by_id"),
            Self::ByContentHash => write!(f, "by_content_hash"),
        }
    }
}

impl std::str::FromStr for ReconcileStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "append_always" => Ok(Self::AppendAlways),
            "by_id" => Ok(Self::ById),
            "by_content_hash" => Ok(Self::ByContentHash),
            _ => Err(format!("Invalid reconcile strategy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ref_classification() {
        let r: ImageRef = "content://tree/DCIM/a.jpg".parse().unwrap();
        assert_eq!(r, ImageRef::ContentHandle("content://tree/DCIM/a.jpg".to_string()));

        let r: ImageRef = "/storage/emulated/0/a.jpg".parse().unwrap();
        assert_eq!(r, ImageRef::AbsolutePath(PathBuf::from("/storage/emulated/0/a.jpg")));

        let r: ImageRef = "42/a.jpg".parse().unwrap();
        assert_eq!(r, ImageRef::RelativePath("42/a.jpg".to_string()));
        assert!(r.is_managed());

        assert!("".parse::<ImageRef>().is_err());
        assert!("   ".parse::<ImageRef>().is_err());
    }

    #[test]
    fn test_image_ref_display_round_trips() {
        for s in ["content://tree/x/b.png", "/abs/c.jpg", "9/d.jpg"] {
            let r: ImageRef = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
        }
    }

    #[test]
    fn test_image_ref_file_name() {
        let r: ImageRef = "/abs/dir/c.jpg".parse().unwrap();
        assert_eq!(r.file_name(), Some("c.jpg".to_string()));

        let r: ImageRef = "9/d.jpg".parse().unwrap();
        assert_eq!(r.file_name(), Some("d.jpg".to_string()));

        let r: ImageRef = "content://tree/photos/e.jpg".parse().unwrap();
        assert_eq!(r.file_name(), Some("e.jpg".to_string()));
    }

    #[test]
    fn test_image_ref_serde_as_string() {
        let r = ImageRef::RelativePath("1/a.jpg".to_string());
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#""1/a.jpg""#);

        let back: ImageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_missing_source_policy() {
        assert_eq!(MissingSourcePolicy::default(), MissingSourcePolicy::Skip);
        assert_eq!("fail".parse::<MissingSourcePolicy>().unwrap(), MissingSourcePolicy::Fail);
        assert_eq!(MissingSourcePolicy::Skip.to_string(), "skip");
        assert!("maybe".parse::<MissingSourcePolicy>().is_err());

        let json = serde_json::to_string(&MissingSourcePolicy::Fail).unwrap();
        assert_eq!(json, r#""fail""#);
    }

    #[test]
    fn test_reconcile_strategy() {
        assert_eq!(ReconcileStrategy::default(), ReconcileStrategy::AppendAlways);
        assert_eq!("by-id".parse::<ReconcileStrategy>().unwrap(), ReconcileStrategy::ById);
        assert_eq!(
            "by_content_hash".parse::<ReconcileStrategy>().unwrap(),
            ReconcileStrategy::ByContentHash
        );
        assert_eq!(ReconcileStrategy::AppendAlways.to_string(), "append_always");

        let parsed: ReconcileStrategy = serde_json::from_str(r#""by_id""#).unwrap();
        assert_eq!(parsed, ReconcileStrategy::ById);
    }
}
