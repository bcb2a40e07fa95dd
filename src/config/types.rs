use carfault_common::{MissingSourcePolicy, ReconcileStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory for the database and managed images (`~` is expanded)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Managed image directory (default: `<data_dir>/images`)
    #[serde(default)]
    pub images_dir: Option<PathBuf>,

    /// SQLite database file (default: `<data_dir>/carfault.db`)
    #[serde(default)]
    pub database: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/carfault")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            images_dir: None,
            database: None,
        }
    }
}

impl StorageConfig {
    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand(&self.data_dir)
    }

    /// Resolved managed image directory.
    pub fn images_path(&self) -> PathBuf {
        match &self.images_dir {
            Some(dir) => expand(dir),
            None => self.data_path().join("images"),
        }
    }

    /// Resolved database file.
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => expand(path),
            None => self.data_path().join("carfault.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    /// Bytes copied per chunk; one progress event is emitted per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// What to do with an image whose source cannot be found
    #[serde(default)]
    pub on_missing_source: MissingSourcePolicy,

    /// How merge treats records that may already exist
    #[serde(default)]
    pub reconcile: ReconcileStrategy,

    /// Keep a record's original id on import when it is free
    #[serde(default = "default_true")]
    pub preserve_ids_on_import: bool,

    /// Image directory used by import (default: `images/` next to the JSON file)
    #[serde(default)]
    pub import_images_dir: Option<PathBuf>,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            on_missing_source: MissingSourcePolicy::default(),
            reconcile: ReconcileStrategy::default(),
            preserve_ids_on_import: default_true(),
            import_images_dir: None,
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}
