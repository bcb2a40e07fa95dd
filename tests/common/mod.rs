//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary data directory with a
//! file-backed database and managed image storage, plus helpers for
//! populating entries and exporting bundles.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use carfault::backup::{BackupOptions, ExportEngine, MergeEngine, ProgressEvent};
use carfault::images::{ImageService, ImageStorage};
use carfault::storage::{DocumentHandle, LocalDocumentTree};
use carfault_common::EntryId;
use carfault_db::models::NewFaultEntry;
use carfault_db::pool::{get_conn, init_pool, DbPool, PooledConnection};
use carfault_db::queries::{dictionary, entries};

/// A store living in its own temporary directory.
pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub db: DbPool,
    pub images: ImageService,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("carfault.db");
        let db = init_pool(db_path.to_str().unwrap()).expect("failed to create pool");
        let images = ImageService::new(ImageStorage::new(dir.path().join("images")), db.clone());

        Self { dir, db, images }
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    /// A scratch directory inside the harness directory.
    pub fn path(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Insert a fully described entry and copy the given images into it.
    pub async fn add_entry(&self, title: &str, images: &[(&str, &str)]) -> EntryId {
        self.add_entry_with_id(EntryId::generate(), title, images)
            .await
    }

    pub async fn add_entry_with_id(
        &self,
        id: EntryId,
        title: &str,
        images: &[(&str, &str)],
    ) -> EntryId {
        {
            let conn = self.conn();
            let year_id = dictionary::ensure_year(&conn, 2018).unwrap();
            let brand_id = dictionary::ensure_brand(&conn, "Toyota").unwrap();
            let model_id = dictionary::ensure_model(&conn, "Camry", brand_id, year_id).unwrap();
            let location_id = dictionary::ensure_location(&conn, "Engine").unwrap();

            let new = NewFaultEntry {
                timestamp: 1_700_000_000,
                year_id: Some(year_id),
                brand_id: Some(brand_id),
                model_id: Some(model_id),
                location_id: Some(location_id),
                title: title.to_string(),
                description: format!("{} description", title),
                images: Vec::new(),
            };
            entries::insert_entry_with_id(&conn, id, &new).unwrap();
        }

        for (name, bytes) in images {
            let mut reader = bytes.as_bytes();
            self.images
                .store_and_attach(id, name, &mut reader)
                .await
                .unwrap();
        }

        id
    }

    /// Insert an entry with the given id and no dictionary references.
    pub fn add_bare_entry(&self, id: i64, title: &str) -> EntryId {
        let id = EntryId::from(id);
        let new = NewFaultEntry {
            timestamp: 1_700_000_000,
            title: title.to_string(),
            ..NewFaultEntry::default()
        };
        entries::insert_entry_with_id(&self.conn(), id, &new).unwrap();
        id
    }

    pub fn count(&self) -> u64 {
        entries::count_entries(&self.conn()).unwrap()
    }

    pub fn export_engine(
        &self,
        bundle: &Path,
        options: BackupOptions,
    ) -> (ExportEngine, DocumentHandle) {
        let tree = LocalDocumentTree::new(bundle);
        let root = tree.root_handle();
        (ExportEngine::new(self.images.clone(), Arc::new(tree), options), root)
    }

    pub fn merge_engine(
        &self,
        bundle: &Path,
        options: BackupOptions,
    ) -> (MergeEngine, DocumentHandle) {
        let tree = LocalDocumentTree::new(bundle);
        let root = tree.root_handle();
        (MergeEngine::new(self.images.clone(), Arc::new(tree), options), root)
    }
}

/// Progress sink that records every event.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    pub fn sink(&self) -> impl Fn(ProgressEvent) + Send + Sync + '_ {
        move |event| self.events.lock().unwrap().push(event)
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}
