mod cli;

use carfault::{
    backup::{BackupOptions, ExportEngine, ImportEngine, MergeEngine, ProgressEvent},
    config::{self, Config},
    images::{ImageService, ImageStorage},
    storage::LocalDocumentTree,
};
use carfault_db::models::{validate_text, FaultEntry, NewFaultEntry};
use carfault_db::pool::init_pool;
use carfault_db::queries::{dictionary, entries};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, EntryCommand};
use std::path::Path;
use std::sync::Arc;

/// Open the store described by the config, creating its directories.
fn open_store(config: &Config) -> Result<ImageService> {
    let images_dir = config.storage.images_path();
    std::fs::create_dir_all(&images_dir)
        .with_context(|| format!("Failed to create image directory {:?}", images_dir))?;

    let db_path = config.storage.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    let db_path_str = db_path.to_string_lossy();
    tracing::debug!("Opening database at {}", db_path_str);
    let pool = init_pool(&db_path_str)?;

    Ok(ImageService::new(ImageStorage::new(images_dir), pool))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "carfault=trace,carfault_db=debug,carfault_common=debug".to_string()
        } else {
            "carfault=info,carfault_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Entry(command) => {
            let config = config::load_config_or_default(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_entry(command, &config))
        }
        Commands::Export { dir } => {
            let config = config::load_config_or_default(config_path)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(export(&dir, &config))
        }
        Commands::Import { json, images } => {
            let mut config = config::load_config_or_default(config_path)?;
            if images.is_some() {
                config.backup.import_images_dir = images;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(import(&json, &config))
        }
        Commands::Merge { dir, strategy } => {
            let mut config = config::load_config_or_default(config_path)?;
            if let Some(strategy) = strategy {
                config.backup.reconcile = strategy;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(merge(&dir, &config))
        }
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("carfault {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_entry(command: EntryCommand, config: &Config) -> Result<()> {
    let service = open_store(config)?;

    match command {
        EntryCommand::Add {
            title,
            description,
            year,
            brand,
            model,
            location,
            images,
        } => {
            if model.is_some() && (brand.is_none() || year.is_none()) {
                anyhow::bail!("--model needs --brand and --year");
            }
            validate_text(&title, &description)?;

            let id = {
                let conn = service.pool().get()?;
                let mut new = NewFaultEntry::now();
                new.title = title;
                new.description = description;
                new.year_id = year.map(|y| dictionary::ensure_year(&conn, y)).transpose()?;
                new.brand_id = brand
                    .as_deref()
                    .map(|b| dictionary::ensure_brand(&conn, b))
                    .transpose()?;
                new.location_id = location
                    .as_deref()
                    .map(|l| dictionary::ensure_location(&conn, l))
                    .transpose()?;
                new.model_id = match (model.as_deref(), new.brand_id, new.year_id) {
                    (Some(name), Some(brand_id), Some(year_id)) => {
                        Some(dictionary::ensure_model(&conn, name, brand_id, year_id)?)
                    }
                    _ => None,
                };
                entries::insert_entry(&conn, &new)?
            };

            for path in &images {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .with_context(|| format!("Image path has no file name: {:?}", path))?;
                let mut file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open image {:?}", path))?;
                service.store_and_attach(id, &name, &mut file).await?;
            }

            println!("{}", id);
        }
        EntryCommand::List { json } => {
            let list = {
                let conn = service.pool().get()?;
                entries::list_entries(&conn)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for entry in &list {
                    print_summary(entry);
                }
            }
        }
        EntryCommand::Show { id, json } => {
            let entry = {
                let conn = service.pool().get()?;
                entries::get_entry(&conn, id)?
            };
            let Some(entry) = entry else {
                anyhow::bail!("Entry {} not found", id);
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_details(&entry);
            }
        }
        EntryCommand::Search { query, limit } => {
            let found = {
                let conn = service.pool().get()?;
                entries::search_entries(&conn, &query, limit)?
            };
            for entry in &found {
                print_summary(entry);
            }
        }
        EntryCommand::Delete { id } => {
            if !service.remove_entry(id).await? {
                anyhow::bail!("Entry {} not found", id);
            }
            println!("Deleted entry {}", id);
        }
    }

    Ok(())
}

fn print_summary(entry: &FaultEntry) {
    let car = [
        entry.brand.as_ref().map(|b| b.name.clone()),
        entry.model.as_ref().map(|m| m.name.clone()),
        entry.year.map(|y| y.value.to_string()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    println!("{}  {}  [{}]", entry.id, entry.title, car);
}

fn print_details(entry: &FaultEntry) {
    println!("Id: {}", entry.id);
    println!("Title: {}", entry.title);
    if let Some(year) = entry.year {
        println!("Year: {}", year.value);
    }
    if let Some(ref brand) = entry.brand {
        println!("Brand: {}", brand.name);
    }
    if let Some(ref model) = entry.model {
        println!("Model: {}", model.name);
    }
    if let Some(ref location) = entry.location {
        println!("Location: {}", location.name);
    }
    if let Some(created) = chrono::DateTime::from_timestamp(entry.timestamp, 0) {
        println!("Created: {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !entry.description.is_empty() {
        println!("\n{}", entry.description);
    }
    if !entry.images.is_empty() {
        println!("\nImages: {}", entry.images.len());
        for image in &entry.images {
            println!("  {}", image);
        }
    }
}

fn log_progress(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { total_bytes } => {
            tracing::info!(total_bytes, "Copying images");
        }
        ProgressEvent::Progress {
            written_bytes,
            total_bytes,
        } => {
            tracing::debug!(written_bytes, total_bytes, "Progress");
        }
        ProgressEvent::Merging { current, total } => {
            tracing::debug!(current, total, "Merging");
        }
        ProgressEvent::Finished | ProgressEvent::Error { .. } => {}
    }
}

async fn export(dir: &Path, config: &Config) -> Result<()> {
    let service = open_store(config)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export folder {:?}", dir))?;

    let tree = LocalDocumentTree::new(dir);
    let root = tree.root_handle();
    let engine = ExportEngine::new(service, Arc::new(tree), BackupOptions::from(&config.backup));

    let summary = engine.export(&root, &log_progress).await?;
    println!(
        "Exported {} entries and {} images ({} bytes) to {}",
        summary.entries,
        summary.images_copied,
        summary.bytes_written,
        dir.display()
    );
    if summary.images_skipped > 0 {
        println!("Skipped {} unreadable images", summary.images_skipped);
    }

    Ok(())
}

async fn import(json: &Path, config: &Config) -> Result<()> {
    let service = open_store(config)?;
    let engine = ImportEngine::new(service, BackupOptions::from(&config.backup));

    let report = engine.import_file(json).await?;
    println!(
        "Imported {} entries with {} images ({} failed)",
        report.imported, report.images_copied, report.failed
    );
    for warning in &report.warnings {
        println!("  {}", warning);
    }

    Ok(())
}

async fn merge(dir: &Path, config: &Config) -> Result<()> {
    let service = open_store(config)?;
    let tree = LocalDocumentTree::new(dir);
    let root = tree.root_handle();
    let engine = MergeEngine::new(service, Arc::new(tree), BackupOptions::from(&config.backup));

    let merged = engine.merge(&root, &log_progress).await?;
    println!("Merged {} entries from {}", merged, dir.display());

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Database: {}", config.storage.database_path().display());
    println!("  Images: {}", config.storage.images_path().display());
    println!("  Chunk size: {} bytes", config.backup.chunk_size);
    println!("  Missing sources: {}", config.backup.on_missing_source);
    println!("  Reconcile: {}", config.backup.reconcile);
    println!(
        "  Import images: {}",
        config
            .backup
            .import_images_dir
            .as_deref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "<document>/images".to_string())
    );

    Ok(())
}
