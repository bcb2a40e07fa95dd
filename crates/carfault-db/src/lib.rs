//! Carfault-DB: Database schema, migrations, and query operations
//!
//! This crate provides the record store and the reference store for carfault
//! using SQLite with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use carfault_db::pool::{init_pool, get_conn};
//! use carfault_db::queries::{dictionary, entries};
//! use carfault_db::models::NewFaultEntry;
//!
//! let pool = init_pool("/var/lib/carfault/carfault.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let brand_id = dictionary::ensure_brand(&conn, "Toyota").unwrap();
//! let new = NewFaultEntry {
//!     brand_id: Some(brand_id),
//!     title: "Coolant leak".to_string(),
//!     ..NewFaultEntry::now()
//! };
//! let id = entries::insert_entry(&conn, &new).unwrap();
//! println!("Created entry: {}", id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
