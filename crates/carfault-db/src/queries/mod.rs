//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - entries: Fault entry CRUD and search (the record store)
//! - images: Ordered image references attached to entries
//! - dictionary: Years, brands, models, and locations (the reference store)

pub mod dictionary;
pub mod entries;
pub mod images;
