//! Carfault - car fault records with folder backups
//!
//! This library crate exposes the backup engines, managed image storage and
//! the external storage facade for the CLI and integration tests.

pub mod backup;
pub mod config;
pub mod images;
pub mod storage;
