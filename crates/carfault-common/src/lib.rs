//! Carfault-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across carfault:
//!
//! - **Typed IDs**: Store-assigned entry identifiers
//! - **Core Types**: Image references and backup policy enums
//! - **Path Utilities**: File name checks and MIME type detection
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use carfault_common::{EntryId, Error, ImageRef, Result};
//! use carfault_common::paths::is_image_file;
//! use std::path::Path;
//!
//! let id = EntryId::generate();
//! assert!(!id.is_new());
//!
//! let image: ImageRef = "42/a.jpg".parse().unwrap();
//! assert_eq!(image.file_name(), Some("a.jpg".to_string()));
//!
//! assert!(is_image_file(Path::new("photo.jpg")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("entry"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
