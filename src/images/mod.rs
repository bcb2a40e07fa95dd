//! Image storage and management module.
//!
//! This module provides the managed image directory, the single dispatch
//! that opens any image reference for reading, and a service that keeps
//! stored files and entry records in step.

mod service;
mod storage;

pub use service::ImageService;
pub use storage::{ImageSource, ImageStorage, StoredImage};
