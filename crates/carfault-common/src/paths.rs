//! Path utilities for image files and bundle entries.
//!
//! Bundles address files purely by name inside a folder, so the helpers here
//! check that a name is a single path component and derive MIME types from
//! extensions the way a document provider would report them.

use std::path::Path;

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "heic"];

/// MIME type reported for JSON documents.
pub const JSON_MIME_TYPE: &str = "application/json";

/// MIME type reported for folders.
pub const FOLDER_MIME_TYPE: &str = "inode/directory";

/// Fallback MIME type for unknown files.
pub const OCTET_STREAM_MIME_TYPE: &str = "application/octet-stream";

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use carfault_common::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("leak.jpg")));
/// assert!(is_image_file(Path::new("/sdcard/DCIM/brakes.PNG")));
/// assert!(!is_image_file(Path::new("notes.txt")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Guess the MIME type for a file name from its extension.
///
/// # Examples
///
/// ```
/// use carfault_common::paths::mime_type_for;
///
/// assert_eq!(mime_type_for("carfault_export.json"), "application/json");
/// assert_eq!(mime_type_for("a.JPG"), "image/jpeg");
/// assert_eq!(mime_type_for("blob"), "application/octet-stream");
/// ```
pub fn mime_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match ext.as_deref() {
        Some("json") => JSON_MIME_TYPE,
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        _ => OCTET_STREAM_MIME_TYPE,
    }
}

/// Check that a name is a single, non-special path component.
///
/// Names coming out of an export document are used to create files inside a
/// bundle folder, so separators and `.`/`..` are rejected.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Return the last component of a slash or backslash separated path.
///
/// # Examples
///
/// ```
/// use carfault_common::paths::base_name;
///
/// assert_eq!(base_name("/data/images/7/a.jpg"), "a.jpg");
/// assert_eq!(base_name("a.jpg"), "a.jpg");
/// ```
pub fn base_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path)
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.jpeg")));
        assert!(is_image_file(Path::new("a.png")));
        assert!(is_image_file(Path::new("a.heic")));

        // Case insensitive
        assert!(is_image_file(Path::new("a.JPG")));

        assert!(!is_image_file(Path::new("a.json")));
        assert!(!is_image_file(Path::new("no_extension")));
        assert!(!is_image_file(Path::new("")));
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("doc.json"), JSON_MIME_TYPE);
        assert_eq!(mime_type_for("doc.JSON"), JSON_MIME_TYPE);
        assert_eq!(mime_type_for("img_1700000000.jpg"), "image/jpeg");
        assert_eq!(mime_type_for("x.png"), "image/png");
        assert_eq!(mime_type_for("x.tar.gz"), OCTET_STREAM_MIME_TYPE);
    }

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("a.jpg"));
        assert!(is_plain_file_name(".hidden.jpg"));
        assert!(is_plain_file_name("img 1.jpg"));

        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../a.jpg"));
        assert!(!is_plain_file_name("dir/a.jpg"));
        assert!(!is_plain_file_name("dir\\a.jpg"));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/abs/path/a.jpg"), "a.jpg");
        assert_eq!(base_name("12/b.png"), "b.png");
        assert_eq!(base_name("C:\\photos\\c.jpg"), "c.jpg");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn test_image_extensions() {
        let exts = image_extensions();
        assert!(exts.contains(&"jpg"));
        assert!(exts.contains(&"png"));
    }
}
