//! Entry image reference queries.
//!
//! Image references are kept in display order per entry. A reference can be
//! attached to an entry only once; attaching it again is a no-op.

use carfault_common::{EntryId, Error, ImageRef, Result};
use rusqlite::Connection;

/// Append an image reference to an entry.
///
/// # Returns
///
/// * `Ok(true)` - If the reference was attached
/// * `Ok(false)` - If the entry already had this reference
/// * `Err(Error)` - If a database error occurs (including an unknown entry)
pub fn add_image_reference(conn: &Connection, entry_id: EntryId, image: &ImageRef) -> Result<bool> {
    let rows = conn
        .execute(
            "INSERT OR IGNORE INTO entry_images (entry_id, reference, position)
             VALUES (
                :entry_id,
                :reference,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM entry_images WHERE entry_id = :entry_id)
             )",
            rusqlite::named_params! {
                ":entry_id": entry_id.get(),
                ":reference": image.to_string(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Get the image references of an entry in display order.
///
/// Rows holding an unparseable reference are skipped with a warning.
pub fn get_image_references(conn: &Connection, entry_id: EntryId) -> Result<Vec<ImageRef>> {
    let mut stmt = conn
        .prepare(
            "SELECT reference FROM entry_images
             WHERE entry_id = :entry_id
             ORDER BY position ASC, id ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let raw = stmt
        .query_map(
            rusqlite::named_params! { ":entry_id": entry_id.get() },
            |row| row.get::<_, String>(0),
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    let images = raw
        .into_iter()
        .filter_map(|reference| match reference.parse::<ImageRef>() {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(entry_id = %entry_id, reference = %reference, "Ignoring image reference: {}", e);
                None
            }
        })
        .collect();

    Ok(images)
}

/// Detach an image reference from an entry.
///
/// # Returns
///
/// * `Ok(true)` - If the reference was removed
/// * `Ok(false)` - If the entry did not have this reference
pub fn remove_image_reference(
    conn: &Connection,
    entry_id: EntryId,
    image: &ImageRef,
) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM entry_images WHERE entry_id = :entry_id AND reference = :reference",
            rusqlite::named_params! {
                ":entry_id": entry_id.get(),
                ":reference": image.to_string(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Replace all image references of an entry, keeping the given order.
pub fn replace_image_references(
    conn: &Connection,
    entry_id: EntryId,
    images: &[ImageRef],
) -> Result<()> {
    conn.execute(
        "DELETE FROM entry_images WHERE entry_id = :entry_id",
        rusqlite::named_params! { ":entry_id": entry_id.get() },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    for image in images {
        add_image_reference(conn, entry_id, image)?;
    }

    Ok(())
}
