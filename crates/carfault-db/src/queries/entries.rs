//! Fault entry database queries.
//!
//! This module provides CRUD operations for fault entries, including their
//! ordered image references, plus listing and text search. Entry ids are
//! assigned here rather than by SQLite.

use carfault_common::{EntryId, Error, Result};
use rusqlite::Connection;

use crate::models::{DictionaryValue, FaultEntry, NewFaultEntry, YearValue};
use crate::queries::images::{get_image_references, replace_image_references};

/// Attempts at drawing a free random id before giving up.
const ID_ATTEMPTS: usize = 8;

const ENTRY_COLUMNS: &str = "e.id, e.timestamp, y.id, y.value, b.id, b.name, m.id, m.name,
                             l.id, l.name, e.title, e.description";

const ENTRY_JOINS: &str = "FROM entries e
                           LEFT JOIN years y ON y.id = e.year_id
                           LEFT JOIN brands b ON b.id = e.brand_id
                           LEFT JOIN models m ON m.id = e.model_id
                           LEFT JOIN locations l ON l.id = e.location_id";

/// Parse an entry row without its images.
fn parse_entry_row(row: &rusqlite::Row) -> rusqlite::Result<FaultEntry> {
    let year = match (row.get::<_, Option<i64>>(2)?, row.get::<_, Option<i32>>(3)?) {
        (Some(id), Some(value)) => Some(YearValue { id, value }),
        _ => None,
    };

    Ok(FaultEntry {
        id: EntryId::from(row.get::<_, i64>(0)?),
        timestamp: row.get(1)?,
        year,
        brand: dictionary_value(row, 4)?,
        model: dictionary_value(row, 6)?,
        location: dictionary_value(row, 8)?,
        title: row.get(10)?,
        description: row.get(11)?,
        images: Vec::new(),
    })
}

fn dictionary_value(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DictionaryValue>> {
    match (
        row.get::<_, Option<i64>>(idx)?,
        row.get::<_, Option<String>>(idx + 1)?,
    ) {
        (Some(id), Some(name)) => Ok(Some(DictionaryValue { id, name })),
        _ => Ok(None),
    }
}

fn with_images(conn: &Connection, mut entries: Vec<FaultEntry>) -> Result<Vec<FaultEntry>> {
    for entry in &mut entries {
        entry.images = get_image_references(conn, entry.id)?;
    }
    Ok(entries)
}

/// Insert a new entry with a store-assigned id.
///
/// The entry row and its image references are written in one transaction.
///
/// # Returns
///
/// * `Ok(EntryId)` - The id assigned to the new entry
/// * `Err(Error)` - If validation or a database operation fails
pub fn insert_entry(conn: &Connection, new: &NewFaultEntry) -> Result<EntryId> {
    for _ in 0..ID_ATTEMPTS {
        let id = EntryId::generate();
        if !entry_exists(conn, id)? {
            insert_entry_with_id(conn, id, new)?;
            return Ok(id);
        }
    }

    Err(Error::database("Could not allocate a free entry id"))
}

/// Insert a new entry under a caller-chosen id.
///
/// # Returns
///
/// * `Ok(())` - If the entry was inserted
/// * `Err(Error::Validation)` - If the id is not positive or the text is too long
/// * `Err(Error::Database)` - If the id is taken or another database error occurs
pub fn insert_entry_with_id(conn: &Connection, id: EntryId, new: &NewFaultEntry) -> Result<()> {
    if id.is_new() || id.get() > EntryId::MAX {
        return Err(Error::validation(format!("Invalid entry id: {}", id)));
    }
    new.validate()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "INSERT INTO entries (id, timestamp, year_id, brand_id, model_id, location_id, title, description)
         VALUES (:id, :timestamp, :year_id, :brand_id, :model_id, :location_id, :title, :description)",
        rusqlite::named_params! {
            ":id": id.get(),
            ":timestamp": new.timestamp,
            ":year_id": new.year_id,
            ":brand_id": new.brand_id,
            ":model_id": new.model_id,
            ":location_id": new.location_id,
            ":title": &new.title,
            ":description": &new.description,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    replace_image_references(&tx, id, &new.images)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    tracing::debug!(entry_id = %id, images = new.images.len(), "Inserted entry");
    Ok(())
}

/// Replace every field and the image list of an existing entry.
///
/// # Returns
///
/// * `Ok(true)` - If the entry was updated
/// * `Ok(false)` - If the entry does not exist
pub fn update_entry(conn: &Connection, id: EntryId, new: &NewFaultEntry) -> Result<bool> {
    new.validate()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = tx
        .execute(
            "UPDATE entries SET
                timestamp = :timestamp,
                year_id = :year_id,
                brand_id = :brand_id,
                model_id = :model_id,
                location_id = :location_id,
                title = :title,
                description = :description
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.get(),
                ":timestamp": new.timestamp,
                ":year_id": new.year_id,
                ":brand_id": new.brand_id,
                ":model_id": new.model_id,
                ":location_id": new.location_id,
                ":title": &new.title,
                ":description": &new.description,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if rows == 0 {
        return Ok(false);
    }

    replace_image_references(&tx, id, &new.images)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(true)
}

/// Get an entry by ID, with its image references.
///
/// # Returns
///
/// * `Ok(Some(FaultEntry))` - The entry if found
/// * `Ok(None)` - If the entry does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_entry(conn: &Connection, id: EntryId) -> Result<Option<FaultEntry>> {
    let sql = format!("SELECT {} {} WHERE e.id = :id", ENTRY_COLUMNS, ENTRY_JOINS);
    let result = conn.query_row(
        &sql,
        rusqlite::named_params! { ":id": id.get() },
        parse_entry_row,
    );

    match result {
        Ok(mut entry) => {
            entry.images = get_image_references(conn, entry.id)?;
            Ok(Some(entry))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all entries, newest first, with their image references.
///
/// The rows and their images are read inside one transaction so the result
/// is a consistent snapshot.
pub fn list_entries(conn: &Connection) -> Result<Vec<FaultEntry>> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let entries = {
        let sql = format!(
            "SELECT {} {} ORDER BY e.timestamp DESC, e.id DESC",
            ENTRY_COLUMNS, ENTRY_JOINS
        );
        let mut stmt = tx.prepare(&sql).map_err(|e| Error::database(e.to_string()))?;

        let entries = stmt
            .query_map([], parse_entry_row)
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;

        with_images(&tx, entries)?
    };

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(entries)
}

/// Search entries whose title or description contains `query`.
///
/// Matching is case-insensitive for ASCII. Results are newest first.
pub fn search_entries(conn: &Connection, query: &str, limit: u32) -> Result<Vec<FaultEntry>> {
    let pattern = format!(
        "%{}%",
        query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    );

    let sql = format!(
        "SELECT {} {}
         WHERE e.title LIKE :pattern ESCAPE '\\' OR e.description LIKE :pattern ESCAPE '\\'
         ORDER BY e.timestamp DESC, e.id DESC
         LIMIT :limit",
        ENTRY_COLUMNS, ENTRY_JOINS
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let entries = stmt
        .query_map(
            rusqlite::named_params! {
                ":pattern": &pattern,
                ":limit": limit,
            },
            parse_entry_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    with_images(conn, entries)
}

/// Delete an entry. Its image references are removed by cascade.
///
/// # Returns
///
/// * `Ok(true)` - If the entry was deleted
/// * `Ok(false)` - If the entry was not found
pub fn delete_entry(conn: &Connection, id: EntryId) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM entries WHERE id = :id",
            rusqlite::named_params! { ":id": id.get() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Whether an entry with this id exists.
pub fn entry_exists(conn: &Connection, id: EntryId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entries WHERE id = :id)",
        rusqlite::named_params! { ":id": id.get() },
        |row| row.get::<_, bool>(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Count all entries.
pub fn count_entries(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get::<_, i64>(0))
        .map(|count| count as u64)
        .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::dictionary::{ensure_brand, ensure_location, ensure_model, ensure_year};
    use carfault_common::ImageRef;

    fn full_entry(conn: &Connection, title: &str, timestamp: i64) -> NewFaultEntry {
        let year_id = ensure_year(conn, 2015).unwrap();
        let brand_id = ensure_brand(conn, "Honda").unwrap();
        let model_id = ensure_model(conn, "Civic", brand_id, year_id).unwrap();
        let location_id = ensure_location(conn, "Engine bay").unwrap();

        NewFaultEntry {
            timestamp,
            year_id: Some(year_id),
            brand_id: Some(brand_id),
            model_id: Some(model_id),
            location_id: Some(location_id),
            title: title.to_string(),
            description: "Rattle at idle".to_string(),
            images: vec![ImageRef::RelativePath("1/a.jpg".to_string())],
        }
    }

    #[test]
    fn test_insert_and_get_entry() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let new = full_entry(&conn, "Heat shield", 1_700_000_000);
        let id = insert_entry(&conn, &new).unwrap();
        assert!(!id.is_new());
        assert!(id.get() <= EntryId::MAX);

        let found = get_entry(&conn, id).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.timestamp, 1_700_000_000);
        assert_eq!(found.year.unwrap().value, 2015);
        assert_eq!(found.brand.unwrap().name, "Honda");
        assert_eq!(found.model.unwrap().name, "Civic");
        assert_eq!(found.location.unwrap().name, "Engine bay");
        assert_eq!(found.title, "Heat shield");
        assert_eq!(found.images, new.images);
    }

    #[test]
    fn test_entry_without_references() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let id = insert_entry(&conn, &NewFaultEntry::now()).unwrap();
        let found = get_entry(&conn, id).unwrap().unwrap();

        assert!(found.year.is_none());
        assert!(found.brand.is_none());
        assert!(found.model.is_none());
        assert!(found.location.is_none());
        assert!(found.images.is_empty());
    }

    #[test]
    fn test_get_missing_entry() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert!(get_entry(&conn, EntryId::from(42)).unwrap().is_none());
    }

    #[test]
    fn test_insert_with_id() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let new = NewFaultEntry::now();
        insert_entry_with_id(&conn, EntryId::from(7), &new).unwrap();
        assert!(entry_exists(&conn, EntryId::from(7)).unwrap());

        // Taken id
        let result = insert_entry_with_id(&conn, EntryId::from(7), &new);
        assert!(matches!(result, Err(Error::Database(_))));

        // Placeholder id
        let result = insert_entry_with_id(&conn, EntryId::NEW, &new);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_insert_rejects_long_title() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let new = NewFaultEntry {
            title: "x".repeat(51),
            ..NewFaultEntry::now()
        };
        assert!(matches!(
            insert_entry(&conn, &new),
            Err(Error::Validation(_))
        ));
        assert_eq!(count_entries(&conn).unwrap(), 0);
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let new = NewFaultEntry {
            brand_id: Some(999),
            ..NewFaultEntry::now()
        };
        // Unknown brand violates the foreign key
        assert!(insert_entry(&conn, &new).is_err());
        assert_eq!(count_entries(&conn).unwrap(), 0);
    }

    #[test]
    fn test_update_entry() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut new = full_entry(&conn, "Before", 100);
        let id = insert_entry(&conn, &new).unwrap();

        new.title = "After".to_string();
        new.location_id = None;
        new.images = vec![
            ImageRef::RelativePath("1/b.jpg".to_string()),
            ImageRef::RelativePath("1/c.jpg".to_string()),
        ];
        assert!(update_entry(&conn, id, &new).unwrap());

        let found = get_entry(&conn, id).unwrap().unwrap();
        assert_eq!(found.title, "After");
        assert!(found.location.is_none());
        assert_eq!(found.images, new.images);

        assert!(!update_entry(&conn, EntryId::from(1), &new).unwrap());
    }

    #[test]
    fn test_list_entries_newest_first() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        for (title, ts) in [("old", 100), ("new", 300), ("mid", 200)] {
            let new = NewFaultEntry {
                timestamp: ts,
                title: title.to_string(),
                ..NewFaultEntry::default()
            };
            insert_entry(&conn, &new).unwrap();
        }

        let titles: Vec<_> = list_entries(&conn)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_search_entries() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        insert_entry(&conn, &full_entry(&conn, "Oil leak", 1)).unwrap();
        insert_entry(&conn, &full_entry(&conn, "Brake squeal", 2)).unwrap();
        insert_entry(&conn, &full_entry(&conn, "100% dead battery", 3)).unwrap();

        let found = search_entries(&conn, "oil", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Oil leak");

        // Matches the shared description
        assert_eq!(search_entries(&conn, "rattle", 10).unwrap().len(), 3);
        assert_eq!(search_entries(&conn, "rattle", 2).unwrap().len(), 2);

        // Wildcards are matched literally
        let found = search_entries(&conn, "0%", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert!(search_entries(&conn, "_", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_entry_cascades_images() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let id = insert_entry(&conn, &full_entry(&conn, "Gone", 1)).unwrap();
        assert!(delete_entry(&conn, id).unwrap());
        assert!(!delete_entry(&conn, id).unwrap());
        assert!(!entry_exists(&conn, id).unwrap());

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM entry_images", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_count_entries() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert_eq!(count_entries(&conn).unwrap(), 0);
        insert_entry(&conn, &NewFaultEntry::now()).unwrap();
        insert_entry(&conn, &NewFaultEntry::now()).unwrap();
        assert_eq!(count_entries(&conn).unwrap(), 2);
    }
}
