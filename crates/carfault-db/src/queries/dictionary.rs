//! Reference data queries: years, brands, models, and locations.
//!
//! Names are unique case-insensitively. The `ensure_*` functions are
//! idempotent: they return the id of the existing value when there is one
//! and create it otherwise. Deleting a value leaves referencing entries in
//! place with a null reference.

use carfault_common::{Error, Result};
use rusqlite::Connection;

use crate::models::{DictionaryValue, ModelValue, YearValue};

/// Tables holding plain named values.
#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Brands,
    Locations,
}

impl NamedTable {
    fn as_str(self) -> &'static str {
        match self {
            Self::Brands => "brands",
            Self::Locations => "locations",
        }
    }
}

fn normalize_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Dictionary name must not be empty"));
    }
    Ok(name)
}

fn ensure_named(conn: &Connection, table: NamedTable, name: &str) -> Result<i64> {
    let name = normalize_name(name)?;
    let table = table.as_str();

    conn.execute(
        &format!(
            "INSERT INTO {} (name) VALUES (:name) ON CONFLICT(name) DO NOTHING",
            table
        ),
        rusqlite::named_params! { ":name": name },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.query_row(
        &format!("SELECT id FROM {} WHERE name = :name", table),
        rusqlite::named_params! { ":name": name },
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

fn list_named(conn: &Connection, table: NamedTable) -> Result<Vec<DictionaryValue>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, name FROM {} ORDER BY name COLLATE NOCASE ASC",
            table.as_str()
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let values = stmt
        .query_map([], |row| {
            Ok(DictionaryValue {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(values)
}

fn delete_by_id(conn: &Connection, table: &str, id: i64) -> Result<bool> {
    let rows = conn
        .execute(
            &format!("DELETE FROM {} WHERE id = :id", table),
            rusqlite::named_params! { ":id": id },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows > 0)
}

/// Ensure a model year exists, returning its id.
pub fn ensure_year(conn: &Connection, value: i32) -> Result<i64> {
    conn.execute(
        "INSERT INTO years (value) VALUES (:value) ON CONFLICT(value) DO NOTHING",
        rusqlite::named_params! { ":value": value },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.query_row(
        "SELECT id FROM years WHERE value = :value",
        rusqlite::named_params! { ":value": value },
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Ensure a brand exists, returning its id.
pub fn ensure_brand(conn: &Connection, name: &str) -> Result<i64> {
    ensure_named(conn, NamedTable::Brands, name)
}

/// Ensure a location exists, returning its id.
pub fn ensure_location(conn: &Connection, name: &str) -> Result<i64> {
    ensure_named(conn, NamedTable::Locations, name)
}

/// Ensure a model exists for the given brand and year, returning its id.
///
/// The same model name under another brand or year is a distinct value.
pub fn ensure_model(conn: &Connection, name: &str, brand_id: i64, year_id: i64) -> Result<i64> {
    let name = normalize_name(name)?;

    conn.execute(
        "INSERT INTO models (name, brand_id, year_id) VALUES (:name, :brand_id, :year_id)
         ON CONFLICT(name, brand_id, year_id) DO NOTHING",
        rusqlite::named_params! {
            ":name": name,
            ":brand_id": brand_id,
            ":year_id": year_id,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.query_row(
        "SELECT id FROM models WHERE name = :name AND brand_id = :brand_id AND year_id = :year_id",
        rusqlite::named_params! {
            ":name": name,
            ":brand_id": brand_id,
            ":year_id": year_id,
        },
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// List all model years in ascending order.
pub fn list_years(conn: &Connection) -> Result<Vec<YearValue>> {
    let mut stmt = conn
        .prepare("SELECT id, value FROM years ORDER BY value ASC")
        .map_err(|e| Error::database(e.to_string()))?;

    let years = stmt
        .query_map([], |row| {
            Ok(YearValue {
                id: row.get(0)?,
                value: row.get(1)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(years)
}

/// List all brands by name.
pub fn list_brands(conn: &Connection) -> Result<Vec<DictionaryValue>> {
    list_named(conn, NamedTable::Brands)
}

/// List all locations by name.
pub fn list_locations(conn: &Connection) -> Result<Vec<DictionaryValue>> {
    list_named(conn, NamedTable::Locations)
}

/// List models, optionally narrowed to one brand and/or year.
pub fn list_models(
    conn: &Connection,
    brand_id: Option<i64>,
    year_id: Option<i64>,
) -> Result<Vec<ModelValue>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, brand_id, year_id FROM models
             WHERE (:brand_id IS NULL OR brand_id = :brand_id)
               AND (:year_id IS NULL OR year_id = :year_id)
             ORDER BY name COLLATE NOCASE ASC, id ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let models = stmt
        .query_map(
            rusqlite::named_params! {
                ":brand_id": brand_id,
                ":year_id": year_id,
            },
            |row| {
                Ok(ModelValue {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    brand_id: row.get(2)?,
                    year_id: row.get(3)?,
                })
            },
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(models)
}

/// Delete a model year. Its models go with it.
pub fn delete_year(conn: &Connection, id: i64) -> Result<bool> {
    delete_by_id(conn, "years", id)
}

/// Delete a brand. Its models go with it.
pub fn delete_brand(conn: &Connection, id: i64) -> Result<bool> {
    delete_by_id(conn, "brands", id)
}

/// Delete a location.
pub fn delete_location(conn: &Connection, id: i64) -> Result<bool> {
    delete_by_id(conn, "locations", id)
}

/// Delete a model.
pub fn delete_model(conn: &Connection, id: i64) -> Result<bool> {
    delete_by_id(conn, "models", id)
}
