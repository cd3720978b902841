//! SQLite persistence for CRM records.
//!
//! One table per entity, integer `AUTOINCREMENT` keys so ids are never
//! reused after a delete. There are no foreign keys: `contactId`/`dealId`
//! are lookup keys only, and deleting a record never cascades.

mod schema;
mod tables;

pub use tables::Table;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{CrmError, Result};
use crate::models::{CustomFieldDefinition, FieldEntity, Id, Validate};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        tracing::debug!("Opened database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "salesdeck", "salesdeck")
            .context("could not determine a data directory")?;
        Ok(dirs.data_dir().join("salesdeck.db"))
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.lock().map_err(anyhow::Error::from)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CrmError::store("database lock poisoned"))
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// All records, newest first.
    pub fn list<R: Table>(&self) -> Result<Vec<R>> {
        self.with_connection(list_in::<R>)
    }

    pub fn get<R: Table>(&self, id: Id) -> Result<Option<R>> {
        self.with_connection(|conn| find_in::<R>(conn, id))
    }

    /// Validate, insert, and return the stored record with its new id.
    pub fn create<R: Table>(&self, input: R::Create) -> Result<R> {
        input.validate()?;
        self.with_connection(|conn| {
            let draft = R::build(0, input, Utc::now());
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                R::TABLE,
                R::COLUMNS.join(", "),
                placeholders(R::COLUMNS.len()),
            );
            conn.execute(&sql, params_from_iter(draft.values()?))?;
            let id = conn.last_insert_rowid();
            tracing::debug!("Created {} {}", R::KIND, id);
            find_in::<R>(conn, id)?.ok_or_else(|| CrmError::not_found(R::KIND, id))
        })
    }

    /// Merge the provided fields into an existing record.
    pub fn update<R: Table>(&self, id: Id, input: R::Update) -> Result<R> {
        input.validate()?;
        self.with_connection(|conn| {
            let mut record =
                find_in::<R>(conn, id)?.ok_or_else(|| CrmError::not_found(R::KIND, id))?;
            record.apply(input);
            record.check()?;
            let assignments: Vec<String> = R::COLUMNS
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{} = ?{}", col, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}",
                R::TABLE,
                assignments.join(", "),
                R::COLUMNS.len() + 1,
            );
            let mut values = record.values()?;
            values.push(rusqlite::types::Value::Integer(id));
            conn.execute(&sql, params_from_iter(values))?;
            tracing::debug!("Updated {} {}", R::KIND, id);
            Ok(record)
        })
    }

    /// Remove a record. Deleting a missing id is an error.
    pub fn delete<R: Table>(&self, id: Id) -> Result<()> {
        self.with_connection(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);
            let removed = conn.execute(&sql, params![id])?;
            if removed == 0 {
                return Err(CrmError::not_found(R::KIND, id));
            }
            tracing::debug!("Deleted {} {}", R::KIND, id);
            Ok(())
        })
    }

    /// Custom field definitions for one entity, oldest first.
    pub fn custom_fields_for(&self, entity: FieldEntity) -> Result<Vec<CustomFieldDefinition>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT id, {} FROM {} WHERE entity = ?1 ORDER BY created_at ASC, id ASC",
                <CustomFieldDefinition as Table>::COLUMNS.join(", "),
                <CustomFieldDefinition as Table>::TABLE,
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![entity.as_str()], CustomFieldDefinition::from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn list_in<R: Table>(conn: &Connection) -> Result<Vec<R>> {
    let sql = format!(
        "SELECT id, {} FROM {} ORDER BY {}",
        R::COLUMNS.join(", "),
        R::TABLE,
        R::ORDER_BY
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], R::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn find_in<R: Table>(conn: &Connection, id: Id) -> Result<Option<R>> {
    let sql = format!(
        "SELECT id, {} FROM {} WHERE id = ?1",
        R::COLUMNS.join(", "),
        R::TABLE
    );
    Ok(conn.query_row(&sql, params![id], R::from_row).optional()?)
}
