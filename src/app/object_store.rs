// Object stores on top of SQLite
// Every store is one table holding JSON records keyed by an auto-incremented integer id.
use std::sync::MutexGuard;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};

use crate::app::accessor::Action;
use crate::app::error::{Error, Result};

pub type Key = i64;
pub type Record = Map<String, Value>;

// Name of the field holding the record key
pub const KEY_PATH: &str = "id";

const TABLE_PREFIX: &str = "store_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

// A transaction over a fixed set of stores.
// Holds the connection lock until committed or dropped; dropping without commit rolls back.
pub struct UnitOfWork<'db> {
    conn: MutexGuard<'db, Connection>,
    mode: TransactionMode,
    scope: Vec<String>,
    finished: bool,
}

// Requests against one store, bound to the unit of work that created it
pub struct ObjectStore<'u, 'db> {
    unit: &'u UnitOfWork<'db>,
    name: String,
    table: String,
}

impl<'db> UnitOfWork<'db> {
    pub(crate) fn begin(
        conn: MutexGuard<'db, Connection>,
        stores: &[&str],
        mode: TransactionMode,
    ) -> Result<UnitOfWork<'db>> {
        let scope = stores
            .iter()
            .map(|name| table_name(name).map(|_| name.to_string()))
            .collect::<Result<Vec<_>>>()?;

        conn.execute_batch(match mode {
            TransactionMode::ReadOnly => "BEGIN DEFERRED;",
            TransactionMode::ReadWrite => "BEGIN IMMEDIATE;",
        })?;

        Ok(UnitOfWork {
            conn,
            mode,
            scope,
            finished: false,
        })
    }

    pub fn object_store(&self, name: &str) -> Result<ObjectStore<'_, 'db>> {
        if !self.scope.iter().any(|store| store == name) {
            return Err(Error::NotInScope(name.to_string()));
        }
        if !store_exists(&self.conn, name)? {
            return Err(Error::UnknownStore(name.to_string()));
        }

        Ok(ObjectStore {
            unit: self,
            name: name.to_string(),
            table: table_name(name)?,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.finished = true;
        Ok(())
    }

    fn ensure_writable(&self, store: &str) -> Result<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(Error::ReadOnly(store.to_string())),
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
            log::warn!("DB: rollback of {:?} failed: {e}", self.scope);
        } else {
            log::debug!("DB: rolled back {:?}", self.scope);
        }
    }
}

impl ObjectStore<'_, '_> {
    // Inserts a new record. Uses the record's own key when it has one, otherwise assigns the next one.
    pub fn add(&self, record: &Record) -> Result<Key> {
        self.unit.ensure_writable(&self.name)?;
        let (key, value) = split_key(record)?;
        let value = serde_json::to_string(&value)?;

        let inserted = match key {
            Some(key) => self.conn().execute(
                &format!("INSERT INTO {} (id, value) VALUES (?1, ?2);", self.table),
                params![key, value],
            ),
            None => self.conn().execute(
                &format!("INSERT INTO {} (value) VALUES (?1);", self.table),
                params![value],
            ),
        };

        let key = match inserted {
            Ok(_) => key.unwrap_or_else(|| self.conn().last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::Constraint {
                    store: self.name.clone(),
                    key: key.unwrap_or_default(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        log::info!("{}", Action::Create.success_message(&self.name, key));
        Ok(key)
    }

    // Inserts or replaces a record
    pub fn put(&self, record: &Record) -> Result<Key> {
        self.unit.ensure_writable(&self.name)?;
        let (key, value) = split_key(record)?;
        let value = serde_json::to_string(&value)?;

        let key = match key {
            Some(key) => {
                self.conn().execute(
                    &format!(
                        "INSERT INTO {} (id, value) VALUES (?1, ?2)
                         ON CONFLICT(id) DO UPDATE SET value = excluded.value;",
                        self.table
                    ),
                    params![key, value],
                )?;
                key
            }
            None => {
                self.conn().execute(
                    &format!("INSERT INTO {} (value) VALUES (?1);", self.table),
                    params![value],
                )?;
                self.conn().last_insert_rowid()
            }
        };

        log::info!("{}", Action::Update.success_message(&self.name, key));
        Ok(key)
    }

    pub fn get(&self, key: Key) -> Result<Option<Record>> {
        let value: Option<String> = self
            .conn()
            .query_row(
                &format!("SELECT value FROM {} WHERE id = ?1;", self.table),
                [key],
                |row| row.get(0),
            )
            .optional()?;

        let record = value.map(|value| join_key(key, &value)).transpose()?;
        match &record {
            Some(_) => log::info!("{}", Action::Find.success_message(&self.name, key)),
            None => log::info!("FIND: key {key} not found in {}", self.name),
        }
        Ok(record)
    }

    pub fn get_all(&self) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT id, value FROM {} ORDER BY id;", self.table))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, Key>(0)?, row.get::<_, String>(1)?)))?;

        let mut records = Vec::new();
        for row in rows {
            let (key, value) = row?;
            records.push(join_key(key, &value)?);
        }

        log::info!("FIND: {} records found in {}", records.len(), self.name);
        Ok(records)
    }

    // Deleting a missing key is not an error
    pub fn delete(&self, key: Key) -> Result<()> {
        self.unit.ensure_writable(&self.name)?;
        self.conn().execute(
            &format!("DELETE FROM {} WHERE id = ?1;", self.table),
            [key],
        )?;

        log::info!("{}", Action::Delete.success_message(&self.name, key));
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.unit.conn
    }
}

// Store names end up in SQL, so only plain identifiers are allowed
pub(crate) fn table_name(store: &str) -> Result<String> {
    let valid = !store.is_empty()
        && store
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(format!("\"{TABLE_PREFIX}{store}\""))
    } else {
        Err(Error::InvalidStoreName(store.to_string()))
    }
}

pub(crate) fn store_exists(conn: &Connection, store: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [format!("{TABLE_PREFIX}{store}")],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn store_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'store\\_%' ESCAPE '\\' ORDER BY name;",
    )?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut stores = Vec::new();
    for name in names {
        let name = name?;
        stores.push(name.trim_start_matches(TABLE_PREFIX).to_string());
    }
    Ok(stores)
}

// Splits the key from the rest of the record. A missing or null key means "assign one".
fn split_key(record: &Record) -> Result<(Option<Key>, Record)> {
    let mut value = record.clone();
    let key = match value.remove(KEY_PATH) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(key) if key > 0 => Some(key),
            _ => return Err(Error::InvalidKey(n.to_string())),
        },
        Some(other) => return Err(Error::InvalidKey(other.to_string())),
    };
    Ok((key, value))
}

fn join_key(key: Key, value: &str) -> Result<Record> {
    let mut record = match serde_json::from_str::<Value>(value)? {
        Value::Object(record) => record,
        other => return Err(Error::InvalidRecord(other.to_string())),
    };
    record.insert(KEY_PATH.to_string(), Value::from(key));
    Ok(record)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}
