// Connection to the object store database
// A single SQLite connection is opened on first use and shared for the rest of the process.
// Based on https://github.com/rusqlite/rusqlite/blob/master/examples/persons/main.rs
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use rusqlite::Connection;

use crate::app::error::{Error, Result};
use crate::app::object_store::{self, TransactionMode, UnitOfWork};

// Runs once when the stored schema version is older than the requested one
pub type UpgradeFn = fn(&VersionChange<'_>) -> Result<()>;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub name: String,
    pub path: PathBuf,
    pub version: u32,
}

pub struct Database {
    config: DbConfig,
    upgrade: UpgradeFn,
    handle: OnceCell<Mutex<Connection>>,
}

// Handed to the upgrade callback while the version bump transaction is open
pub struct VersionChange<'a> {
    conn: &'a Connection,
    pub old_version: u32,
    pub new_version: u32,
}

impl VersionChange<'_> {
    pub fn create_object_store(&self, name: &str) -> Result<()> {
        let table = object_store::table_name(name)?;
        self.conn.execute_batch(&format!(
            "CREATE TABLE {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                value TEXT NOT NULL
            );"
        ))?;
        log::info!("DB: object store '{name}' created");
        Ok(())
    }

    pub fn object_store_names(&self) -> Result<Vec<String>> {
        object_store::store_names(self.conn)
    }
}

impl Database {
    pub fn new(config: DbConfig, upgrade: UpgradeFn) -> Database {
        Database {
            config,
            upgrade,
            handle: OnceCell::new(),
        }
    }

    // Bootstrap call of the application
    pub fn start_connection(&self) -> Result<&Mutex<Connection>> {
        self.connection()
    }

    // Returns the shared handle, opening it first if needed.
    // Callers that arrive while another thread is opening wait for that open and get the same handle.
    // A failed open is not remembered, the next call tries again.
    pub fn connection(&self) -> Result<&Mutex<Connection>> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }

        log::debug!("DB: opening connection to '{}'...", self.config.name);
        self.handle.get_or_try_init(|| self.open()).map_err(|e| {
            log::error!("DB: failed to open connection: {e}");
            e
        })
    }

    // Starts a unit of work over the given stores. The connection stays locked until it ends.
    pub fn unit_of_work(&self, stores: &[&str], mode: TransactionMode) -> Result<UnitOfWork<'_>> {
        let conn = self.lock()?;
        UnitOfWork::begin(conn, stores, mode)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection()?.lock().map_err(|_| Error::Poisoned)
    }

    fn open(&self) -> Result<Mutex<Connection>> {
        let mut conn = Connection::open(&self.config.path).map_err(|source| Error::Open {
            path: self.config.path.clone(),
            source,
        })?;

        let stored: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        let requested = self.config.version;

        if stored > requested {
            return Err(Error::VersionMismatch { stored, requested });
        }

        if stored < requested {
            let tx = conn.transaction()?;
            (self.upgrade)(&VersionChange {
                conn: &tx,
                old_version: stored,
                new_version: requested,
            })?;
            tx.pragma_update(None, "user_version", requested)?;
            tx.commit()?;
            log::info!("DB: updated version {stored} -> {requested}");
        }

        log::info!(
            "DB: connection to '{}' opened successfully ({})",
            self.config.name,
            self.config.path.display()
        );
        Ok(Mutex::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;

    fn setup(change: &VersionChange<'_>) -> Result<()> {
        change.create_object_store("notes")
    }

    fn config(dir: &TempDir, version: u32) -> DbConfig {
        DbConfig {
            name: "test".to_string(),
            path: dir.path().join("test.db"),
            version,
        }
    }

    #[test]
    fn test_first_open_runs_upgrade() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(config(&temp, 1), setup);

        let conn = db.start_connection().unwrap().lock().unwrap();
        let names = object_store::store_names(&conn).unwrap();
        assert_eq!(names, vec!["notes".to_string()]);

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_reopen_same_version_skips_upgrade() {
        fn fail(_: &VersionChange<'_>) -> Result<()> {
            Err(Error::InvalidRecord("upgrade should not run".to_string()))
        }

        let temp = TempDir::new().unwrap();
        Database::new(config(&temp, 1), setup).connection().unwrap();

        let reopened = Database::new(config(&temp, 1), fail);
        assert!(reopened.connection().is_ok());
    }

    #[test]
    fn test_older_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        Database::new(config(&temp, 2), setup).connection().unwrap();

        let db = Database::new(config(&temp, 1), setup);
        assert!(matches!(
            db.connection(),
            Err(Error::VersionMismatch {
                stored: 2,
                requested: 1
            })
        ));
    }

    #[test]
    fn test_upgrade_sees_versions() {
        fn check(change: &VersionChange<'_>) -> Result<()> {
            assert_eq!(change.old_version, 0);
            assert_eq!(change.new_version, 3);
            change.create_object_store("tasks")
        }

        let temp = TempDir::new().unwrap();
        assert!(Database::new(config(&temp, 3), check).connection().is_ok());
    }

    #[test]
    fn test_failed_open_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(
            DbConfig {
                name: "test".to_string(),
                path: temp.path().join("missing").join("test.db"),
                version: 1,
            },
            setup,
        );

        assert!(matches!(db.connection(), Err(Error::Open { .. })));

        std::fs::create_dir(temp.path().join("missing")).unwrap();
        assert!(db.connection().is_ok());
    }

    #[test]
    fn test_concurrent_callers_share_one_open() {
        static OPENS: AtomicUsize = AtomicUsize::new(0);

        fn counting(change: &VersionChange<'_>) -> Result<()> {
            OPENS.fetch_add(1, Ordering::SeqCst);
            change.create_object_store("notes")
        }

        let temp = TempDir::new().unwrap();
        let db = Database::new(config(&temp, 1), counting);
        let db = &db;

        let handles: Vec<usize> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || db.connection().unwrap() as *const _ as usize))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(OPENS.load(Ordering::SeqCst), 1);
    }
}
