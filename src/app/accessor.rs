// Single operations against a named store
// Each call opens its own unit of work, issues one request, commits, and logs what happened.
use crate::app::error::Result;
use crate::app::object_store::{Key, ObjectStore, Record, TransactionMode, UnitOfWork};
use crate::app::storage::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Find,
    Delete,
}

impl Action {
    pub fn error_message(&self, store: &str) -> String {
        match self {
            Action::Create => format!("CREATE: failed to create {store}"),
            Action::Update => format!("UPDATE: failed to update {store}"),
            Action::Find => format!("FIND: failed to find {store}"),
            Action::Delete => format!("DELETE: failed to delete {store}"),
        }
    }

    pub fn success_message(&self, store: &str, key: Key) -> String {
        match self {
            Action::Create => format!("CREATE: new {store} created with key {key}"),
            Action::Update => format!("UPDATE: key {key} in {store} updated"),
            Action::Find => format!("FIND: key {key} found in {store}"),
            Action::Delete => format!("DELETE: key {key} deleted in {store}"),
        }
    }

    pub fn complete_message(&self, store: &str) -> String {
        match self {
            Action::Create => format!("CREATE: new {store} complete"),
            Action::Update => format!("UPDATE: update in {store} complete"),
            Action::Find => format!("FIND: find {store} complete"),
            Action::Delete => format!("DELETE: delete in {store} complete"),
        }
    }
}

pub struct Create<'a> {
    pub store: &'a str,
    pub record: Record,
}

pub struct Update<'a> {
    pub store: &'a str,
    pub record: Record,
}

pub struct Find<'a> {
    pub store: &'a str,
    pub key: Key,
    // Read-only unless set
    pub mode: Option<TransactionMode>,
}

pub struct Delete<'a> {
    pub store: &'a str,
    pub key: Key,
}

#[derive(Clone, Copy)]
pub struct StoreAccessor<'db> {
    db: &'db Database,
}

impl<'db> StoreAccessor<'db> {
    pub fn new(db: &'db Database) -> StoreAccessor<'db> {
        StoreAccessor { db }
    }

    // CREATE
    pub fn create(&self, params: Create<'_>) -> Result<Key> {
        self.single(Action::Create, params.store, TransactionMode::ReadWrite, |store| {
            store.add(&params.record)
        })
    }

    // UPDATE
    pub fn update(&self, params: Update<'_>) -> Result<Key> {
        self.single(Action::Update, params.store, TransactionMode::ReadWrite, |store| {
            store.put(&params.record)
        })
    }

    // READ
    pub fn find_by_key(&self, params: Find<'_>) -> Result<Option<Record>> {
        let mode = params.mode.unwrap_or(TransactionMode::ReadOnly);
        self.single(Action::Find, params.store, mode, |store| store.get(params.key))
    }

    pub fn find_all(&self, store: &str) -> Result<Vec<Record>> {
        self.single(Action::Find, store, TransactionMode::ReadOnly, |store| store.get_all())
    }

    // DELETE
    pub fn delete(&self, params: Delete<'_>) -> Result<()> {
        self.single(Action::Delete, params.store, TransactionMode::ReadWrite, |store| {
            store.delete(params.key)
        })
    }

    // Runs several requests in one unit of work. Commits when `work` succeeds, rolls back otherwise.
    // Completion and failure are logged once for the whole unit, under `action`.
    pub fn transact<T>(
        &self,
        action: Action,
        stores: &[&str],
        mode: TransactionMode,
        work: impl FnOnce(&UnitOfWork<'db>) -> Result<T>,
    ) -> Result<T> {
        let label = stores.join(", ");
        let outcome = self.db.unit_of_work(stores, mode).and_then(|unit| {
            let value = work(&unit)?;
            unit.commit()?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                log::info!("{}", action.complete_message(&label));
                Ok(value)
            }
            Err(e) => {
                log::error!("{}: {e}", action.error_message(&label));
                Err(e)
            }
        }
    }

    fn single<T>(
        &self,
        action: Action,
        store: &str,
        mode: TransactionMode,
        request: impl FnOnce(&ObjectStore<'_, 'db>) -> Result<T>,
    ) -> Result<T> {
        self.transact(action, &[store], mode, |unit| request(&unit.object_store(store)?))
    }
}
