// Task operations on the "tasks" store
// Stamps the task timestamps and hands the records to the store accessor.
use chrono::Utc;
use serde_json::Value;

use crate::app::accessor::{Action, Create, Delete, Find, StoreAccessor, Update};
use crate::app::error::{Error, Result};
use crate::app::models::{NewTask, Task, TaskChanges, TaskPatch};
use crate::app::object_store::{Key, Record, TransactionMode};
use crate::app::storage::{Database, VersionChange};

pub const STORE_NAME: &str = "tasks";

// Upgrade callback creating the tasks store
pub fn setup(change: &VersionChange<'_>) -> Result<()> {
    if change.object_store_names()?.iter().any(|name| name == STORE_NAME) {
        return Ok(());
    }
    log::info!("DB: configuring TODO list...");
    change.create_object_store(STORE_NAME)
}

#[derive(Clone, Copy)]
pub struct Tasks<'db> {
    model: StoreAccessor<'db>,
}

impl<'db> Tasks<'db> {
    pub fn new(db: &'db Database) -> Tasks<'db> {
        Tasks {
            model: StoreAccessor::new(db),
        }
    }

    pub fn create(&self, new_task: NewTask) -> Result<Task> {
        let mut task = Task {
            id: None,
            title: new_task.title,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };

        let key = self.model.create(Create {
            store: STORE_NAME,
            record: to_record(&task)?,
        })?;
        task.id = Some(key);
        Ok(task)
    }

    pub fn update(&self, key: Key, changes: TaskChanges) -> Result<Task> {
        match changes {
            TaskChanges::Replace(mut task) => {
                task.id = Some(key);
                task.updated_at = Some(Utc::now());
                self.model.update(Update {
                    store: STORE_NAME,
                    record: to_record(&task)?,
                })?;
                Ok(task)
            }
            TaskChanges::Merge(patch) => self.merge(key, patch),
        }
    }

    pub fn find_by_key(&self, key: Key) -> Result<Option<Task>> {
        self.model
            .find_by_key(Find {
                store: STORE_NAME,
                key,
                mode: None,
            })?
            .map(from_record)
            .transpose()
    }

    pub fn find_all(&self) -> Result<Vec<Task>> {
        self.model
            .find_all(STORE_NAME)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn delete(&self, key: Key) -> Result<()> {
        self.model.delete(Delete {
            store: STORE_NAME,
            key,
        })
    }

    // Find, overlay, put; all inside one read-write unit of work
    fn merge(&self, key: Key, patch: TaskPatch) -> Result<Task> {
        let mut changes = to_record(&patch)?;
        changes.insert(
            "updated_at".to_string(),
            serde_json::to_value(Utc::now())?,
        );

        let merged = self.model.transact(
            Action::Update,
            &[STORE_NAME],
            TransactionMode::ReadWrite,
            |unit| {
                let store = unit.object_store(STORE_NAME)?;
                let mut current = store.get(key)?.ok_or_else(|| Error::NotFound {
                    store: STORE_NAME.to_string(),
                    key,
                })?;
                current.extend(changes);
                store.put(&current)?;
                Ok(current)
            },
        )?;

        from_record(merged)
    }
}

fn to_record<T: serde::Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        other => Err(Error::InvalidRecord(other.to_string())),
    }
}

fn from_record(record: Record) -> Result<Task> {
    Ok(serde_json::from_value(Value::Object(record))?)
}
