use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::object_store::Key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Key>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// Input for a new task. The timestamps are always set by the store.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
}

// Fields overlaid on the stored task by a merge update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> TaskPatch {
        TaskPatch {
            title: Some(title.into()),
            ..TaskPatch::default()
        }
    }

    pub fn completed(completed: bool) -> TaskPatch {
        TaskPatch {
            completed_at: Some(completed.then(Utc::now)),
            ..TaskPatch::default()
        }
    }
}

pub enum TaskChanges {
    // Read the stored task and overlay the patch on it
    Merge(TaskPatch),
    // Write the given task as is, without reading the stored one first
    Replace(Task),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_patch_skips_untouched_fields() {
        let patch = serde_json::to_value(TaskPatch::title("B")).unwrap();
        assert_eq!(patch, json!({"title": "B"}));

        let patch = serde_json::to_value(TaskPatch::completed(false)).unwrap();
        assert_eq!(patch, json!({"completed_at": null}));
    }

    #[test]
    fn test_new_record_has_explicit_nulls() {
        let task = Task {
            id: None,
            title: "A".to_string(),
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };
        let value = serde_json::to_value(&task).unwrap();

        assert!(value.get("id").is_none());
        assert_eq!(value["updated_at"], json!(null));
        assert_eq!(value["completed_at"], json!(null));
        assert!(!task.is_completed());
    }
}
