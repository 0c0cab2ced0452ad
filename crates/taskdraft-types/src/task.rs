//! Remote task record returned by the task-creation collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::form::FormType;

/// A task as persisted by the remote document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub form_type: FormType,
    pub title: String,
    pub created_at: DateTime<Utc>,
}
