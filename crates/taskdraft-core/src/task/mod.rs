//! Remote task creation port.
//!
//! The remote document store is an external collaborator; only the call
//! this subsystem depends on is modelled here.

use std::future::Future;

use taskdraft_types::error::TaskError;
use taskdraft_types::form::FormData;
use taskdraft_types::task::TaskRecord;

/// Creates a published task from a submitted form.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait TaskCreator: Send + Sync {
    fn create_task(
        &self,
        course_id: &str,
        lesson_id: &str,
        form: &FormData,
    ) -> impl Future<Output = Result<TaskRecord, TaskError>> + Send;
}
