use sea_orm::{
    prelude::DateTimeWithTimeZone, ConnectionTrait, DbBackend, FromQueryResult, Statement,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ServiceError;

/// A task that exhausted its retry budget. The queue keeps the row itself
/// (state, serialized arguments, error, retry count, timestamps), so the row
/// is the durable dead-letter record; nothing is replayed from it.
#[derive(Debug, FromQueryResult)]
pub struct DeadTask {
    pub id: Uuid,
    pub task_type: String,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub retries: i32,
    pub updated_at: DateTimeWithTimeZone,
}

/// Periodically reports tasks that entered the dead letter state since the
/// last scan.
pub struct DlqWatcher {
    last_seen: Mutex<DateTimeWithTimeZone>,
}

impl DlqWatcher {
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(chrono::Utc::now().fixed_offset()),
        }
    }

    pub async fn scan<C: ConnectionTrait>(&self, db: &C) -> Result<usize, ServiceError> {
        let mut last_seen = self.last_seen.lock().await;
        let tasks = DeadTask::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"SELECT "id", "task_type", "metadata", "error_message", "retries", "updated_at" FROM "fang_tasks" WHERE "state" = 'failed' AND "updated_at" > $1 ORDER BY "updated_at""#,
            [(*last_seen).into()],
        ))
        .all(db)
        .await?;

        for task in &tasks {
            tracing::error!(
                task_id = %task.id,
                task_type = %task.task_type,
                retries = task.retries,
                args = %task.metadata,
                error = task.error_message.as_deref().unwrap_or("unknown"),
                timestamp = %task.updated_at,
                "task moved to the dead letter queue"
            );
            if task.updated_at > *last_seen {
                *last_seen = task.updated_at;
            }
        }
        Ok(tasks.len())
    }
}

impl Default for DlqWatcher {
    fn default() -> Self {
        Self::new()
    }
}
