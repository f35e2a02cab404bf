use fang::AsyncRunnable;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use std::time::Duration;

use crate::{error::ServiceError, types::SmsType};

pub const EXPRESS_QUEUE: &str = "express";
pub const REGULAR_QUEUE: &str = "regular";

pub fn queue_for(sms_type: SmsType) -> &'static str {
    match sms_type {
        SmsType::Express => EXPRESS_QUEUE,
        SmsType::Regular => REGULAR_QUEUE,
    }
}

/// Inserts a task row into the queue table on the caller's connection. Called
/// with an open transaction this is the outbox write: the task commits (and
/// becomes visible to the worker pools) together with the rest of the
/// admission writes, or not at all.
///
/// The metadata is produced by serializing the task through its trait object,
/// which yields exactly the tagged JSON the worker-side deserializer expects.
pub async fn enqueue_in<C: ConnectionTrait>(
    db: &C,
    task: &dyn AsyncRunnable,
) -> Result<(), ServiceError> {
    let metadata = serde_json::to_value(task)?;
    db.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"INSERT INTO "fang_tasks" ("metadata", "task_type") VALUES ($1, $2)"#,
        [metadata.into(), task.task_type().into()],
    ))
    .await?;
    Ok(())
}

/// Returns tasks claimed by workers that died mid-flight back to the queue.
/// A task is considered stuck once it has been in progress for longer than
/// the visibility timeout; redelivery keeps the pipeline at-least-once.
pub async fn requeue_stuck<C: ConnectionTrait>(
    db: &C,
    visibility_timeout: Duration,
) -> Result<u64, ServiceError> {
    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"UPDATE "fang_tasks" SET "state" = 'new', "updated_at" = now() WHERE "state" = 'in_progress' AND "updated_at" < now() - $1::interval"#,
            [format!("{} seconds", visibility_timeout.as_secs()).into()],
        ))
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_classes_map_to_task_types() {
        assert_eq!(queue_for(SmsType::Express), "express");
        assert_eq!(queue_for(SmsType::Regular), "regular");
    }
}
