pub mod dlq;

use clokwerk::{AsyncScheduler, TimeUnits};
use fang::{
    async_trait,
    asynk::{
        async_queue::{AsyncQueue, AsyncQueueable},
        async_worker_pool::AsyncWorkerPool,
    },
    serde::{Deserialize, Serialize},
    typetag, AsyncRunnable, FangError, NoTls, RetentionMode,
};
use once_cell::sync::OnceCell;
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    dispatcher::{DispatchOutcome, OperatorClient},
    error::ServiceError,
    queue,
    repository,
    settings::{SettlerSettings, SweeperSettings, WorkerSettings},
    settlement::{buffer::SettlementBuffer, settler::Settler, SettlementRecord},
    types::{SmsStatus, SmsType},
};

const MAX_TASK_RETRIES: i32 = 3;

/// Shared resources for task execution. Queue tasks are deserialized from
/// their stored metadata, so they reach these through a process-wide handle
/// installed once at worker startup.
pub struct WorkerContext {
    pub db: DatabaseConnection,
    pub dispatcher: OperatorClient,
    pub buffer: SettlementBuffer,
}

static CONTEXT: OnceCell<Arc<WorkerContext>> = OnceCell::new();

pub fn install_context(context: Arc<WorkerContext>) {
    if CONTEXT.set(context).is_err() {
        tracing::warn!("worker context is already installed");
    }
}

fn context() -> Result<Arc<WorkerContext>, FangError> {
    CONTEXT.get().cloned().ok_or_else(|| FangError {
        description: "worker context is not initialized".to_string(),
    })
}

/// Queue envelope and task in one: dispatch a message to the operators and
/// settle the outcome.
///
/// Delivery is at-least-once. A worker that dies between a successful
/// operator call and the acknowledgement leaves the task claimable again, so
/// the same message can reach an operator twice; settlement itself stays
/// idempotent because terminal statuses are never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "fang::serde")]
pub struct ProcessSms {
    pub sms_id: Uuid,
    pub account_id: Uuid,
    pub phone_number: String,
    pub message: String,
    pub sms_type: SmsType,
}

#[async_trait]
#[typetag::serde]
impl AsyncRunnable for ProcessSms {
    async fn run(&self, _queueable: &mut dyn AsyncQueueable) -> Result<(), FangError> {
        let context = context()?;
        process(&context, self).await.map_err(|err| FangError {
            description: err.to_string(),
        })
    }

    fn task_type(&self) -> String {
        queue::queue_for(self.sms_type).to_string()
    }

    fn max_retries(&self) -> i32 {
        MAX_TASK_RETRIES
    }

    fn backoff(&self, attempt: u32) -> u32 {
        2u32.pow(attempt)
    }
}

async fn process(context: &WorkerContext, task: &ProcessSms) -> Result<(), ServiceError> {
    let outcome = context
        .dispatcher
        .send(&task.phone_number, &task.message)
        .await;

    let record = match outcome {
        DispatchOutcome::Sent {
            provider_message_id,
        } => {
            tracing::info!(
                sms_id = %task.sms_id,
                provider_message_id = ?provider_message_id,
                "message sent"
            );
            SettlementRecord {
                sms_id: task.sms_id,
                status: SmsStatus::Sent,
                sent_at: Some(chrono::Utc::now().naive_utc()),
            }
        }
        DispatchOutcome::Failed { error } => {
            tracing::error!(sms_id = %task.sms_id, error = %error, "message failed");
            SettlementRecord {
                sms_id: task.sms_id,
                status: SmsStatus::Failed,
                sent_at: None,
            }
        }
    };

    // The outcome must be recorded somewhere before the task is acked.
    if let Err(err) = context.buffer.push(&record).await {
        tracing::warn!(
            sms_id = %task.sms_id,
            error = %err,
            "settlement buffer unavailable, updating the database directly"
        );
        settle_directly(&context.db, &record).await?;
    }
    Ok(())
}

async fn settle_directly(
    db: &DatabaseConnection,
    record: &SettlementRecord,
) -> Result<(), ServiceError> {
    let (sent_ids, failed_ids) = match record.status {
        SmsStatus::Sent => (vec![record.sms_id], Vec::new()),
        _ => (Vec::new(), vec![record.sms_id]),
    };
    let sent_at = record
        .sent_at
        .unwrap_or_else(|| chrono::Utc::now().naive_utc());
    repository::sms::batch_update(db, &sent_ids, &failed_ids, sent_at).await?;
    Ok(())
}

/// Starts the per-class worker pools and the periodic jobs (settler, stuck
/// task sweeper, DLQ watcher). Returns once everything is spawned.
pub async fn run(
    db: DatabaseConnection,
    db_url: &str,
    dispatcher: OperatorClient,
    buffer: SettlementBuffer,
    worker_settings: &WorkerSettings,
    settler_settings: &SettlerSettings,
    sweeper_settings: &SweeperSettings,
) -> Result<(), ServiceError> {
    install_context(Arc::new(WorkerContext {
        db: db.clone(),
        dispatcher,
        buffer: buffer.clone(),
    }));

    if worker_settings.enabled {
        let mut fang_queue = AsyncQueue::builder()
            .uri(db_url)
            .max_pool_size(worker_settings.queue_pool_size)
            .build();
        fang_queue
            .connect(NoTls)
            .await
            .map_err(|err| ServiceError::Queue(err.to_string()))?;

        let mut express_pool: AsyncWorkerPool<AsyncQueue<NoTls>> = AsyncWorkerPool::builder()
            .number_of_workers(worker_settings.express_workers)
            .queue(fang_queue.clone())
            .retention_mode(RetentionMode::RemoveFinished)
            .task_type(queue::EXPRESS_QUEUE.to_string())
            .build();
        let mut regular_pool: AsyncWorkerPool<AsyncQueue<NoTls>> = AsyncWorkerPool::builder()
            .number_of_workers(worker_settings.regular_workers)
            .queue(fang_queue)
            .retention_mode(RetentionMode::RemoveFinished)
            .task_type(queue::REGULAR_QUEUE.to_string())
            .build();
        express_pool.start().await;
        regular_pool.start().await;
        tracing::info!(
            express_workers = worker_settings.express_workers,
            regular_workers = worker_settings.regular_workers,
            "worker pools started"
        );
    }

    let mut scheduler = AsyncScheduler::new();

    if settler_settings.enabled {
        let settler = Arc::new(Settler::new(
            db.clone(),
            buffer,
            settler_settings,
        ));
        let tick = (settler_settings.tick.as_secs().max(1) as u32).seconds();
        scheduler.every(tick).run(move || {
            let settler = settler.clone();
            async move { settler.tick().await }
        });
        tracing::info!(tick = ?settler_settings.tick, "batch settler scheduled");
    }

    let sweeper_interval = (sweeper_settings.interval.as_secs().max(1) as u32).seconds();
    let sweeper_db = db.clone();
    let visibility_timeout = sweeper_settings.visibility_timeout;
    scheduler.every(sweeper_interval).run(move || {
        let db = sweeper_db.clone();
        async move {
            match queue::requeue_stuck(&db, visibility_timeout).await {
                Ok(0) => {}
                Ok(requeued) => tracing::warn!(requeued, "returned stuck tasks to the queue"),
                Err(err) => tracing::error!(error = %err, "failed to requeue stuck tasks"),
            }
        }
    });

    let watcher = Arc::new(dlq::DlqWatcher::new());
    let watcher_db = db;
    scheduler.every(sweeper_interval).run(move || {
        let watcher = watcher.clone();
        let db = watcher_db.clone();
        async move {
            if let Err(err) = watcher.scan(&db).await {
                tracing::error!(error = %err, "dead letter scan failed");
            }
        }
    });

    tokio::spawn(async move {
        loop {
            scheduler.run_pending().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(sms_type: SmsType) -> ProcessSms {
        ProcessSms {
            sms_id: Uuid::nil(),
            account_id: Uuid::nil(),
            phone_number: "+15551234567".to_string(),
            message: "hi".to_string(),
            sms_type,
        }
    }

    #[test]
    fn task_type_follows_priority_class() {
        assert_eq!(task(SmsType::Express).task_type(), "express");
        assert_eq!(task(SmsType::Regular).task_type(), "regular");
    }

    #[test]
    fn metadata_carries_the_full_envelope() {
        let value = serde_json::to_value(&task(SmsType::Express) as &dyn AsyncRunnable).unwrap();
        assert_eq!(value["type"], serde_json::json!("ProcessSms"));
        assert_eq!(
            value["sms_id"],
            serde_json::json!("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(value["phone_number"], serde_json::json!("+15551234567"));
        assert_eq!(value["message"], serde_json::json!("hi"));
        assert_eq!(value["sms_type"], serde_json::json!(2));
    }

    #[test]
    fn retry_backoff_is_exponential() {
        let task = task(SmsType::Regular);
        assert_eq!(task.max_retries(), 3);
        assert_eq!(task.backoff(0), 1);
        assert_eq!(task.backoff(1), 2);
        assert_eq!(task.backoff(2), 4);
    }
}
