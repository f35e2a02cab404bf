use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{buffer::SettlementBuffer, SettlementRecord};
use crate::{error::ServiceError, repository, settings::SettlerSettings, types::SmsStatus};

/// Periodic job that drains the settlement buffer and applies the outcomes as
/// two batched UPDATEs in a single transaction.
pub struct Settler {
    db: DatabaseConnection,
    buffer: SettlementBuffer,
    batch_size: usize,
    running: Mutex<()>,
}

impl Settler {
    pub fn new(db: DatabaseConnection, buffer: SettlementBuffer, settings: &SettlerSettings) -> Self {
        Self {
            db,
            buffer,
            batch_size: settings.batch_size,
            running: Mutex::new(()),
        }
    }

    /// Overlapping ticks are dropped rather than queued; a skipped tick only
    /// delays terminal-status visibility.
    pub async fn tick(&self) {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("previous settlement tick still running, skipping");
            return;
        };
        if let Err(err) = self.settle().await {
            tracing::error!(error = %err, "settlement tick failed");
        }
    }

    async fn settle(&self) -> Result<(), ServiceError> {
        let records = self.buffer.drain(self.batch_size).await?;
        if records.is_empty() {
            return Ok(());
        }
        let (sent_ids, failed_ids, sent_at) = partition_records(&records);
        let (sent, failed) =
            repository::sms::batch_update(&self.db, &sent_ids, &failed_ids, sent_at).await?;
        tracing::info!(sent, failed, "settled message statuses");
        Ok(())
    }
}

/// Splits a drained batch into SENT and FAILED id lists. The batch shares one
/// coarse `sent_at`: the earliest timestamp reported by the workers, or the
/// drain time when none carried one.
fn partition_records(
    records: &[SettlementRecord],
) -> (Vec<Uuid>, Vec<Uuid>, NaiveDateTime) {
    let mut sent_ids = Vec::new();
    let mut failed_ids = Vec::new();
    let mut sent_at: Option<NaiveDateTime> = None;
    for record in records {
        match record.status {
            SmsStatus::Sent => {
                sent_ids.push(record.sms_id);
                if let Some(ts) = record.sent_at {
                    sent_at = Some(sent_at.map_or(ts, |current| current.min(ts)));
                }
            }
            SmsStatus::Failed => failed_ids.push(record.sms_id),
            SmsStatus::Pending => {
                tracing::warn!(sms_id = %record.sms_id, "ignoring non-terminal settlement record")
            }
        }
    }
    (
        sent_ids,
        failed_ids,
        sent_at.unwrap_or_else(|| chrono::Utc::now().naive_utc()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(status: SmsStatus, sent_at: Option<NaiveDateTime>) -> SettlementRecord {
        SettlementRecord {
            sms_id: Uuid::new_v4(),
            status,
            sent_at,
        }
    }

    fn ts(secs: i64) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn partitions_by_status() {
        let records = vec![
            record(SmsStatus::Sent, Some(ts(100))),
            record(SmsStatus::Failed, None),
            record(SmsStatus::Sent, Some(ts(50))),
            record(SmsStatus::Failed, None),
        ];
        let (sent_ids, failed_ids, sent_at) = partition_records(&records);
        assert_eq!(sent_ids, vec![records[0].sms_id, records[2].sms_id]);
        assert_eq!(failed_ids, vec![records[1].sms_id, records[3].sms_id]);
        // the batch timestamp is the earliest reported sent_at
        assert_eq!(sent_at, ts(50));
    }

    #[test]
    fn falls_back_to_now_without_sent_timestamps() {
        let records = vec![record(SmsStatus::Failed, None)];
        let before = chrono::Utc::now().naive_utc();
        let (sent_ids, failed_ids, sent_at) = partition_records(&records);
        assert!(sent_ids.is_empty());
        assert_eq!(failed_ids.len(), 1);
        assert!(sent_at >= before);
    }

    #[test]
    fn non_terminal_records_are_ignored() {
        let records = vec![record(SmsStatus::Pending, None)];
        let (sent_ids, failed_ids, _) = partition_records(&records);
        assert!(sent_ids.is_empty());
        assert!(failed_ids.is_empty());
    }

    #[test]
    fn settlement_record_wire_format() {
        let record = SettlementRecord {
            sms_id: Uuid::nil(),
            status: SmsStatus::Sent,
            sent_at: Some(ts(0)),
        };
        let json = serde_json::to_value(&record).unwrap();
        // status travels as its integer value
        assert_eq!(json["status"], serde_json::json!(2));
        assert_eq!(
            json["sms_id"],
            serde_json::json!("00000000-0000-0000-0000-000000000000")
        );
    }
}
