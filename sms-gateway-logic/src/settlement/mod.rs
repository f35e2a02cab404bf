pub mod buffer;
pub mod settler;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SmsStatus;

/// Terminal outcome of one message, produced by a worker and coalesced into
/// batched updates by the settler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub sms_id: Uuid,
    pub status: SmsStatus,
    pub sent_at: Option<NaiveDateTime>,
}
