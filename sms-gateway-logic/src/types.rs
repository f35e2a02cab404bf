use serde::{Deserialize, Serialize};

/// Message priority class. The integer values are stored in the database,
/// carried in queue envelopes and exposed over the HTTP API as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum SmsType {
    #[default]
    Regular = 1,
    Express = 2,
}

impl From<SmsType> for i16 {
    fn from(value: SmsType) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for SmsType {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SmsType::Regular),
            2 => Ok(SmsType::Express),
            other => Err(format!("invalid sms_type: {other}")),
        }
    }
}

/// Message delivery status. Transitions are monotonic:
/// PENDING -> SENT or PENDING -> FAILED, terminal rows are never re-mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum SmsStatus {
    Pending = 1,
    Sent = 2,
    Failed = 3,
}

impl SmsStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SmsStatus::Pending)
    }
}

impl From<SmsStatus> for i16 {
    fn from(value: SmsStatus) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for SmsStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SmsStatus::Pending),
            2 => Ok(SmsStatus::Sent),
            3 => Ok(SmsStatus::Failed),
            other => Err(format!("invalid status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sms_type_round_trips_through_i16() {
        for kind in [SmsType::Regular, SmsType::Express] {
            assert_eq!(SmsType::try_from(i16::from(kind)), Ok(kind));
        }
        assert!(SmsType::try_from(0).is_err());
        assert!(SmsType::try_from(3).is_err());
    }

    #[test]
    fn sms_type_defaults_to_regular() {
        assert_eq!(SmsType::default(), SmsType::Regular);
    }

    #[test]
    fn status_serializes_as_integer() {
        let json = serde_json::to_string(&SmsStatus::Sent).unwrap();
        assert_eq!(json, "2");
        let status: SmsStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, SmsStatus::Failed);
        assert!(serde_json::from_str::<SmsStatus>("4").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SmsStatus::Pending.is_terminal());
        assert!(SmsStatus::Sent.is_terminal());
        assert!(SmsStatus::Failed.is_terminal());
    }
}
