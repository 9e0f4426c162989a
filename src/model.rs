use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Operation type of a queued record. The queue itself treats payloads as
/// opaque; the kind only selects the remote endpoint on submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordKind {
    #[serde(rename = "CREATE_PATIENT")]
    CreatePatient,
    #[serde(rename = "CREATE_VISIT_REPORT")]
    CreateVisitReport,
    #[serde(rename = "CREATE_PRESCRIPTION")]
    CreatePrescription,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::CreatePatient => "CREATE_PATIENT",
            RecordKind::CreateVisitReport => "CREATE_VISIT_REPORT",
            RecordKind::CreatePrescription => "CREATE_PRESCRIPTION",
        }
    }

    pub fn parse(s: &str) -> Option<RecordKind> {
        match s {
            "CREATE_PATIENT" => Some(RecordKind::CreatePatient),
            "CREATE_VISIT_REPORT" => Some(RecordKind::CreateVisitReport),
            "CREATE_PRESCRIPTION" => Some(RecordKind::CreatePrescription),
            _ => None,
        }
    }
}

/// One pending locally-created record awaiting remote confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Client-generated id, also sent to the server as the idempotency key.
    pub id: String,
    pub kind: RecordKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Prior submission attempts, for diagnostics. Retries are not capped.
    pub attempts: i32,
}

/// Snapshot reported to the sync-status screen.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub depth: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_online: bool,
}

/// Tally of one completed sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub submitted: usize,
    pub failed: usize,
}

/// Result of a sync trigger. `Busy` means another pass was already in
/// flight and this trigger was dropped; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(SyncReport),
    Busy,
}

/// Errors surfaced to the UI layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store rejected a read or write. The record in question was
    /// NOT saved; the user must be told immediately.
    #[error("local storage unavailable: {0}")]
    StorageUnavailable(String),
    /// A remote submission failed. Recovered by requeueing; only visible in
    /// aggregate through queue depth and last-sync time.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_round_trips() {
        for kind in [
            RecordKind::CreatePatient,
            RecordKind::CreateVisitReport,
            RecordKind::CreatePrescription,
        ] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("DELETE_PATIENT"), None);
    }

    #[test]
    fn record_kind_serde_matches_wire_tags() {
        let json = serde_json::to_string(&RecordKind::CreatePatient).unwrap();
        assert_eq!(json, "\"CREATE_PATIENT\"");
        let parsed: RecordKind = serde_json::from_str("\"CREATE_VISIT_REPORT\"").unwrap();
        assert_eq!(parsed, RecordKind::CreateVisitReport);
    }
}
