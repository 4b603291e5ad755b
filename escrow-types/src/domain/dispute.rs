//! Dispute domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::{DisputeId, TransactionId, UserId};

labelled_enum! {
    DisputeStatus {
        Open => "OPEN",
        InProgress => "INPROGRESS",
        Resolved => "RESOLVED",
        Rejected => "REJECTED",
    }
}

impl DisputeStatus {
    /// Open and in-progress disputes still block the transaction.
    pub fn is_active(&self) -> bool {
        matches!(self, DisputeStatus::Open | DisputeStatus::InProgress)
    }
}

/// A claim raised by a buyer or seller against a funded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dispute {
    pub id: DisputeId,
    pub transaction_id: TransactionId,
    pub raised_by: UserId,
    #[schema(example = "Item never delivered")]
    pub reason: String,
    pub evidence_url: Option<String>,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-status dispute tally for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DisputeStatusCount {
    pub resolved: i64,
    pub in_progress: i64,
    pub open: i64,
    pub rejected: i64,
}

impl DisputeStatusCount {
    pub fn add(&mut self, status: DisputeStatus, count: i64) {
        match status {
            DisputeStatus::Open => self.open += count,
            DisputeStatus::InProgress => self.in_progress += count,
            DisputeStatus::Resolved => self.resolved += count,
            DisputeStatus::Rejected => self.rejected += count,
        }
    }

    pub fn active(&self) -> i64 {
        self.open + self.in_progress
    }
}
