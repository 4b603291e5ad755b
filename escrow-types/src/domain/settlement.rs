//! Settlement domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::{SettlementId, TransactionId, UserId};
use super::money::Currency;

/// Recipient label used when the receiving side never registered.
pub const UNREGISTERED_RECIPIENT: &str = "UNREGISTERED USER";

labelled_enum! {
    /// Direction escrowed funds moved in.
    SettlementType {
        ReleaseToSeller => "RELEASE_TO_SELLER",
        RefundToBuyer => "REFUND_TO_BUYER",
    }
}

labelled_enum! {
    /// State of the mobile-money payout that follows a settlement.
    PayoutStatus {
        /// Not attempted yet, or waiting for manual processing.
        Pending => "PENDING",
        Sent => "SENT",
        Failed => "FAILED",
    }
}

/// Final movement of escrowed funds to one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Settlement {
    pub id: SettlementId,
    pub transaction_id: TransactionId,
    /// Registered recipient, if any
    pub user_id: Option<UserId>,
    #[schema(example = 250000)]
    pub amount: i64,
    pub currency: Currency,
    /// Recipient user id, momo number, or `UNREGISTERED USER`
    pub released_to: String,
    pub settlement_type: SettlementType,
    pub payout_status: PayoutStatus,
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}
