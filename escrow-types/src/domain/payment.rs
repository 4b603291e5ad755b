//! Payment domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::{PaymentId, TransactionId, UserId};
use super::money::Currency;

labelled_enum! {
    /// Channel the buyer paid through.
    PaymentMethod {
        Momo => "MOMO",
        Card => "CARD",
    }
}

labelled_enum! {
    /// Outcome reported by the payment processor.
    PaymentStatus {
        Pending => "PENDING",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
}

/// A buyer's payment into escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    #[schema(example = 250000)]
    pub amount: i64,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    /// Processor reference
    #[schema(example = "T8821773412")]
    pub reference: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}
