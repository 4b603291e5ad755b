//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    Currency, Dispute, DisputeStatus, PartyRole, Payment, PaymentMethod, PaymentStatus, Shop,
    Transaction, TransactionId, TransactionStatus, UserId, UserSummary,
};

pub use escrow_fees::{CommissionQuote, Percentage};

// ─────────────────────────────────────────────────────────────────────────────
// Common
// ─────────────────────────────────────────────────────────────────────────────

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Dispute created successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<i64>,
    /// Page size (default 10, max 100)
    pub limit: Option<i64>,
}

/// Normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;
    /// Highest page whose offset still fits in an `i64`.
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_LIMIT;

    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, Self::MAX_PAGE),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` rows.
    pub fn last_page(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

impl From<PageQuery> for PageRequest {
    fn from(q: PageQuery) -> Self {
        Self::new(q.page.unwrap_or(1), q.limit.unwrap_or(Self::DEFAULT_LIMIT))
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub last_page: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// User DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ama Mensah")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[schema(example = "0241234567")]
    pub phone: String,
    /// At least 6 characters with an uppercase letter, a digit and one of `!@#$%^&*`
    #[schema(example = "Secret1!")]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "0241234567")]
    pub phone: String,
    pub password: String,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub phone: String,
    /// OTP received by SMS
    #[schema(example = "482913")]
    pub code: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PushTokenRequest {
    #[schema(example = "ExponentPushToken[xxxxxxxxxxxxxxxxxxxxxx]")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlockUserRequest {
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtpVerification {
    pub verified: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the `payload` field when creating a transaction.
///
/// The authenticated user is the initiator. The counterparty is looked up by
/// `counterparty_code`, then `counterparty_phone`; it may be unregistered.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    #[schema(example = "iPhone 13, 128GB")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Amount in smallest currency unit
    #[schema(example = 250000)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Currency,
    /// The initiator's side of the deal
    pub initiate_by: PartyRole,
    #[serde(default)]
    pub counterparty_code: Option<String>,
    #[serde(default)]
    pub counterparty_phone: Option<String>,
    #[serde(default)]
    pub seller_momo_number: Option<String>,
    #[serde(default)]
    pub delivery_number: Option<String>,
    /// Overrides the computed commission (smallest currency unit)
    #[serde(default)]
    pub commission_fee: Option<i64>,
}

/// Acknowledgement carrying the affected transaction id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionAck {
    #[schema(example = "Transaction created successfully")]
    pub message: String,
    pub id: TransactionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTransactionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<i64>,
    pub seller_momo_number: Option<String>,
    pub delivery_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionStatusResponse {
    pub id: TransactionId,
    pub status: TransactionStatus,
}

/// Buyer-side payment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[schema(example = "T8821773412")]
    pub reference: String,
    pub status: PaymentStatus,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Momo
}

/// Signed notification from the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCallback {
    #[schema(example = "ESGH-4F7K2Q")]
    pub trans_code: String,
    pub reference: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentConfirmation {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = "Transaction paid successfully")]
    pub message: String,
}

/// Query filters for the admin transaction listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub trans_code: Option<String>,
    pub initiated_by: Option<PartyRole>,
}

/// Platform-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionStats {
    pub total_transactions: i64,
    /// Sum of all transaction amounts, smallest currency unit
    pub total_value: i64,
    pub in_escrow: i64,
    pub completed: i64,
    pub disputed: i64,
}

/// Totals for one user's purchases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserStatistics {
    pub total_transactions: i64,
    pub pending_payments: i64,
    /// Sum of completed purchases, smallest currency unit
    pub total_amount: i64,
    pub disputes_count: i64,
    /// Percentage of purchases without an active dispute, 2 decimals
    #[schema(example = 87.5)]
    pub success_rate: f64,
}

/// A transaction with its parties, latest dispute and payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionDetails {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub buyer: Option<UserSummary>,
    pub seller: Option<UserSummary>,
    pub dispute: Option<Dispute>,
    pub payment: Option<Payment>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispute DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the `payload` field when opening a dispute.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpenDisputeRequest {
    #[schema(example = "Item never delivered")]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettleDisputeRequest {
    /// Refund the buyer when true, release to the seller otherwise
    pub settle_to_buyer: bool,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDisputeStatusRequest {
    pub status: DisputeStatus,
}

/// Status filter for dispute listings, validated by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
pub struct DisputeQuery {
    /// One of OPEN, INPROGRESS, RESOLVED, REJECTED
    pub status: Option<String>,
}

/// A dispute with the user who raised it and the disputed transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DisputeDetails {
    #[serde(flatten)]
    pub dispute: Dispute,
    pub user: Option<UserSummary>,
    pub transaction: Option<Transaction>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shop DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the `payload` field when creating a shop.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateShopRequest {
    #[schema(example = "Adwoa's Gadgets")]
    pub shop_name: String,
    pub description: String,
    pub momo_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateShopRequest {
    pub shop_name: Option<String>,
    pub description: Option<String>,
    pub momo_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShopDetails {
    #[serde(flatten)]
    pub shop: Shop,
    pub owner: Option<UserSummary>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendNotificationRequest {
    /// Expo push token of the target device
    pub token: String,
    pub title: String,
    pub message: String,
}
