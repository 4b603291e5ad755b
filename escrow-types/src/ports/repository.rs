//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory test doubles) implement this trait.

use crate::domain::{
    Currency, Dispute, DisputeId, DisputeStatus, DisputeStatusCount, PartyRole, Payment,
    PaymentMethod, PaymentStatus, PayoutStatus, Settlement, SettlementId, SettlementType, Shop,
    ShopId, Transaction, TransactionId, TransactionStatus, User, UserId,
};
use crate::dto::{PageRequest, TransactionFilter, TransactionStats};
use crate::error::RepoError;

// ─────────────────────────────────────────────────────────────────────────────
// Write models
// ─────────────────────────────────────────────────────────────────────────────

/// A user ready to be persisted. The adapter assigns id and `user_code`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A transaction ready to be persisted. The adapter assigns id and `trans_code`;
/// it is stored as PENDING with only the initiator's acceptance.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub title: String,
    pub description: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub commission_fee: i64,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub initiated_by: PartyRole,
    pub counterparty_phone: Option<String>,
    pub seller_momo_number: Option<String>,
    pub delivery_number: Option<String>,
    pub item_image: Option<String>,
}

/// Partial transaction update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<i64>,
    pub commission_fee: Option<i64>,
    pub seller_momo_number: Option<String>,
    pub delivery_number: Option<String>,
}

/// Binds an accepting user into an empty side of the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyBinding {
    pub role: PartyRole,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub amount: i64,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub reference: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub user_id: Option<UserId>,
    pub amount: i64,
    pub currency: Currency,
    pub released_to: String,
    pub settlement_type: SettlementType,
}

#[derive(Debug, Clone)]
pub struct NewDispute {
    pub transaction_id: TransactionId,
    pub raised_by: UserId,
    pub reason: String,
    pub evidence_url: Option<String>,
}

/// How the active disputes of a settled transaction are closed.
#[derive(Debug, Clone)]
pub struct DisputeResolution {
    pub resolution: String,
    pub resolved_by: UserId,
}

/// A shop ready to be persisted. The adapter assigns id and `shop_code`.
#[derive(Debug, Clone)]
pub struct NewShop {
    pub shop_name: String,
    pub description: String,
    pub momo_number: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub icon: Option<String>,
    pub owner_id: UserId,
}

/// Partial shop update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ShopChanges {
    pub shop_name: Option<String>,
    pub description: Option<String>,
    pub momo_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub icon: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Port
// ─────────────────────────────────────────────────────────────────────────────

/// The repository port for the escrow service.
///
/// Status transitions that create rows (funding, release, dispute, settlement)
/// MUST be atomic and conditional on the expected current status, returning
/// `RepoError::Conflict` when the transaction is no longer in that status.
/// Unique-constraint violations are reported as `RepoError::Conflict`.
#[async_trait::async_trait]
pub trait EscrowRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError>;

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError>;

    async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, RepoError>;

    /// Lists all users, newest first.
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;

    async fn update_user(&self, id: UserId, changes: UserChanges)
    -> Result<Option<User>, RepoError>;

    /// Replaces the password hash. Returns false when the user does not exist.
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, RepoError>;

    async fn set_user_blocked(&self, id: UserId, blocked: bool)
    -> Result<Option<User>, RepoError>;

    async fn set_push_token(&self, id: UserId, token: Option<&str>) -> Result<bool, RepoError>;

    /// Deletes a user. Fails with `Conflict` while financial records reference them.
    async fn delete_user(&self, id: UserId) -> Result<bool, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction, RepoError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    async fn find_transaction_by_code(&self, code: &str)
    -> Result<Option<Transaction>, RepoError>;

    /// Filtered page, newest first, with the total number of matches.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, i64), RepoError>;

    /// Transactions where the user is buyer or seller, newest first.
    async fn list_transactions_for_user(
        &self,
        user: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>, RepoError>;

    async fn transaction_stats(&self) -> Result<TransactionStats, RepoError>;

    async fn update_transaction(
        &self,
        id: TransactionId,
        changes: TransactionChanges,
    ) -> Result<Option<Transaction>, RepoError>;

    /// Unconditional status override.
    async fn set_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, RepoError>;

    /// PENDING → ACCEPTED, only if the counterparty has not accepted yet.
    async fn accept_transaction(
        &self,
        id: TransactionId,
        binding: Option<PartyBinding>,
    ) -> Result<Transaction, RepoError>;

    /// Records a payment. A SUCCESS payment also moves ACCEPTED → IN_ESCROW
    /// and marks the transaction funded, in the same database transaction.
    async fn record_payment(
        &self,
        id: TransactionId,
        payment: NewPayment,
    ) -> Result<(Transaction, Payment), RepoError>;

    /// IN_ESCROW → COMPLETED together with the settlement row.
    async fn release_funds(
        &self,
        id: TransactionId,
        settlement: NewSettlement,
    ) -> Result<Settlement, RepoError>;

    async fn delete_transaction(&self, id: TransactionId) -> Result<bool, RepoError>;

    /// Latest payment recorded for a transaction.
    async fn get_payment_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Payment>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Disputes
    // ─────────────────────────────────────────────────────────────────────────────

    /// IN_ESCROW → DISPUTED together with a new OPEN dispute.
    async fn open_dispute(&self, dispute: NewDispute) -> Result<Dispute, RepoError>;

    async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, RepoError>;

    /// All disputes, optionally filtered by status, newest first.
    async fn list_disputes(&self, status: Option<DisputeStatus>)
    -> Result<Vec<Dispute>, RepoError>;

    async fn list_disputes_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<Dispute>, RepoError>;

    async fn list_disputes_for_user(&self, user: UserId) -> Result<Vec<Dispute>, RepoError>;

    async fn count_disputes_by_status(&self, user: UserId)
    -> Result<DisputeStatusCount, RepoError>;

    async fn update_dispute_status(
        &self,
        id: DisputeId,
        status: DisputeStatus,
    ) -> Result<Option<Dispute>, RepoError>;

    /// DISPUTED → COMPLETED: inserts the settlement and resolves every active
    /// dispute of the transaction, atomically.
    async fn settle_dispute(
        &self,
        id: TransactionId,
        settlement: NewSettlement,
        resolution: DisputeResolution,
    ) -> Result<Settlement, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Settlements
    // ─────────────────────────────────────────────────────────────────────────────

    async fn list_settlements(&self) -> Result<Vec<Settlement>, RepoError>;

    async fn update_payout(
        &self,
        id: SettlementId,
        status: PayoutStatus,
        reference: Option<String>,
    ) -> Result<Option<Settlement>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Shops
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_shop(&self, shop: NewShop) -> Result<Shop, RepoError>;

    async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, RepoError>;

    async fn find_shop_by_name(&self, name: &str) -> Result<Option<Shop>, RepoError>;

    async fn list_shops(&self) -> Result<Vec<Shop>, RepoError>;

    /// Exact shop code, case-insensitive name substring, or exact momo number.
    async fn search_shops(&self, identifier: &str) -> Result<Vec<Shop>, RepoError>;

    async fn list_shops_for_owner(&self, owner: UserId) -> Result<Vec<Shop>, RepoError>;

    async fn update_shop(&self, id: ShopId, changes: ShopChanges)
    -> Result<Option<Shop>, RepoError>;

    async fn delete_shop(&self, id: ShopId) -> Result<bool, RepoError>;
}
