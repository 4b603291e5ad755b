//! Database row types shared by the SQL adapters.
//!
//! Ids are stored as UUIDs (BLOB in SQLite) and timestamps as UTC date-times
//! (TEXT in SQLite), so the same rows decode from either backend. Enum columns
//! hold the upper-case labels and are parsed back through `FromStr`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use escrow_types::domain::{
    Currency, Dispute, DisputeId, DisputeStatus, PartyRole, Payment, PaymentId, PaymentMethod,
    PaymentStatus, PayoutStatus, Settlement, SettlementId, SettlementType, Shop, ShopId,
    Transaction, TransactionId, TransactionStatus, User, UserId,
};
use escrow_types::{RepoError, TransactionStats};

pub(crate) const USER_COLUMNS: &str = "id, name, email, phone, user_code, password_hash, \
     is_admin, is_blocked, push_token, created_at, updated_at";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, trans_code, title, description, amount, \
     currency, commission_fee, buyer_id, seller_id, initiated_by, initiator_accepted, \
     counterparty_accepted, counterparty_phone, seller_momo_number, delivery_number, \
     item_image, status, is_funded, release_date, created_at, updated_at";

pub(crate) const PAYMENT_COLUMNS: &str = "id, transaction_id, user_id, amount, currency, \
     payment_method, reference, status, created_at";

pub(crate) const DISPUTE_COLUMNS: &str = "id, transaction_id, raised_by, reason, evidence_url, \
     status, resolution, resolved_by, resolved_at, created_at";

pub(crate) const SETTLEMENT_COLUMNS: &str = "id, transaction_id, user_id, amount, currency, \
     released_to, settlement_type, payout_status, payout_reference, created_at";

pub(crate) const SHOP_COLUMNS: &str = "id, shop_code, shop_name, description, momo_number, \
     email, address, location, icon, owner_id, created_at, updated_at";

/// Maps a sqlx error, turning constraint violations into `Conflict`.
pub(crate) fn map_db_err(e: sqlx::Error) -> RepoError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return RepoError::Conflict(format!("Duplicate field: {}", db.message()));
        }
        if db.is_foreign_key_violation() {
            return RepoError::Conflict(format!("Referenced by other records: {}", db.message()));
        }
    }
    RepoError::Database(e.to_string())
}

pub(crate) fn map_tx_err(e: sqlx::Error) -> RepoError {
    RepoError::Transaction(e.to_string())
}

/// `%needle%` for a `LIKE ... ESCAPE '\'` match, with the needle's own
/// wildcards taken literally.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Inserts tried per row before a generated-code collision is reported.
pub(crate) const CODE_ATTEMPTS: usize = 5;

/// Whether `e` is a unique violation on `column`.
///
/// SQLite names the column in the message (`users.user_code`); Postgres names
/// the constraint (`users_user_code_key`).
pub(crate) fn is_unique_violation_on(e: &sqlx::Error, column: &str) -> bool {
    e.as_database_error().is_some_and(|db| {
        db.is_unique_violation()
            && (db.message().contains(column)
                || db.constraint().is_some_and(|c| c.contains(column)))
    })
}

/// Runs `insert` with a fresh code from `generate` until the code is unique.
///
/// Only a collision on `column` is retried; any other error is mapped and
/// returned at once.
pub(crate) async fn with_fresh_code<T, G, F, Fut>(
    column: &str,
    mut generate: G,
    mut insert: F,
) -> Result<T, RepoError>
where
    G: FnMut() -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match insert(generate()).await {
            Ok(row) => return Ok(row),
            Err(e) if attempt < CODE_ATTEMPTS && is_unique_violation_on(&e, column) => {
                tracing::warn!(column, attempt, "Generated code already taken, retrying");
                attempt += 1;
            }
            Err(e) => return Err(map_db_err(e)),
        }
    }
}

fn parse<T>(value: &str) -> Result<T, RepoError>
where
    T: std::str::FromStr<Err = escrow_types::DomainError>,
{
    value.parse().map_err(RepoError::Domain)
}

// ─────────────────────────────────────────────────────────────────────────────
// Rows
// ─────────────────────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
pub(crate) struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub user_code: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn into_domain(self) -> Result<User, RepoError> {
        Ok(User {
            id: UserId::from_uuid(self.id),
            name: self.name,
            email: self.email,
            phone: self.phone,
            user_code: self.user_code,
            password_hash: self.password_hash,
            is_admin: self.is_admin,
            is_blocked: self.is_blocked,
            push_token: self.push_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbTransaction {
    pub id: Uuid,
    pub trans_code: String,
    pub title: String,
    pub description: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub commission_fee: i64,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub initiated_by: String,
    pub initiator_accepted: bool,
    pub counterparty_accepted: bool,
    pub counterparty_phone: Option<String>,
    pub seller_momo_number: Option<String>,
    pub delivery_number: Option<String>,
    pub item_image: Option<String>,
    pub status: String,
    pub is_funded: bool,
    pub release_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbTransaction {
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        Ok(Transaction {
            id: TransactionId::from_uuid(self.id),
            trans_code: self.trans_code,
            title: self.title,
            description: self.description,
            amount: self.amount,
            currency: parse::<Currency>(&self.currency)?,
            commission_fee: self.commission_fee,
            buyer_id: self.buyer_id.map(UserId::from_uuid),
            seller_id: self.seller_id.map(UserId::from_uuid),
            initiated_by: parse::<PartyRole>(&self.initiated_by)?,
            initiator_accepted: self.initiator_accepted,
            counterparty_accepted: self.counterparty_accepted,
            counterparty_phone: self.counterparty_phone,
            seller_momo_number: self.seller_momo_number,
            delivery_number: self.delivery_number,
            item_image: self.item_image,
            status: parse::<TransactionStatus>(&self.status)?,
            is_funded: self.is_funded,
            release_date: self.release_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbPayment {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub reference: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl DbPayment {
    pub fn into_domain(self) -> Result<Payment, RepoError> {
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            user_id: UserId::from_uuid(self.user_id),
            amount: self.amount,
            currency: parse::<Currency>(&self.currency)?,
            payment_method: parse::<PaymentMethod>(&self.payment_method)?,
            reference: self.reference,
            status: parse::<PaymentStatus>(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbDispute {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub raised_by: Uuid,
    pub reason: String,
    pub evidence_url: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DbDispute {
    pub fn into_domain(self) -> Result<Dispute, RepoError> {
        Ok(Dispute {
            id: DisputeId::from_uuid(self.id),
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            raised_by: UserId::from_uuid(self.raised_by),
            reason: self.reason,
            evidence_url: self.evidence_url,
            status: parse::<DisputeStatus>(&self.status)?,
            resolution: self.resolution,
            resolved_by: self.resolved_by.map(UserId::from_uuid),
            resolved_at: self.resolved_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbSettlement {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub released_to: String,
    pub settlement_type: String,
    pub payout_status: String,
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbSettlement {
    pub fn into_domain(self) -> Result<Settlement, RepoError> {
        Ok(Settlement {
            id: SettlementId::from_uuid(self.id),
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            user_id: self.user_id.map(UserId::from_uuid),
            amount: self.amount,
            currency: parse::<Currency>(&self.currency)?,
            released_to: self.released_to,
            settlement_type: parse::<SettlementType>(&self.settlement_type)?,
            payout_status: parse::<PayoutStatus>(&self.payout_status)?,
            payout_reference: self.payout_reference,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbShop {
    pub id: Uuid,
    pub shop_code: String,
    pub shop_name: String,
    pub description: String,
    pub momo_number: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub icon: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbShop {
    pub fn into_domain(self) -> Result<Shop, RepoError> {
        Ok(Shop {
            id: ShopId::from_uuid(self.id),
            shop_code: self.shop_code,
            shop_name: self.shop_name,
            description: self.description,
            momo_number: self.momo_number,
            email: self.email,
            address: self.address,
            location: self.location,
            icon: self.icon,
            owner_id: UserId::from_uuid(self.owner_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbStats {
    pub total_transactions: i64,
    pub total_value: i64,
    pub in_escrow: i64,
    pub completed: i64,
    pub disputed: i64,
}

impl From<DbStats> for TransactionStats {
    fn from(row: DbStats) -> Self {
        TransactionStats {
            total_transactions: row.total_transactions,
            total_value: row.total_value,
            in_escrow: row.in_escrow,
            completed: row.completed,
            disputed: row.disputed,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbStatusCount {
    pub status: String,
    pub total: i64,
}

impl DbStatusCount {
    pub fn status(&self) -> Result<DisputeStatus, RepoError> {
        parse(&self.status)
    }
}
