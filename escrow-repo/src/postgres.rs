//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use escrow_types::domain::{
    Dispute, DisputeId, DisputeStatus, DisputeStatusCount, Payment, PaymentStatus,
    PayoutStatus, Settlement, SettlementId, Shop, ShopId, Transaction, TransactionId,
    TransactionStatus, User, UserId,
};
use escrow_types::ports::{
    DisputeResolution, EscrowRepository, NewDispute, NewPayment, NewSettlement, NewShop,
    NewTransaction, NewUser, PartyBinding, ShopChanges, TransactionChanges, UserChanges,
};
use escrow_types::{DomainError, PageRequest, RepoError, TransactionFilter, TransactionStats};

use crate::codes;
use crate::types::{
    DISPUTE_COLUMNS, DbDispute, DbPayment, DbSettlement, DbShop, DbStats, DbStatusCount,
    DbTransaction, DbUser, PAYMENT_COLUMNS, SETTLEMENT_COLUMNS, SHOP_COLUMNS,
    TRANSACTION_COLUMNS, USER_COLUMNS, contains_pattern, map_db_err, map_tx_err,
    with_fresh_code,
};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository. State transitions are conditional updates inside a
/// database transaction.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
        "0001",
    )
    .await
}

const FILTER_WHERE: &str = "($1::TEXT IS NULL OR status = $1) \
     AND ($2::UUID IS NULL OR buyer_id = $2) \
     AND ($3::UUID IS NULL OR seller_id = $3) \
     AND ($4::TEXT IS NULL OR trans_code = $4) \
     AND ($5::TEXT IS NULL OR initiated_by = $5)";

/// Explains why a conditional status update touched no row.
async fn transition_error(
    conn: &mut PgConnection,
    id: Uuid,
    expected: TransactionStatus,
) -> RepoError {
    let status: Result<Option<(String,)>, _> =
        sqlx::query_as("SELECT status FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await;

    match status {
        Ok(None) => RepoError::NotFound,
        Ok(Some((actual,))) => match actual.parse::<TransactionStatus>() {
            Ok(actual) => RepoError::Domain(DomainError::InvalidState { expected, actual }),
            Err(e) => RepoError::Domain(e),
        },
        Err(e) => map_db_err(e),
    }
}

async fn insert_settlement(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    settlement: &NewSettlement,
) -> Result<Settlement, RepoError> {
    let sql = format!(
        "INSERT INTO settlements (id, transaction_id, user_id, amount, currency, released_to, \
         settlement_type, payout_status, payout_reference, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', NULL, $8) RETURNING {}",
        SETTLEMENT_COLUMNS
    );
    let row: DbSettlement = sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(transaction_id)
        .bind(settlement.user_id.map(UserId::into_uuid))
        .bind(settlement.amount)
        .bind(settlement.currency.as_str())
        .bind(&settlement.released_to)
        .bind(settlement.settlement_type.as_str())
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .map_err(map_db_err)?;

    row.into_domain()
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl EscrowRepository for PostgresRepo {
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, name, email, phone, user_code, password_hash, is_admin, \
             is_blocked, push_token, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NULL, $8, $8) RETURNING {}",
            USER_COLUMNS
        );
        let (sql, user, pool) = (sql.as_str(), &user, &self.pool);
        let row: DbUser = with_fresh_code("user_code", codes::user_code, |code| async move {
            sqlx::query_as::<_, DbUser>(sql)
                .bind(Uuid::new_v4())
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.phone)
                .bind(code)
                .bind(&user.password_hash)
                .bind(user.is_admin)
                .bind(now)
                .fetch_one(pool)
                .await
        })
        .await?;

        row.into_domain()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE phone = $1", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_code(&self, code: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE user_code = $1", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        let rows: Vec<DbUser> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbUser::into_domain).collect()
    }

    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             phone = COALESCE($4, phone), updated_at = $5 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.phone)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, RepoError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id.into_uuid())
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_user_blocked(
        &self,
        id: UserId,
        blocked: bool,
    ) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET is_blocked = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(blocked)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn set_push_token(&self, id: UserId, token: Option<&str>) -> Result<bool, RepoError> {
        let result = sqlx::query("UPDATE users SET push_token = $2, updated_at = $3 WHERE id = $1")
            .bind(id.into_uuid())
            .bind(token)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction, RepoError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO transactions (id, trans_code, title, description, amount, currency, \
             commission_fee, buyer_id, seller_id, initiated_by, initiator_accepted, \
             counterparty_accepted, counterparty_phone, seller_momo_number, delivery_number, \
             item_image, status, is_funded, release_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, FALSE, $11, $12, $13, $14, \
             'PENDING', FALSE, NULL, $15, $15) RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let (sql, tx, pool) = (sql.as_str(), &tx, &self.pool);
        let row: DbTransaction =
            with_fresh_code("trans_code", codes::transaction_code, |code| async move {
                sqlx::query_as::<_, DbTransaction>(sql)
                    .bind(Uuid::new_v4())
                    .bind(code)
                    .bind(&tx.title)
                    .bind(&tx.description)
                    .bind(tx.amount)
                    .bind(tx.currency.as_str())
                    .bind(tx.commission_fee)
                    .bind(tx.buyer_id.map(UserId::into_uuid))
                    .bind(tx.seller_id.map(UserId::into_uuid))
                    .bind(tx.initiated_by.as_str())
                    .bind(&tx.counterparty_phone)
                    .bind(&tx.seller_momo_number)
                    .bind(&tx.delivery_number)
                    .bind(&tx.item_image)
                    .bind(now)
                    .fetch_one(pool)
                    .await
            })
            .await?;

        row.into_domain()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);
        let row: Option<DbTransaction> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn find_transaction_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE trans_code = $1",
            TRANSACTION_COLUMNS
        );
        let row: Option<DbTransaction> = sqlx::query_as(&sql)
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, i64), RepoError> {
        let status = filter.status.map(|s| s.as_str());
        let buyer = filter.buyer_id.map(UserId::into_uuid);
        let seller = filter.seller_id.map(UserId::into_uuid);
        let code = filter.trans_code.as_deref().map(str::to_uppercase);
        let initiated_by = filter.initiated_by.map(|r| r.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM transactions WHERE {}", FILTER_WHERE);
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(status)
            .bind(buyer)
            .bind(seller)
            .bind(&code)
            .bind(initiated_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        let sql = format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            TRANSACTION_COLUMNS, FILTER_WHERE
        );
        let rows: Vec<DbTransaction> = sqlx::query_as(&sql)
            .bind(status)
            .bind(buyer)
            .bind(seller)
            .bind(&code)
            .bind(initiated_by)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        let items = rows
            .into_iter()
            .map(DbTransaction::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn list_transactions_for_user(
        &self,
        user: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE buyer_id = $1 OR seller_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
            TRANSACTION_COLUMNS
        );
        let rows: Vec<DbTransaction> = sqlx::query_as(&sql)
            .bind(user.into_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn transaction_stats(&self) -> Result<TransactionStats, RepoError> {
        let row: DbStats = sqlx::query_as(
            r#"SELECT COUNT(*) AS total_transactions,
                      COALESCE(SUM(amount), 0)::BIGINT AS total_value,
                      COUNT(*) FILTER (WHERE status = 'IN_ESCROW') AS in_escrow,
                      COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed,
                      COUNT(*) FILTER (WHERE status = 'DISPUTED') AS disputed
               FROM transactions"#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.into())
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        changes: TransactionChanges,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!(
            "UPDATE transactions SET title = COALESCE($2, title), \
             description = COALESCE($3, description), amount = COALESCE($4, amount), \
             commission_fee = COALESCE($5, commission_fee), \
             seller_momo_number = COALESCE($6, seller_momo_number), \
             delivery_number = COALESCE($7, delivery_number), updated_at = $8 \
             WHERE id = $1 AND status = 'PENDING' RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let row: Option<DbTransaction> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.amount)
            .bind(changes.commission_fee)
            .bind(&changes.seller_momo_number)
            .bind(&changes.delivery_number)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        match row {
            Some(row) => row.into_domain().map(Some),
            None => {
                let mut conn = self.pool.acquire().await.map_err(map_db_err)?;
                match transition_error(&mut conn, id.into_uuid(), TransactionStatus::Pending)
                    .await
                {
                    RepoError::NotFound => Ok(None),
                    e => Err(e),
                }
            }
        }
    }

    async fn set_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!(
            "UPDATE transactions SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let row: Option<DbTransaction> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(status.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn accept_transaction(
        &self,
        id: TransactionId,
        binding: Option<PartyBinding>,
    ) -> Result<Transaction, RepoError> {
        let role = binding.map(|b| b.role.as_str());
        let user = binding.map(|b| b.user_id.into_uuid());

        let sql = format!(
            "UPDATE transactions SET counterparty_accepted = TRUE, status = 'ACCEPTED', \
             buyer_id = CASE WHEN $2::TEXT = 'BUYER' THEN $3::UUID ELSE buyer_id END, \
             seller_id = CASE WHEN $2::TEXT = 'SELLER' THEN $3::UUID ELSE seller_id END, \
             updated_at = $4 \
             WHERE id = $1 AND status = 'PENDING' AND counterparty_accepted = FALSE \
             AND ($2::TEXT IS NULL \
                  OR ($2::TEXT = 'BUYER' AND buyer_id IS NULL) \
                  OR ($2::TEXT = 'SELLER' AND seller_id IS NULL)) \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let row: Option<DbTransaction> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(role)
            .bind(user)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        match row {
            Some(row) => row.into_domain(),
            None => match self.get_transaction(id).await? {
                None => Err(RepoError::NotFound),
                Some(_) => Err(RepoError::Conflict(
                    "Transaction was accepted concurrently".into(),
                )),
            },
        }
    }

    async fn record_payment(
        &self,
        id: TransactionId,
        payment: NewPayment,
    ) -> Result<(Transaction, Payment), RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(map_tx_err)?;

        let row: Option<DbTransaction> = if payment.status == PaymentStatus::Success {
            let sql = format!(
                "UPDATE transactions SET is_funded = TRUE, status = 'IN_ESCROW', updated_at = $2 \
                 WHERE id = $1 AND status = 'ACCEPTED' RETURNING {}",
                TRANSACTION_COLUMNS
            );
            sqlx::query_as(&sql)
                .bind(id.into_uuid())
                .bind(Utc::now())
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(map_db_err)?
        } else {
            let sql = format!(
                "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
                TRANSACTION_COLUMNS
            );
            sqlx::query_as(&sql)
                .bind(id.into_uuid())
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(map_db_err)?
        };

        let transaction = match row {
            Some(row) => row.into_domain()?,
            None => {
                return Err(
                    transition_error(&mut *db_tx, id.into_uuid(), TransactionStatus::Accepted)
                        .await,
                );
            }
        };

        let sql = format!(
            "INSERT INTO payments (id, transaction_id, user_id, amount, currency, payment_method, \
             reference, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            PAYMENT_COLUMNS
        );
        let payment_row: DbPayment = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(id.into_uuid())
            .bind(payment.user_id.into_uuid())
            .bind(payment.amount)
            .bind(payment.currency.as_str())
            .bind(payment.payment_method.as_str())
            .bind(&payment.reference)
            .bind(payment.status.as_str())
            .bind(Utc::now())
            .fetch_one(&mut *db_tx)
            .await
            .map_err(map_db_err)?;

        db_tx.commit().await.map_err(map_tx_err)?;

        Ok((transaction, payment_row.into_domain()?))
    }

    async fn release_funds(
        &self,
        id: TransactionId,
        settlement: NewSettlement,
    ) -> Result<Settlement, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(map_tx_err)?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"UPDATE transactions SET status = 'COMPLETED', release_date = $2, updated_at = $2
               WHERE id = $1 AND status = 'IN_ESCROW'"#,
        )
        .bind(id.into_uuid())
        .bind(now)
        .execute(&mut *db_tx)
        .await
        .map_err(map_db_err)?;

        if updated.rows_affected() == 0 {
            return Err(
                transition_error(&mut *db_tx, id.into_uuid(), TransactionStatus::InEscrow).await,
            );
        }

        let settlement = insert_settlement(&mut *db_tx, id.into_uuid(), &settlement).await?;

        db_tx.commit().await.map_err(map_tx_err)?;

        Ok(settlement)
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_payment_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Payment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE transaction_id = $1 ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbPayment::into_domain).transpose()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Disputes
    // ─────────────────────────────────────────────────────────────────────────

    async fn open_dispute(&self, dispute: NewDispute) -> Result<Dispute, RepoError> {
        let tx_id = dispute.transaction_id.into_uuid();
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await.map_err(map_tx_err)?;

        let updated = sqlx::query(
            r#"UPDATE transactions SET status = 'DISPUTED', updated_at = $2
               WHERE id = $1 AND status = 'IN_ESCROW'"#,
        )
        .bind(tx_id)
        .bind(now)
        .execute(&mut *db_tx)
        .await
        .map_err(map_db_err)?;

        if updated.rows_affected() == 0 {
            return Err(transition_error(&mut *db_tx, tx_id, TransactionStatus::InEscrow).await);
        }

        let sql = format!(
            "INSERT INTO disputes (id, transaction_id, raised_by, reason, evidence_url, status, \
             resolution, resolved_by, resolved_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'OPEN', NULL, NULL, NULL, $6) RETURNING {}",
            DISPUTE_COLUMNS
        );
        let row: DbDispute = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(tx_id)
            .bind(dispute.raised_by.into_uuid())
            .bind(&dispute.reason)
            .bind(&dispute.evidence_url)
            .bind(now)
            .fetch_one(&mut *db_tx)
            .await
            .map_err(map_db_err)?;

        db_tx.commit().await.map_err(map_tx_err)?;

        row.into_domain()
    }

    async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, RepoError> {
        let sql = format!("SELECT {} FROM disputes WHERE id = $1", DISPUTE_COLUMNS);
        let row: Option<DbDispute> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbDispute::into_domain).transpose()
    }

    async fn list_disputes(
        &self,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, RepoError> {
        let sql = format!(
            "SELECT {} FROM disputes WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC",
            DISPUTE_COLUMNS
        );
        let rows: Vec<DbDispute> = sqlx::query_as(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbDispute::into_domain).collect()
    }

    async fn list_disputes_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<Dispute>, RepoError> {
        let sql = format!(
            "SELECT {} FROM disputes WHERE transaction_id = $1 ORDER BY created_at DESC",
            DISPUTE_COLUMNS
        );
        let rows: Vec<DbDispute> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbDispute::into_domain).collect()
    }

    async fn list_disputes_for_user(&self, user: UserId) -> Result<Vec<Dispute>, RepoError> {
        let sql = format!(
            "SELECT {} FROM disputes WHERE raised_by = $1 ORDER BY created_at DESC",
            DISPUTE_COLUMNS
        );
        let rows: Vec<DbDispute> = sqlx::query_as(&sql)
            .bind(user.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbDispute::into_domain).collect()
    }

    async fn count_disputes_by_status(
        &self,
        user: UserId,
    ) -> Result<DisputeStatusCount, RepoError> {
        let rows: Vec<DbStatusCount> = sqlx::query_as(
            r#"SELECT status, COUNT(*) AS total FROM disputes WHERE raised_by = $1 GROUP BY status"#,
        )
        .bind(user.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut counts = DisputeStatusCount::default();
        for row in rows {
            counts.add(row.status()?, row.total);
        }
        Ok(counts)
    }

    async fn update_dispute_status(
        &self,
        id: DisputeId,
        status: DisputeStatus,
    ) -> Result<Option<Dispute>, RepoError> {
        let resolved_at = (!status.is_active()).then(Utc::now);
        let sql = format!(
            "UPDATE disputes SET status = $2, resolved_at = COALESCE($3, resolved_at) \
             WHERE id = $1 RETURNING {}",
            DISPUTE_COLUMNS
        );
        let row: Option<DbDispute> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(status.as_str())
            .bind(resolved_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbDispute::into_domain).transpose()
    }

    async fn settle_dispute(
        &self,
        id: TransactionId,
        settlement: NewSettlement,
        resolution: DisputeResolution,
    ) -> Result<Settlement, RepoError> {
        let tx_id = id.into_uuid();
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await.map_err(map_tx_err)?;

        let updated = sqlx::query(
            r#"UPDATE transactions SET status = 'COMPLETED', release_date = $2, updated_at = $2
               WHERE id = $1 AND status = 'DISPUTED'"#,
        )
        .bind(tx_id)
        .bind(now)
        .execute(&mut *db_tx)
        .await
        .map_err(map_db_err)?;

        if updated.rows_affected() == 0 {
            return Err(transition_error(&mut *db_tx, tx_id, TransactionStatus::Disputed).await);
        }

        let settlement = insert_settlement(&mut *db_tx, tx_id, &settlement).await?;

        sqlx::query(
            r#"UPDATE disputes SET status = 'RESOLVED', resolution = $2, resolved_by = $3, resolved_at = $4
               WHERE transaction_id = $1 AND status IN ('OPEN', 'INPROGRESS')"#,
        )
        .bind(tx_id)
        .bind(&resolution.resolution)
        .bind(resolution.resolved_by.into_uuid())
        .bind(now)
        .execute(&mut *db_tx)
        .await
        .map_err(map_db_err)?;

        db_tx.commit().await.map_err(map_tx_err)?;

        Ok(settlement)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settlements
    // ─────────────────────────────────────────────────────────────────────────

    async fn list_settlements(&self) -> Result<Vec<Settlement>, RepoError> {
        let sql = format!(
            "SELECT {} FROM settlements ORDER BY created_at DESC",
            SETTLEMENT_COLUMNS
        );
        let rows: Vec<DbSettlement> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbSettlement::into_domain).collect()
    }

    async fn update_payout(
        &self,
        id: SettlementId,
        status: PayoutStatus,
        reference: Option<String>,
    ) -> Result<Option<Settlement>, RepoError> {
        let sql = format!(
            "UPDATE settlements SET payout_status = $2, \
             payout_reference = COALESCE($3, payout_reference) WHERE id = $1 RETURNING {}",
            SETTLEMENT_COLUMNS
        );
        let row: Option<DbSettlement> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(status.as_str())
            .bind(&reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbSettlement::into_domain).transpose()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shops
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_shop(&self, shop: NewShop) -> Result<Shop, RepoError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO shops (id, shop_code, shop_name, description, momo_number, email, \
             address, location, icon, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING {}",
            SHOP_COLUMNS
        );
        let (sql, shop, pool) = (sql.as_str(), &shop, &self.pool);
        let row: DbShop = with_fresh_code("shop_code", codes::shop_code, |code| async move {
            sqlx::query_as::<_, DbShop>(sql)
                .bind(Uuid::new_v4())
                .bind(code)
                .bind(&shop.shop_name)
                .bind(&shop.description)
                .bind(&shop.momo_number)
                .bind(&shop.email)
                .bind(&shop.address)
                .bind(&shop.location)
                .bind(&shop.icon)
                .bind(shop.owner_id.into_uuid())
                .bind(now)
                .fetch_one(pool)
                .await
        })
        .await?;

        row.into_domain()
    }

    async fn get_shop(&self, id: ShopId) -> Result<Option<Shop>, RepoError> {
        let sql = format!("SELECT {} FROM shops WHERE id = $1", SHOP_COLUMNS);
        let row: Option<DbShop> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbShop::into_domain).transpose()
    }

    async fn find_shop_by_name(&self, name: &str) -> Result<Option<Shop>, RepoError> {
        let sql = format!(
            "SELECT {} FROM shops WHERE LOWER(shop_name) = LOWER($1)",
            SHOP_COLUMNS
        );
        let row: Option<DbShop> = sqlx::query_as(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbShop::into_domain).transpose()
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, RepoError> {
        let sql = format!("SELECT {} FROM shops ORDER BY created_at DESC", SHOP_COLUMNS);
        let rows: Vec<DbShop> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbShop::into_domain).collect()
    }

    async fn search_shops(&self, identifier: &str) -> Result<Vec<Shop>, RepoError> {
        let sql = format!(
            "SELECT {} FROM shops \
             WHERE shop_code = UPPER($1) OR shop_name ILIKE $2 ESCAPE '\\' OR momo_number = $1 \
             ORDER BY created_at DESC",
            SHOP_COLUMNS
        );
        let rows: Vec<DbShop> = sqlx::query_as(&sql)
            .bind(identifier.trim())
            .bind(contains_pattern(identifier.trim()))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbShop::into_domain).collect()
    }

    async fn list_shops_for_owner(&self, owner: UserId) -> Result<Vec<Shop>, RepoError> {
        let sql = format!(
            "SELECT {} FROM shops WHERE owner_id = $1 ORDER BY created_at DESC",
            SHOP_COLUMNS
        );
        let rows: Vec<DbShop> = sqlx::query_as(&sql)
            .bind(owner.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(DbShop::into_domain).collect()
    }

    async fn update_shop(
        &self,
        id: ShopId,
        changes: ShopChanges,
    ) -> Result<Option<Shop>, RepoError> {
        let sql = format!(
            "UPDATE shops SET shop_name = COALESCE($2, shop_name), \
             description = COALESCE($3, description), momo_number = COALESCE($4, momo_number), \
             email = COALESCE($5, email), address = COALESCE($6, address), \
             location = COALESCE($7, location), icon = COALESCE($8, icon), updated_at = $9 \
             WHERE id = $1 RETURNING {}",
            SHOP_COLUMNS
        );
        let row: Option<DbShop> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(&changes.shop_name)
            .bind(&changes.description)
            .bind(&changes.momo_number)
            .bind(&changes.email)
            .bind(&changes.address)
            .bind(&changes.location)
            .bind(&changes.icon)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(DbShop::into_domain).transpose()
    }

    async fn delete_shop(&self, id: ShopId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM shops WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
