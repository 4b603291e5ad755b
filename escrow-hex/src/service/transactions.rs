//! Escrow transaction lifecycle: create, accept, fund, release.

use escrow_repo::security::verify_signature;
use escrow_types::domain::{
    Money, PartyRole, PaymentMethod, PaymentStatus, SettlementType, UNREGISTERED_RECIPIENT,
    normalize_phone,
};
use escrow_types::ports::{ImageUpload, NewPayment, NewSettlement, NewTransaction, PartyBinding, TransactionChanges};
use escrow_types::{
    AppError, ConfirmPaymentRequest, CreateTransactionRequest, EscrowRepository, MessageResponse,
    Page, PageRequest, PaymentCallback, PaymentConfirmation, RepoError, Transaction,
    TransactionAck, TransactionDetails, TransactionFilter, TransactionId, TransactionStats,
    TransactionStatus, TransactionStatusResponse, UpdateTransactionRequest, User,
    UserStatistics,
};

use super::{EscrowService, non_blank, require_admin};

/// Number of transactions in the "recent" listing.
const RECENT_LIMIT: i64 = 5;

const APPROVE_URL: &str = "https://escrowgh.com/approve";

/// The counterparty as named by the initiator.
struct Counterparty {
    user: Option<User>,
    phone: Option<String>,
}

impl<R: EscrowRepository> EscrowService<R> {
    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    /// Expands a transaction with its parties, latest dispute and payment.
    async fn details(&self, transaction: Transaction) -> Result<TransactionDetails, AppError> {
        let buyer = self.find_user(transaction.buyer_id).await?;
        let seller = self.find_user(transaction.seller_id).await?;
        let dispute = self
            .repo
            .list_disputes_for_transaction(transaction.id)
            .await?
            .into_iter()
            .next();
        let payment = self.repo.get_payment_for_transaction(transaction.id).await?;

        Ok(TransactionDetails {
            transaction,
            buyer: buyer.map(|u| u.summary()),
            seller: seller.map(|u| u.summary()),
            dispute,
            payment,
        })
    }

    /// Loads a transaction the caller takes part in (or any, for admins).
    async fn visible_transaction(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let tx = self.load_transaction(id).await?;
        if !caller.is_admin && !tx.is_party(caller.id) {
            return Err(AppError::Forbidden(
                "You are not a party to this transaction".into(),
            ));
        }
        Ok(tx)
    }

    pub async fn list_transactions(
        &self,
        caller: &User,
        page: PageRequest,
    ) -> Result<Page<TransactionDetails>, AppError> {
        self.filter_transactions(caller, TransactionFilter::default(), page)
            .await
    }

    pub async fn filter_transactions(
        &self,
        caller: &User,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<TransactionDetails>, AppError> {
        require_admin(caller)?;
        let (rows, total) = self.repo.list_transactions(&filter, page).await?;

        let mut data = Vec::with_capacity(rows.len());
        for tx in rows {
            data.push(self.details(tx).await?);
        }

        Ok(Page {
            data,
            total,
            page: page.page,
            last_page: page.last_page(total),
        })
    }

    pub async fn transaction_stats(&self, caller: &User) -> Result<TransactionStats, AppError> {
        require_admin(caller)?;
        Ok(self.repo.transaction_stats().await?)
    }

    pub async fn get_transaction(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<TransactionDetails, AppError> {
        let tx = self.visible_transaction(caller, id).await?;
        self.details(tx).await
    }

    /// Approval links are shared by code, so any signed-in user may look one up.
    pub async fn get_transaction_by_code(&self, code: &str) -> Result<TransactionDetails, AppError> {
        let tx = self
            .repo
            .find_transaction_by_code(code.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;
        self.details(tx).await
    }

    pub async fn get_transaction_status(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<TransactionStatusResponse, AppError> {
        let tx = self.visible_transaction(caller, id).await?;
        Ok(TransactionStatusResponse {
            id: tx.id,
            status: tx.status,
        })
    }

    pub async fn recent_transactions(&self, caller: &User) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .repo
            .list_transactions_for_user(caller.id, Some(RECENT_LIMIT))
            .await?)
    }

    pub async fn my_transactions(&self, caller: &User) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions_for_user(caller.id, None).await?)
    }

    /// Purchase statistics: only transactions where the caller is the buyer count.
    pub async fn user_statistics(&self, caller: &User) -> Result<UserStatistics, AppError> {
        let purchases: Vec<Transaction> = self
            .repo
            .list_transactions_for_user(caller.id, None)
            .await?
            .into_iter()
            .filter(|tx| tx.buyer_id == Some(caller.id))
            .collect();

        let total_transactions = purchases.len() as i64;
        let pending_payments = purchases
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .count() as i64;
        let total_amount = purchases
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .map(|tx| tx.amount)
            .sum();
        let disputes_count = self
            .repo
            .count_disputes_by_status(caller.id)
            .await?
            .active();

        Ok(UserStatistics {
            total_transactions,
            pending_payments,
            total_amount,
            disputes_count,
            success_rate: success_rate(total_transactions, disputes_count),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Creation & edits
    // ─────────────────────────────────────────────────────────────────────────────

    async fn resolve_counterparty(
        &self,
        req: &CreateTransactionRequest,
    ) -> Result<Counterparty, AppError> {
        if let Some(code) = non_blank(req.counterparty_code.clone()) {
            let user = self
                .repo
                .find_user_by_code(&code)
                .await?
                .ok_or_else(|| AppError::NotFound("Counterparty not found".into()))?;
            return Ok(Counterparty {
                phone: Some(user.phone.clone()),
                user: Some(user),
            });
        }

        if let Some(phone) = non_blank(req.counterparty_phone.clone()) {
            let phone = normalize_phone(&phone)?;
            let user = self.repo.find_user_by_phone(&phone).await?;
            return Ok(Counterparty {
                user,
                phone: Some(phone),
            });
        }

        Err(AppError::BadRequest(
            "A counterparty code or phone number is required".into(),
        ))
    }

    pub async fn create_transaction(
        &self,
        caller: &User,
        req: CreateTransactionRequest,
        image: Option<ImageUpload>,
    ) -> Result<TransactionAck, AppError> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title is required".into()));
        }
        let money = Money::positive(req.amount, req.currency)?;

        let counterparty = self.resolve_counterparty(&req).await?;
        let counterparty_id = counterparty.user.as_ref().map(|u| u.id);
        if counterparty_id == Some(caller.id) {
            return Err(AppError::BadRequest("Invalid counterparty".into()));
        }

        let commission_fee = match req.commission_fee {
            Some(fee) if fee < 0 => {
                return Err(AppError::BadRequest(
                    "Commission fee cannot be negative".into(),
                ));
            }
            Some(fee) => fee,
            None => escrow_fees::commission_fee(money.amount())?,
        };

        let (buyer_id, seller_id, seller_phone) = match req.initiate_by {
            PartyRole::Buyer => (Some(caller.id), counterparty_id, counterparty.phone.clone()),
            PartyRole::Seller => (counterparty_id, Some(caller.id), Some(caller.phone.clone())),
        };
        let seller_momo_number = match non_blank(req.seller_momo_number) {
            Some(number) => Some(normalize_phone(&number)?),
            None => seller_phone,
        };

        let item_image = self.upload_image(image).await?;

        let tx = self
            .repo
            .create_transaction(NewTransaction {
                title,
                description: non_blank(req.description),
                amount: money.amount(),
                currency: money.currency(),
                commission_fee,
                buyer_id,
                seller_id,
                initiated_by: req.initiate_by,
                counterparty_phone: counterparty.phone.clone(),
                seller_momo_number,
                delivery_number: non_blank(req.delivery_number),
                item_image,
            })
            .await?;

        tracing::info!(
            transaction_id = %tx.id,
            trans_code = %tx.trans_code,
            initiated_by = %tx.initiated_by,
            "Transaction created"
        );

        let message = format!(
            "You have a new escrow transaction ({}) from {} worth GHS {}. Visit {}/{} to accept.",
            tx.trans_code,
            caller.name,
            tx.money().format_major(),
            APPROVE_URL,
            tx.trans_code
        );
        if let Some(phone) = &counterparty.phone {
            self.notify_sms(phone, &message).await;
        }
        if let Some(user) = &counterparty.user {
            self.notify_push(user, "New escrow transaction", &message)
                .await;
        }

        Ok(TransactionAck {
            message: "Transaction created successfully".into(),
            id: tx.id,
        })
    }

    pub async fn update_transaction(
        &self,
        caller: &User,
        id: TransactionId,
        req: UpdateTransactionRequest,
    ) -> Result<Transaction, AppError> {
        let tx = self.visible_transaction(caller, id).await?;
        if !tx.status.is_editable() {
            return Err(AppError::Conflict(format!(
                "Transaction is {} and can no longer be edited",
                tx.status
            )));
        }

        let title = match req.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::BadRequest("Title cannot be empty".into()));
            }
            other => other.map(|t| t.trim().to_string()),
        };

        let (amount, commission_fee) = match req.amount {
            Some(amount) => {
                let money = Money::positive(amount, tx.currency)?;
                let fee = escrow_fees::commission_fee(money.amount())?;
                (Some(money.amount()), Some(fee))
            }
            None => (None, None),
        };

        let seller_momo_number = non_blank(req.seller_momo_number)
            .map(|n| normalize_phone(&n))
            .transpose()?;

        self.repo
            .update_transaction(
                id,
                TransactionChanges {
                    title,
                    description: non_blank(req.description),
                    amount,
                    commission_fee,
                    seller_momo_number,
                    delivery_number: non_blank(req.delivery_number),
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))
    }

    /// Admin override; no transition rules apply.
    pub async fn update_status(
        &self,
        caller: &User,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, AppError> {
        require_admin(caller)?;
        let tx = self
            .repo
            .set_transaction_status(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;
        tracing::warn!(transaction_id = %id, status = %status, admin = %caller.id, "Transaction status overridden");
        Ok(tx)
    }

    pub async fn delete_transaction(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<MessageResponse, AppError> {
        require_admin(caller)?;
        if !self.repo.delete_transaction(id).await? {
            return Err(AppError::NotFound("Transaction not found".into()));
        }
        Ok(MessageResponse::new("Transaction deleted successfully"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Acceptance
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn accept_transaction(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<TransactionAck, AppError> {
        let tx = self.load_transaction(id).await?;
        if tx.counterparty_accepted {
            return Err(AppError::Forbidden("Counterpart accepted already".into()));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Transaction is {} and can no longer be accepted",
                tx.status
            )));
        }

        let not_counterparty = || AppError::Forbidden("You are not the counterparty".into());
        let binding = match tx.counterparty_id() {
            Some(id) if id == caller.id => None,
            Some(_) => return Err(not_counterparty()),
            // An unregistered side is claimed by the phone it was addressed to.
            None if !tx.is_party(caller.id)
                && tx.counterparty_phone.as_deref() == Some(caller.phone.as_str()) =>
            {
                Some(PartyBinding {
                    role: tx.counterparty_role(),
                    user_id: caller.id,
                })
            }
            None => return Err(not_counterparty()),
        };

        let tx = self
            .repo
            .accept_transaction(id, binding)
            .await
            .map_err(|e| match e {
                RepoError::Conflict(_) => {
                    AppError::Forbidden("Counterpart accepted already".into())
                }
                RepoError::NotFound => AppError::NotFound("Transaction not found".into()),
                e => e.into(),
            })?;

        tracing::info!(transaction_id = %tx.id, accepted_by = %caller.id, "Transaction accepted");

        if let Some(initiator) = self.find_user(tx.initiator_id()).await? {
            let message = format!(
                "{} accepted your escrow transaction {} ({}).",
                caller.name, tx.trans_code, tx.title
            );
            self.notify_sms(&initiator.phone, &message).await;
            self.notify_push(&initiator, "Transaction accepted", &message)
                .await;
        }

        Ok(TransactionAck {
            message: "Transaction accepted".into(),
            id: tx.id,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Funding
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn confirm_payment(
        &self,
        caller: &User,
        id: TransactionId,
        req: ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, AppError> {
        let tx = self.load_transaction(id).await?;
        let buyer_id = tx
            .buyer_id
            .ok_or_else(|| AppError::BadRequest("Transaction has no registered buyer".into()))?;
        if buyer_id != caller.id && !caller.is_admin {
            return Err(AppError::Forbidden(
                "Only the buyer can pay for this transaction".into(),
            ));
        }

        self.apply_payment(tx, req).await
    }

    /// Processor callback, authenticated by an HMAC-SHA256 of the raw body.
    pub async fn payment_callback(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<PaymentConfirmation, AppError> {
        let secret = self.callback_secret.as_deref().ok_or_else(|| {
            AppError::Unavailable("Payment callbacks are not configured".into())
        })?;
        let signature =
            signature.ok_or_else(|| AppError::Unauthorized("Missing signature".into()))?;
        if !verify_signature(body, signature, secret) {
            return Err(AppError::Unauthorized("Invalid signature".into()));
        }

        let callback: PaymentCallback = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid callback body: {}", e)))?;

        let tx = self
            .repo
            .find_transaction_by_code(callback.trans_code.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;
        if tx.buyer_id.is_none() {
            return Err(AppError::BadRequest(
                "Transaction has no registered buyer".into(),
            ));
        }

        tracing::info!(trans_code = %tx.trans_code, status = %callback.status, "Payment callback received");
        self.apply_payment(
            tx,
            ConfirmPaymentRequest {
                reference: callback.reference,
                status: callback.status,
                payment_method: PaymentMethod::Momo,
            },
        )
        .await
    }

    /// Records the buyer's payment; a successful one moves the funds into escrow.
    async fn apply_payment(
        &self,
        tx: Transaction,
        req: ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, AppError> {
        let buyer_id = tx
            .buyer_id
            .ok_or_else(|| AppError::BadRequest("Transaction has no registered buyer".into()))?;
        if !tx.counterparty_accepted {
            return Err(AppError::BadRequest(
                "Your counterpart has not accepted this transaction yet.".into(),
            ));
        }
        let reference = req.reference.trim().to_string();
        if reference.is_empty() {
            return Err(AppError::BadRequest("Payment reference is required".into()));
        }

        let amount = tx.amount.checked_add(tx.commission_fee).ok_or_else(|| {
            AppError::BadRequest("Invalid transaction amount.".into())
        })?;

        let (tx, payment) = self
            .repo
            .record_payment(
                tx.id,
                NewPayment {
                    user_id: buyer_id,
                    amount,
                    currency: tx.currency,
                    payment_method: req.payment_method,
                    reference,
                    status: req.status,
                },
            )
            .await?;

        tracing::info!(
            transaction_id = %tx.id,
            payment_id = %payment.id,
            status = %payment.status,
            "Payment recorded"
        );

        match payment.status {
            PaymentStatus::Success => {
                if let Some(number) = &tx.seller_momo_number {
                    let buyer = self.find_user(Some(buyer_id)).await?;
                    let message = funding_message(&tx, buyer.as_ref());
                    self.notify_sms(number, &message).await;
                }
                Ok(PaymentConfirmation {
                    status: "success".into(),
                    message: "Transaction paid successfully".into(),
                })
            }
            PaymentStatus::Failed => Ok(PaymentConfirmation {
                status: "failed".into(),
                message: "Payment failed".into(),
            }),
            PaymentStatus::Pending => Ok(PaymentConfirmation {
                status: "pending".into(),
                message: "Payment is awaiting confirmation".into(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Release
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn release_funds(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<MessageResponse, AppError> {
        let tx = match self.repo.get_transaction(id).await? {
            Some(tx) if tx.buyer_id == Some(caller.id) => tx,
            _ => {
                return Err(AppError::BadRequest(
                    "Transaction not found or unauthorized.".into(),
                ));
            }
        };
        if tx.status != TransactionStatus::InEscrow {
            return Err(AppError::BadRequest(
                "Funds cannot be released at this stage.".into(),
            ));
        }

        let seller = self.find_user(tx.seller_id).await?;
        let released_to = match (&seller, &tx.seller_momo_number) {
            (Some(seller), _) => seller.id.to_string(),
            (None, Some(number)) => number.clone(),
            (None, None) => UNREGISTERED_RECIPIENT.to_string(),
        };

        let settlement = self
            .repo
            .release_funds(
                id,
                NewSettlement {
                    user_id: tx.seller_id,
                    amount: tx.amount,
                    currency: tx.currency,
                    released_to,
                    settlement_type: SettlementType::ReleaseToSeller,
                },
            )
            .await?;

        tracing::info!(transaction_id = %id, settlement_id = %settlement.id, "Funds released");

        let msisdn = tx
            .seller_momo_number
            .clone()
            .or_else(|| seller.as_ref().map(|s| s.phone.clone()));
        self.pay_out(
            &settlement,
            msisdn.clone(),
            format!("Escrow release {}", tx.trans_code),
        )
        .await;

        if let Some(number) = &msisdn {
            let message = format!(
                "Funds for {} ({}) worth GHS {} have been released to you.",
                tx.title,
                tx.trans_code,
                tx.money().format_major()
            );
            self.notify_sms(number, &message).await;
        }

        Ok(MessageResponse::new("Funds released to seller."))
    }
}

/// SMS sent to the seller once the buyer's payment is held.
fn funding_message(tx: &Transaction, buyer: Option<&User>) -> String {
    format!(
        "Hello! A buyer has initiated an escrow transaction for {}, with transaction code {} \
         has been initiated by {} worth GHS {}. Please visit {}/{} to approve or view details",
        tx.title,
        tx.trans_code,
        buyer.map(|b| b.name.as_str()).unwrap_or("a buyer"),
        tx.money().format_major(),
        APPROVE_URL,
        tx.trans_code
    )
}

/// Share of purchases without an active dispute, in percent with 2 decimals.
fn success_rate(total: i64, disputes: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = (total - disputes) as f64 / total as f64 * 100.0;
    ((rate * 100.0).round() / 100.0).max(0.0)
}
