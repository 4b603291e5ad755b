//! Disputes and admin settlement.

use escrow_types::domain::{
    DisputeId, DisputeStatusCount, PartyRole, Settlement, SettlementType, UNREGISTERED_RECIPIENT,
};
use escrow_types::ports::{DisputeResolution, ImageUpload, NewDispute, NewSettlement};
use escrow_types::{
    AppError, Dispute, DisputeDetails, DisputeStatus, EscrowRepository, MessageResponse,
    OpenDisputeRequest, SettleDisputeRequest, TransactionId, TransactionStatus, User, UserId,
};

use super::{EscrowService, non_blank, require_admin};

impl<R: EscrowRepository> EscrowService<R> {
    pub async fn open_dispute(
        &self,
        caller: &User,
        id: TransactionId,
        req: OpenDisputeRequest,
        evidence: Option<ImageUpload>,
    ) -> Result<MessageResponse, AppError> {
        let tx = self.load_transaction(id).await?;
        if !tx.is_party(caller.id) {
            return Err(AppError::BadRequest(
                "Unauthorized to raise dispute.".into(),
            ));
        }
        if tx.status != TransactionStatus::InEscrow {
            return Err(AppError::Conflict(format!(
                "Only funded transactions can be disputed; this one is {}",
                tx.status
            )));
        }
        let reason = req.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::BadRequest("A reason is required".into()));
        }

        let evidence_url = self.upload_image(evidence).await?;

        let dispute = self
            .repo
            .open_dispute(NewDispute {
                transaction_id: id,
                raised_by: caller.id,
                reason,
                evidence_url,
            })
            .await?;

        tracing::info!(transaction_id = %id, dispute_id = %dispute.id, raised_by = %caller.id, "Dispute opened");
        Ok(MessageResponse::new("Dispute created successfully"))
    }

    async fn dispute_details(&self, dispute: Dispute) -> Result<DisputeDetails, AppError> {
        let user = self.repo.get_user(dispute.raised_by).await?;
        let transaction = self.repo.get_transaction(dispute.transaction_id).await?;
        Ok(DisputeDetails {
            dispute,
            user: user.map(|u| u.summary()),
            transaction,
        })
    }

    /// All disputes, optionally filtered by a status label.
    pub async fn list_disputes(
        &self,
        caller: &User,
        status: Option<&str>,
    ) -> Result<Vec<DisputeDetails>, AppError> {
        require_admin(caller)?;
        let status = status
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<DisputeStatus>)
            .transpose()?;

        let disputes = self.repo.list_disputes(status).await?;
        let mut details = Vec::with_capacity(disputes.len());
        for dispute in disputes {
            details.push(self.dispute_details(dispute).await?);
        }
        Ok(details)
    }

    pub async fn transaction_disputes(
        &self,
        caller: &User,
        id: TransactionId,
    ) -> Result<Vec<Dispute>, AppError> {
        let tx = self.load_transaction(id).await?;
        if !caller.is_admin && !tx.is_party(caller.id) {
            return Err(AppError::Forbidden(
                "You are not a party to this transaction".into(),
            ));
        }
        Ok(self.repo.list_disputes_for_transaction(id).await?)
    }

    fn require_self_or_admin(caller: &User, user: UserId) -> Result<(), AppError> {
        if caller.id == user || caller.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only view your own disputes".into(),
            ))
        }
    }

    pub async fn user_disputes(
        &self,
        caller: &User,
        user: UserId,
    ) -> Result<Vec<Dispute>, AppError> {
        Self::require_self_or_admin(caller, user)?;
        Ok(self.repo.list_disputes_for_user(user).await?)
    }

    pub async fn dispute_counts(
        &self,
        caller: &User,
        user: UserId,
    ) -> Result<DisputeStatusCount, AppError> {
        Self::require_self_or_admin(caller, user)?;
        Ok(self.repo.count_disputes_by_status(user).await?)
    }

    pub async fn update_dispute_status(
        &self,
        caller: &User,
        id: DisputeId,
        status: DisputeStatus,
    ) -> Result<Dispute, AppError> {
        require_admin(caller)?;
        self.repo
            .update_dispute_status(id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Dispute not found".into()))
    }

    /// Closes a disputed transaction by refunding the buyer or paying the seller.
    pub async fn settle_dispute(
        &self,
        caller: &User,
        id: TransactionId,
        req: SettleDisputeRequest,
    ) -> Result<MessageResponse, AppError> {
        require_admin(caller)?;
        let tx = self.load_transaction(id).await?;
        if tx.status != TransactionStatus::Disputed {
            return Err(AppError::BadRequest(
                "Transaction not eligible for settlement.".into(),
            ));
        }

        let (role, settlement_type, default_resolution) = if req.settle_to_buyer {
            (
                PartyRole::Buyer,
                SettlementType::RefundToBuyer,
                "Funds refunded to buyer",
            )
        } else {
            (
                PartyRole::Seller,
                SettlementType::ReleaseToSeller,
                "Funds released to seller",
            )
        };

        let recipient = self.find_user(tx.party(role)).await?;
        let released_to = match (&recipient, role, &tx.seller_momo_number) {
            (Some(user), _, _) => user.id.to_string(),
            (None, PartyRole::Seller, Some(number)) => number.clone(),
            _ => UNREGISTERED_RECIPIENT.to_string(),
        };
        let resolution =
            non_blank(req.resolution).unwrap_or_else(|| default_resolution.to_string());

        let settlement = self
            .repo
            .settle_dispute(
                id,
                NewSettlement {
                    user_id: recipient.as_ref().map(|u| u.id),
                    amount: tx.amount,
                    currency: tx.currency,
                    released_to,
                    settlement_type,
                },
                DisputeResolution {
                    resolution: resolution.clone(),
                    resolved_by: caller.id,
                },
            )
            .await?;

        tracing::info!(
            transaction_id = %id,
            settlement_id = %settlement.id,
            settlement_type = %settlement.settlement_type,
            admin = %caller.id,
            "Dispute settled"
        );

        let msisdn = match role {
            PartyRole::Seller => tx
                .seller_momo_number
                .clone()
                .or_else(|| recipient.as_ref().map(|u| u.phone.clone())),
            PartyRole::Buyer => recipient.as_ref().map(|u| u.phone.clone()),
        };
        self.pay_out(
            &settlement,
            msisdn.clone(),
            format!("Escrow settlement {}", tx.trans_code),
        )
        .await;

        if let Some(number) = &msisdn {
            self.notify_sms(number, &settlement_message(&settlement, &tx.trans_code, &resolution))
                .await;
        }

        Ok(MessageResponse::new("Dispute settled successfully."))
    }
}

fn settlement_message(settlement: &Settlement, trans_code: &str, resolution: &str) -> String {
    format!(
        "The dispute on escrow transaction {} has been settled: {}. Amount: {} {}.",
        trans_code,
        resolution,
        settlement.currency,
        escrow_types::Money::new(settlement.amount, settlement.currency)
            .map(|m| m.format_major())
            .unwrap_or_default()
    )
}
