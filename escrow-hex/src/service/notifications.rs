//! Admin push notifications, commission quotes and settlement listing.

use escrow_types::ports::PushMessage;
use escrow_types::{
    AppError, CommissionQuote, EscrowRepository, MessageResponse, SendNotificationRequest,
    Settlement, User,
};

use super::{EscrowService, require_admin};

impl<R: EscrowRepository> EscrowService<R> {
    pub async fn send_notification(
        &self,
        caller: &User,
        req: SendNotificationRequest,
    ) -> Result<MessageResponse, AppError> {
        require_admin(caller)?;
        if req.token.trim().is_empty() {
            return Err(AppError::BadRequest("Push token is required".into()));
        }

        self.gateways
            .push
            .push(PushMessage {
                to: req.token.trim().to_string(),
                title: req.title,
                body: req.message,
            })
            .await?;
        Ok(MessageResponse::new("Notification sent successfully"))
    }

    /// Fee breakdown for an amount in minor units. Public.
    pub fn commission_quote(&self, amount: i64) -> Result<CommissionQuote, AppError> {
        Ok(escrow_fees::quote(amount)?)
    }

    pub async fn list_settlements(&self, caller: &User) -> Result<Vec<Settlement>, AppError> {
        require_admin(caller)?;
        Ok(self.repo.list_settlements().await?)
    }
}
