//! Escrow Application Service
//!
//! Orchestrates domain operations through the repository port and the
//! outbound gateway ports. Access rules live here; the HTTP layer only
//! authenticates and hands over the caller.

mod disputes;
mod notifications;
mod shops;
mod transactions;
mod users;

use std::sync::Arc;

use escrow_types::domain::{PayoutStatus, Settlement};
use escrow_types::ports::{
    GatewayError, ImageStore, ImageUpload, OtpProvider, PayoutProvider, PayoutRequest,
    PushMessage, PushNotifier, SmsSender,
};
use escrow_types::{AppError, EscrowRepository, Transaction, TransactionId, User, UserId};

use crate::outbound::NotConfigured;
use crate::tokens::JwtManager;

/// The outbound services the escrow flow talks to.
#[derive(Clone)]
pub struct Gateways {
    pub images: Arc<dyn ImageStore>,
    pub sms: Arc<dyn SmsSender>,
    pub otp: Arc<dyn OtpProvider>,
    pub push: Arc<dyn PushNotifier>,
    pub payouts: Arc<dyn PayoutProvider>,
}

impl Gateways {
    /// Every gateway replaced by its not-configured stand-in.
    pub fn disabled() -> Self {
        Self {
            images: Arc::new(NotConfigured("Image storage")),
            sms: Arc::new(NotConfigured("SMS")),
            otp: Arc::new(NotConfigured("OTP")),
            push: Arc::new(NotConfigured("Push notifications")),
            payouts: Arc::new(NotConfigured("Payouts")),
        }
    }
}

impl Default for Gateways {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Application service for the escrow marketplace.
///
/// Generic over `R: EscrowRepository` - the adapter is injected at compile time.
pub struct EscrowService<R: EscrowRepository> {
    repo: R,
    tokens: JwtManager,
    gateways: Gateways,
    admin_phones: Vec<String>,
    callback_secret: Option<String>,
}

impl<R: EscrowRepository> EscrowService<R> {
    /// Creates a service with every gateway disabled.
    pub fn new(repo: R, tokens: JwtManager) -> Self {
        Self {
            repo,
            tokens,
            gateways: Gateways::disabled(),
            admin_phones: Vec::new(),
            callback_secret: None,
        }
    }

    pub fn with_gateways(mut self, gateways: Gateways) -> Self {
        self.gateways = gateways;
        self
    }

    /// Phones that are registered as admins.
    pub fn with_admin_phones(mut self, phones: Vec<String>) -> Self {
        self.admin_phones = phones;
        self
    }

    /// Secret used to verify payment processor callbacks.
    pub fn with_callback_secret(mut self, secret: Option<String>) -> Self {
        self.callback_secret = secret;
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn tokens(&self) -> &JwtManager {
        &self.tokens
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Shared lookups
    // ─────────────────────────────────────────────────────────────────────────────

    async fn load_user(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))
    }

    async fn find_user(&self, id: Option<UserId>) -> Result<Option<User>, AppError> {
        match id {
            Some(id) => Ok(self.repo.get_user(id).await?),
            None => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Gateways
    // ─────────────────────────────────────────────────────────────────────────────

    async fn upload_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, AppError> {
        match image {
            Some(image) => {
                let url = self.gateways.images.upload(image).await?;
                Ok(Some(url))
            }
            None => Ok(None),
        }
    }

    /// Best effort: failures are logged, never returned.
    async fn notify_sms(&self, to: &str, message: &str) {
        if let Err(e) = self.gateways.sms.send_sms(to, message).await {
            tracing::warn!(to = %to, error = %e, "SMS notification failed");
        }
    }

    /// Best effort push to the user's saved device, if any.
    async fn notify_push(&self, user: &User, title: &str, body: &str) {
        let Some(token) = user.push_token.as_deref() else {
            return;
        };
        let message = PushMessage {
            to: token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        };
        if let Err(e) = self.gateways.push.push(message).await {
            tracing::warn!(user_id = %user.id, error = %e, "Push notification failed");
        }
    }

    /// Sends the settled amount to `msisdn` and records the outcome.
    ///
    /// Runs after the settlement committed; its failure never undoes it.
    async fn pay_out(&self, settlement: &Settlement, msisdn: Option<String>, description: String) {
        let Some(msisdn) = msisdn else {
            tracing::warn!(settlement_id = %settlement.id, "No mobile-money number for payout");
            return;
        };

        let request = PayoutRequest {
            msisdn,
            amount: settlement.amount,
            reference: settlement.id.to_string(),
            description,
        };

        let (status, reference) = match self.gateways.payouts.payout(request).await {
            Ok(reference) => (PayoutStatus::Sent, Some(reference)),
            Err(GatewayError::NotConfigured(_)) => {
                tracing::info!(settlement_id = %settlement.id, "Payouts disabled, left for manual processing");
                return;
            }
            Err(e) => {
                tracing::error!(settlement_id = %settlement.id, error = %e, "Payout failed");
                (PayoutStatus::Failed, None)
            }
        };

        if let Err(e) = self
            .repo
            .update_payout(settlement.id, status, reference)
            .await
        {
            tracing::error!(settlement_id = %settlement.id, error = %e, "Failed to record payout outcome");
        }
    }
}

/// Admin-only operations.
fn require_admin(caller: &User) -> Result<(), AppError> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Unauthorized access: Admins only".into(),
        ))
    }
}

/// Trims an optional text field, treating blank as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
