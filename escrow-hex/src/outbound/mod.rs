//! Outbound adapters
//!
//! reqwest-based implementations of the gateway ports, plus a stand-in used
//! for any gateway whose credentials are not configured.

mod arkesel;
mod cloudinary;
mod expo;
mod momo;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use escrow_types::ports::{
    GatewayError, ImageStore, ImageUpload, OtpProvider, PayoutProvider, PayoutRequest,
    PushMessage, PushNotifier, SmsSender,
};

pub use arkesel::{ArkeselOtp, ArkeselSms, DEFAULT_ARKESEL_URL, OTP_MESSAGE};
pub use cloudinary::{CloudinaryStore, DEFAULT_UPLOAD_FOLDER};
pub use expo::{DEFAULT_EXPO_PUSH_URL, ExpoPush};
pub use momo::{MomoConfig, MomoPayouts, Network};

/// Stand-in for a gateway that has no credentials.
///
/// Every call fails with [`GatewayError::NotConfigured`] carrying the gateway name.
#[derive(Debug, Clone, Copy)]
pub struct NotConfigured(pub &'static str);

#[async_trait]
impl ImageStore for NotConfigured {
    async fn upload(&self, _image: ImageUpload) -> Result<String, GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }
}

#[async_trait]
impl SmsSender for NotConfigured {
    async fn send_sms(&self, _to: &str, _message: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }
}

#[async_trait]
impl OtpProvider for NotConfigured {
    async fn send_otp(&self, _phone: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }

    async fn verify_otp(&self, _phone: &str, _code: &str) -> Result<bool, GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }
}

#[async_trait]
impl PushNotifier for NotConfigured {
    async fn push(&self, _message: PushMessage) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }
}

#[async_trait]
impl PayoutProvider for NotConfigured {
    async fn payout(&self, _request: PayoutRequest) -> Result<String, GatewayError> {
        Err(GatewayError::NotConfigured(self.0))
    }
}

fn http_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Http(e.to_string())
}

/// Decodes a successful JSON response, or turns the status and body into an error.
async fn json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

async fn empty_response(response: reqwest::Response) -> Result<(), GatewayError> {
    let status = response.status();

    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
