//! Arkesel SMS and OTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use escrow_types::ports::{GatewayError, OtpProvider, SmsSender};

use super::{empty_response, http_error};

pub const DEFAULT_ARKESEL_URL: &str = "https://sms.arkesel.com";

pub const OTP_MESSAGE: &str =
    "%otp_code% is your ESCROWGH verification OTP. It is valid for 10 minutes.";

const OTP_LENGTH: u8 = 6;
const OTP_EXPIRY_MINUTES: u8 = 10;

/// Arkesel reports a successful verification with this code.
const OTP_VERIFIED: &str = "1100";

#[derive(Debug, Serialize)]
struct SmsBody<'a> {
    sender: &'a str,
    message: &'a str,
    recipients: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct GenerateOtpBody<'a> {
    expiry: u8,
    length: u8,
    medium: &'static str,
    message: &'static str,
    number: &'a str,
    sender_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct VerifyOtpBody<'a> {
    code: &'a str,
    number: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyOtpResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Transactional SMS through the v2 send endpoint.
pub struct ArkeselSms {
    http: Client,
    base_url: String,
    api_key: String,
    sender: String,
}

impl ArkeselSms {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl SmsSender for ArkeselSms {
    async fn send_sms(&self, to: &str, message: &str) -> Result<(), GatewayError> {
        let body = SmsBody {
            sender: &self.sender,
            message,
            recipients: vec![to],
        };

        let response = self
            .http
            .post(format!("{}/api/v2/sms/send", self.base_url))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        empty_response(response).await
    }
}

/// Numeric one-time passwords delivered by SMS.
pub struct ArkeselOtp {
    http: Client,
    base_url: String,
    api_key: String,
    sender: String,
}

impl ArkeselOtp {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }

    fn generate_body<'a>(&'a self, phone: &'a str) -> GenerateOtpBody<'a> {
        GenerateOtpBody {
            expiry: OTP_EXPIRY_MINUTES,
            length: OTP_LENGTH,
            medium: "sms",
            message: OTP_MESSAGE,
            number: phone,
            sender_id: &self.sender,
            kind: "numeric",
        }
    }
}

#[async_trait]
impl OtpProvider for ArkeselOtp {
    async fn send_otp(&self, phone: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(format!("{}/api/otp/generate", self.base_url))
            .header("api-key", &self.api_key)
            .json(&self.generate_body(phone))
            .send()
            .await
            .map_err(http_error)?;

        empty_response(response).await
    }

    async fn verify_otp(&self, phone: &str, code: &str) -> Result<bool, GatewayError> {
        let response = self
            .http
            .post(format!("{}/api/otp/verify", self.base_url))
            .header("api-key", &self.api_key)
            .json(&VerifyOtpBody { code, number: phone })
            .send()
            .await
            .map_err(http_error)?;

        // Wrong or expired codes come back as 4xx with a JSON body.
        let status = response.status();
        if status.is_server_error() || status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let outcome: VerifyOtpResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            code = %outcome.code,
            message = outcome.message.as_deref().unwrap_or_default(),
            "OTP verification result"
        );
        Ok(outcome.code == OTP_VERIFIED)
    }
}
