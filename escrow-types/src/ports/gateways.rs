//! Outbound gateway ports.
//!
//! Third-party HTTP services the escrow flow talks to: image hosting, SMS,
//! one-time passwords, push notifications and mobile-money payouts.

/// Error type for outbound gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A push notification addressed to one device token.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
}

/// A mobile-money disbursement.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequest {
    /// Recipient wallet number
    pub msisdn: String,
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Our reference for the payout (settlement id)
    pub reference: String,
    pub description: String,
}

/// Stores images and returns a public URL.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<String, GatewayError>;
}

/// Sends transactional SMS.
#[async_trait::async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, message: &str) -> Result<(), GatewayError>;
}

/// Issues and checks one-time passwords delivered by SMS.
#[async_trait::async_trait]
pub trait OtpProvider: Send + Sync {
    async fn send_otp(&self, phone: &str) -> Result<(), GatewayError>;

    /// Returns whether `code` is the valid, unexpired code for `phone`.
    async fn verify_otp(&self, phone: &str, code: &str) -> Result<bool, GatewayError>;
}

/// Delivers push notifications to devices.
#[async_trait::async_trait]
pub trait PushNotifier: Send + Sync {
    async fn push(&self, message: PushMessage) -> Result<(), GatewayError>;
}

/// Sends money out to a mobile-money wallet. Returns the processor reference.
#[async_trait::async_trait]
pub trait PayoutProvider: Send + Sync {
    async fn payout(&self, request: PayoutRequest) -> Result<String, GatewayError>;
}
