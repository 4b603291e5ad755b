//! # Escrow Client SDK
//!
//! A typed Rust client for the escrow marketplace API.
//!
//! Requests that create transactions, disputes or shops are sent as
//! `multipart/form-data` with a JSON `payload` field and an optional `file`.

use escrow_fees::CommissionQuote;
use escrow_types::domain::{
    Dispute, PaymentMethod, PaymentStatus, Shop, Transaction, TransactionId, UserSummary,
};
use escrow_types::{
    AuthResponse, ConfirmPaymentRequest, CreateShopRequest, CreateTransactionRequest,
    LoginRequest, MessageResponse, OpenDisputeRequest, Page, PaymentConfirmation,
    RegisterRequest, SettleDisputeRequest, ShopDetails, TransactionAck, TransactionDetails,
    TransactionStats, TransactionStatusResponse, UserStatistics,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A file attached to a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Escrow API client.
pub struct EscrowClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl EscrowClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            http: Client::new(),
        }
    }

    /// Sets the bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ── Users ───────────────────────────────────────────────────────────────

    pub async fn register(
        &self,
        name: &str,
        phone: &str,
        password: &str,
        email: Option<String>,
    ) -> Result<AuthResponse, ClientError> {
        let req = RegisterRequest {
            name: name.to_string(),
            email,
            phone: phone.to_string(),
            password: password.to_string(),
        };
        self.post("/api/users/register", &req).await
    }

    pub async fn login(&self, phone: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let req = LoginRequest {
            phone: phone.to_string(),
            password: password.to_string(),
        };
        self.post("/api/users/login", &req).await
    }

    /// Profile of the token's owner.
    pub async fn me(&self) -> Result<UserSummary, ClientError> {
        self.get("/api/users/me").await
    }

    // ── Transactions ────────────────────────────────────────────────────────

    /// Opens a transaction with the caller as initiator.
    pub async fn create_transaction(
        &self,
        req: &CreateTransactionRequest,
        image: Option<Upload>,
    ) -> Result<TransactionAck, ClientError> {
        self.post_multipart("/api/transactions", req, image).await
    }

    pub async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<TransactionDetails, ClientError> {
        self.get(&format!("/api/transactions/{}", id)).await
    }

    pub async fn transaction_by_code(&self, code: &str) -> Result<TransactionDetails, ClientError> {
        self.get(&format!("/api/transactions/code/{}", code)).await
    }

    pub async fn transaction_status(
        &self,
        id: TransactionId,
    ) -> Result<TransactionStatusResponse, ClientError> {
        self.get(&format!("/api/transactions/{}/status", id)).await
    }

    /// Transactions where the caller is buyer or seller.
    pub async fn my_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        self.get("/api/transactions/mine").await
    }

    /// One page of all transactions (admin).
    pub async fn list_transactions(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<Page<TransactionDetails>, ClientError> {
        self.get(&format!("/api/transactions?page={}&limit={}", page, limit))
            .await
    }

    pub async fn statistics(&self) -> Result<UserStatistics, ClientError> {
        self.get("/api/transactions/statistics").await
    }

    /// Platform totals (admin).
    pub async fn stats(&self) -> Result<TransactionStats, ClientError> {
        self.get("/api/transactions/stats").await
    }

    pub async fn accept(&self, id: TransactionId) -> Result<TransactionAck, ClientError> {
        self.post(&format!("/api/transactions/{}/accept", id), &serde_json::json!({}))
            .await
    }

    /// Records the buyer's payment for an accepted transaction.
    pub async fn confirm_payment(
        &self,
        id: TransactionId,
        reference: &str,
        status: PaymentStatus,
        payment_method: PaymentMethod,
    ) -> Result<PaymentConfirmation, ClientError> {
        let req = ConfirmPaymentRequest {
            reference: reference.to_string(),
            status,
            payment_method,
        };
        self.put(&format!("/api/transactions/{}/payment", id), &req)
            .await
    }

    /// Releases escrowed funds to the seller.
    pub async fn release(&self, id: TransactionId) -> Result<MessageResponse, ClientError> {
        self.post(&format!("/api/transactions/{}/release", id), &serde_json::json!({}))
            .await
    }

    // ── Disputes ────────────────────────────────────────────────────────────

    pub async fn open_dispute(
        &self,
        id: TransactionId,
        reason: &str,
        evidence: Option<Upload>,
    ) -> Result<MessageResponse, ClientError> {
        let req = OpenDisputeRequest {
            reason: reason.to_string(),
        };
        self.post_multipart(&format!("/api/transactions/{}/disputes", id), &req, evidence)
            .await
    }

    pub async fn transaction_disputes(
        &self,
        id: TransactionId,
    ) -> Result<Vec<Dispute>, ClientError> {
        self.get(&format!("/api/transactions/{}/disputes", id)).await
    }

    /// Settles the active dispute of a transaction (admin).
    pub async fn settle_dispute(
        &self,
        id: TransactionId,
        settle_to_buyer: bool,
        resolution: Option<String>,
    ) -> Result<MessageResponse, ClientError> {
        let req = SettleDisputeRequest {
            settle_to_buyer,
            resolution,
        };
        self.post(&format!("/api/disputes/settle/{}", id), &req).await
    }

    // ── Shops ───────────────────────────────────────────────────────────────

    pub async fn create_shop(
        &self,
        req: &CreateShopRequest,
        icon: Option<Upload>,
    ) -> Result<Shop, ClientError> {
        self.post_multipart("/api/shops", req, icon).await
    }

    pub async fn list_shops(&self) -> Result<Vec<ShopDetails>, ClientError> {
        self.get("/api/shops").await
    }

    /// Shops whose name contains `identifier`; `all` lists every shop.
    pub async fn search_shops(&self, identifier: &str) -> Result<Vec<ShopDetails>, ClientError> {
        self.get(&format!("/api/shops/search/{}", identifier)).await
    }

    // ── Commissions ─────────────────────────────────────────────────────────

    pub async fn commission(&self, amount: i64) -> Result<CommissionQuote, ClientError> {
        self.get(&format!("/api/commissions/calculate/{}", amount))
            .await
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.authorize(self.http.get(format!("{}{}", self.base_url, path)));
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self.authorize(
            self.http
                .post(format!("{}{}", self.base_url, path))
                .json(body),
        );
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self.authorize(
            self.http
                .put(format!("{}{}", self.base_url, path))
                .json(body),
        );
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post_multipart<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        payload: &B,
        file: Option<Upload>,
    ) -> Result<T, ClientError> {
        let form = multipart_form(payload, file)?;
        let req = self.authorize(
            self.http
                .post(format!("{}{}", self.base_url, path))
                .multipart(form),
        );
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(body),
            })
        }
    }
}

/// Builds the `payload` + optional `file` form the API expects.
fn multipart_form<B: Serialize>(payload: &B, file: Option<Upload>) -> Result<Form, ClientError> {
    let mut form = Form::new().text("payload", serde_json::to_string(payload)?);
    if let Some(upload) = file {
        let mut part = Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type {
            part = part.mime_str(&content_type)?;
        }
        form = form.part("file", part);
    }
    Ok(form)
}

/// Pulls `error` out of a JSON error body, or returns the body unchanged.
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or(body)
}
