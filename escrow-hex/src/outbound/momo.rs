//! Mobile-money payouts through the processor's transfer endpoint.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use escrow_types::ports::{GatewayError, PayoutProvider, PayoutRequest};

use super::{http_error, json_response};

/// Processing code for a wallet credit.
const PROCESSING_CODE: &str = "000200";

/// Response code of an approved transfer.
const APPROVED: &str = "000";

/// Ghanaian mobile-money networks, as the processor's `r-switch` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mtn,
    Vodafone,
    AirtelTigo,
}

impl Network {
    pub fn code(&self) -> &'static str {
        match self {
            Network::Mtn => "MTN",
            Network::Vodafone => "VDF",
            Network::AirtelTigo => "ATL",
        }
    }

    /// Network of a Ghanaian number, from its `0XX` prefix.
    pub fn from_msisdn(msisdn: &str) -> Option<Network> {
        let digits: String = msisdn.chars().filter(|c| c.is_ascii_digit()).collect();
        let local = match digits.strip_prefix("233") {
            Some(rest) if digits.len() == 12 => format!("0{}", rest),
            _ => digits,
        };

        match local.get(..3)? {
            "024" | "025" | "053" | "054" | "055" | "059" => Some(Network::Mtn),
            "020" | "050" => Some(Network::Vodafone),
            "026" | "027" | "056" | "057" => Some(Network::AirtelTigo),
            _ => None,
        }
    }
}

/// Credentials and endpoint for the payout processor.
#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub api_key: String,
    pub merchant_id: String,
}

#[derive(Debug, Serialize)]
struct TransferPayload<'a> {
    subscriber_number: &'a str,
    account_issuer: &'static str,
    merchant_id: &'a str,
    transaction_id: String,
    processing_code: &'static str,
    amount: String,
    #[serde(rename = "r-switch")]
    r_switch: &'static str,
    desc: &'a str,
    pass_code: &'static str,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    #[serde(default)]
    status: Option<String>,
    code: String,
    #[serde(default)]
    reason: Option<String>,
}

pub struct MomoPayouts {
    http: Client,
    config: MomoConfig,
}

impl MomoPayouts {
    pub fn new(config: MomoConfig) -> Self {
        let config = MomoConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            http: Client::new(),
            config,
        }
    }

    fn payload<'a>(
        &'a self,
        request: &'a PayoutRequest,
        transaction_id: String,
    ) -> Result<TransferPayload<'a>, GatewayError> {
        let network = Network::from_msisdn(&request.msisdn).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "Unsupported mobile-money number: {}",
                request.msisdn
            ))
        })?;
        if request.amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "Payout amount must be positive".into(),
            ));
        }

        Ok(TransferPayload {
            subscriber_number: &request.msisdn,
            account_issuer: network.code(),
            merchant_id: &self.config.merchant_id,
            transaction_id,
            processing_code: PROCESSING_CODE,
            amount: format_amount(request.amount),
            r_switch: network.code(),
            desc: &request.description,
            pass_code: "",
        })
    }
}

/// Minor units, zero-padded to the 12 digits the processor expects.
fn format_amount(amount: i64) -> String {
    format!("{:012}", amount)
}

/// Random 12-digit processor transaction id.
fn transaction_id() -> String {
    let mut rng = rand::rng();
    (0..12)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[async_trait]
impl PayoutProvider for MomoPayouts {
    async fn payout(&self, request: PayoutRequest) -> Result<String, GatewayError> {
        let payload = self.payload(&request, transaction_id())?;
        let processor_id = payload.transaction_id.clone();

        let response = self
            .http
            .post(format!("{}/transaction/process", self.config.base_url))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(http_error)?;

        let outcome: TransferResponse = json_response(response).await?;
        if outcome.code != APPROVED {
            return Err(GatewayError::Rejected {
                status: 200,
                body: format!(
                    "{} {}",
                    outcome.code,
                    outcome.reason.unwrap_or_default()
                ),
            });
        }

        tracing::info!(
            reference = %request.reference,
            processor_id = %processor_id,
            status = outcome.status.as_deref().unwrap_or("approved"),
            "Payout approved"
        );
        Ok(processor_id)
    }
}
