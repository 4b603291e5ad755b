//! Expo push notifications.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use escrow_types::ports::{GatewayError, PushMessage, PushNotifier};

use super::{http_error, json_response};

pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    sound: &'static str,
    title: &'a str,
    body: &'a str,
}

impl<'a> From<&'a PushMessage> for ExpoMessage<'a> {
    fn from(message: &'a PushMessage) -> Self {
        ExpoMessage {
            to: &message.to,
            sound: "default",
            title: &message.title,
            body: &message.body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct ExpoPush {
    http: Client,
    url: String,
}

impl ExpoPush {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }
}

impl Default for ExpoPush {
    fn default() -> Self {
        Self::new(DEFAULT_EXPO_PUSH_URL)
    }
}

#[async_trait]
impl PushNotifier for ExpoPush {
    async fn push(&self, message: PushMessage) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/json")
            .json(&ExpoMessage::from(&message))
            .send()
            .await
            .map_err(http_error)?;

        let ticket: ExpoResponse = json_response(response).await?;
        if ticket.data.status == "error" {
            return Err(GatewayError::Rejected {
                status: 200,
                body: ticket.data.message.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
