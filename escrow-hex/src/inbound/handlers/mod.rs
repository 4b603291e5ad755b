//! HTTP request handlers.

pub mod disputes;
pub mod misc;
pub mod shops;
pub mod transactions;
pub mod users;

use std::str::FromStr;

use axum::{
    Json,
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use escrow_types::{AppError, EscrowRepository, ports::ImageUpload};

use crate::EscrowService;

/// Application state shared across handlers.
pub struct AppState<R: EscrowRepository> {
    pub service: EscrowService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.0.message(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Parses an id path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)).into())
}

/// A `payload` JSON field plus an optional `file` upload.
pub(crate) struct MultipartForm<T> {
    pub payload: T,
    pub file: Option<ImageUpload>,
}

pub(crate) async fn read_multipart<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> Result<MultipartForm<T>, ApiError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError(AppError::BadRequest(format!("Invalid multipart body: {}", e)))
    };

    let mut payload = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        match field.name() {
            Some("payload") => {
                let text = field.text().await.map_err(bad_form)?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    AppError::BadRequest(format!("Invalid payload: {}", e))
                })?;
                payload = Some(parsed);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_form)?;
                if !bytes.is_empty() {
                    file = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let payload = payload
        .ok_or_else(|| AppError::BadRequest("Missing payload field".into()))?;
    Ok(MultipartForm { payload, file })
}
