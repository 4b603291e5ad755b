//! Commissions, notifications and settlements.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use escrow_types::{AppError, EscrowRepository, SendNotificationRequest};

use super::{ApiError, AppState};
use crate::inbound::auth::AuthUser;

/// Commission quote for an amount in minor units. Public.
#[tracing::instrument(skip(state))]
pub async fn calculate_commission<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(amount): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let amount: i64 = amount
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid transaction amount.".into()))?;
    Ok(Json(state.service.commission_quote(amount)?))
}

#[tracing::instrument(skip(state, caller, req), fields(caller = %caller.id, title = %req.title))]
pub async fn send_notification<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Json(req): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.send_notification(&caller, req).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list_settlements<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_settlements(&caller).await?))
}
