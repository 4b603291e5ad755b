//! Dispute handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use escrow_types::domain::DisputeId;
use escrow_types::{
    DisputeQuery, EscrowRepository, OpenDisputeRequest, SettleDisputeRequest, TransactionId,
    UpdateDisputeStatusRequest, UserId,
};

use super::{ApiError, AppState, parse_id, read_multipart};
use crate::inbound::auth::AuthUser;

/// Raise a dispute from a multipart `payload` plus optional evidence image.
#[tracing::instrument(skip(state, caller, multipart), fields(caller = %caller.id, transaction_id = %id))]
pub async fn open_dispute<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    let form = read_multipart::<OpenDisputeRequest>(multipart).await?;
    let ack = state
        .service
        .open_dispute(&caller, tx_id, form.payload, form.file)
        .await?;
    Ok((StatusCode::CREATED, Json(ack)))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list_disputes<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Query(query): Query<DisputeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state
            .service
            .list_disputes(&caller, query.status.as_deref())
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn transaction_disputes<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(
        state.service.transaction_disputes(&caller, tx_id).await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, user_id = %user_id))]
pub async fn user_disputes<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user: UserId = parse_id(&user_id, "user")?;
    Ok(Json(state.service.user_disputes(&caller, user).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, user_id = %user_id))]
pub async fn dispute_counts<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user: UserId = parse_id(&user_id, "user")?;
    Ok(Json(state.service.dispute_counts(&caller, user).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, dispute_id = %id, status = %req.status))]
pub async fn update_dispute_status<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDisputeStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dispute_id: DisputeId = parse_id(&id, "dispute")?;
    Ok(Json(
        state
            .service
            .update_dispute_status(&caller, dispute_id, req.status)
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %transaction_id, to_buyer = req.settle_to_buyer))]
pub async fn settle_dispute<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(transaction_id): Path<String>,
    Json(req): Json<SettleDisputeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&transaction_id, "transaction")?;
    Ok(Json(
        state.service.settle_dispute(&caller, tx_id, req).await?,
    ))
}
