//! Escrow transaction handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use escrow_types::{
    ConfirmPaymentRequest, CreateTransactionRequest, EscrowRepository, PageQuery, PageRequest,
    TransactionFilter, TransactionId, UpdateStatusRequest, UpdateTransactionRequest,
};

use super::{ApiError, AppState, parse_id, read_multipart};
use crate::inbound::auth::AuthUser;

/// Header carrying the hex HMAC-SHA256 of a processor callback body.
pub const SIGNATURE_HEADER: &str = "X-Escrow-Signature";

/// Create a transaction from a multipart `payload` plus optional item image.
#[tracing::instrument(skip(state, caller, multipart), fields(caller = %caller.id))]
pub async fn create_transaction<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_multipart::<CreateTransactionRequest>(multipart).await?;
    let ack = state
        .service
        .create_transaction(&caller, form.payload, form.file)
        .await?;
    Ok((StatusCode::CREATED, Json(ack)))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list_transactions<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .service
        .list_transactions(&caller, PageRequest::from(page))
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn filter_transactions<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Query(filter): Query<TransactionFilter>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .service
        .filter_transactions(&caller, filter, PageRequest::from(page))
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn transaction_stats<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.transaction_stats(&caller).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn recent_transactions<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.recent_transactions(&caller).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn my_transactions<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.my_transactions(&caller).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn user_statistics<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.user_statistics(&caller).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn get_transaction<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.service.get_transaction(&caller, tx_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get_transaction_by_code<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_transaction_by_code(&code).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn get_transaction_status<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(
        state.service.get_transaction_status(&caller, tx_id).await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn update_transaction<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(
        state
            .service
            .update_transaction(&caller, tx_id, req)
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id, status = %req.status))]
pub async fn update_status<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(
        state
            .service
            .update_status(&caller, tx_id, req.status)
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn delete_transaction<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.service.delete_transaction(&caller, tx_id).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn accept_transaction<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.service.accept_transaction(&caller, tx_id).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id, status = %req.status))]
pub async fn confirm_payment<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(
        state
            .service
            .confirm_payment(&caller, tx_id, req)
            .await?,
    ))
}

/// Payment processor callback. The signature covers the raw body, so it is
/// read as bytes and decoded by the service.
#[tracing::instrument(skip(state, headers, body))]
pub async fn payment_callback<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    Ok(Json(
        state.service.payment_callback(&body, signature).await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, transaction_id = %id))]
pub async fn release_funds<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id: TransactionId = parse_id(&id, "transaction")?;
    Ok(Json(state.service.release_funds(&caller, tx_id).await?))
}
