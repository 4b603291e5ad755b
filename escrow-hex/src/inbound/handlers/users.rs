//! Account and authentication handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use escrow_types::{
    BlockUserRequest, EscrowRepository, LoginRequest, OtpRequest, PushTokenRequest,
    RegisterRequest, ResetPasswordRequest, UpdateUserRequest, UserId, VerifyOtpRequest,
};

use super::{ApiError, AppState, parse_id};
use crate::inbound::auth::AuthUser;

#[tracing::instrument(skip(state, req), fields(phone = %req.phone))]
pub async fn register<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.service.register(req).await?;
    Ok((StatusCode::CREATED, Json(auth)))
}

#[tracing::instrument(skip(state, req), fields(phone = %req.phone))]
pub async fn login<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.service.login(req).await?;
    Ok(Json(auth))
}

#[tracing::instrument(skip(state))]
pub async fn send_otp<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<OtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.send_otp(req).await?))
}

#[tracing::instrument(skip(state, req), fields(phone = %req.phone))]
pub async fn verify_otp<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.verify_otp(req).await?))
}

#[tracing::instrument(skip(state, req), fields(phone = %req.phone))]
pub async fn reset_password<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.reset_password(req).await?))
}

/// The authenticated caller.
pub async fn me(Extension(AuthUser(caller)): Extension<AuthUser>) -> impl IntoResponse {
    Json(caller.summary())
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list_users<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_users(&caller).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %id))]
pub async fn get_user<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    Ok(Json(state.service.get_user(user_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get_user_by_code<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_user_by_code(&code).await?))
}

#[tracing::instrument(skip(state, caller, req), fields(caller = %caller.id, user_id = %id))]
pub async fn update_user<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    Ok(Json(state.service.update_user(&caller, user_id, req).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, user_id = %id))]
pub async fn delete_user<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    Ok(Json(state.service.delete_user(&caller, user_id).await?))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, user_id = %id, blocked = req.blocked))]
pub async fn set_blocked<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<BlockUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    Ok(Json(
        state
            .service
            .set_blocked(&caller, user_id, req.blocked)
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller, req), fields(caller = %caller.id))]
pub async fn save_push_token<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Json(req): Json<PushTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.save_push_token(&caller, &req.token).await?))
}
