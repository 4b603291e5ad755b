//! Shop handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use escrow_types::{CreateShopRequest, EscrowRepository, ShopId, UpdateShopRequest, UserId};

use super::{ApiError, AppState, parse_id, read_multipart};
use crate::inbound::auth::AuthUser;

/// Create a shop from a multipart `payload` plus optional icon.
#[tracing::instrument(skip(state, caller, multipart), fields(caller = %caller.id))]
pub async fn create_shop<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_multipart::<CreateShopRequest>(multipart).await?;
    let shop = state
        .service
        .create_shop(&caller, form.payload, form.file)
        .await?;
    Ok((StatusCode::CREATED, Json(shop)))
}

#[tracing::instrument(skip(state))]
pub async fn list_shops<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_shops().await?))
}

#[tracing::instrument(skip(state))]
pub async fn search_shops<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.search_shops(&identifier).await?))
}

#[tracing::instrument(skip(state), fields(user_id = %user_id))]
pub async fn user_shops<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner: UserId = parse_id(&user_id, "user")?;
    Ok(Json(state.service.user_shops(owner).await?))
}

#[tracing::instrument(skip(state, caller, multipart), fields(caller = %caller.id, shop_id = %id))]
pub async fn update_shop<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let shop_id: ShopId = parse_id(&id, "shop")?;
    let form = read_multipart::<UpdateShopRequest>(multipart).await?;
    Ok(Json(
        state
            .service
            .update_shop(&caller, shop_id, form.payload, form.file)
            .await?,
    ))
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.id, shop_id = %id))]
pub async fn delete_shop<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(AuthUser(caller)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let shop_id: ShopId = parse_id(&id, "shop")?;
    Ok(Json(state.service.delete_shop(&caller, shop_id).await?))
}
