//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use escrow_types::{AppError, EscrowRepository, User};

use super::handlers::{ApiError, AppState};

/// The authenticated caller, inserted as a request extension.
#[derive(Clone)]
pub struct AuthUser(pub User);

/// Extracts the token from the Authorization header.
/// Expected format: "Bearer <token>" or just "<token>"
pub(crate) fn extract_token(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?.trim();
    let token = match header.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
        _ => header,
    };
    if token.is_empty() { None } else { Some(token) }
}

/// Authentication middleware for the protected routes.
///
/// Validates the JWT, reloads the user so blocking takes effect immediately,
/// and rejects blocked accounts with 403.
pub async fn auth_middleware<R: EscrowRepository>(
    State(state): State<Arc<AppState<R>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let Some(token) = extract_token(auth_header) else {
        return ApiError(AppError::Unauthorized(
            "Missing or invalid Authorization header".into(),
        ))
        .into_response();
    };

    match state.service.authenticate(token).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, "Authenticated request");
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}
