//! HTTP Server configuration and startup.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use escrow_types::EscrowRepository;

use super::auth::auth_middleware;
use super::handlers::{self, AppState, disputes, misc, shops, transactions, users};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::EscrowService;
use crate::openapi::ApiDoc;

/// Uploads are images; anything above this is refused.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// HTTP Server for the Escrow API.
pub struct HttpServer<R: EscrowRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: EscrowRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: EscrowService<R>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: EscrowService<R>, requests_per_minute: u32) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Routes that need no token.
    fn public_routes(&self) -> Router<Arc<AppState<R>>> {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/users/register", post(users::register::<R>))
            .route("/api/users/login", post(users::login::<R>))
            .route("/api/users/otp/send", post(users::send_otp::<R>))
            .route("/api/users/otp/verify", post(users::verify_otp::<R>))
            .route("/api/users/reset-password", post(users::reset_password::<R>))
            .route("/api/payments/callback", post(transactions::payment_callback::<R>))
            .route(
                "/api/commissions/calculate/{amount}",
                get(misc::calculate_commission::<R>),
            )
            .route("/api/shops", get(shops::list_shops::<R>))
            .route("/api/shops/search/{identifier}", get(shops::search_shops::<R>))
    }

    /// Routes behind the bearer-token guard.
    fn protected_routes(&self) -> Router<Arc<AppState<R>>> {
        Router::new()
            // Users
            .route("/api/users", get(users::list_users::<R>))
            .route("/api/users/me", get(users::me))
            .route("/api/users/push-token", put(users::save_push_token::<R>))
            .route("/api/users/code/{code}", get(users::get_user_by_code::<R>))
            .route(
                "/api/users/{id}",
                get(users::get_user::<R>)
                    .put(users::update_user::<R>)
                    .delete(users::delete_user::<R>),
            )
            .route("/api/users/{id}/block", put(users::set_blocked::<R>))
            // Transactions
            .route(
                "/api/transactions",
                post(transactions::create_transaction::<R>)
                    .get(transactions::list_transactions::<R>),
            )
            .route(
                "/api/transactions/filter",
                get(transactions::filter_transactions::<R>),
            )
            .route(
                "/api/transactions/stats",
                get(transactions::transaction_stats::<R>),
            )
            .route(
                "/api/transactions/recent",
                get(transactions::recent_transactions::<R>),
            )
            .route(
                "/api/transactions/mine",
                get(transactions::my_transactions::<R>),
            )
            .route(
                "/api/transactions/statistics",
                get(transactions::user_statistics::<R>),
            )
            .route(
                "/api/transactions/code/{code}",
                get(transactions::get_transaction_by_code::<R>),
            )
            .route(
                "/api/transactions/{id}",
                get(transactions::get_transaction::<R>)
                    .put(transactions::update_transaction::<R>)
                    .delete(transactions::delete_transaction::<R>),
            )
            .route(
                "/api/transactions/{id}/status",
                get(transactions::get_transaction_status::<R>)
                    .post(transactions::update_status::<R>),
            )
            .route(
                "/api/transactions/{id}/accept",
                post(transactions::accept_transaction::<R>),
            )
            .route(
                "/api/transactions/{id}/payment",
                put(transactions::confirm_payment::<R>),
            )
            .route(
                "/api/transactions/{id}/release",
                post(transactions::release_funds::<R>),
            )
            .route(
                "/api/transactions/{id}/disputes",
                post(disputes::open_dispute::<R>).get(disputes::transaction_disputes::<R>),
            )
            // Disputes
            .route("/api/disputes", get(disputes::list_disputes::<R>))
            .route(
                "/api/disputes/user/{user_id}",
                get(disputes::user_disputes::<R>),
            )
            .route(
                "/api/disputes/user/{user_id}/counts",
                get(disputes::dispute_counts::<R>),
            )
            .route(
                "/api/disputes/{id}/status",
                put(disputes::update_dispute_status::<R>),
            )
            .route(
                "/api/disputes/settle/{transaction_id}",
                post(disputes::settle_dispute::<R>),
            )
            // Settlements, shops, notifications
            .route("/api/settlements", get(misc::list_settlements::<R>))
            .route("/api/shops", post(shops::create_shop::<R>))
            .route("/api/shops/user/{user_id}", get(shops::user_shops::<R>))
            .route(
                "/api/shops/{id}",
                put(shops::update_shop::<R>).delete(shops::delete_shop::<R>),
            )
            .route(
                "/api/notifications/send",
                post(misc::send_notification::<R>),
            )
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<R>,
            ))
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        self.public_routes()
            .merge(self.protected_routes())
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                (self.rate_limiter.clone(), self.state.clone()),
                rate_limit_middleware::<R>,
            ))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
