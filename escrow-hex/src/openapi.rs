//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use escrow_types::domain::{
    Currency, Dispute, DisputeId, DisputeStatus, DisputeStatusCount, PartyRole, Payment,
    PaymentMethod, PaymentStatus, PayoutStatus, Settlement, SettlementType, Shop, ShopId,
    Transaction, TransactionId, TransactionStatus, UserId, UserProfile, UserSummary,
};
use escrow_types::dto::{
    AuthResponse, BlockUserRequest, CommissionQuote, ConfirmPaymentRequest, CreateShopRequest,
    CreateTransactionRequest, DisputeDetails, LoginRequest, MessageResponse, OpenDisputeRequest,
    OtpRequest, OtpVerification, Page, PageQuery, PaymentCallback, PaymentConfirmation,
    Percentage, PushTokenRequest, RegisterRequest, ResetPasswordRequest, SendNotificationRequest,
    SettleDisputeRequest, ShopDetails, TransactionAck, TransactionDetails, TransactionFilter,
    TransactionStats, TransactionStatusResponse, UpdateDisputeStatusRequest, UpdateShopRequest,
    UpdateStatusRequest, UpdateTransactionRequest, UpdateUserRequest, UserStatistics,
    VerifyOtpRequest,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

// ── Users ───────────────────────────────────────────────────────────────────

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or duplicate phone/email")
    )
)]
async fn register() {}

/// Exchange phone and password for an access token
#[utoipa::path(
    post,
    path = "/api/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid password"),
        (status = 404, description = "User not found")
    )
)]
async fn login() {}

/// Send a one-time password by SMS
#[utoipa::path(
    post,
    path = "/api/users/otp/send",
    tag = "users",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 503, description = "OTP provider not configured")
    )
)]
async fn send_otp() {}

/// Check a one-time password
#[utoipa::path(
    post,
    path = "/api/users/otp/verify",
    tag = "users",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verification result", body = OtpVerification)
    )
)]
async fn verify_otp() {}

/// Reset a password with an OTP
#[utoipa::path(
    post,
    path = "/api/users/reset-password",
    tag = "users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 404, description = "User not found")
    )
)]
async fn reset_password() {}

/// Current user
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated user", body = UserSummary),
        (status = 401, description = "Unauthorized")
    )
)]
async fn me() {}

/// List all users (admin)
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<UserProfile>),
        (status = 403, description = "Admins only")
    )
)]
async fn list_users() {}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = UserId, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "User", body = UserSummary),
        (status = 404, description = "User not found")
    )
)]
async fn get_user() {}

/// Get a user by their share code
#[utoipa::path(
    get,
    path = "/api/users/code/{code}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Six character user code")),
    responses(
        (status = 200, description = "User", body = UserSummary),
        (status = 404, description = "User not found")
    )
)]
async fn get_user_by_code() {}

/// Update a profile (self or admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = UserId, Path, description = "User ID (UUID)")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserSummary),
        (status = 403, description = "Not allowed")
    )
)]
async fn update_user() {}

/// Delete a user (admin)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = UserId, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 409, description = "User still has transactions")
    )
)]
async fn delete_user() {}

/// Block or unblock a user (admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}/block",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = UserId, Path, description = "User ID (UUID)")),
    request_body = BlockUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 403, description = "Admins only")
    )
)]
async fn set_blocked() {}

/// Store the caller's Expo push token
#[utoipa::path(
    put,
    path = "/api/users/push-token",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = PushTokenRequest,
    responses(
        (status = 200, description = "Token saved", body = MessageResponse)
    )
)]
async fn save_push_token() {}

// ── Transactions ────────────────────────────────────────────────────────────

/// Create a transaction. Multipart: `payload` (JSON) and optional `file` (image)
#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body(content = CreateTransactionRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Transaction created", body = TransactionAck),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Account blocked")
    )
)]
async fn create_transaction() {}

/// List all transactions (admin)
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "One page of transactions", body = Page<TransactionDetails>),
        (status = 403, description = "Admins only")
    )
)]
async fn list_transactions() {}

/// Filter transactions (admin)
#[utoipa::path(
    get,
    path = "/api/transactions/filter",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionFilter, PageQuery),
    responses(
        (status = 200, description = "One page of matching transactions", body = Page<TransactionDetails>),
        (status = 403, description = "Admins only")
    )
)]
async fn filter_transactions() {}

/// Platform totals (admin)
#[utoipa::path(
    get,
    path = "/api/transactions/stats",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Totals", body = TransactionStats),
        (status = 403, description = "Admins only")
    )
)]
async fn transaction_stats() {}

/// The caller's most recent transactions
#[utoipa::path(
    get,
    path = "/api/transactions/recent",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Up to five transactions", body = Vec<Transaction>)
    )
)]
async fn recent_transactions() {}

/// Every transaction the caller is a party to
#[utoipa::path(
    get,
    path = "/api/transactions/mine",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transactions", body = Vec<Transaction>)
    )
)]
async fn my_transactions() {}

/// Purchase statistics for the caller
#[utoipa::path(
    get,
    path = "/api/transactions/statistics",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Statistics", body = UserStatistics)
    )
)]
async fn user_statistics() {}

/// Get a transaction by ID
#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Transaction", body = TransactionDetails),
        (status = 404, description = "Transaction not found")
    )
)]
async fn get_transaction() {}

/// Get a transaction by its code
#[utoipa::path(
    get,
    path = "/api/transactions/code/{code}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Transaction code")),
    responses(
        (status = 200, description = "Transaction", body = TransactionDetails),
        (status = 404, description = "Transaction not found")
    )
)]
async fn get_transaction_by_code() {}

/// Current status of a transaction
#[utoipa::path(
    get,
    path = "/api/transactions/{id}/status",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Status", body = TransactionStatusResponse)
    )
)]
async fn get_transaction_status() {}

/// Override a transaction's status (admin)
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/status",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Transaction),
        (status = 403, description = "Admins only")
    )
)]
async fn update_status() {}

/// Edit a pending transaction
#[utoipa::path(
    put,
    path = "/api/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Updated", body = Transaction),
        (status = 409, description = "Transaction can no longer be edited")
    )
)]
async fn update_transaction() {}

/// Delete a transaction
#[utoipa::path(
    delete,
    path = "/api/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse)
    )
)]
async fn delete_transaction() {}

/// Accept a transaction as the counterparty
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/accept",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Accepted", body = TransactionAck),
        (status = 403, description = "Already accepted, or not the counterparty"),
        (status = 409, description = "Transaction is no longer pending")
    )
)]
async fn accept_transaction() {}

/// Record the buyer's payment
#[utoipa::path(
    put,
    path = "/api/transactions/{id}/payment",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = PaymentConfirmation),
        (status = 400, description = "Transaction not accepted yet")
    )
)]
async fn confirm_payment() {}

/// Signed payment notification from the processor
#[utoipa::path(
    post,
    path = "/api/payments/callback",
    tag = "payments",
    request_body = PaymentCallback,
    params(("X-Escrow-Signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")),
    responses(
        (status = 200, description = "Payment recorded", body = PaymentConfirmation),
        (status = 401, description = "Invalid signature"),
        (status = 503, description = "Callback secret not configured")
    )
)]
async fn payment_callback() {}

/// Release escrowed funds to the seller (buyer)
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/release",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Funds released", body = MessageResponse),
        (status = 400, description = "Funds cannot be released at this stage")
    )
)]
async fn release_funds() {}

// ── Disputes ────────────────────────────────────────────────────────────────

/// Raise a dispute. Multipart: `payload` (JSON) and optional `file` (evidence)
#[utoipa::path(
    post,
    path = "/api/transactions/{id}/disputes",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body(content = OpenDisputeRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Dispute created", body = MessageResponse),
        (status = 403, description = "Not a party to the transaction"),
        (status = 409, description = "Transaction is not in escrow")
    )
)]
async fn open_dispute() {}

/// Disputes of one transaction
#[utoipa::path(
    get,
    path = "/api/transactions/{id}/disputes",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    responses(
        (status = 200, description = "Disputes", body = Vec<Dispute>)
    )
)]
async fn transaction_disputes() {}

/// List disputes (admin)
#[utoipa::path(
    get,
    path = "/api/disputes",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("status" = Option<String>, Query, description = "OPEN, INPROGRESS, RESOLVED or REJECTED")),
    responses(
        (status = 200, description = "Disputes", body = Vec<DisputeDetails>),
        (status = 403, description = "Admins only")
    )
)]
async fn list_disputes() {}

/// Disputes raised by a user
#[utoipa::path(
    get,
    path = "/api/disputes/user/{user_id}",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("user_id" = UserId, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "Disputes", body = Vec<Dispute>)
    )
)]
async fn user_disputes() {}

/// Dispute counts per status for a user
#[utoipa::path(
    get,
    path = "/api/disputes/user/{user_id}/counts",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("user_id" = UserId, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "Counts", body = DisputeStatusCount)
    )
)]
async fn dispute_counts() {}

/// Move a dispute to another status (admin)
#[utoipa::path(
    put,
    path = "/api/disputes/{id}/status",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("id" = DisputeId, Path, description = "Dispute ID (UUID)")),
    request_body = UpdateDisputeStatusRequest,
    responses(
        (status = 200, description = "Updated dispute", body = Dispute),
        (status = 404, description = "Dispute not found")
    )
)]
async fn update_dispute_status() {}

/// Settle a disputed transaction (admin)
#[utoipa::path(
    post,
    path = "/api/disputes/settle/{transaction_id}",
    tag = "disputes",
    security(("bearer_auth" = [])),
    params(("transaction_id" = TransactionId, Path, description = "Transaction ID (UUID)")),
    request_body = SettleDisputeRequest,
    responses(
        (status = 200, description = "Dispute settled", body = MessageResponse),
        (status = 400, description = "Transaction not eligible for settlement")
    )
)]
async fn settle_dispute() {}

/// All settlements (admin)
#[utoipa::path(
    get,
    path = "/api/settlements",
    tag = "disputes",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Settlements", body = Vec<Settlement>),
        (status = 403, description = "Admins only")
    )
)]
async fn list_settlements() {}

// ── Shops ───────────────────────────────────────────────────────────────────

/// Create a shop. Multipart: `payload` (JSON) and optional `file` (icon)
#[utoipa::path(
    post,
    path = "/api/shops",
    tag = "shops",
    security(("bearer_auth" = [])),
    request_body(content = CreateShopRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Shop created", body = Shop),
        (status = 400, description = "Shop name already exists")
    )
)]
async fn create_shop() {}

/// List all shops
#[utoipa::path(
    get,
    path = "/api/shops",
    tag = "shops",
    responses(
        (status = 200, description = "Shops", body = Vec<ShopDetails>)
    )
)]
async fn list_shops() {}

/// Search shops by name, or `all`
#[utoipa::path(
    get,
    path = "/api/shops/search/{identifier}",
    tag = "shops",
    params(("identifier" = String, Path, description = "Name fragment or `all`")),
    responses(
        (status = 200, description = "Matching shops", body = Vec<ShopDetails>),
        (status = 404, description = "No shops found")
    )
)]
async fn search_shops() {}

/// Shops owned by a user
#[utoipa::path(
    get,
    path = "/api/shops/user/{user_id}",
    tag = "shops",
    security(("bearer_auth" = [])),
    params(("user_id" = UserId, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "Shops", body = Vec<Shop>)
    )
)]
async fn user_shops() {}

/// Update a shop. Multipart: `payload` (JSON) and optional `file` (icon)
#[utoipa::path(
    put,
    path = "/api/shops/{id}",
    tag = "shops",
    security(("bearer_auth" = [])),
    params(("id" = ShopId, Path, description = "Shop ID (UUID)")),
    request_body(content = UpdateShopRequest, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated shop", body = Shop),
        (status = 403, description = "Not the owner")
    )
)]
async fn update_shop() {}

/// Delete a shop
#[utoipa::path(
    delete,
    path = "/api/shops/{id}",
    tag = "shops",
    security(("bearer_auth" = [])),
    params(("id" = ShopId, Path, description = "Shop ID (UUID)")),
    responses(
        (status = 200, description = "Shop deleted", body = MessageResponse)
    )
)]
async fn delete_shop() {}

// ── Misc ────────────────────────────────────────────────────────────────────

/// Commission for an amount in pesewas
#[utoipa::path(
    get,
    path = "/api/commissions/calculate/{amount}",
    tag = "commissions",
    params(("amount" = i64, Path, description = "Amount in smallest currency unit")),
    responses(
        (status = 200, description = "Quote", body = CommissionQuote),
        (status = 400, description = "Invalid transaction amount")
    )
)]
async fn calculate_commission() {}

/// Push a notification to a device (admin)
#[utoipa::path(
    post,
    path = "/api/notifications/send",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Notification sent", body = MessageResponse),
        (status = 502, description = "Push service rejected the message")
    )
)]
async fn send_notification() {}

/// OpenAPI documentation for the Escrow API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Escrow Marketplace API",
        version = "1.0.0",
        description = "Peer-to-peer escrow for buyers and sellers paying by mobile money.\n\n## Authentication\n\nRegister or log in to receive an access token, then include it in the `Authorization` header:\n\n```\nAuthorization: Bearer <access_token>\n```",
        license(name = "MIT"),
    ),
    paths(
        health,
        register,
        login,
        send_otp,
        verify_otp,
        reset_password,
        me,
        list_users,
        get_user,
        get_user_by_code,
        update_user,
        delete_user,
        set_blocked,
        save_push_token,
        create_transaction,
        list_transactions,
        filter_transactions,
        transaction_stats,
        recent_transactions,
        my_transactions,
        user_statistics,
        get_transaction,
        get_transaction_by_code,
        get_transaction_status,
        update_status,
        update_transaction,
        delete_transaction,
        accept_transaction,
        confirm_payment,
        payment_callback,
        release_funds,
        open_dispute,
        transaction_disputes,
        list_disputes,
        user_disputes,
        dispute_counts,
        update_dispute_status,
        settle_dispute,
        list_settlements,
        create_shop,
        list_shops,
        search_shops,
        user_shops,
        update_shop,
        delete_shop,
        calculate_commission,
        send_notification,
    ),
    components(
        schemas(
            Currency,
            PartyRole,
            TransactionStatus,
            PaymentStatus,
            PaymentMethod,
            DisputeStatus,
            SettlementType,
            PayoutStatus,
            UserId,
            TransactionId,
            DisputeId,
            ShopId,
            UserSummary,
            UserProfile,
            Transaction,
            Payment,
            Dispute,
            DisputeStatusCount,
            Settlement,
            Shop,
            MessageResponse,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UpdateUserRequest,
            ResetPasswordRequest,
            PushTokenRequest,
            BlockUserRequest,
            OtpRequest,
            VerifyOtpRequest,
            OtpVerification,
            CreateTransactionRequest,
            TransactionAck,
            UpdateTransactionRequest,
            UpdateStatusRequest,
            TransactionStatusResponse,
            ConfirmPaymentRequest,
            PaymentCallback,
            PaymentConfirmation,
            TransactionStats,
            UserStatistics,
            TransactionDetails,
            OpenDisputeRequest,
            SettleDisputeRequest,
            UpdateDisputeStatusRequest,
            DisputeDetails,
            CreateShopRequest,
            UpdateShopRequest,
            ShopDetails,
            SendNotificationRequest,
            CommissionQuote,
            Percentage,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Accounts, login and OTP"),
        (name = "transactions", description = "Escrow transaction lifecycle"),
        (name = "payments", description = "Funding and release of escrowed money"),
        (name = "disputes", description = "Disputes and settlements"),
        (name = "shops", description = "Seller storefronts"),
        (name = "commissions", description = "Commission schedule"),
        (name = "notifications", description = "Push notifications"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for Bearer token authentication.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
