//! # Escrow Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Build the outbound gateways that have credentials
//! - Create the escrow service
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escrow_hex::outbound::{ArkeselOtp, ArkeselSms, CloudinaryStore, ExpoPush, MomoPayouts};
use escrow_hex::{EscrowService, Gateways, JwtManager, inbound::HttpServer};
use escrow_repo::build_repo;

use config::Config;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create OTLP span exporter: {}", e))?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("escrow-service"), provider))
}

/// Real adapters where credentials exist, not-configured stand-ins elsewhere.
fn build_gateways(config: &Config) -> Gateways {
    let mut gateways = Gateways::disabled();

    match &config.cloudinary {
        Some(c) => {
            gateways.images = Arc::new(CloudinaryStore::new(
                &c.cloud_name,
                &c.api_key,
                &c.api_secret,
                &c.folder,
            ))
        }
        None => tracing::warn!("Cloudinary credentials missing; image uploads are disabled"),
    }

    match &config.sms {
        Some(sms) => {
            gateways.sms = Arc::new(ArkeselSms::new(
                &config.arkesel_base_url,
                &sms.api_key,
                &sms.sender,
            ))
        }
        None => tracing::warn!("SMS_API_KEY or SMS_BUSINESS_ID missing; SMS is disabled"),
    }

    match &config.otp {
        Some(otp) => {
            gateways.otp = Arc::new(ArkeselOtp::new(
                &config.arkesel_base_url,
                &otp.api_key,
                &otp.sender,
            ))
        }
        None => tracing::warn!("OTP credentials missing; OTP and password reset are disabled"),
    }

    gateways.push = Arc::new(ExpoPush::new(&config.expo_push_url));

    match &config.payouts {
        Some(momo) => gateways.payouts = Arc::new(MomoPayouts::new(momo.clone())),
        None => {
            tracing::warn!("Payment API credentials missing; payouts are left for manual processing")
        }
    }

    gateways
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,escrow_app=debug,escrow_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting escrow server on port {}", config.port);

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    if config.payment_callback_secret.is_none() {
        tracing::warn!("PAYMENT_CALLBACK_SECRET missing; payment callbacks are rejected");
    }

    // Create the escrow service
    let service = EscrowService::new(
        repo,
        JwtManager::new(config.jwt_secret.clone(), config.jwt_ttl_secs),
    )
    .with_gateways(build_gateways(&config))
    .with_admin_phones(config.admin_phones.clone())
    .with_callback_secret(config.payment_callback_secret.clone());

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(service, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
