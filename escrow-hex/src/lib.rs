//! # Escrow Hex
//!
//! Application service layer, HTTP adapter and outbound gateway adapters
//! for the escrow marketplace service.
//!
//! ## Architecture
//!
//! - `service/` - Application service (orchestrates domain operations)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `outbound/` - Image storage, SMS/OTP, push and mobile-money payout clients
//! - `tokens` - JWT access tokens
//!
//! The service is generic over `R: EscrowRepository`, allowing
//! different repository implementations to be injected.

pub mod inbound;
pub mod openapi;
pub mod outbound;
pub mod service;
pub mod tokens;

#[cfg(test)]
mod service_tests;

pub use service::{EscrowService, Gateways};
pub use tokens::JwtManager;
