//! # Escrow Types
//!
//! Domain types and port traits for the escrow marketplace service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, User, Transaction, Dispute, Shop)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Currency, Dispute, DisputeId, DisputeStatus, Money, PartyRole, Payment, PaymentStatus,
    Settlement, Shop, ShopId, Transaction, TransactionId, TransactionStatus, User, UserId,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::{EscrowRepository, GatewayError};
