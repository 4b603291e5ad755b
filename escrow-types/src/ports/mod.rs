//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod gateways;
mod repository;

pub use gateways::{
    GatewayError, ImageStore, ImageUpload, OtpProvider, PayoutProvider, PayoutRequest,
    PushMessage, PushNotifier, SmsSender,
};
pub use repository::{
    DisputeResolution, EscrowRepository, NewDispute, NewPayment, NewSettlement, NewShop,
    NewTransaction, NewUser, PartyBinding, ShopChanges, TransactionChanges, UserChanges,
};
