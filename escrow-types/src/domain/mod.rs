//! Domain models for the escrow service.

/// Declares a fieldless enum persisted and serialized as an upper-case label.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            utoipa::ToSchema,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        let valid: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        $crate::error::DomainError::ValidationError(format!(
                            "Invalid {} '{}'. Valid values: {}",
                            stringify!($name),
                            s,
                            valid.join(", ")
                        ))
                    })
            }
        }
    };
}

pub mod dispute;
pub mod id;
pub mod money;
pub mod payment;
pub mod settlement;
pub mod shop;
pub mod transaction;
pub mod user;

pub use dispute::{Dispute, DisputeStatus, DisputeStatusCount};
pub use id::{DisputeId, PaymentId, SettlementId, ShopId, TransactionId, UserId};
pub use money::{Currency, Money};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use settlement::{PayoutStatus, Settlement, SettlementType, UNREGISTERED_RECIPIENT};
pub use shop::Shop;
pub use transaction::{PartyRole, Transaction, TransactionStatus};
pub use user::{
    User, UserProfile, UserSummary, normalize_phone, validate_email, validate_password,
};
