//! Escrow transaction domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::{TransactionId, UserId};
use super::money::{Currency, Money};

labelled_enum! {
    /// Which side of the deal a party is on.
    PartyRole {
        Buyer => "BUYER",
        Seller => "SELLER",
    }
}

impl PartyRole {
    pub fn opposite(&self) -> PartyRole {
        match self {
            PartyRole::Buyer => PartyRole::Seller,
            PartyRole::Seller => PartyRole::Buyer,
        }
    }
}

labelled_enum! {
    /// Lifecycle of an escrow transaction.
    ///
    /// `PENDING → ACCEPTED → IN_ESCROW → COMPLETED`, or
    /// `IN_ESCROW → DISPUTED → COMPLETED` when an admin settles.
    TransactionStatus {
        /// Created by the initiator, waiting for the counterparty.
        Pending => "PENDING",
        /// Both parties agreed, waiting for the buyer's payment.
        Accepted => "ACCEPTED",
        /// Paid and held.
        InEscrow => "IN_ESCROW",
        /// Funds released or refunded.
        Completed => "COMPLETED",
        /// Held funds frozen pending admin settlement.
        Disputed => "DISPUTED",
        /// Closed by an admin without settlement.
        Cancelled => "CANCELLED",
    }
}

impl TransactionStatus {
    /// Whether details (title, amount, ...) may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, TransactionStatus::Pending)
    }
}

/// A peer-to-peer escrow deal between a buyer and a seller.
///
/// Either side may be unregistered; the counterparty of an unregistered side is
/// reachable through `counterparty_phone` or `seller_momo_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: TransactionId,
    #[schema(example = "ESGH-4F7K2Q")]
    pub trans_code: String,
    #[schema(example = "iPhone 13, 128GB")]
    pub title: String,
    pub description: Option<String>,
    /// Escrowed amount in smallest currency unit
    #[schema(example = 250000)]
    pub amount: i64,
    pub currency: Currency,
    /// Commission in smallest currency unit
    #[schema(example = 5000)]
    pub commission_fee: i64,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub initiated_by: PartyRole,
    pub initiator_accepted: bool,
    pub counterparty_accepted: bool,
    pub counterparty_phone: Option<String>,
    pub seller_momo_number: Option<String>,
    pub delivery_number: Option<String>,
    pub item_image: Option<String>,
    pub status: TransactionStatus,
    pub is_funded: bool,
    pub release_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn money(&self) -> Money {
        Money::new(self.amount, self.currency).unwrap_or_else(|_| Money::zero(self.currency))
    }

    /// The user occupying `role`, if registered.
    pub fn party(&self, role: PartyRole) -> Option<UserId> {
        match role {
            PartyRole::Buyer => self.buyer_id,
            PartyRole::Seller => self.seller_id,
        }
    }

    pub fn initiator_id(&self) -> Option<UserId> {
        self.party(self.initiated_by)
    }

    pub fn counterparty_role(&self) -> PartyRole {
        self.initiated_by.opposite()
    }

    pub fn counterparty_id(&self) -> Option<UserId> {
        self.party(self.counterparty_role())
    }

    /// The role `user` plays in this transaction, if any.
    pub fn role_of(&self, user: UserId) -> Option<PartyRole> {
        if self.buyer_id == Some(user) {
            Some(PartyRole::Buyer)
        } else if self.seller_id == Some(user) {
            Some(PartyRole::Seller)
        } else {
            None
        }
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.role_of(user).is_some()
    }
}
