//! Shop domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::{ShopId, UserId};

/// A seller's storefront listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Shop {
    pub id: ShopId,
    #[schema(example = "SHOP-8QX2LM")]
    pub shop_code: String,
    #[schema(example = "Adwoa's Gadgets")]
    pub shop_name: String,
    pub description: String,
    #[schema(example = "0241234567")]
    pub momo_number: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    /// Uploaded logo URL
    pub icon: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
