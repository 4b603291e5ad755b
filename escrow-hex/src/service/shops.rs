//! Seller shops.

use escrow_types::domain::normalize_phone;
use escrow_types::domain::validate_email;
use escrow_types::ports::{ImageUpload, NewShop, ShopChanges};
use escrow_types::{
    AppError, CreateShopRequest, EscrowRepository, MessageResponse, RepoError, Shop,
    ShopDetails, ShopId, UpdateShopRequest, User, UserId,
};

use super::{EscrowService, non_blank};

/// A unique violation on `shop_name` is bad input; any other conflict is not.
fn duplicate_name(err: RepoError) -> AppError {
    match err {
        RepoError::Conflict(msg) if msg.contains("shop_name") => {
            AppError::BadRequest("Shop name already exists".into())
        }
        e => e.into(),
    }
}

impl<R: EscrowRepository> EscrowService<R> {
    async fn shop_details(&self, shops: Vec<Shop>) -> Result<Vec<ShopDetails>, AppError> {
        let mut details = Vec::with_capacity(shops.len());
        for shop in shops {
            let owner = self.repo.get_user(shop.owner_id).await?;
            details.push(ShopDetails {
                shop,
                owner: owner.map(|u| u.summary()),
            });
        }
        Ok(details)
    }

    /// Loads a shop the caller owns (or any, for admins).
    async fn owned_shop(&self, caller: &User, id: ShopId) -> Result<Shop, AppError> {
        let shop = self
            .repo
            .get_shop(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shop not found".into()))?;
        if shop.owner_id != caller.id && !caller.is_admin {
            return Err(AppError::Forbidden("You do not own this shop".into()));
        }
        Ok(shop)
    }

    pub async fn create_shop(
        &self,
        caller: &User,
        req: CreateShopRequest,
        icon: Option<ImageUpload>,
    ) -> Result<Shop, AppError> {
        if caller.is_blocked {
            return Err(AppError::Forbidden(
                "Your account is blocked, You can not create a shop".into(),
            ));
        }

        let shop_name = req.shop_name.trim().to_string();
        if shop_name.is_empty() {
            return Err(AppError::BadRequest("Shop name is required".into()));
        }
        if self.repo.find_shop_by_name(&shop_name).await?.is_some() {
            return Err(AppError::BadRequest("Shop name already exists".into()));
        }
        let momo_number = normalize_phone(&req.momo_number)?;
        let email = non_blank(req.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let icon = self.upload_image(icon).await?;

        let shop = self
            .repo
            .create_shop(NewShop {
                shop_name,
                description: req.description.trim().to_string(),
                momo_number,
                email,
                address: non_blank(req.address),
                location: non_blank(req.location),
                icon,
                owner_id: caller.id,
            })
            .await
            .map_err(duplicate_name)?;

        tracing::info!(shop_id = %shop.id, shop_code = %shop.shop_code, owner = %caller.id, "Shop created");
        Ok(shop)
    }

    pub async fn list_shops(&self) -> Result<Vec<ShopDetails>, AppError> {
        let shops = self.repo.list_shops().await?;
        self.shop_details(shops).await
    }

    /// `all` lists every shop; anything else matches code, name or momo number.
    pub async fn search_shops(&self, identifier: &str) -> Result<Vec<ShopDetails>, AppError> {
        let identifier = identifier.trim();
        let shops = if identifier.eq_ignore_ascii_case("all") {
            self.repo.list_shops().await?
        } else {
            self.repo.search_shops(identifier).await?
        };

        if shops.is_empty() {
            return Err(AppError::NotFound("No shops found".into()));
        }
        self.shop_details(shops).await
    }

    pub async fn user_shops(&self, owner: UserId) -> Result<Vec<Shop>, AppError> {
        Ok(self.repo.list_shops_for_owner(owner).await?)
    }

    pub async fn update_shop(
        &self,
        caller: &User,
        id: ShopId,
        req: UpdateShopRequest,
        icon: Option<ImageUpload>,
    ) -> Result<Shop, AppError> {
        self.owned_shop(caller, id).await?;

        let momo_number = non_blank(req.momo_number)
            .map(|n| normalize_phone(&n))
            .transpose()?;
        let email = non_blank(req.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let icon = self.upload_image(icon).await?;

        self.repo
            .update_shop(
                id,
                ShopChanges {
                    shop_name: non_blank(req.shop_name),
                    description: non_blank(req.description),
                    momo_number,
                    email,
                    address: non_blank(req.address),
                    location: non_blank(req.location),
                    icon,
                },
            )
            .await
            .map_err(duplicate_name)?
            .ok_or_else(|| AppError::NotFound("Shop not found".into()))
    }

    pub async fn delete_shop(&self, caller: &User, id: ShopId) -> Result<MessageResponse, AppError> {
        self.owned_shop(caller, id).await?;
        if !self.repo.delete_shop(id).await? {
            return Err(AppError::NotFound("Shop not found".into()));
        }
        Ok(MessageResponse::new("Shop deleted successfully"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(msg: &str) -> RepoError {
        RepoError::Conflict(format!("Duplicate field: {}", msg))
    }

    #[test]
    fn test_only_name_conflicts_read_as_duplicate_name() {
        let sqlite = duplicate_name(conflict("UNIQUE constraint failed: shops.shop_name"));
        assert!(matches!(sqlite, AppError::BadRequest(msg) if msg == "Shop name already exists"));

        let postgres = duplicate_name(conflict(
            "duplicate key value violates unique constraint \"shops_shop_name_key\"",
        ));
        assert!(matches!(postgres, AppError::BadRequest(_)));

        let code = duplicate_name(conflict("UNIQUE constraint failed: shops.shop_code"));
        assert!(matches!(code, AppError::Conflict(_)));

        assert!(matches!(duplicate_name(RepoError::NotFound), AppError::NotFound(_)));
    }
}
