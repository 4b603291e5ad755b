//! Accounts, authentication and OTP.

use escrow_repo::security::{hash_password, verify_password};
use escrow_types::domain::{UserProfile, UserSummary, normalize_phone, validate_email, validate_password};
use escrow_types::ports::{NewUser, UserChanges};
use escrow_types::{
    AppError, AuthResponse, EscrowRepository, LoginRequest, MessageResponse, OtpRequest,
    OtpVerification, RegisterRequest, RepoError, ResetPasswordRequest, UpdateUserRequest, User,
    UserId, VerifyOtpRequest,
};

use super::{EscrowService, non_blank, require_admin};

/// Unique violations on user fields are reported as bad input.
fn duplicate_field(err: RepoError) -> AppError {
    match err {
        RepoError::Conflict(msg) if msg.starts_with("Duplicate field") => {
            AppError::BadRequest(msg)
        }
        e => e.into(),
    }
}

fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(e.to_string()))
}

impl<R: EscrowRepository> EscrowService<R> {
    /// Registers a user and signs them in.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".into()));
        }
        let phone = normalize_phone(&req.phone)?;
        let email = non_blank(req.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        validate_password(&req.password)?;

        let is_admin = self.admin_phones.iter().any(|p| p == &phone);
        let user = self
            .repo
            .create_user(NewUser {
                name,
                email,
                phone,
                password_hash: hash(&req.password)?,
                is_admin,
            })
            .await
            .map_err(duplicate_field)?;

        tracing::info!(user_id = %user.id, is_admin, "User registered");
        self.sign_in(&user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        let phone = normalize_phone(&req.phone)?;
        let user = self
            .repo
            .find_user_by_phone(&phone)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if !verify_password(&req.password, &user.password_hash) {
            return Err(AppError::BadRequest("Invalid password".into()));
        }

        self.sign_in(&user)
    }

    fn sign_in(&self, user: &User) -> Result<AuthResponse, AppError> {
        Ok(AuthResponse {
            user: user.summary(),
            access_token: self.tokens.issue(user)?,
        })
    }

    /// Resolves a bearer token to a fresh, unblocked user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let claims = self.tokens.validate(token)?;
        let user = self
            .repo
            .get_user(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;

        if user.is_blocked {
            return Err(AppError::Forbidden(
                "Your account has been blocked. Please contact support.".into(),
            ));
        }
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // OTP & password reset
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn send_otp(&self, req: OtpRequest) -> Result<MessageResponse, AppError> {
        let phone = normalize_phone(&req.phone)?;
        self.gateways.otp.send_otp(&phone).await?;
        Ok(MessageResponse::new("OTP sent successfully"))
    }

    pub async fn verify_otp(&self, req: VerifyOtpRequest) -> Result<OtpVerification, AppError> {
        let phone = normalize_phone(&req.phone)?;
        let verified = self.gateways.otp.verify_otp(&phone, req.code.trim()).await?;
        Ok(OtpVerification { verified })
    }

    pub async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<MessageResponse, AppError> {
        let phone = normalize_phone(&req.phone)?;
        let user = self
            .repo
            .find_user_by_phone(&phone)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        validate_password(&req.password)?;

        if !self.gateways.otp.verify_otp(&phone, req.code.trim()).await? {
            return Err(AppError::BadRequest("Invalid or expired OTP".into()));
        }

        if !self
            .repo
            .update_password(user.id, &hash(&req.password)?)
            .await?
        {
            return Err(AppError::NotFound("User not found".into()));
        }

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(MessageResponse::new("Password reset successfully"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Profiles
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self, caller: &User) -> Result<Vec<UserProfile>, AppError> {
        require_admin(caller)?;
        let users = self.repo.list_users().await?;
        Ok(users.iter().map(User::profile).collect())
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserSummary, AppError> {
        Ok(self.load_user(id).await?.summary())
    }

    pub async fn get_user_by_code(&self, code: &str) -> Result<UserSummary, AppError> {
        self.repo
            .find_user_by_code(code.trim())
            .await?
            .map(|u| u.summary())
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn update_user(
        &self,
        caller: &User,
        id: UserId,
        req: UpdateUserRequest,
    ) -> Result<UserSummary, AppError> {
        if caller.id != id {
            require_admin(caller).map_err(|_| {
                AppError::Forbidden("You can only update your own profile".into())
            })?;
        }

        let name = non_blank(req.name);
        let email = non_blank(req.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let phone = non_blank(req.phone)
            .map(|p| normalize_phone(&p))
            .transpose()?;

        self.repo
            .update_user(id, UserChanges { name, email, phone })
            .await
            .map_err(duplicate_field)?
            .map(|u| u.summary())
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn delete_user(&self, caller: &User, id: UserId) -> Result<MessageResponse, AppError> {
        require_admin(caller)?;
        if !self.repo.delete_user(id).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        tracing::info!(user_id = %id, admin = %caller.id, "User deleted");
        Ok(MessageResponse::new("User deleted successfully"))
    }

    pub async fn set_blocked(
        &self,
        caller: &User,
        id: UserId,
        blocked: bool,
    ) -> Result<UserProfile, AppError> {
        require_admin(caller)?;
        let user = self
            .repo
            .set_user_blocked(id, blocked)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        tracing::info!(user_id = %id, blocked, "User block status changed");
        Ok(user.profile())
    }

    pub async fn save_push_token(
        &self,
        caller: &User,
        token: &str,
    ) -> Result<MessageResponse, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::BadRequest("Push token is required".into()));
        }
        self.repo.set_push_token(caller.id, Some(token)).await?;
        Ok(MessageResponse::new("Push token saved"))
    }
}
