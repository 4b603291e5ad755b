//! Configuration loading from environment.

use std::env;

use escrow_hex::outbound::{DEFAULT_ARKESEL_URL, DEFAULT_EXPO_PUSH_URL, DEFAULT_UPLOAD_FOLDER, MomoConfig};
use escrow_hex::tokens::DEFAULT_TOKEN_TTL_SECS;
use escrow_types::domain::normalize_phone;

/// Cloudinary credentials for image uploads.
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

/// Arkesel SMS credentials. The business id is the SMS sender name.
pub struct SmsConfig {
    pub api_key: String,
    pub sender: String,
}

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub rate_limit_per_minute: u32,
    /// Normalized phones that register as admins
    pub admin_phones: Vec<String>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub sms: Option<SmsConfig>,
    /// OTP key; falls back to the SMS key
    pub otp: Option<SmsConfig>,
    pub arkesel_base_url: String,
    pub expo_push_url: String,
    pub payouts: Option<MomoConfig>,
    pub payment_callback_secret: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let port = get("PORT")
            .unwrap_or_else(|| "4000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid PORT: {}", e))?;

        let jwt_ttl_secs = match get("JWT_TTL_SECS") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid JWT_TTL_SECS: {}", e))?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };

        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid RATE_LIMIT_PER_MINUTE: {}", e))?,
            None => 100,
        };

        let admin_phones = get("ADMIN_PHONES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| normalize_phone(p).map_err(|e| anyhow::anyhow!("ADMIN_PHONES: {}", e)))
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: get("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.into()),
            }),
            _ => None,
        };

        let sender = get("SMS_BUSINESS_ID");
        let sms_key = get("SMS_API_KEY");
        let sms = match (&sms_key, &sender) {
            (Some(api_key), Some(sender)) => Some(SmsConfig {
                api_key: api_key.clone(),
                sender: sender.clone(),
            }),
            _ => None,
        };
        let otp = match (get("OTP_API_KEY").or(sms_key), sender) {
            (Some(api_key), Some(sender)) => Some(SmsConfig { api_key, sender }),
            _ => None,
        };

        let payouts = match (
            get("PAYMENT_API_URL"),
            get("PAYMENT_API_USERNAME"),
            get("PAYMENT_API_PASSWORD"),
            get("PAYMENT_API_KEY"),
            get("PAYMENT_MERCHANT_ID"),
        ) {
            (Some(base_url), Some(username), Some(password), Some(api_key), Some(merchant_id)) => {
                Some(MomoConfig {
                    base_url,
                    username,
                    password,
                    api_key,
                    merchant_id,
                })
            }
            _ => None,
        };

        Ok(Self {
            port,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_secs,
            rate_limit_per_minute,
            admin_phones,
            cloudinary,
            sms,
            otp,
            arkesel_base_url: get("ARKESEL_BASE_URL").unwrap_or_else(|| DEFAULT_ARKESEL_URL.into()),
            expo_push_url: get("EXPO_PUSH_URL").unwrap_or_else(|| DEFAULT_EXPO_PUSH_URL.into()),
            payouts,
            payment_callback_secret: get("PAYMENT_CALLBACK_SECRET"),
        })
    }
}
