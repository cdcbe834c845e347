use std::env;

use crate::payments::PaymentProvider;

const PAGBANK_PRODUCTION_URL: &str = "https://api.pagseguro.com";
const PAGBANK_SANDBOX_URL: &str = "https://sandbox.api.pagseguro.com";
const SUMUP_API_URL: &str = "https://api.sumup.com";

/// Credentials and endpoints for the active payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub pagbank_token: Option<String>,
    pub pagbank_base_url: String,
    /// Check `x-authenticity-token` on PagBank webhooks
    pub pagbank_verify_webhooks: bool,
    pub sumup_api_key: Option<String>,
    pub sumup_merchant_code: Option<String>,
    pub sumup_base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl PaymentConfig {
    /// PagBank defaults with no credentials. Tests fill in what they need.
    pub fn unconfigured(provider: PaymentProvider) -> Self {
        Self {
            provider,
            pagbank_token: None,
            pagbank_base_url: PAGBANK_SANDBOX_URL.to_string(),
            pagbank_verify_webhooks: false,
            sumup_api_key: None,
            sumup_merchant_code: None,
            sumup_base_url: SUMUP_API_URL.to_string(),
            currency: "BRL".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public base URL used for webhook, redirect and download links
    pub site_url: String,
    pub jwt_secret: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub payments: PaymentConfig,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    /// Nominal ad-impression value credited per free download
    pub free_download_ad_cents: i64,
    pub download_token_ttl_hours: i64,
    pub dev_mode: bool,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("APPMART_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let site_url = env_opt("SITE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let jwt_secret = match env_opt("JWT_SECRET") {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("JWT_SECRET not set, using an insecure development secret");
                "appmart-dev-secret".to_string()
            }
            None => return Err("JWT_SECRET must be set outside dev mode".to_string()),
        };

        let provider_name = env::var("PAYMENT_PROVIDER").unwrap_or_else(|_| "pagbank".to_string());
        let provider: PaymentProvider = provider_name
            .parse()
            .map_err(|_| format!("Unknown PAYMENT_PROVIDER: {}", provider_name))?;

        let pagbank_sandbox = env::var("PAGBANK_ENV")
            .map(|v| v == "sandbox")
            .unwrap_or(true);
        let pagbank_base_url = env_opt("PAGBANK_API_BASE_URL").unwrap_or_else(|| {
            if pagbank_sandbox {
                PAGBANK_SANDBOX_URL.to_string()
            } else {
                PAGBANK_PRODUCTION_URL.to_string()
            }
        });

        let payments = PaymentConfig {
            provider,
            pagbank_token: env_opt("PAGBANK_TOKEN"),
            pagbank_base_url,
            pagbank_verify_webhooks: env_parse("PAGBANK_WEBHOOK_VERIFY", false),
            sumup_api_key: env_opt("SUMUP_API_KEY"),
            sumup_merchant_code: env_opt("SUMUP_MERCHANT_CODE"),
            sumup_base_url: env_opt("SUMUP_API_BASE_URL")
                .unwrap_or_else(|| SUMUP_API_URL.to_string()),
            currency: env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "BRL".to_string()),
            timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS", 15),
        };

        let smtp = env_opt("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587),
            username: env_opt("SMTP_USER"),
            password: env_opt("SMTP_PASS"),
        });

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "appmart.db".to_string()),
            site_url,
            jwt_secret,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 200 * 1024 * 1024),
            payments,
            smtp,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "AppMart <no-reply@appmart.local>".to_string()),
            free_download_ad_cents: env_parse("FREE_DOWNLOAD_AD_CENTS", 10),
            download_token_ttl_hours: env_parse("DOWNLOAD_TOKEN_TTL_HOURS", 72),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
