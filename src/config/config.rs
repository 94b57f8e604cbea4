use std::time::Duration;

use chrono::Duration as ChronoDuration;
use color_eyre::Result;
use dotenv::dotenv;
use eyre::WrapErr;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub platform_name: String,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,

    #[serde(default = "default_otp_ttl_seconds")]
    pub otp_ttl_seconds: i64,
    #[serde(default = "default_resend_cooldown_seconds")]
    pub resend_cooldown_seconds: i64,
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i32,
    #[serde(default = "default_exchange_token_ttl_seconds")]
    pub exchange_token_ttl_seconds: i64,
}

fn default_otp_ttl_seconds() -> i64 {
    300
}

fn default_resend_cooldown_seconds() -> i64 {
    60
}

fn default_otp_max_attempts() -> i32 {
    5
}

fn default_exchange_token_ttl_seconds() -> i64 {
    900
}

/// Time windows and budgets of the registration state machine. All waiting is
/// stored timestamps compared against the current time at read/verify time.
#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub otp_ttl: ChronoDuration,
    pub resend_cooldown: ChronoDuration,
    pub max_attempts: i32,
    pub token_ttl: ChronoDuration,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            otp_ttl: ChronoDuration::seconds(default_otp_ttl_seconds()),
            resend_cooldown: ChronoDuration::seconds(default_resend_cooldown_seconds()),
            max_attempts: default_otp_max_attempts(),
            token_ttl: ChronoDuration::seconds(default_exchange_token_ttl_seconds()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        info!("Initializing configuration");
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .wrap_err("Building configuration")?;

        settings
            .try_deserialize()
            .wrap_err("loading configuration from environment")
    }

    pub async fn db_pool(&self) -> Result<PgPool> {
        info!("Initializing database pool");
        PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&self.database_url)
            .await
            .wrap_err("Creating database pool")
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            otp_ttl: ChronoDuration::seconds(self.otp_ttl_seconds),
            resend_cooldown: ChronoDuration::seconds(self.resend_cooldown_seconds),
            max_attempts: self.otp_max_attempts,
            token_ttl: ChronoDuration::seconds(self.exchange_token_ttl_seconds),
        }
    }
}
