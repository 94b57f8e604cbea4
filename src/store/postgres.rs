use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use eyre::{Result, WrapErr};
use sqlx::{Error as SqlxError, PgPool};
use uuid::Uuid;

use crate::models::{
    account::{Account, NewAccount},
    exchange_token::ExchangeToken,
    pending_otp::PendingOtp,
};
use crate::store::RegistrationStore;

/// Postgres-backed store. Multiple server workers observe the same rows, so
/// every race-prone mutation is a single conditional statement.
pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn get_pending_otp(&self, email: &str) -> Result<Option<PendingOtp>> {
        sqlx::query_as::<_, PendingOtp>(
            r#"
                SELECT email, code_hash, issued_at, expires_at, attempts_remaining
                FROM pending_otps
                WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .wrap_err("fetching pending OTP")
    }

    async fn put_pending_otp(&self, record: PendingOtp, cooldown: Duration) -> Result<bool> {
        // The DO UPDATE guard makes check-and-replace atomic: the upsert only
        // lands when the existing row is expired or its cooldown has elapsed.
        let cooldown_cutoff = record.issued_at - cooldown;
        let result = sqlx::query(
            r#"
                INSERT INTO pending_otps (email, code_hash, issued_at, expires_at, attempts_remaining)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (email)
                DO UPDATE SET
                    code_hash = EXCLUDED.code_hash,
                    issued_at = EXCLUDED.issued_at,
                    expires_at = EXCLUDED.expires_at,
                    attempts_remaining = EXCLUDED.attempts_remaining
                WHERE pending_otps.expires_at <= EXCLUDED.issued_at
                   OR pending_otps.issued_at <= $6
            "#,
        )
        .bind(&record.email)
        .bind(&record.code_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.attempts_remaining)
        .bind(cooldown_cutoff)
        .execute(&self.pool)
        .await
        .wrap_err("storing pending OTP")?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_pending_otp(&self, email: &str, code_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_otps WHERE email = $1 AND code_hash = $2")
            .bind(email)
            .bind(code_hash)
            .execute(&self.pool)
            .await
            .wrap_err("claiming pending OTP")?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(&self, email: &str, code_hash: &str) -> Result<Option<i32>> {
        sqlx::query_scalar::<_, i32>(
            r#"
                UPDATE pending_otps
                SET attempts_remaining = attempts_remaining - 1
                WHERE email = $1 AND code_hash = $2
                RETURNING attempts_remaining
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await
        .wrap_err("recording failed OTP attempt")
    }

    async fn put_exchange_token(&self, token: ExchangeToken) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO exchange_tokens (token, email, issued_at, expires_at, consumed)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.token)
        .bind(&token.email)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.consumed)
        .execute(&self.pool)
        .await
        .wrap_err("storing exchange token")?;

        Ok(())
    }

    async fn get_exchange_token(&self, token: &str) -> Result<Option<ExchangeToken>> {
        sqlx::query_as::<_, ExchangeToken>(
            r#"
                SELECT token, email, issued_at, expires_at, consumed
                FROM exchange_tokens
                WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .wrap_err("fetching exchange token")
    }

    async fn consume_exchange_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExchangeToken>> {
        sqlx::query_as::<_, ExchangeToken>(
            r#"
                UPDATE exchange_tokens
                SET consumed = TRUE
                WHERE token = $1 AND consumed = FALSE AND expires_at > $2
                RETURNING token, email, issued_at, expires_at, consumed
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .wrap_err("consuming exchange token")
    }

    async fn email_registered(&self, email: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .wrap_err("checking for registered email")
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Option<Account>> {
        let result = sqlx::query_as::<_, Account>(
            r#"
                INSERT INTO accounts (
                    id,
                    name,
                    email,
                    password_hash,
                    bio,
                    avatar_url,
                    date_of_birth,
                    email_verified,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
                RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.bio)
        .bind(&account.avatar_url)
        .bind(account.date_of_birth)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(Some(account)),
            Err(SqlxError::Database(db_err))
                if db_err.constraint() == Some("idx_accounts_email") =>
            {
                Ok(None)
            }
            Err(err) => Err(err).wrap_err("inserting account"),
        }
    }
}
