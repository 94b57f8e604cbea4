use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::config::crypto::{CryptoService, OTP_CODE_LENGTH};
use crate::errors::RegistrationError;
use crate::models::exchange_token::ExchangeToken;
use crate::service::exchange_token_service::ExchangeTokenService;
use crate::service::normalize_email;
use crate::store::RegistrationStore;

/// Validates a submitted code and mints the exchange token on success. This
/// is the single transition from "unverified" to "verified".
pub struct OtpVerifier {
    store: Arc<dyn RegistrationStore>,
    crypto: CryptoService,
    tokens: Arc<ExchangeTokenService>,
}

impl OtpVerifier {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        crypto: CryptoService,
        tokens: Arc<ExchangeTokenService>,
    ) -> Self {
        Self {
            store,
            crypto,
            tokens,
        }
    }

    #[instrument(skip(self, submitted_code))]
    pub async fn verify(
        &self,
        email: &str,
        submitted_code: &str,
    ) -> Result<ExchangeToken, RegistrationError> {
        let email = normalize_email(email);
        let submitted_code = submitted_code.trim();
        if submitted_code.len() != OTP_CODE_LENGTH
            || !submitted_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(RegistrationError::Validation(format!(
                "the OTP must be a {OTP_CODE_LENGTH}-digit code"
            )));
        }

        let record = self
            .store
            .get_pending_otp(&email)
            .await?
            .ok_or(RegistrationError::NoActiveOtp)?;
        let now = Utc::now();

        if record.is_expired(now) {
            // Cleanup conditioned on the hash, so a concurrent resend's fresh
            // record is never the one deleted.
            self.store
                .claim_pending_otp(&email, &record.code_hash)
                .await?;
            return Err(RegistrationError::OtpExpired);
        }

        if record.attempts_remaining <= 0 {
            self.store
                .claim_pending_otp(&email, &record.code_hash)
                .await?;
            return Err(RegistrationError::TooManyAttempts);
        }

        if !self.crypto.verify_secret(submitted_code, &record.code_hash)? {
            let attempts_remaining = self
                .store
                .record_failed_attempt(&email, &record.code_hash)
                .await?
                .unwrap_or(0);
            return Err(RegistrationError::InvalidOtp { attempts_remaining });
        }

        // Compare-and-delete: of two concurrent correct submissions exactly
        // one claims the record; the loser observes it gone.
        if !self
            .store
            .claim_pending_otp(&email, &record.code_hash)
            .await?
        {
            return Err(RegistrationError::NoActiveOtp);
        }

        self.tokens.issue(&email).await
    }
}
