use std::sync::Arc;

use chrono::Utc;

use crate::config::config::RegistrationSettings;
use crate::config::crypto::CryptoService;
use crate::errors::RegistrationError;
use crate::models::exchange_token::ExchangeToken;
use crate::store::RegistrationStore;

/// Issues, validates and single-use-consumes the credential bridging a
/// successful OTP check to account completion.
pub struct ExchangeTokenService {
    store: Arc<dyn RegistrationStore>,
    crypto: CryptoService,
    settings: RegistrationSettings,
}

impl ExchangeTokenService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        crypto: CryptoService,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            store,
            crypto,
            settings,
        }
    }

    /// Called by the OTP verifier only, after a full code match.
    pub async fn issue(&self, email: &str) -> Result<ExchangeToken, RegistrationError> {
        let now = Utc::now();
        let token = ExchangeToken {
            token: self.crypto.generate_exchange_token(),
            email: email.to_string(),
            issued_at: now,
            expires_at: now + self.settings.token_ttl,
            consumed: false,
        };
        self.store.put_exchange_token(token.clone()).await?;

        Ok(token)
    }

    /// Side-effect free, so the client can probe a stored token before
    /// rendering the completion form.
    pub async fn validate(&self, token: &str) -> Result<String, RegistrationError> {
        let record = self
            .store
            .get_exchange_token(token)
            .await?
            .ok_or(RegistrationError::InvalidOrExpiredToken)?;

        if !record.is_valid(Utc::now()) {
            return Err(RegistrationError::InvalidOrExpiredToken);
        }

        Ok(record.email)
    }

    /// Marks the token consumed as part of the same conditional operation
    /// that reads it. Two concurrent consumers succeed exactly once.
    pub async fn consume(&self, token: &str) -> Result<String, RegistrationError> {
        let record = self
            .store
            .consume_exchange_token(token, Utc::now())
            .await?
            .ok_or(RegistrationError::InvalidOrExpiredToken)?;

        Ok(record.email)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::service::testing::{harness, settings};

    #[tokio::test]
    async fn validate_is_idempotent() {
        let h = harness(settings());
        let token = h.tokens.issue("a@x.com").await.unwrap();

        let first = h.tokens.validate(&token.token).await.unwrap();
        let second = h.tokens.validate(&token.token).await.unwrap();
        assert_eq!(first, "a@x.com");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn consume_succeeds_once_then_fails_permanently() {
        let h = harness(settings());
        let token = h.tokens.issue("a@x.com").await.unwrap();

        assert_eq!(h.tokens.consume(&token.token).await.unwrap(), "a@x.com");
        assert!(matches!(
            h.tokens.consume(&token.token).await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            h.tokens.validate(&token.token).await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn concurrent_consume_has_a_single_winner() {
        let h = harness(settings());
        let token = h.tokens.issue("a@x.com").await.unwrap();

        let (first, second) = tokio::join!(
            h.tokens.consume(&token.token),
            h.tokens.consume(&token.token)
        );
        let wins = [first, second].into_iter().filter(Result::is_ok).count();
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let mut cfg = settings();
        cfg.token_ttl = Duration::zero();
        let h = harness(cfg);
        let token = h.tokens.issue("a@x.com").await.unwrap();

        assert!(matches!(
            h.tokens.validate(&token.token).await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            h.tokens.consume(&token.token).await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let h = harness(settings());
        assert!(matches!(
            h.tokens.validate("no-such-token").await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
    }
}
