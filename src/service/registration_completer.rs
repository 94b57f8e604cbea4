use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::config::crypto::CryptoService;
use crate::errors::RegistrationError;
use crate::models::account::{Account, CompleteRegistration, NewAccount};
use crate::service::email_service::EmailNotifier;
use crate::service::exchange_token_service::ExchangeTokenService;
use crate::store::RegistrationStore;

/// Final step of the flow: burns the exchange token and creates the durable
/// account record.
pub struct RegistrationCompleter {
    store: Arc<dyn RegistrationStore>,
    tokens: Arc<ExchangeTokenService>,
    crypto: CryptoService,
    notifier: Arc<dyn EmailNotifier>,
    platform_name: String,
}

impl RegistrationCompleter {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        tokens: Arc<ExchangeTokenService>,
        crypto: CryptoService,
        notifier: Arc<dyn EmailNotifier>,
        platform_name: &str,
    ) -> Self {
        Self {
            store,
            tokens,
            crypto,
            notifier,
            platform_name: platform_name.to_string(),
        }
    }

    #[instrument(skip_all)]
    pub async fn complete(
        &self,
        token: &str,
        registration: CompleteRegistration,
    ) -> Result<Account, RegistrationError> {
        // Field checks come first so a rejected form does not burn the
        // single-use token.
        registration.validate()?;

        let email = self.tokens.consume(token).await?;

        let password_hash = self.crypto.hash_secret(&registration.password)?;
        let new_account = NewAccount {
            email: email.clone(),
            name: registration.name.trim().to_string(),
            password_hash,
            bio: registration.bio,
            avatar_url: registration.avatar_url,
            date_of_birth: registration.dob,
        };

        // The token stays consumed on conflict; the loser of an email race
        // restarts the whole flow.
        let account = self
            .store
            .insert_account(new_account)
            .await?
            .ok_or(RegistrationError::EmailAlreadyRegistered)?;

        info!("Account created for {email}");

        let subject = format!("Welcome to {}", self.platform_name);
        let body = format!(
            "Welcome to {}, {}! Your account is ready.",
            self.platform_name, account.name
        );
        if let Err(err) = self.notifier.send(&email, &subject, body).await {
            warn!("Failed to send welcome email to {email}: {err:#}");
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{complete_form, harness, registered_account, settings};

    #[tokio::test]
    async fn complete_creates_the_account_and_burns_the_token() {
        let h = harness(settings());
        h.issuer.request_code("b@x.com").await.unwrap();
        let code = h.notifier.last_code();
        let token = h.verifier.verify("b@x.com", &code).await.unwrap();

        let account = h
            .completer
            .complete(&token.token, complete_form("B", "secret-pw"))
            .await
            .unwrap();
        assert_eq!(account.email, "b@x.com");
        assert_eq!(account.name, "B");
        assert!(account.email_verified);

        // The password hash never serializes.
        let serialized = serde_json::to_value(&account).unwrap();
        assert!(serialized.get("password_hash").is_none());

        // Replay of the consumed token fails and creates nothing further.
        assert!(matches!(
            h.completer
                .complete(&token.token, complete_form("B2", "secret-pw"))
                .await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn invalid_fields_do_not_burn_the_token() {
        let h = harness(settings());
        h.issuer.request_code("a@x.com").await.unwrap();
        let code = h.notifier.last_code();
        let token = h.verifier.verify("a@x.com", &code).await.unwrap();

        assert!(matches!(
            h.completer
                .complete(&token.token, complete_form("A", "short"))
                .await,
            Err(RegistrationError::Validation(_))
        ));

        // The token survived the rejected form and still completes.
        assert_eq!(h.tokens.validate(&token.token).await.unwrap(), "a@x.com");
        h.completer
            .complete(&token.token, complete_form("A", "long-enough"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bad_token_never_creates_an_account() {
        let h = harness(settings());

        assert!(matches!(
            h.completer
                .complete("bogus-token", complete_form("A", "secret-pw"))
                .await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
        assert!(!h.store.email_registered("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn email_conflict_fails_without_recrediting_the_token() {
        let h = harness(settings());
        h.issuer.request_code("dup@x.com").await.unwrap();
        let code = h.notifier.last_code();
        let token = h.verifier.verify("dup@x.com", &code).await.unwrap();

        // Someone else claimed the email between verify and complete.
        registered_account(&h, "dup@x.com").await;

        assert!(matches!(
            h.completer
                .complete(&token.token, complete_form("Dup", "secret-pw"))
                .await,
            Err(RegistrationError::EmailAlreadyRegistered)
        ));
        assert!(matches!(
            h.tokens.validate(&token.token).await,
            Err(RegistrationError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn welcome_email_is_best_effort() {
        let h = harness(settings());
        h.issuer.request_code("a@x.com").await.unwrap();
        let code = h.notifier.last_code();
        let token = h.verifier.verify("a@x.com", &code).await.unwrap();

        let h = h.with_failing_notifier();
        h.completer
            .complete(&token.token, complete_form("A", "secret-pw"))
            .await
            .unwrap();
        assert!(h.store.email_registered("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn profile_fields_are_persisted() {
        let h = harness(settings());
        h.issuer.request_code("full@x.com").await.unwrap();
        let code = h.notifier.last_code();
        let token = h.verifier.verify("full@x.com", &code).await.unwrap();

        let mut form = complete_form("Full Profile", "secret-pw");
        form.bio = Some("I write Rust.".to_string());
        form.avatar_url = Some("https://cdn.example.com/me.png".to_string());
        form.dob = chrono::NaiveDate::from_ymd_opt(1990, 4, 2);

        let account = h.completer.complete(&token.token, form).await.unwrap();
        assert_eq!(account.bio.as_deref(), Some("I write Rust."));
        assert_eq!(
            account.avatar_url.as_deref(),
            Some("https://cdn.example.com/me.png")
        );
        assert_eq!(
            account.date_of_birth,
            chrono::NaiveDate::from_ymd_opt(1990, 4, 2)
        );
    }
}
