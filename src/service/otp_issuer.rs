use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};
use validator::ValidateEmail;

use crate::config::config::RegistrationSettings;
use crate::config::crypto::CryptoService;
use crate::errors::RegistrationError;
use crate::models::pending_otp::PendingOtp;
use crate::service::email_service::EmailNotifier;
use crate::service::normalize_email;
use crate::store::RegistrationStore;

#[derive(Debug)]
pub struct OtpIssued {
    pub expires_in: i64,
}

#[derive(Debug)]
pub struct OtpStatus {
    pub has_active_otp: bool,
    pub remaining_time: i64,
}

/// Issues one-time passcodes, enforcing a single active code per address and
/// a minimum resend interval.
pub struct OtpIssuer {
    store: Arc<dyn RegistrationStore>,
    notifier: Arc<dyn EmailNotifier>,
    crypto: CryptoService,
    settings: RegistrationSettings,
    platform_name: String,
}

impl OtpIssuer {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        notifier: Arc<dyn EmailNotifier>,
        crypto: CryptoService,
        settings: RegistrationSettings,
        platform_name: &str,
    ) -> Self {
        Self {
            store,
            notifier,
            crypto,
            settings,
            platform_name: platform_name.to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn request_code(&self, email: &str) -> Result<OtpIssued, RegistrationError> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(RegistrationError::Validation(
                "a valid email address is required".to_string(),
            ));
        }

        if self.store.email_registered(&email).await? {
            return Err(RegistrationError::EmailAlreadyRegistered);
        }

        let now = Utc::now();
        if let Some(existing) = self.store.get_pending_otp(&email).await? {
            // Expiry clears the cooldown immediately; only a live code throttles.
            if !existing.is_expired(now) {
                let remaining = existing.cooldown_remaining(now, self.settings.resend_cooldown);
                if remaining > 0 {
                    return Err(RegistrationError::OtpAlreadyActive {
                        remaining_time: remaining,
                    });
                }
            }
        }

        let code = self.crypto.generate_otp_code();
        let code_hash = self.crypto.hash_secret(&code)?;
        let record = PendingOtp {
            email: email.clone(),
            code_hash,
            issued_at: now,
            expires_at: now + self.settings.otp_ttl,
            attempts_remaining: self.settings.max_attempts,
        };

        // The store re-checks the cooldown under its own lock; losing here
        // means a concurrent request issued a fresher code first.
        if !self
            .store
            .put_pending_otp(record, self.settings.resend_cooldown)
            .await?
        {
            let remaining = match self.store.get_pending_otp(&email).await? {
                Some(winner) => winner.cooldown_remaining(now, self.settings.resend_cooldown),
                None => 0,
            };
            return Err(RegistrationError::OtpAlreadyActive {
                remaining_time: remaining,
            });
        }

        let subject = format!("Your {} verification code", self.platform_name);
        let body = format!(
            "Your {} verification code is {}. It expires in {} seconds.",
            self.platform_name,
            code,
            self.settings.otp_ttl.num_seconds(),
        );
        if let Err(err) = self.notifier.send(&email, &subject, body).await {
            // Best effort: the stored code stays valid even if delivery is flaky.
            warn!("Failed to send verification code to {email}: {err:#}");
        }

        Ok(OtpIssued {
            expires_in: self.settings.otp_ttl.num_seconds(),
        })
    }

    /// Pure read used by clients to restore their countdown after a refresh.
    pub async fn check_status(&self, email: &str) -> Result<OtpStatus, RegistrationError> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(RegistrationError::Validation(
                "a valid email address is required".to_string(),
            ));
        }

        let now = Utc::now();
        let status = match self.store.get_pending_otp(&email).await? {
            Some(record) if !record.is_expired(now) => OtpStatus {
                has_active_otp: true,
                remaining_time: record.remaining_ttl(now),
            },
            _ => OtpStatus {
                has_active_otp: false,
                remaining_time: 0,
            },
        };

        Ok(status)
    }
}
