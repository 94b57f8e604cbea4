//! Shared fixtures for the service tests: an in-memory store, a recording
//! notifier, and a fully wired set of components with tunable windows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eyre::Result;

use crate::config::config::RegistrationSettings;
use crate::config::crypto::{CryptoService, OTP_CODE_LENGTH};
use crate::models::account::{CompleteRegistration, NewAccount};
use crate::service::email_service::EmailNotifier;
use crate::service::exchange_token_service::ExchangeTokenService;
use crate::service::otp_issuer::OtpIssuer;
use crate::service::otp_verifier::OtpVerifier;
use crate::service::registration_completer::RegistrationCompleter;
use crate::store::memory::MemoryRegistrationStore;
use crate::store::RegistrationStore;

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records every send; flips to failing on demand to exercise the
/// best-effort delivery policy.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The OTP code carried by the most recent email.
    pub fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let body = &sent.last().expect("no email recorded").body;
        body.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_digit()))
            .find(|word| {
                word.len() == OTP_CODE_LENGTH && word.chars().all(|c| c.is_ascii_digit())
            })
            .expect("no code in email body")
            .to_string()
    }
}

#[async_trait]
impl EmailNotifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("smtp relay unreachable"));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body,
        });
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryRegistrationStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub issuer: OtpIssuer,
    pub verifier: OtpVerifier,
    pub tokens: Arc<ExchangeTokenService>,
    pub completer: RegistrationCompleter,
}

impl Harness {
    pub fn with_failing_notifier(self) -> Self {
        self.notifier.fail.store(true, Ordering::SeqCst);
        self
    }
}

pub fn settings() -> RegistrationSettings {
    RegistrationSettings::default()
}

pub fn harness(settings: RegistrationSettings) -> Harness {
    let store = Arc::new(MemoryRegistrationStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let crypto = CryptoService;

    let store_dyn: Arc<dyn RegistrationStore> = store.clone();
    let notifier_dyn: Arc<dyn EmailNotifier> = notifier.clone();

    let tokens = Arc::new(ExchangeTokenService::new(
        store_dyn.clone(),
        crypto,
        settings.clone(),
    ));
    let issuer = OtpIssuer::new(
        store_dyn.clone(),
        notifier_dyn.clone(),
        crypto,
        settings,
        "Testbed",
    );
    let verifier = OtpVerifier::new(store_dyn.clone(), crypto, tokens.clone());
    let completer =
        RegistrationCompleter::new(store_dyn, tokens.clone(), crypto, notifier_dyn, "Testbed");

    Harness {
        store,
        notifier,
        issuer,
        verifier,
        tokens,
        completer,
    }
}

pub fn complete_form(name: &str, password: &str) -> CompleteRegistration {
    CompleteRegistration {
        name: name.to_string(),
        password: password.to_string(),
        bio: None,
        dob: None,
        avatar_url: None,
    }
}

pub async fn registered_account(h: &Harness, email: &str) {
    h.store
        .insert_account(NewAccount {
            email: email.to_string(),
            name: "Existing".to_string(),
            password_hash: "already-hashed".to_string(),
            bio: None,
            avatar_url: None,
            date_of_birth: None,
        })
        .await
        .unwrap();
}
