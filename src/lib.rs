pub mod config;
pub mod controllers;
pub mod errors;
pub mod models;
pub mod service;
pub mod store;

use std::sync::Arc;

use actix_web::web;

use crate::config::config::RegistrationSettings;
use crate::config::crypto::CryptoService;
use crate::service::email_service::EmailNotifier;
use crate::service::exchange_token_service::ExchangeTokenService;
use crate::service::otp_issuer::OtpIssuer;
use crate::service::otp_verifier::OtpVerifier;
use crate::service::registration_completer::RegistrationCompleter;
use crate::store::RegistrationStore;

/// The wired registration components, ready to be handed to the app as
/// shared `web::Data`. Built once at startup and cloned per worker.
#[derive(Clone)]
pub struct RegistrationServices {
    issuer: web::Data<OtpIssuer>,
    verifier: web::Data<OtpVerifier>,
    tokens: web::Data<ExchangeTokenService>,
    completer: web::Data<RegistrationCompleter>,
}

impl RegistrationServices {
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.issuer.clone())
            .app_data(self.verifier.clone())
            .app_data(self.tokens.clone())
            .app_data(self.completer.clone());
    }
}

pub fn registration_services(
    store: Arc<dyn RegistrationStore>,
    notifier: Arc<dyn EmailNotifier>,
    settings: RegistrationSettings,
    platform_name: &str,
) -> RegistrationServices {
    let crypto = CryptoService;

    let tokens = Arc::new(ExchangeTokenService::new(
        store.clone(),
        crypto,
        settings.clone(),
    ));
    let issuer = OtpIssuer::new(
        store.clone(),
        notifier.clone(),
        crypto,
        settings,
        platform_name,
    );
    let verifier = OtpVerifier::new(store.clone(), crypto, tokens.clone());
    let completer = RegistrationCompleter::new(store, tokens.clone(), crypto, notifier, platform_name);

    RegistrationServices {
        issuer: web::Data::new(issuer),
        verifier: web::Data::new(verifier),
        tokens: web::Data::from(tokens),
        completer: web::Data::new(completer),
    }
}
