pub mod email_service;
pub mod exchange_token_service;
pub mod otp_issuer;
pub mod otp_verifier;
pub mod registration_completer;

#[cfg(test)]
pub(crate) mod testing;

/// Emails are compared case-insensitively everywhere in the flow.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
