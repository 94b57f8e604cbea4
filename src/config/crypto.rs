use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use color_eyre::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rand_core::OsRng;
use tracing::instrument;

/// Length of the numeric one-time passcode sent by email.
pub const OTP_CODE_LENGTH: usize = 6;

/// Length of the opaque exchange token string.
pub const EXCHANGE_TOKEN_LENGTH: usize = 48;

#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoService;

impl CryptoService {
    fn argon2() -> Result<Argon2<'static>> {
        let params = Params::new(
            32_768, // 32 MB
            3,      // iterations
            1,      // parallelism
            None,
        )
        .map_err(|e| eyre::eyre!("Failed to create Argon2 params: {e}"))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes a secret (password or OTP code) for storage. Neither is ever
    /// stored or compared in plaintext.
    #[instrument(skip(self, secret))]
    pub fn hash_secret(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Self::argon2()?;

        let hash = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| eyre::eyre!("Failed to hash secret: {e}"))?
            .to_string();

        Ok(hash)
    }

    #[instrument(skip(self, secret, hash))]
    pub fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| eyre::eyre!("Invalid secret hash format: {e}"))?;

        let argon2 = Self::argon2()?;

        match argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(eyre::eyre!("Secret verification failed: {e}")),
        }
    }

    pub fn generate_otp_code(&self) -> String {
        let code = rand::thread_rng().gen_range(100_000..=999_999);
        code.to_string()
    }

    pub fn generate_exchange_token(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(EXCHANGE_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_codes_are_fixed_length_digits() {
        let crypto = CryptoService;
        for _ in 0..20 {
            let code = crypto.generate_otp_code();
            assert_eq!(code.len(), OTP_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_round_trip_rejects_wrong_secret() {
        let crypto = CryptoService;
        let hash = crypto.hash_secret("123456").unwrap();
        assert!(crypto.verify_secret("123456", &hash).unwrap());
        assert!(!crypto.verify_secret("654321", &hash).unwrap());
    }

    #[test]
    fn exchange_tokens_are_opaque_and_distinct() {
        let crypto = CryptoService;
        let a = crypto.generate_exchange_token();
        let b = crypto.generate_exchange_token();
        assert_eq!(a.len(), EXCHANGE_TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
