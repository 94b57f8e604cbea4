use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Single-use credential proving "this email passed OTP verification".
/// Opaque to the client; trust decisions come only from the store row.
#[derive(Debug, Clone, FromRow)]
pub struct ExchangeToken {
    pub token: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ExchangeToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && self.expires_at > now
    }
}
