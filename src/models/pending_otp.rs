use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

/// The single in-flight OTP challenge for an email address. At most one
/// non-expired record exists per address; a resend fully replaces it.
#[derive(Debug, Clone, FromRow)]
pub struct PendingOtp {
    pub email: String,
    pub code_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: i32,
}

impl PendingOtp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Seconds until the code expires, clamped to zero.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Seconds until a resend is accepted again, clamped to zero.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> i64 {
        (self.issued_at + cooldown - now).num_seconds().max(0)
    }
}
