//! Persistence boundary for the registration flow.
//!
//! Every mutation that races with another request is expressed as a
//! conditional operation (compare-and-delete, compare-and-set) so callers
//! never read-then-write. Expired rows may linger until overwritten; the
//! read paths treat the stored timestamps as authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use eyre::Result;

use crate::models::{
    account::{Account, NewAccount},
    exchange_token::ExchangeToken,
    pending_otp::PendingOtp,
};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn get_pending_otp(&self, email: &str) -> Result<Option<PendingOtp>>;

    /// Insert or fully replace the pending OTP for `record.email`, unless a
    /// non-expired record issued less than `cooldown` ago still exists.
    /// Returns false when the write lost to such a record.
    async fn put_pending_otp(&self, record: PendingOtp, cooldown: Duration) -> Result<bool>;

    /// Compare-and-delete: removes the record only if it still carries
    /// `code_hash`. Returns false when a concurrent verify or resend got
    /// there first.
    async fn claim_pending_otp(&self, email: &str, code_hash: &str) -> Result<bool>;

    /// Decrements `attempts_remaining`, conditioned on the record still
    /// carrying `code_hash`. Returns the attempts left after the decrement,
    /// or None when the record was gone or already replaced.
    async fn record_failed_attempt(&self, email: &str, code_hash: &str) -> Result<Option<i32>>;

    async fn put_exchange_token(&self, token: ExchangeToken) -> Result<()>;

    async fn get_exchange_token(&self, token: &str) -> Result<Option<ExchangeToken>>;

    /// Compare-and-set `consumed = true`; succeeds only for a token that is
    /// still unconsumed and unexpired at `now`. Exactly one concurrent caller
    /// receives the record.
    async fn consume_exchange_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExchangeToken>>;

    async fn email_registered(&self, email: &str) -> Result<bool>;

    /// Creates the durable account row. Returns None when the email is
    /// already taken (uniqueness is enforced here, not earlier).
    async fn insert_account(&self, account: NewAccount) -> Result<Option<Account>>;
}
