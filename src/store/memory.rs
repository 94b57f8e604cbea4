//! In-process store over DashMap, for single-server deployments and tests.
//! Per-key entry locking provides the same conditional-mutation guarantees
//! the Postgres statements give across workers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use eyre::Result;
use uuid::Uuid;

use crate::models::{
    account::{Account, NewAccount},
    exchange_token::ExchangeToken,
    pending_otp::PendingOtp,
};
use crate::store::RegistrationStore;

#[derive(Default)]
pub struct MemoryRegistrationStore {
    otps: DashMap<String, PendingOtp>,
    tokens: DashMap<String, ExchangeToken>,
    accounts: DashMap<String, Account>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn get_pending_otp(&self, email: &str) -> Result<Option<PendingOtp>> {
        Ok(self.otps.get(email).map(|record| record.value().clone()))
    }

    async fn put_pending_otp(&self, record: PendingOtp, cooldown: Duration) -> Result<bool> {
        match self.otps.entry(record.email.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                let now = record.issued_at;
                if !existing.is_expired(now) && existing.issued_at + cooldown > now {
                    return Ok(false);
                }
                slot.insert(record);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn claim_pending_otp(&self, email: &str, code_hash: &str) -> Result<bool> {
        Ok(self
            .otps
            .remove_if(email, |_, record| record.code_hash == code_hash)
            .is_some())
    }

    async fn record_failed_attempt(&self, email: &str, code_hash: &str) -> Result<Option<i32>> {
        Ok(self.otps.get_mut(email).and_then(|mut record| {
            if record.code_hash != code_hash {
                return None;
            }
            record.attempts_remaining -= 1;
            Some(record.attempts_remaining)
        }))
    }

    async fn put_exchange_token(&self, token: ExchangeToken) -> Result<()> {
        self.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_exchange_token(&self, token: &str) -> Result<Option<ExchangeToken>> {
        Ok(self.tokens.get(token).map(|record| record.value().clone()))
    }

    async fn consume_exchange_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExchangeToken>> {
        Ok(self.tokens.get_mut(token).and_then(|mut record| {
            if !record.is_valid(now) {
                return None;
            }
            record.consumed = true;
            Some(record.value().clone())
        }))
    }

    async fn email_registered(&self, email: &str) -> Result<bool> {
        Ok(self.accounts.contains_key(email))
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Option<Account>> {
        match self.accounts.entry(account.email.clone()) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let created = Account {
                    id: Uuid::new_v4(),
                    name: account.name,
                    email: account.email,
                    password_hash: Some(account.password_hash),
                    bio: account.bio,
                    avatar_url: account.avatar_url,
                    date_of_birth: account.date_of_birth,
                    email_verified: true,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(created.clone());
                Ok(Some(created))
            }
        }
    }
}
