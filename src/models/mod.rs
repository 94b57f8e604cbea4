pub mod account;
pub mod exchange_token;
pub mod pending_otp;
