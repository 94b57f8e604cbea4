use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    #[serde(skip_serializing)] //select false on account sql queries for the password hash
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: Option<NaiveDate>,

    pub email_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Profile fields submitted together with the exchange token on the final
/// registration step.
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteRegistration {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub dob: Option<NaiveDate>,
    #[serde(rename = "avatarUrl")]
    #[validate(url)]
    pub avatar_url: Option<String>,
}

/// Insert payload for the accounts table; the email comes from the consumed
/// exchange token, never from the client.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}
