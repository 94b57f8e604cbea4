use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure the registration flow can hand back to a client, plus an
/// opaque bucket for infrastructure faults. The HTTP layer maps each variant
/// to a status code and a stable `error` code string the client branches on.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    #[error("an OTP was already sent recently, wait before requesting a new one")]
    OtpAlreadyActive { remaining_time: i64 },

    #[error("no active OTP for this address, request a new code")]
    NoActiveOtp,

    #[error("the OTP has expired, request a new code")]
    OtpExpired,

    #[error("too many failed attempts, request a new code")]
    TooManyAttempts,

    #[error("incorrect OTP")]
    InvalidOtp { attempts_remaining: i32 },

    #[error("invalid or expired exchange token")]
    InvalidOrExpiredToken,

    #[error("this email is already registered")]
    EmailAlreadyRegistered,

    #[error("internal error")]
    Internal(eyre::Report),
}

impl RegistrationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::OtpAlreadyActive { .. } => "OTPAlreadyActive",
            Self::NoActiveOtp => "NoActiveOTP",
            Self::OtpExpired => "OTPExpired",
            Self::TooManyAttempts => "TooManyAttempts",
            Self::InvalidOtp { .. } => "InvalidOTP",
            Self::InvalidOrExpiredToken => "InvalidOrExpiredToken",
            Self::EmailAlreadyRegistered => "EmailAlreadyRegistered",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<eyre::Report> for RegistrationError {
    fn from(report: eyre::Report) -> Self {
        Self::Internal(report)
    }
}

impl From<validator::ValidationErrors> for RegistrationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl ResponseError for RegistrationError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::OtpAlreadyActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidOrExpiredToken => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Internal(report) = self {
            error!("registration request failed: {report:?}");
        }

        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
        });
        match self {
            Self::OtpAlreadyActive { remaining_time } => {
                body["remainingTime"] = json!(remaining_time);
            }
            Self::InvalidOtp { attempts_remaining } => {
                body["attemptsRemaining"] = json!(attempts_remaining);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
