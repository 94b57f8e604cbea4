use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::errors::RegistrationError;
use crate::models::account::CompleteRegistration;
use crate::service::exchange_token_service::ExchangeTokenService;
use crate::service::otp_issuer::OtpIssuer;
use crate::service::otp_verifier::OtpVerifier;
use crate::service::registration_completer::RegistrationCompleter;

/// Header carrying the exchange token on the completion request.
pub const EXCHANGE_TOKEN_HEADER: &str = "X-Exchange-Token";

#[derive(Debug, Deserialize, Validate)]
pub struct RequestOtpBody {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpStatusQuery {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpBody {
    #[validate(email)]
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenQuery {
    pub token: String,
}

pub struct RegistrationController;

impl RegistrationController {
    pub async fn health() -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
    }

    pub async fn request_otp(
        issuer: web::Data<OtpIssuer>,
        body: web::Json<RequestOtpBody>,
    ) -> Result<HttpResponse, RegistrationError> {
        body.validate()?;

        let issued = issuer.request_code(&body.email).await?;

        Ok(HttpResponse::Ok().json(serde_json::json!({
            "expiresIn": issued.expires_in,
            "message": "OTP sent to email. Please verify your account"
        })))
    }

    pub async fn otp_status(
        issuer: web::Data<OtpIssuer>,
        query: web::Query<OtpStatusQuery>,
    ) -> Result<HttpResponse, RegistrationError> {
        let status = issuer.check_status(&query.email).await?;

        Ok(HttpResponse::Ok().json(serde_json::json!({
            "hasActiveOTP": status.has_active_otp,
            "remainingTime": status.remaining_time
        })))
    }

    pub async fn verify_otp(
        verifier: web::Data<OtpVerifier>,
        body: web::Json<VerifyOtpBody>,
    ) -> Result<HttpResponse, RegistrationError> {
        body.validate()?;

        let token = verifier.verify(&body.email, &body.otp).await?;

        Ok(HttpResponse::Ok().json(serde_json::json!({
            "exchangeToken": token.token,
            "message": "Email verified. Complete your registration"
        })))
    }

    /// Read-only probe; an unusable token is a 200 with `valid: false`, not
    /// an error, so clients can branch without special-casing statuses.
    pub async fn validate_exchange_token(
        tokens: web::Data<ExchangeTokenService>,
        query: web::Query<ValidateTokenQuery>,
    ) -> Result<HttpResponse, RegistrationError> {
        match tokens.validate(&query.token).await {
            Ok(email) => Ok(HttpResponse::Ok().json(serde_json::json!({
                "valid": true,
                "email": email
            }))),
            Err(RegistrationError::InvalidOrExpiredToken) => {
                Ok(HttpResponse::Ok().json(serde_json::json!({ "valid": false })))
            }
            Err(other) => Err(other),
        }
    }

    pub async fn complete_registration(
        completer: web::Data<RegistrationCompleter>,
        request: HttpRequest,
        body: web::Json<CompleteRegistration>,
    ) -> Result<HttpResponse, RegistrationError> {
        let token = request
            .headers()
            .get(EXCHANGE_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(RegistrationError::InvalidOrExpiredToken)?;

        let account = completer.complete(token, body.into_inner()).await?;

        Ok(HttpResponse::Created().json(serde_json::json!({ "account": account })))
    }
}
