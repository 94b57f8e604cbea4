use crate::controllers::registration_controller::RegistrationController;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(RegistrationController::health))
        .route(
            "/api/otp/request",
            web::post().to(RegistrationController::request_otp),
        )
        .route(
            "/api/otp/status",
            web::get().to(RegistrationController::otp_status),
        )
        .route(
            "/api/otp/verify",
            web::post().to(RegistrationController::verify_otp),
        )
        .route(
            "/api/otp/exchange-token/validate",
            web::get().to(RegistrationController::validate_exchange_token),
        )
        .route(
            "/api/registration/complete",
            web::post().to(RegistrationController::complete_registration),
        );
}
