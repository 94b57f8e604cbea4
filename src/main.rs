use std::sync::Arc;

use actix_web::{middleware::Logger, App, HttpServer};
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use registration_service::config::{config::Config, routes::routes};
use registration_service::registration_services;
use registration_service::service::email_service::{EmailNotifier, SmtpNotifier};
use registration_service::store::postgres::PgRegistrationStore;
use registration_service::store::RegistrationStore;

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let pool = config.db_pool().await?;

    let store: Arc<dyn RegistrationStore> = Arc::new(PgRegistrationStore::new(pool));
    let notifier: Arc<dyn EmailNotifier> = Arc::new(SmtpNotifier::new(
        &config.smtp_host,
        &config.smtp_user,
        &config.smtp_pass,
    )?);
    let services = registration_services(
        store,
        notifier,
        config.registration_settings(),
        &config.platform_name,
    );

    let bind_addr = format!("{}:{}", config.host, config.port);
    info!("Binding to {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| services.configure(cfg))
            .configure(routes)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
