use async_trait::async_trait;
use eyre::Result;
use lettre::{transport::smtp::authentication::Credentials, SmtpTransport, Transport};

/// Outbound notification boundary. Delivery is fire-and-forget from the
/// flow's perspective: callers log failures and keep the committed state.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()>;
}

pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_address: String,
}

impl SmtpNotifier {
    pub fn new(smtp_host: &str, smtp_user: &str, smtp_pass: &str) -> Result<Self> {
        let creds = Credentials::new(smtp_user.to_string(), smtp_pass.to_string());

        let mailer = SmtpTransport::relay(smtp_host)?.credentials(creds).build();

        Ok(Self {
            mailer,
            from_address: smtp_user.to_string(),
        })
    }
}

#[async_trait]
impl EmailNotifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let email = lettre::Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(lettre::message::header::ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;

        Ok(())
    }
}
