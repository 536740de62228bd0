pub mod resend;
pub mod templates;

use async_trait::async_trait;

/// One transactional email. Templates produce these; a `Mailer` delivers
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}
