use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::tools::{Tool, ToolOutput, str_arg};

const DEFAULT_SUBJECT: &str = "AI scheduler";
const DEFAULT_BODY: &str = "AI alert";

/// Delivers a plaintext message to the configured recipient.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// SMTP over implicit TLS.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    cfg: EmailConfig,
}

impl SmtpMailer {
    pub fn new(cfg: EmailConfig) -> Self {
        Self { cfg }
    }

    fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("missing email setting {key}"))
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        let sender: Mailbox = Self::required(&self.cfg.sender, "EMAIL_SENDER")?
            .parse()
            .context("parse sender address")?;
        let recipient: Mailbox = Self::required(&self.cfg.recipient, "EMAIL_TO")?
            .parse()
            .context("parse recipient address")?;
        Message::builder()
            .from(sender)
            .to(recipient)
            .subject(format!("{}{}", self.cfg.subject_prefix, subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email message")
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(subject, body)?;
        let sender = Self::required(&self.cfg.sender, "EMAIL_SENDER")?;
        let password = Self::required(&self.cfg.password, "EMAIL_KEY")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.cfg.smtp_host)
            .context("configure smtp relay")?
            .port(self.cfg.smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();
        transport.send(message).await.context("smtp send")?;
        info!(host=%self.cfg.smtp_host, "email sent");
        Ok(())
    }
}

pub struct SendEmailTool {
    mailer: Arc<dyn Mailer>,
}

impl SendEmailTool {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait::async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "sendEmail"
    }

    fn description(&self) -> &str {
        "Send a plaintext email to the configured recipient."
    }

    fn input_schema(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string", "description": "Email subject"},
                "body": {"type": "string", "description": "Email body"}
            },
            "required": ["subject", "body"]
        })
    }

    // Delivery failures are reported as text; this never returns Err.
    async fn call(&self, args: &JsonValue) -> Result<ToolOutput> {
        let subject = str_arg(args, "subject", DEFAULT_SUBJECT);
        let body = str_arg(args, "body", DEFAULT_BODY);
        match self.mailer.send(subject, body).await {
            Ok(()) => Ok(ToolOutput::new("Email sent successfully.")),
            Err(e) => {
                warn!(error=%format!("{e:#}"), "email sending failed");
                Ok(ToolOutput::new(format!("Email sending failed: {e:#}")))
            }
        }
    }
}
