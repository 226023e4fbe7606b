use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::{DeliveryConfig, DeliveryProvider};

/// An email to dispatch, with local files attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Utf8PathBuf>,
    pub from_email: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

/// Successful dispatch, echoing the recipient list.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub recipients: Vec<String>,
}

/// Errors from a single dispatch attempt. Retries, if any, belong to the
/// delivery collaborator's own policy configuration, not to the callers here.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("mail CLI 'pop' not found; {}", PopMailer::INSTALLATION_INSTRUCTIONS)]
    MailerNotInstalled,

    #[error("mail dispatch failed: {0}")]
    Failed(String),

    #[error("failed to run mail CLI: {0}")]
    Process(#[from] std::io::Error),
}

/// Delivery collaborator.
///
/// One method, object-safe; tests substitute a fake that records messages
/// instead of shelling out.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Mailer backed by the Charm `pop` CLI.
///
/// Provider-specific settings (Resend API key, SMTP host and credentials) are
/// handed to `pop` through its own environment variables; the body goes in on
/// stdin.
pub struct PopMailer {
    config: DeliveryConfig,
}

impl PopMailer {
    pub const INSTALLATION_INSTRUCTIONS: &'static str =
        "install it with 'brew install pop' or 'go install github.com/charmbracelet/pop@latest'";

    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    /// Whether the `pop` binary is on PATH.
    pub fn is_available() -> bool {
        which::which("pop").is_ok()
    }

    /// Build the pop argument vector for a message. Attachments that no
    /// longer exist on disk are silently dropped, matching pop's own
    /// behavior of refusing missing files.
    pub fn build_command(&self, message: &EmailMessage) -> Vec<String> {
        let mut args = Vec::new();

        let from_email = message
            .from_email
            .as_deref()
            .or(self.config.defaults.from_email.as_deref());
        if let Some(from) = from_email {
            args.push("--from".to_string());
            args.push(from.to_string());
        }

        for recipient in &message.to {
            args.push("--to".to_string());
            args.push(recipient.clone());
        }
        for cc in &message.cc {
            args.push("--cc".to_string());
            args.push(cc.clone());
        }
        for bcc in &message.bcc {
            args.push("--bcc".to_string());
            args.push(bcc.clone());
        }

        args.push("--subject".to_string());
        args.push(message.subject.clone());

        for attachment in &message.attachments {
            if attachment.exists() {
                args.push("--attach".to_string());
                args.push(attachment.to_string());
            }
        }

        args
    }

    /// Environment variables injected into the pop process for the configured
    /// provider.
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();

        match self.config.provider {
            DeliveryProvider::Resend => {
                if let Some(api_key) = &self.config.resend.api_key {
                    env.push(("RESEND_API_KEY".to_string(), api_key.clone()));
                }
            }
            DeliveryProvider::Smtp => {
                if let Some(host) = &self.config.smtp.host {
                    env.push(("POP_SMTP_HOST".to_string(), host.clone()));
                }
                env.push(("POP_SMTP_PORT".to_string(), self.config.smtp.port.to_string()));
                if let Some(username) = &self.config.smtp.username {
                    env.push(("POP_SMTP_USERNAME".to_string(), username.clone()));
                }
                if let Some(password) = &self.config.smtp.password {
                    env.push(("POP_SMTP_PASSWORD".to_string(), password.clone()));
                }
            }
        }

        if let Some(from) = &self.config.defaults.from_email {
            env.push(("POP_FROM".to_string(), from.clone()));
        }
        if let Some(signature) = &self.config.defaults.signature {
            env.push(("POP_SIGNATURE".to_string(), signature.clone()));
        }

        env
    }
}

#[async_trait]
impl Mailer for PopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        if !Self::is_available() {
            return Err(DeliveryError::MailerNotInstalled);
        }

        let args = self.build_command(message);
        tracing::info!(
            "Dispatching mail to {} recipient(s), {} attachment(s)",
            message.to.len(),
            message.attachments.len()
        );

        let mut child = Command::new("pop")
            .args(&args)
            .envs(self.env_overrides())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.body.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;

        if output.status.success() {
            tracing::info!("Mail sent to {}", message.to.join(", "));
            Ok(DeliveryReceipt {
                recipients: message.to.clone(),
            })
        } else {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if diagnostic.is_empty() {
                diagnostic = format!(
                    "pop exited with status {}",
                    output.status.code().unwrap_or(-1)
                );
            }
            tracing::warn!("Mail dispatch failed: {}", diagnostic);
            Err(DeliveryError::Failed(diagnostic))
        }
    }
}

/// Default body for a generated report email when the caller gives none.
pub fn default_report_body(attachments: &[Utf8PathBuf]) -> String {
    let names: Vec<&str> = attachments
        .iter()
        .map(|p| p.file_name().unwrap_or(p.as_str()))
        .collect();

    let mut body = String::from(
        "# PDF Report Generated by BARQUE\n\nPlease find attached the following PDF documents:\n\n",
    );
    for name in names {
        body.push_str(&format!("- {name}\n"));
    }
    body.push_str("\nGenerated by BARQUE v2.0.0\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryProvider;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: "Report".to_string(),
            body: "see attached".to_string(),
            attachments: vec![Utf8PathBuf::from("/nonexistent/report-light.pdf")],
            from_email: None,
            cc: vec!["c@example.com".to_string()],
            bcc: Vec::new(),
        }
    }

    #[test]
    fn test_build_command_recipients_and_subject() {
        let mailer = PopMailer::new(DeliveryConfig::default());
        let args = mailer.build_command(&message());

        let to_count = args.iter().filter(|a| *a == "--to").count();
        assert_eq!(to_count, 2);
        assert!(args.contains(&"a@example.com".to_string()));
        assert!(args.contains(&"--cc".to_string()));
        assert!(!args.contains(&"--bcc".to_string()));

        let subject_pos = args.iter().position(|a| a == "--subject").unwrap();
        assert_eq!(args[subject_pos + 1], "Report");
    }

    #[test]
    fn test_build_command_drops_missing_attachments() {
        let mailer = PopMailer::new(DeliveryConfig::default());
        let args = mailer.build_command(&message());
        assert!(!args.contains(&"--attach".to_string()));
    }

    #[test]
    fn test_build_command_from_falls_back_to_config() {
        let mut config = DeliveryConfig::default();
        config.defaults.from_email = Some("default@example.com".to_string());
        let mailer = PopMailer::new(config);

        let args = mailer.build_command(&message());
        let from_pos = args.iter().position(|a| a == "--from").unwrap();
        assert_eq!(args[from_pos + 1], "default@example.com");

        // An explicit message sender wins over the configured default.
        let mut msg = message();
        msg.from_email = Some("explicit@example.com".to_string());
        let args = mailer.build_command(&msg);
        let from_pos = args.iter().position(|a| a == "--from").unwrap();
        assert_eq!(args[from_pos + 1], "explicit@example.com");
    }

    #[test]
    fn test_env_overrides_resend() {
        let mut config = DeliveryConfig::default();
        config.resend.api_key = Some("re_123".to_string());
        config.defaults.from_email = Some("me@example.com".to_string());
        let mailer = PopMailer::new(config);

        let env = mailer.env_overrides();
        assert!(env.contains(&("RESEND_API_KEY".to_string(), "re_123".to_string())));
        assert!(env.contains(&("POP_FROM".to_string(), "me@example.com".to_string())));
        assert!(!env.iter().any(|(k, _)| k == "POP_SMTP_HOST"));
    }

    #[test]
    fn test_env_overrides_smtp() {
        let mut config = DeliveryConfig::default();
        config.provider = DeliveryProvider::Smtp;
        config.smtp.host = Some("smtp.example.com".to_string());
        config.smtp.username = Some("alice".to_string());
        config.smtp.password = Some("secret".to_string());
        let mailer = PopMailer::new(config);

        let env = mailer.env_overrides();
        assert!(env.contains(&("POP_SMTP_HOST".to_string(), "smtp.example.com".to_string())));
        assert!(env.contains(&("POP_SMTP_PORT".to_string(), "587".to_string())));
        assert!(env.contains(&("POP_SMTP_USERNAME".to_string(), "alice".to_string())));
        assert!(!env.iter().any(|(k, _)| k == "RESEND_API_KEY"));
    }

    #[test]
    fn test_default_report_body_lists_attachments() {
        let body = default_report_body(&[
            Utf8PathBuf::from("output/light/a-light.pdf"),
            Utf8PathBuf::from("output/dark/a-dark.pdf"),
        ]);
        assert!(body.contains("- a-light.pdf"));
        assert!(body.contains("- a-dark.pdf"));
    }
}
