//! Email delivery configuration.
//!
//! Same layering model as the main configuration (explicit file > environment
//! > project file > user files > defaults) with one deliberate difference: the
//! `delivery` policy section merges all-or-nothing per precedence level,
//! because partial retry-policy overrides are error-prone. All other sections
//! merge field-level.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

use super::{ConfigError, Environment, PROJECT_CONFIG_DIR};

/// File name of the delivery configuration in each search location.
pub const EMAIL_FILE_NAME: &str = "email.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryProvider {
    Resend,
    Smtp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResendConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultsConfig {
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub signature: Option<String>,
}

/// Retry and limit policy for the delivery collaborator. Retry execution
/// belongs to the collaborator itself; the core only carries the settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_true")]
    pub retry_exponential_backoff: bool,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size_mb: u64,
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_rate_limit() -> u32 {
    60
}
fn default_max_attachment_size() -> u64 {
    25
}
fn default_max_attachments() -> usize {
    10
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay(),
            retry_exponential_backoff: true,
            rate_limit: default_rate_limit(),
            max_attachment_size_mb: default_max_attachment_size(),
            max_attachments: default_max_attachments(),
        }
    }
}

/// Resolved delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub provider: DeliveryProvider,
    pub resend: ResendConfig,
    pub smtp: SmtpConfig,
    pub defaults: DefaultsConfig,
    pub delivery: DeliveryPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            provider: DeliveryProvider::Resend,
            resend: ResendConfig::default(),
            smtp: SmtpConfig::default(),
            defaults: DefaultsConfig::default(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ResendPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SmtpPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    use_tls: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct DefaultsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

/// One layer of delivery configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeliveryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<DeliveryProvider>,
    #[serde(default)]
    resend: ResendPatch,
    #[serde(default)]
    smtp: SmtpPatch,
    #[serde(default)]
    defaults: DefaultsPatch,
    /// Whole-section replacement: a level that sets `delivery` at all
    /// replaces the policy entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delivery: Option<DeliveryPolicy>,
}

impl DeliveryPatch {
    fn apply(&self, config: &mut DeliveryConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }

        if let Some(v) = &self.resend.api_key {
            config.resend.api_key = Some(v.clone());
        }

        if let Some(v) = &self.smtp.host {
            config.smtp.host = Some(v.clone());
        }
        if let Some(v) = self.smtp.port {
            config.smtp.port = v;
        }
        if let Some(v) = &self.smtp.username {
            config.smtp.username = Some(v.clone());
        }
        if let Some(v) = &self.smtp.password {
            config.smtp.password = Some(v.clone());
        }
        if let Some(v) = self.smtp.use_tls {
            config.smtp.use_tls = v;
        }

        if let Some(v) = &self.defaults.from_email {
            config.defaults.from_email = Some(v.clone());
        }
        if let Some(v) = &self.defaults.from_name {
            config.defaults.from_name = Some(v.clone());
        }
        if let Some(v) = &self.defaults.signature {
            config.defaults.signature = Some(v.clone());
        }

        if let Some(policy) = &self.delivery {
            config.delivery = policy.clone();
        }
    }

    /// Environment layer. The provider flips to SMTP when any SMTP host or
    /// username variable is present, matching what the mail CLI itself reads.
    fn from_env(env: &Environment, errors: &mut Vec<String>) -> Self {
        let mut patch = Self::default();

        if env.get("POP_SMTP_HOST").is_some() || env.get("POP_SMTP_USERNAME").is_some() {
            patch.provider = Some(DeliveryProvider::Smtp);
        }

        patch.resend.api_key = env.get("RESEND_API_KEY").map(str::to_string);
        patch.smtp.host = env.get("POP_SMTP_HOST").map(str::to_string);
        patch.smtp.username = env.get("POP_SMTP_USERNAME").map(str::to_string);
        patch.smtp.password = env.get("POP_SMTP_PASSWORD").map(str::to_string);
        patch.defaults.from_email = env.get("POP_FROM").map(str::to_string);
        patch.defaults.signature = env.get("POP_SIGNATURE").map(str::to_string);

        if let Some(raw) = env.get("POP_SMTP_PORT") {
            match raw.parse::<u16>() {
                Ok(port) => patch.smtp.port = Some(port),
                Err(_) => errors.push(format!("POP_SMTP_PORT must be a port number, got '{raw}'")),
            }
        }

        if let Some(raw) = env.get("POP_SMTP_USE_TLS") {
            match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => patch.smtp.use_tls = Some(true),
                "false" | "0" | "no" => patch.smtp.use_tls = Some(false),
                _ => errors.push(format!("POP_SMTP_USE_TLS must be a boolean, got '{raw}'")),
            }
        }

        patch
    }
}

/// Loads and merges delivery configuration from all sources.
#[derive(Debug, Clone)]
pub struct DeliveryConfigLoader {
    start_dir: Utf8PathBuf,
    user_config_dir: Utf8PathBuf,
    home_dir: Option<Utf8PathBuf>,
}

impl DeliveryConfigLoader {
    pub fn new() -> Result<Self> {
        let cwd = Utf8PathBuf::from_path_buf(
            std::env::current_dir().context("Failed to read working directory")?,
        )
        .map_err(|p| anyhow::anyhow!("Working directory is not UTF-8: {}", p.display()))?;

        let user_config_dir = dirs::config_dir()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
            .map(|p| p.join("barque"))
            .context("Failed to determine user config directory")?;

        let home_dir = dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok());

        Ok(Self {
            start_dir: cwd,
            user_config_dir,
            home_dir,
        })
    }

    pub fn with_roots(
        start_dir: Utf8PathBuf,
        user_config_dir: Utf8PathBuf,
        home_dir: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            start_dir,
            user_config_dir,
            home_dir,
        }
    }

    /// Layer files in ascending precedence order.
    fn layer_files(&self) -> Vec<Utf8PathBuf> {
        let mut files = Vec::new();
        if let Some(home) = &self.home_dir {
            files.push(home.join(PROJECT_CONFIG_DIR).join(EMAIL_FILE_NAME));
        }
        files.push(self.user_config_dir.join(EMAIL_FILE_NAME));

        // Project file by upward walk, same marker directory as the main
        // config.
        let mut dir = Some(self.start_dir.as_path());
        while let Some(current) = dir {
            let candidate = current.join(PROJECT_CONFIG_DIR).join(EMAIL_FILE_NAME);
            if candidate.exists() {
                files.push(candidate);
                break;
            }
            dir = current.parent();
        }

        files
    }

    /// Merge all delivery configuration sources, highest precedence last.
    pub fn load(
        &self,
        explicit: Option<&Utf8Path>,
        env: &Environment,
    ) -> Result<DeliveryConfig, ConfigError> {
        let mut errors = Vec::new();
        let mut config = DeliveryConfig::default();

        for file in self.layer_files() {
            if let Some(patch) = load_delivery_patch(&file, &mut errors) {
                patch.apply(&mut config);
            }
        }

        DeliveryPatch::from_env(env, &mut errors).apply(&mut config);

        if let Some(path) = explicit {
            if path.exists() {
                if let Some(patch) = load_delivery_patch(path, &mut errors) {
                    patch.apply(&mut config);
                }
            } else {
                errors.push(format!("Email config file not found: {path}"));
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Example configuration file content, written by `barque init
    /// --with-email`.
    pub fn example_yaml() -> &'static str {
        "\
provider: resend
resend:
  api_key: \"\"
smtp:
  host: smtp.gmail.com
  port: 587
  username: \"\"
  password: \"\"
  use_tls: true
defaults:
  from_email: \"\"
  from_name: \"\"
  signature: \"Sent with BARQUE v2.0.0\"
delivery:
  max_retries: 3
  retry_delay_seconds: 5
  retry_exponential_backoff: true
  rate_limit: 60
  max_attachment_size_mb: 25
  max_attachments: 10
"
    }
}

fn load_delivery_patch(path: &Utf8Path, errors: &mut Vec<String>) -> Option<DeliveryPatch> {
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            errors.push(format!("Failed to read email config {path}: {e}"));
            return None;
        }
    };

    match serde_yaml_ng::from_str::<DeliveryPatch>(&contents) {
        Ok(patch) => Some(patch),
        Err(e) => {
            errors.push(format!("Failed to parse email config {path}: {e}"));
            None
        }
    }
}
