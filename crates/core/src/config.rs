use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::secrets::{EnvSecrets, SecretProvider};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Load a specific env file. Missing files are ignored like [`load_dotenv`].
pub fn load_dotenv_from(path: &std::path::Path) {
    if dotenvy::from_path(path).is_err() {
        tracing::debug!(path = %path.display(), "env file not loaded");
    }
}

pub const DEFAULT_SNAPSHOT_FILE: &str = "previous_errors.json";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "Source error for {{ advertiser.name }}";

/// Credential headers sent with every feed request, keyed by the secret
/// that holds their value.
const AUTH_HEADERS: &[(&str, &str)] = &[
    ("Authorization", "API_TOKEN"),
    ("Admin-Token", "ADMIN_TOKEN"),
    ("Newspaper-Token", "NEWSPAPER_TOKEN"),
];

fn value_or(secrets: &dyn SecretProvider, key: &str, default: &str) -> String {
    secrets.get(key).unwrap_or_else(|| default.to_string())
}

fn value_u64(secrets: &dyn SecretProvider, key: &str, default: u64) -> u64 {
    match secrets.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "not a number, using default");
            default
        }),
        None => default,
    }
}

/// Like [`value_u64`], but zero also falls back to the default.
fn value_secs(secrets: &dyn SecretProvider, key: &str, default: u64) -> u64 {
    match value_u64(secrets, key, default) {
        0 => {
            tracing::warn!(key, default, "timeout must be positive, using default");
            default
        }
        secs => secs,
    }
}

fn required(secrets: &dyn SecretProvider, key: &'static str) -> Result<String, ConfigError> {
    secrets.get(key).ok_or(ConfigError::Missing(key))
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub snapshot_path: PathBuf,
    pub smtp: SmtpConfig,
    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_secrets(&EnvSecrets)
    }

    /// Build config from any value provider.
    pub fn from_secrets(secrets: &dyn SecretProvider) -> Result<Self, ConfigError> {
        let failure_policy = match secrets.get("NOTIFY_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => FailurePolicy::default(),
        };
        Ok(Self {
            api: ApiConfig::from_secrets(secrets)?,
            snapshot_path: PathBuf::from(value_or(secrets, "SNAPSHOT_FILE", DEFAULT_SNAPSHOT_FILE)),
            smtp: SmtpConfig::from_secrets(secrets)?,
            failure_policy,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let headers: Vec<&str> = self.api.auth_headers.iter().map(|(k, _)| k.as_str()).collect();
        tracing::info!("Config loaded:");
        tracing::info!("  api:       url={}, pages={}, timeout={}s", self.api.endpoint_url, self.api.max_pages, self.api.timeout_secs);
        tracing::info!("  api auth:  headers=[{}]", headers.join(", "));
        tracing::info!("  snapshot:  path={}", self.snapshot_path.display());
        tracing::info!(
            "  smtp:      host={}:{}, auth={}, from={}, to={}",
            self.smtp.host,
            self.smtp.port,
            self.smtp.has_credentials(),
            self.smtp.from,
            self.smtp.to.join(",")
        );
        tracing::info!("  on error:  {}", self.failure_policy);
    }
}

// ── Remote feed ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint_url: String,
    /// Header name → value. Headers whose secret is absent are left out.
    pub auth_headers: Vec<(String, String)>,
    pub timeout_secs: u64,
    pub max_pages: u32,
}

impl ApiConfig {
    fn from_secrets(secrets: &dyn SecretProvider) -> Result<Self, ConfigError> {
        let auth_headers = AUTH_HEADERS
            .iter()
            .filter_map(|(header, key)| secrets.get(key).map(|v| (header.to_string(), v)))
            .collect();
        let max_pages = value_u64(secrets, "API_MAX_PAGES", 1).clamp(1, u32::MAX as u64) as u32;
        Ok(Self {
            endpoint_url: required(secrets, "API_URL")?,
            auth_headers,
            timeout_secs: value_secs(secrets, "API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            max_pages,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── SMTP / email ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub from: String,
    pub to: Vec<String>,
    pub subject_template: String,
}

impl SmtpConfig {
    fn from_secrets(secrets: &dyn SecretProvider) -> Result<Self, ConfigError> {
        let port = match secrets.get("SMTP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "SMTP_PORT",
                message: format!("'{raw}' is not a port number"),
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        let to: Vec<String> = required(secrets, "EMAIL_TO")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if to.is_empty() {
            return Err(ConfigError::Invalid {
                key: "EMAIL_TO",
                message: "at least one recipient is required".to_string(),
            });
        }

        Ok(Self {
            host: value_or(secrets, "SMTP_HOST", DEFAULT_SMTP_HOST),
            port,
            username: secrets.get("SMTP_USER"),
            password: secrets.get("SMTP_PASS"),
            timeout_secs: value_secs(secrets, "SMTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            from: required(secrets, "EMAIL_FROM")?,
            to,
            subject_template: value_or(secrets, "EMAIL_SUBJECT_TEMPLATE", DEFAULT_SUBJECT_TEMPLATE),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Send-failure policy ───────────────────────────────────────

/// What a run does when an email cannot be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed send; the snapshot is not written.
    #[default]
    Abort,
    /// Keep sending, then save a snapshot that leaves undelivered sources
    /// unacknowledged so the next run picks them up again.
    Defer,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "defer" => Ok(Self::Defer),
            other => Err(ConfigError::Invalid {
                key: "NOTIFY_FAILURE_POLICY",
                message: format!("unknown policy '{other}' (expected abort or defer)"),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Defer => f.write_str("defer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecrets;

    fn minimal() -> StaticSecrets {
        StaticSecrets::new()
            .with("API_URL", "https://api.example.com/customers?page=1&per=10")
            .with("EMAIL_FROM", "monitor@example.com")
            .with("EMAIL_TO", "ops@example.com")
    }

    #[test]
    fn defaults_applied() {
        let config = Config::from_secrets(&minimal()).unwrap();
        assert_eq!(config.snapshot_path, PathBuf::from("previous_errors.json"));
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.api.max_pages, 1);
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.smtp.subject_template, DEFAULT_SUBJECT_TEMPLATE);
        assert!(config.api.auth_headers.is_empty());
        assert!(!config.smtp.has_credentials());
    }

    #[test]
    fn auth_headers_from_tokens() {
        let secrets = minimal()
            .with("API_TOKEN", "tok-1")
            .with("NEWSPAPER_TOKEN", "tok-3");
        let config = Config::from_secrets(&secrets).unwrap();
        assert_eq!(
            config.api.auth_headers,
            vec![
                ("Authorization".to_string(), "tok-1".to_string()),
                ("Newspaper-Token".to_string(), "tok-3".to_string()),
            ]
        );
    }

    #[test]
    fn recipients_split_on_commas() {
        let secrets = minimal().with("EMAIL_TO", "a@example.com, b@example.com,");
        let config = Config::from_secrets(&secrets).unwrap();
        assert_eq!(config.smtp.to, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let secrets = StaticSecrets::new()
            .with("EMAIL_FROM", "monitor@example.com")
            .with("EMAIL_TO", "ops@example.com");
        let err = Config::from_secrets(&secrets).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("API_URL")));
    }

    #[test]
    fn blank_recipients_rejected() {
        let secrets = minimal().with("EMAIL_TO", " , ");
        let err = Config::from_secrets(&secrets).unwrap_err();
        assert!(err.to_string().contains("EMAIL_TO"), "got: {err}");
    }

    #[test]
    fn invalid_port_rejected() {
        let secrets = minimal().with("SMTP_PORT", "smtp");
        let err = Config::from_secrets(&secrets).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SMTP_PORT", .. }));
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let secrets = minimal()
            .with("API_TIMEOUT_SECS", "soon")
            .with("API_MAX_PAGES", "0");
        let config = Config::from_secrets(&secrets).unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.max_pages, 1);
    }

    #[test]
    fn zero_timeouts_fall_back() {
        let secrets = minimal()
            .with("API_TIMEOUT_SECS", "0")
            .with("SMTP_TIMEOUT_SECS", "0");
        let config = Config::from_secrets(&secrets).unwrap();
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.smtp.timeout(), Duration::from_secs(30));

        let config = Config::from_secrets(&minimal().with("SMTP_TIMEOUT_SECS", "5")).unwrap();
        assert_eq!(config.smtp.timeout_secs, 5);
    }

    #[test]
    fn failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(" Defer ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Defer);
        assert!("retry".parse::<FailurePolicy>().is_err());

        let config = Config::from_secrets(&minimal().with("NOTIFY_FAILURE_POLICY", "defer")).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Defer);
    }

    #[test]
    fn smtp_credentials_need_both_halves() {
        let config = Config::from_secrets(&minimal().with("SMTP_USER", "bot")).unwrap();
        assert!(!config.smtp.has_credentials());

        let config = Config::from_secrets(
            &minimal().with("SMTP_USER", "bot").with("SMTP_PASS", "hunter2"),
        )
        .unwrap();
        assert!(config.smtp.has_credentials());
    }
}
