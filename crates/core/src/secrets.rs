//! Lookup of credentials and settings by name.
//!
//! Production reads the process environment; tests hand in fixed values
//! through [`StaticSecrets`] so nothing touches `std::env`.

use std::collections::HashMap;
use std::env;

/// Named value lookup. Empty values count as absent.
pub trait SecretProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads values from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|s| !s.is_empty())
    }
}

/// Fixed in-memory values.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecrets {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|s| !s.is_empty()).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for StaticSecrets
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_secrets_lookup() {
        let secrets = StaticSecrets::new().with("API_TOKEN", "abc");
        assert_eq!(secrets.get("API_TOKEN").as_deref(), Some("abc"));
        assert_eq!(secrets.get("ADMIN_TOKEN"), None);
    }

    #[test]
    fn empty_value_is_absent() {
        let secrets: StaticSecrets = [("SMTP_USER", "")].into_iter().collect();
        assert_eq!(secrets.get("SMTP_USER"), None);
    }

    #[test]
    fn env_secrets_reads_environment() {
        std::env::set_var("SOURCEWATCH_SECRETS_TEST", "from-env");
        assert_eq!(
            EnvSecrets.get("SOURCEWATCH_SECRETS_TEST").as_deref(),
            Some("from-env")
        );
        std::env::remove_var("SOURCEWATCH_SECRETS_TEST");
        assert_eq!(EnvSecrets.get("SOURCEWATCH_SECRETS_TEST"), None);
    }
}
