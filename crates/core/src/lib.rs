pub mod config;
pub mod error;
pub mod model;
pub mod secrets;

pub use config::{ApiConfig, Config, FailurePolicy, SmtpConfig};
pub use error::*;
pub use model::*;
pub use secrets::{EnvSecrets, SecretProvider, StaticSecrets};
