//! Failure notifications for advertisers.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery channels
//! - SMTP email and log-only notifier implementations
//! - Minijinja rendering of the subject and plain-text body

pub mod email;
pub mod log;
pub mod templating;
pub mod traits;

pub use email::EmailNotifier;
pub use log::LogNotifier;
pub use templating::TemplateRenderer;
pub use traits::{Notification, Notifier, NotifyError};
