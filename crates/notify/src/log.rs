//! Notifier that writes rendered messages to the log instead of sending them.

use crate::traits::{Notification, Notifier, NotifyError};

/// Logs every notification at info level. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            channel = "log",
            advertiser_id = %notification.advertiser_id,
            subject = %notification.subject,
            "would send notification:\n{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notification = Notification {
            advertiser_id: "A1".to_string(),
            subject: "Source error for Acme".to_string(),
            body: "Advertiser: Acme\n".to_string(),
        };
        assert!(LogNotifier.send(&notification).await.is_ok());
        assert_eq!(LogNotifier.channel_name(), "log");
    }
}
