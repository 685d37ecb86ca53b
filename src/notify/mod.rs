//! Outbound alerts about the order's outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::NotifyError;
use crate::events::NotificationEvent;

pub mod sns;

pub use sns::SnsNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Writes alerts to the log only. Used when no topic is configured.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!("📣 [NOTIFY] {}\n{}", event.subject, event.render_body());
        Ok(())
    }
}

/// SNS when the profile names a topic and AWS credentials are present,
/// otherwise the log.
pub fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    let topic = config.credentials.sns_topic.trim();
    if topic.is_empty() {
        info!("ℹ️ [NOTIFY] SNS_TOPIC not set - notifications go to the log");
        return Arc::new(LogNotifier);
    }

    match SnsNotifier::from_env(topic, config.credentials.aws_region.as_deref()) {
        Ok(sns) => Arc::new(sns),
        Err(e) => {
            warn!("⚠️ [NOTIFY] SNS unavailable ({}), falling back to log", e);
            Arc::new(LogNotifier)
        }
    }
}
