use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use dossier_core::notify::Notifier;
use dossier_core::BoxError;

/// Logging notifier. The real SMTP relay sits behind the same trait in
/// deployment; for local runs and tests the delivery is just recorded.
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("Dossier <no-reply@dossier.example>")
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, link: &str, subject_context: &str) -> Result<(), BoxError> {
        let message_id = format!("msg_{}", Uuid::new_v4());
        info!(
            %message_id,
            from = %self.from,
            to,
            link,
            subject_context,
            "delivery email sent"
        );
        Ok(())
    }
}
