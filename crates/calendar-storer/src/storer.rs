use std::sync::Arc;

use calendar_mq::Consumer;
use calendar_storage::NotificationStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Counters for one [`Storer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub received: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Consumer-to-store pump.
pub struct Storer {
    store: Arc<dyn NotificationStore>,
    consumer: Box<dyn Consumer>,
}

impl Storer {
    /// `consumer` must already be connected.
    pub fn new(store: Arc<dyn NotificationStore>, consumer: Box<dyn Consumer>) -> Self {
        Self { store, consumer }
    }

    /// Save notifications in delivery order until `cancel` fires or the
    /// subscription ends.
    ///
    /// Cancellation is checked before each item; an in-flight save always
    /// completes.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunReport> {
        let mut subscription = self.consumer.consume(cancel.clone()).await?;
        let mut report = RunReport::default();
        info!(consumer = %self.consumer.name(), "storer started");

        loop {
            let notification = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("storer cancelled");
                    break;
                }
                next = subscription.recv() => match next {
                    Some(notification) => notification,
                    None => {
                        info!("subscription ended");
                        break;
                    }
                },
            };

            report.received += 1;
            match self.store.save_notification(&notification).await {
                Ok(()) => {
                    report.saved += 1;
                    debug!(
                        notification_id = %notification.id,
                        user_id = %notification.user_id,
                        "notification saved"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        notification_id = %notification.id,
                        error = %e,
                        "failed to save notification, dropping it"
                    );
                }
            }
        }

        info!(
            received = report.received,
            saved = report.saved,
            failed = report.failed,
            "storer stopped"
        );
        Ok(report)
    }

    /// Release the consumer. Call after [`run`](Self::run) has returned.
    pub async fn close(mut self) -> Result<()> {
        self.consumer.close().await?;
        Ok(())
    }
}
