use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::observability::metrics::Metrics;
use crate::ports::NotificationSink;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Sms {
        phone: String,
        message: String,
    },
    Push {
        user_id: String,
        title: String,
        message: String,
    },
}

impl Notification {
    pub fn channel(&self) -> &'static str {
        match self {
            Notification::Sms { .. } => "sms",
            Notification::Push { .. } => "push",
        }
    }
}

/// Producer side of the post-commit notification hooks. Enqueueing never
/// waits; a full or closed queue drops the notification with a warning.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
    metrics: Metrics,
}

impl NotificationQueue {
    pub fn new(queue_size: usize, metrics: Metrics) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { tx, metrics }, rx)
    }

    pub fn enqueue(&self, notification: Notification) -> bool {
        let channel = notification.channel();
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(err) => {
                warn!(channel, error = %err, "notification dropped");
                self.metrics
                    .notifications_total
                    .with_label_values(&[channel, "dropped"])
                    .inc();
                false
            }
        }
    }
}

pub async fn run_notification_worker(
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,
    mut rx: mpsc::Receiver<Notification>,
) {
    info!("notification worker started");

    while let Some(notification) = rx.recv().await {
        let channel = notification.channel();
        let result = match &notification {
            Notification::Sms { phone, message } => sink.send_sms(phone, message).await,
            Notification::Push {
                user_id,
                title,
                message,
            } => sink.send_push(user_id, title, message).await,
        };

        let outcome = match result {
            Ok(true) => {
                debug!(channel, "notification delivered");
                "success"
            }
            Ok(false) => {
                warn!(channel, "notification declined by provider");
                "declined"
            }
            Err(err) => {
                warn!(channel, error = %err, "notification failed");
                "error"
            }
        };

        metrics
            .notifications_total
            .with_label_values(&[channel, outcome])
            .inc();
    }

    warn!("notification worker stopped: queue channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Notification, NotificationQueue, run_notification_worker};
    use crate::adapters::simulated::{SentNotification, SimulatedBackend};
    use crate::observability::metrics::Metrics;

    fn sms(n: u32) -> Notification {
        Notification::Sms {
            phone: "+2250700000001".to_string(),
            message: format!("parcel {n}"),
        }
    }

    #[test]
    fn full_queue_drops_instead_of_waiting() {
        let (queue, _rx) = NotificationQueue::new(1, Metrics::new());
        assert!(queue.enqueue(sms(1)));
        assert!(!queue.enqueue(sms(2)));
    }

    #[test]
    fn closed_queue_drops() {
        let (queue, rx) = NotificationQueue::new(4, Metrics::new());
        drop(rx);
        assert!(!queue.enqueue(sms(1)));
    }

    #[tokio::test]
    async fn worker_delivers_and_survives_failures() {
        let backend = Arc::new(SimulatedBackend::new(Duration::ZERO));
        let metrics = Metrics::new();
        let (queue, rx) = NotificationQueue::new(8, metrics.clone());

        backend.set_notifications_failing(true);
        queue.enqueue(sms(1));
        drop(queue);

        run_notification_worker(backend.clone(), metrics.clone(), rx).await;
        assert!(backend.sent_notifications().is_empty());
        assert_eq!(
            metrics
                .notifications_total
                .with_label_values(&["sms", "error"])
                .get(),
            1
        );

        backend.set_notifications_failing(false);
        let (queue, rx) = NotificationQueue::new(8, metrics.clone());
        queue.enqueue(sms(2));
        queue.enqueue(Notification::Push {
            user_id: "user-1".to_string(),
            title: "New delivery".to_string(),
            message: "parcel 2".to_string(),
        });
        drop(queue);

        run_notification_worker(backend.clone(), metrics, rx).await;
        let sent = backend.sent_notifications();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], SentNotification::Sms { message, .. } if message == "parcel 2"));
        assert!(matches!(&sent[1], SentNotification::Push { user_id, .. } if user_id == "user-1"));
    }
}
