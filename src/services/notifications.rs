use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::mpsc;

use crate::db::queries;
use crate::models::{Channel, Notification};
use crate::services::messaging::{MailSender, SmsSender};

/// Hands a notification off for delivery. Never blocks and never fails the caller.
pub trait Notifier: Send + Sync {
    fn enqueue(&self, notification: Notification);
}

/// Channel-backed notifier; a background worker records and delivers each message.
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// Spawns the delivery worker on the current tokio runtime.
    pub fn start(
        db: Arc<Mutex<Connection>>,
        sms: Box<dyn SmsSender>,
        mail: Box<dyn MailSender>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(db, rx, sms, mail));
        Self { tx }
    }
}

impl Notifier for NotificationQueue {
    fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::error!(kind = %e.0.kind, "notification worker has stopped, message dropped");
        }
    }
}

async fn run_dispatcher(
    db: Arc<Mutex<Connection>>,
    mut rx: mpsc::UnboundedReceiver<Notification>,
    sms: Box<dyn SmsSender>,
    mail: Box<dyn MailSender>,
) {
    while let Some(notification) = rx.recv().await {
        let record_id = match db.lock() {
            Ok(conn) => queries::insert_notification(&conn, &notification)
                .map_err(|e| tracing::error!(error = %e, "failed to record notification"))
                .ok(),
            Err(_) => None,
        };

        let result = match notification.channel {
            Channel::Sms => sms.send_sms(&notification.recipient, &notification.body).await,
            Channel::Email => {
                let subject = notification.subject.as_deref().unwrap_or("Your appointment");
                mail.send_mail(&notification.recipient, subject, &notification.body)
                    .await
            }
        };

        let status = match &result {
            Ok(()) => "sent",
            Err(e) => {
                tracing::warn!(
                    kind = %notification.kind,
                    channel = notification.channel.as_str(),
                    error = %e,
                    "notification delivery failed"
                );
                "failed"
            }
        };

        if let Some(id) = record_id {
            if let Ok(conn) = db.lock() {
                if let Err(e) = queries::mark_notification(&conn, id, status) {
                    tracing::error!(error = %e, "failed to update notification status");
                }
            }
        }
    }
    tracing::info!("notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use async_trait::async_trait;

    struct RecordingSms {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FailingMail;

    #[async_trait]
    impl MailSender for FailingMail {
        async fn send_mail(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            anyhow::bail!("mail server unavailable")
        }
    }

    fn notification(channel: Channel, booking_id: &str) -> Notification {
        Notification {
            channel,
            kind: "reminder".to_string(),
            recipient: "someone".to_string(),
            body: "See you tomorrow".to_string(),
            subject: None,
            metadata: serde_json::json!({ "booking_id": booking_id }),
        }
    }

    async fn wait_for_status(db: &Arc<Mutex<Connection>>, booking_id: &str) -> String {
        for _ in 0..100 {
            let status: Option<String> = {
                let conn = db.lock().unwrap();
                conn.query_row(
                    "SELECT status FROM notifications WHERE booking_id = ?1",
                    [booking_id],
                    |row| row.get(0),
                )
                .ok()
            };
            if let Some(status) = status.filter(|s| s != "queued") {
                return status;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("notification for {booking_id} was never processed");
    }

    #[tokio::test]
    async fn test_worker_records_and_delivers() {
        let db = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let sent = Arc::new(Mutex::new(vec![]));
        let queue = NotificationQueue::start(
            Arc::clone(&db),
            Box::new(RecordingSms {
                sent: Arc::clone(&sent),
            }),
            Box::new(FailingMail),
        );

        queue.enqueue(notification(Channel::Sms, "b-sms"));
        queue.enqueue(notification(Channel::Email, "b-mail"));

        assert_eq!(wait_for_status(&db, "b-sms").await, "sent");
        assert_eq!(wait_for_status(&db, "b-mail").await, "failed");
        assert_eq!(sent.lock().unwrap().len(), 1);

        let conn = db.lock().unwrap();
        assert!(queries::has_notification(&conn, "b-sms", "reminder").unwrap());
    }
}
