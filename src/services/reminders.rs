use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDateTime, Timelike, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::notification::KIND_REMINDER;
use crate::models::{Channel, Notification};
use crate::services::notifications::Notifier;
use crate::state::AppState;

/// Queues one reminder for every live booking tomorrow that starts in the current hour
/// and has not been reminded yet. Returns how many were queued.
pub fn scan_due_reminders(
    conn: &Connection,
    notifier: &dyn Notifier,
    salon_name: &str,
    now_local: NaiveDateTime,
) -> anyhow::Result<usize> {
    let Some(tomorrow) = now_local.date().checked_add_days(Days::new(1)) else {
        return Ok(0);
    };
    let hour = now_local.hour();

    let mut queued = 0;
    for booking in queries::live_bookings_in_range(conn, tomorrow, tomorrow)? {
        if booking.booking_time.hour() != hour {
            continue;
        }
        if queries::has_notification(conn, &booking.id, KIND_REMINDER)? {
            continue;
        }
        let Some(customer_id) = booking.customer_id.as_deref() else {
            continue;
        };
        let Some(customer) = queries::get_user(conn, customer_id)? else {
            tracing::warn!(booking_id = %booking.id, "reminder skipped, customer account missing");
            continue;
        };

        let body = format!(
            "Reminder: your {salon_name} appointment is tomorrow at {}. Reference: {}",
            queries::format_time(booking.booking_time),
            booking.id
        );
        let (channel, recipient, subject) = match (&customer.phone, &customer.email) {
            (Some(phone), _) => (Channel::Sms, phone.clone(), None),
            (None, Some(email)) => (
                Channel::Email,
                email.clone(),
                Some(format!("Your {salon_name} appointment tomorrow")),
            ),
            (None, None) => continue,
        };

        notifier.enqueue(Notification {
            channel,
            kind: KIND_REMINDER.to_string(),
            recipient,
            body,
            subject,
            metadata: serde_json::json!({ "booking_id": booking.id }),
        });
        queued += 1;
    }
    Ok(queued)
}

/// Background task that queues next-day reminders once per interval.
pub async fn run_reminder_scanner(state: Arc<AppState>) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(state.config.reminder_interval_secs.max(1)));
    loop {
        interval.tick().await;
        let now_local = Utc::now()
            .with_timezone(&state.config.salon_offset())
            .naive_local();

        let result = state.db().map_err(anyhow::Error::from).and_then(|conn| {
            scan_due_reminders(&conn, state.notifier.as_ref(), &state.config.salon_name, now_local)
        });
        match result {
            Ok(0) => tracing::debug!("no reminders due"),
            Ok(n) => tracing::info!(count = n, "queued booking reminders"),
            Err(e) => tracing::error!(error = %e, "reminder scan failed"),
        }
    }
}
