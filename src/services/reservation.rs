use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tokio::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::notification::{KIND_CONFIRMATION, KIND_CREDENTIALS};
use crate::models::resource::is_on_leave;
use crate::models::{
    Booking, BookingStatus, Caller, Channel, GuestContact, Notification, Resource, Role, User,
    Variation,
};
use crate::services::accounts;
use crate::services::duration::PricingDurationIndex;
use crate::services::notifications::Notifier;
use crate::services::overlap::overlaps;
use crate::services::payments::{PaymentConfirmation, PaymentGateway};
use crate::state::AppState;

pub const CHECK_IN_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub style_id: Option<String>,
    pub variation_id: String,
    pub resource_id: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub guest: Option<GuestContact>,
    pub payment_reference: String,
    pub promo_code: Option<String>,
}

/// A booking together with its catalog-resolved duration.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub duration_minutes: u32,
}

enum CustomerRef {
    Account(User),
    Guest(GuestContact),
}

/// Everything resolved before the payment is touched.
struct ReservationPlan {
    style_id: String,
    variation: Variation,
    resource: Option<Resource>,
    customer: CustomerRef,
    index: PricingDurationIndex,
    duration_minutes: u32,
    price_cents: i64,
}

struct Committed {
    booking: Booking,
    customer: User,
    new_credential: Option<String>,
}

fn storage(e: impl std::fmt::Display) -> AppError {
    AppError::Transaction(format!("storage error: {e}"))
}

fn minute_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Whether the resource already has a live booking overlapping `[start, start + duration)`.
pub fn resource_has_conflict(
    conn: &Connection,
    index: &PricingDurationIndex,
    resource_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: u32,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let start = minute_of(time);
    let end = start.saturating_add(duration_minutes);
    let bookings = queries::live_bookings_for_resource_on(conn, resource_id, date)?;
    Ok(bookings
        .iter()
        .filter(|b| exclude_booking_id != Some(b.id.as_str()))
        .any(|b| {
            let b_start = b.start_minute();
            let b_end = b_start.saturating_add(index.duration_for(&b.style_id, &b.variation_id));
            overlaps(start, end, b_start, b_end)
        }))
}

fn validate_resource(
    conn: &Connection,
    resource_id: &str,
    style_id: &str,
    date: NaiveDate,
) -> Result<Resource, AppError> {
    let resource = queries::get_resource(conn, resource_id)?
        .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))?;
    if !resource.active {
        return Err(AppError::Capability(format!(
            "{} is not taking bookings",
            resource.name
        )));
    }
    if !resource.is_capable_of(style_id) {
        return Err(AppError::Capability(format!(
            "{} does not offer this style",
            resource.name
        )));
    }
    let leave = queries::leave_in_range(conn, date, date)?;
    if is_on_leave(&leave, &resource.id, date) {
        return Err(AppError::Capability(format!(
            "{} is not working on {date}",
            resource.name
        )));
    }
    Ok(resource)
}

fn validate_reservation(
    conn: &Connection,
    caller: &Caller,
    req: &ReservationRequest,
) -> Result<ReservationPlan, AppError> {
    if req.payment_reference.trim().is_empty() {
        return Err(AppError::Validation(
            "a payment confirmation reference is required".to_string(),
        ));
    }

    let variation = queries::get_variation(conn, &req.variation_id)?
        .ok_or_else(|| AppError::NotFound(format!("variation {}", req.variation_id)))?;

    let style_id = match req.style_id.as_deref() {
        Some(style_id) => {
            queries::get_style(conn, style_id)?
                .ok_or_else(|| AppError::NotFound(format!("style {style_id}")))?;
            if variation.style_id != style_id {
                return Err(AppError::Validation(format!(
                    "variation {} does not belong to style {style_id}",
                    variation.id
                )));
            }
            style_id.to_string()
        }
        None => variation.style_id.clone(),
    };

    let resource = req
        .resource_id
        .as_deref()
        .map(|id| validate_resource(conn, id, &style_id, req.date))
        .transpose()?;

    let customer = match caller.user_id.as_deref() {
        Some(user_id) => {
            CustomerRef::Account(queries::get_user(conn, user_id)?.ok_or(AppError::Unauthorized)?)
        }
        None => match &req.guest {
            Some(guest) if guest.is_complete() => CustomerRef::Guest(guest.clone()),
            _ => {
                return Err(AppError::Validation(
                    "guest bookings require a name, email and phone".to_string(),
                ))
            }
        },
    };

    if queries::payment_reference_exists(conn, &req.payment_reference)? {
        return Err(AppError::Payment(
            "this payment has already been used for a booking".to_string(),
        ));
    }

    let index = PricingDurationIndex::load(conn)?;
    let duration_minutes = index.duration_for(&style_id, &variation.id);
    let price_cents = index.price_for(&style_id, &variation.id, resource.as_ref());

    Ok(ReservationPlan {
        style_id,
        variation,
        resource,
        customer,
        index,
        duration_minutes,
        price_cents,
    })
}

/// Conflict re-check, booking insert and payment insert as one IMMEDIATE transaction.
fn commit_reservation(
    conn: &mut Connection,
    plan: &ReservationPlan,
    req: &ReservationRequest,
    confirmation: &PaymentConfirmation,
    deadline: Instant,
) -> Result<Committed, AppError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(storage)?;

    if queries::payment_reference_exists(&tx, &req.payment_reference).map_err(storage)? {
        return Err(AppError::Payment(
            "this payment has already been used for a booking".to_string(),
        ));
    }

    let (customer, new_credential) = match &plan.customer {
        CustomerRef::Account(user) => (user.clone(), None),
        CustomerRef::Guest(contact) => {
            let account = accounts::resolve_guest(&tx, contact).map_err(storage)?;
            (account.user, account.new_credential)
        }
    };

    let conflict = match &plan.resource {
        Some(resource) => resource_has_conflict(
            &tx,
            &plan.index,
            &resource.id,
            req.date,
            req.time,
            plan.duration_minutes,
            None,
        ),
        None => queries::customer_has_booking_at(&tx, &customer.id, req.date, req.time, None),
    }
    .map_err(storage)?;

    if conflict {
        return Err(AppError::slot_unavailable());
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: Some(customer.id.clone()),
        style_id: plan.style_id.clone(),
        variation_id: plan.variation.id.clone(),
        resource_id: plan.resource.as_ref().map(|r| r.id.clone()),
        booking_date: req.date,
        booking_time: req.time,
        status: BookingStatus::Booked,
        promo_code: req.promo_code.clone(),
        price_cents: plan.price_cents,
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(&tx, &booking).map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::slot_unavailable()
        } else {
            storage(e)
        }
    })?;

    queries::insert_payment(
        &tx,
        &booking.id,
        confirmation.amount_cents,
        &req.payment_reference,
        "succeeded",
    )
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Payment("this payment has already been used for a booking".to_string())
        } else {
            storage(e)
        }
    })?;

    if Instant::now() >= deadline {
        return Err(AppError::Transaction(
            "reservation timed out before it could be saved".to_string(),
        ));
    }

    tx.commit().map_err(storage)?;

    Ok(Committed {
        booking,
        customer,
        new_credential,
    })
}

/// Turns a validated request and a captured payment into a booking. Any failure once
/// the payment is confirmed is answered with a refund before the error is returned.
pub async fn reserve(
    state: &AppState,
    caller: &Caller,
    req: ReservationRequest,
) -> Result<BookingDetails, AppError> {
    let deadline = Instant::now() + Duration::from_secs(state.config.reservation_timeout_secs);

    let plan = {
        let conn = state.db()?;
        validate_reservation(&conn, caller, &req)?
    };

    let confirmation = match tokio::time::timeout_at(
        deadline,
        state.payments.confirm(&req.payment_reference),
    )
    .await
    {
        Ok(Ok(confirmation)) => confirmation,
        Ok(Err(e)) => {
            tracing::warn!(reference = %req.payment_reference, error = %e, "payment confirmation failed");
            return Err(AppError::Payment("payment could not be confirmed".to_string()));
        }
        Err(_) => {
            // The client captured before calling us; an unanswered confirm still holds money.
            let err = AppError::Transaction("payment confirmation timed out".to_string());
            compensate(state.payments.as_ref(), &req.payment_reference, &err).await;
            return Err(err);
        }
    };

    if !confirmation.is_succeeded() {
        return Err(AppError::Payment(format!(
            "payment has not succeeded (status: {})",
            confirmation.status
        )));
    }

    let outcome = state
        .db()
        .and_then(|mut conn| commit_reservation(&mut conn, &plan, &req, &confirmation, deadline));

    match outcome {
        Ok(committed) => {
            tracing::info!(
                booking_id = %committed.booking.id,
                resource = ?committed.booking.resource_id,
                date = %committed.booking.booking_date,
                time = %queries::format_time(committed.booking.booking_time),
                "booking created"
            );
            notify_confirmed(state.notifier.as_ref(), &state.config, &committed);
            Ok(BookingDetails {
                booking: committed.booking,
                duration_minutes: plan.duration_minutes,
            })
        }
        Err(err) => {
            // A reused reference belongs to another booking and must not be refunded.
            if !matches!(err, AppError::Payment(_)) {
                compensate(state.payments.as_ref(), &req.payment_reference, &err).await;
            }
            Err(err)
        }
    }
}

async fn compensate(payments: &dyn PaymentGateway, reference: &str, cause: &AppError) {
    tracing::warn!(reference, error = %cause, "reservation failed after payment capture, refunding");
    if let Err(e) = payments.refund(reference).await {
        tracing::error!(
            critical = true,
            reference,
            cause = %cause,
            error = %e,
            "refund of captured payment failed, manual follow-up required"
        );
    }
}

fn notify_confirmed(notifier: &dyn Notifier, config: &AppConfig, committed: &Committed) {
    let booking = &committed.booking;
    let metadata = serde_json::json!({ "booking_id": booking.id });
    let body = format!(
        "Hi {}, your {} appointment on {} at {} is confirmed. Reference: {}",
        committed.customer.name,
        config.salon_name,
        queries::format_date(booking.booking_date),
        queries::format_time(booking.booking_time),
        booking.id,
    );

    if let Some(email) = &committed.customer.email {
        notifier.enqueue(Notification {
            channel: Channel::Email,
            kind: KIND_CONFIRMATION.to_string(),
            recipient: email.clone(),
            body: body.clone(),
            subject: Some(format!("{} booking confirmed", config.salon_name)),
            metadata: metadata.clone(),
        });

        if let Some(credential) = &committed.new_credential {
            notifier.enqueue(Notification {
                channel: Channel::Email,
                kind: KIND_CREDENTIALS.to_string(),
                recipient: email.clone(),
                body: format!(
                    "An account was created for you at {}. Sign in with {} and the temporary password {}.",
                    config.salon_name, email, credential
                ),
                subject: Some(format!("Your {} account", config.salon_name)),
                metadata: serde_json::json!({ "user_id": committed.customer.id }),
            });
        }
    }

    if let Some(phone) = &committed.customer.phone {
        notifier.enqueue(Notification {
            channel: Channel::Sms,
            kind: KIND_CONFIRMATION.to_string(),
            recipient: phone.clone(),
            body,
            subject: None,
            metadata,
        });
    }
}

// ── Access ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    Owner,
    Operator,
}

/// Who the caller is relative to this booking: admin, the customer who owns it, or the
/// account operating its assigned stylist.
pub fn authorize(conn: &Connection, caller: &Caller, booking: &Booking) -> Result<Access, AppError> {
    if caller.is_admin {
        return Ok(Access::Admin);
    }
    let user_id = caller.user_id.as_deref().ok_or(AppError::Unauthorized)?;
    let user = queries::get_user(conn, user_id)?.ok_or(AppError::Unauthorized)?;

    if user.role == Role::Admin {
        return Ok(Access::Admin);
    }
    if caller.is(booking.customer_id.as_deref()) {
        return Ok(Access::Owner);
    }
    if let Some(resource_id) = booking.resource_id.as_deref() {
        if let Some(resource) = queries::get_resource(conn, resource_id)? {
            if resource.user_id.as_deref() == Some(user_id) {
                return Ok(Access::Operator);
            }
        }
    }
    Err(AppError::Forbidden)
}

pub fn get_booking(
    conn: &Connection,
    caller: &Caller,
    booking_id: &str,
) -> Result<BookingDetails, AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    authorize(conn, caller, &booking)?;
    let index = PricingDurationIndex::load(conn)?;
    Ok(BookingDetails {
        duration_minutes: index.duration_for(&booking.style_id, &booking.variation_id),
        booking,
    })
}

// ── Reschedule / reassignment ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAssignment {
    Unassigned,
    Resource(String),
}

impl ResourceAssignment {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "unassigned" => ResourceAssignment::Unassigned,
            id => ResourceAssignment::Resource(id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    pub status: Option<BookingStatus>,
    pub resource: Option<ResourceAssignment>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub payment_status: Option<String>,
}

pub fn update_booking(
    conn: &mut Connection,
    caller: &Caller,
    booking_id: &str,
    update: BookingUpdate,
) -> Result<BookingDetails, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    let access = authorize(&tx, caller, &booking)?;

    if update.payment_status.is_some() && access != Access::Admin {
        return Err(AppError::Forbidden);
    }

    let next_status = match update.status {
        Some(next) if next != booking.status => {
            if next == BookingStatus::CheckedIn {
                return Err(AppError::Validation(
                    "use the check-in endpoint to check a booking in".to_string(),
                ));
            }
            if next == BookingStatus::Completed && access == Access::Owner {
                return Err(AppError::Forbidden);
            }
            if !booking.status.can_transition_to(next) {
                return Err(AppError::Validation(format!(
                    "cannot move a {} booking to {}",
                    booking.status.as_str(),
                    next.as_str()
                )));
            }
            next
        }
        _ => booking.status,
    };

    let new_resource_id = match &update.resource {
        None => booking.resource_id.clone(),
        Some(ResourceAssignment::Unassigned) => None,
        Some(ResourceAssignment::Resource(id)) => Some(id.clone()),
    };
    let new_date = update.date.unwrap_or(booking.booking_date);
    let new_time = update.time.unwrap_or(booking.booking_time);

    let resource_changed = new_resource_id != booking.resource_id;
    let moved =
        resource_changed || new_date != booking.booking_date || new_time != booking.booking_time;

    if moved && booking.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "a {} booking cannot be rescheduled",
            booking.status.as_str()
        )));
    }

    if moved && next_status != BookingStatus::Cancelled {
        let index = PricingDurationIndex::load(&tx)?;
        let duration = index.duration_for(&booking.style_id, &booking.variation_id);

        let conflict = match new_resource_id.as_deref() {
            Some(resource_id) => {
                if resource_changed || new_date != booking.booking_date {
                    validate_resource(&tx, resource_id, &booking.style_id, new_date)?;
                }
                resource_has_conflict(
                    &tx,
                    &index,
                    resource_id,
                    new_date,
                    new_time,
                    duration,
                    Some(&booking.id),
                )?
            }
            None => match booking.customer_id.as_deref() {
                Some(customer_id) => queries::customer_has_booking_at(
                    &tx,
                    customer_id,
                    new_date,
                    new_time,
                    Some(&booking.id),
                )?,
                None => false,
            },
        };

        if conflict {
            return Err(AppError::slot_unavailable());
        }
    }

    booking.resource_id = new_resource_id;
    booking.booking_date = new_date;
    booking.booking_time = new_time;
    booking.status = next_status;

    queries::update_booking(&tx, &booking).map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::slot_unavailable()
        } else {
            AppError::Internal(e)
        }
    })?;

    if let Some(payment_status) = update.payment_status.as_deref() {
        queries::update_payment_status_for_booking(&tx, &booking.id, payment_status)?;
    }

    let index = PricingDurationIndex::load(&tx)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        status = booking.status.as_str(),
        resource = ?booking.resource_id,
        date = %booking.booking_date,
        time = %queries::format_time(booking.booking_time),
        "booking updated"
    );

    let updated = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    Ok(BookingDetails {
        duration_minutes: index.duration_for(&updated.style_id, &updated.variation_id),
        booking: updated,
    })
}

// ── Check-in ──

/// `booked → checked_in`, allowed within 30 minutes either side of the appointment.
/// `now` is UTC wall-clock time compared directly against the booking's date and time.
pub fn check_in(
    conn: &Connection,
    caller: &Caller,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let mut booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    authorize(conn, caller, &booking)?;

    if booking.status != BookingStatus::Booked {
        return Err(AppError::Validation(format!(
            "a {} booking cannot be checked in",
            booking.status.as_str()
        )));
    }

    let offset = (now - booking.scheduled_at()).num_seconds().abs();
    if offset > CHECK_IN_WINDOW_MINUTES * 60 {
        return Err(AppError::TimeWindow(format!(
            "check-in is only possible within {CHECK_IN_WINDOW_MINUTES} minutes of the appointment"
        )));
    }

    queries::update_booking_status(conn, &booking.id, BookingStatus::CheckedIn)?;
    booking.status = BookingStatus::CheckedIn;
    tracing::info!(booking_id = %booking.id, "booking checked in");
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Style, WeeklyHours};
    use chrono::Duration as ChronoDuration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn user(conn: &Connection, id: &str, role: Role) {
        let user = User {
            id: id.to_string(),
            name: id.to_string(),
            email: Some(format!("{id}@example.com")),
            phone: None,
            role,
        };
        queries::insert_user(conn, &user, None).unwrap();
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::save_business_hours(&conn, &WeeklyHours::every_day("09:00", "17:00")).unwrap();
        queries::insert_style(
            &conn,
            &Style {
                id: "cut".to_string(),
                name: "Cut".to_string(),
            },
        )
        .unwrap();
        queries::insert_style(
            &conn,
            &Style {
                id: "braids".to_string(),
                name: "Braids".to_string(),
            },
        )
        .unwrap();
        queries::insert_variation(
            &conn,
            &Variation {
                id: "cut-short".to_string(),
                style_id: "cut".to_string(),
                name: "Short".to_string(),
                price_cents: 3000,
                duration_minutes: Some(60),
            },
        )
        .unwrap();

        user(&conn, "alice", Role::Customer);
        user(&conn, "bob", Role::Customer);
        user(&conn, "sam", Role::Stylist);
        user(&conn, "boss", Role::Admin);

        for (id, styles, operator) in [
            ("r1", vec!["cut"], Some("sam")),
            ("r2", vec!["cut"], None),
            ("r3", vec!["braids"], None),
        ] {
            queries::insert_resource(
                &conn,
                &Resource {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    active: true,
                    working_hours: None,
                    style_ids: styles.into_iter().map(str::to_string).collect(),
                    surcharge: None,
                    user_id: operator.map(str::to_string),
                },
            )
            .unwrap();
        }
        conn
    }

    fn seed_booking(conn: &Connection, id: &str, customer: &str, resource: Option<&str>, time: &str) {
        let now = Utc::now().naive_utc();
        queries::create_booking(
            conn,
            &Booking {
                id: id.to_string(),
                customer_id: Some(customer.to_string()),
                style_id: "cut".to_string(),
                variation_id: "cut-short".to_string(),
                resource_id: resource.map(str::to_string),
                booking_date: d("2025-06-16"),
                booking_time: t(time),
                status: BookingStatus::Booked,
                promo_code: None,
                price_cents: 3000,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_reschedule_onto_own_slot_succeeds() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let update = BookingUpdate {
            resource: Some(ResourceAssignment::Resource("r1".to_string())),
            date: Some(d("2025-06-16")),
            time: Some(t("10:00")),
            ..Default::default()
        };
        let details = update_booking(&mut conn, &Caller::user("alice"), "b1", update).unwrap();
        assert_eq!(details.booking.booking_time, t("10:00"));
        assert_eq!(details.duration_minutes, 60);
    }

    #[test]
    fn test_shift_within_own_interval_is_not_a_self_conflict() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let update = BookingUpdate {
            time: Some(t("10:30")),
            ..Default::default()
        };
        let details = update_booking(&mut conn, &Caller::user("alice"), "b1", update).unwrap();
        assert_eq!(details.booking.booking_time, t("10:30"));
    }

    #[test]
    fn test_reschedule_into_occupied_slot_conflicts() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
        seed_booking(&conn, "b2", "bob", Some("r1"), "12:00");

        let update = BookingUpdate {
            time: Some(t("11:30")),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::user("alice"), "b1", update).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let unchanged = queries::get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(unchanged.booking_time, t("10:00"));
    }

    #[test]
    fn test_reassign_checks_capability() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let to_braider = BookingUpdate {
            resource: Some(ResourceAssignment::Resource("r3".to_string())),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::admin(), "b1", to_braider).unwrap_err();
        assert!(matches!(err, AppError::Capability(_)));

        let to_r2 = BookingUpdate {
            resource: Some(ResourceAssignment::Resource("r2".to_string())),
            ..Default::default()
        };
        let details = update_booking(&mut conn, &Caller::admin(), "b1", to_r2).unwrap();
        assert_eq!(details.booking.resource_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_reassign_onto_stylist_on_leave_is_rejected() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
        queries::insert_leave(
            &conn,
            &crate::models::LeaveRecord {
                resource_id: "r2".to_string(),
                start_date: d("2025-06-15"),
                end_date: d("2025-06-17"),
                reason: "holiday".to_string(),
            },
        )
        .unwrap();

        let update = BookingUpdate {
            resource: Some(ResourceAssignment::Resource("r2".to_string())),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::admin(), "b1", update).unwrap_err();
        assert!(matches!(err, AppError::Capability(_)));
    }

    #[test]
    fn test_conflict_check_saturates_long_durations() {
        let conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "16:00");
        let index = PricingDurationIndex::load(&conn).unwrap();

        let conflict =
            resource_has_conflict(&conn, &index, "r1", d("2025-06-16"), t("09:00"), u32::MAX, None)
                .unwrap();
        assert!(conflict);
    }

    #[test]
    fn test_unassigned_sentinel_clears_resource() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let update = BookingUpdate {
            resource: Some(ResourceAssignment::parse("unassigned")),
            ..Default::default()
        };
        let details = update_booking(&mut conn, &Caller::admin(), "b1", update).unwrap();
        assert_eq!(details.booking.resource_id, None);
    }

    #[test]
    fn test_unassigned_reschedule_blocks_same_customer_duplicate() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", None, "10:00");
        seed_booking(&conn, "b2", "alice", None, "12:00");

        let update = BookingUpdate {
            time: Some(t("12:00")),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::user("alice"), "b1", update).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_status_changes_follow_the_state_machine() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let complete = BookingUpdate {
            status: Some(BookingStatus::Completed),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::admin(), "b1", complete).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let cancel = BookingUpdate {
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        };
        let details = update_booking(&mut conn, &Caller::user("alice"), "b1", cancel).unwrap();
        assert_eq!(details.booking.status, BookingStatus::Cancelled);

        let move_cancelled = BookingUpdate {
            time: Some(t("14:00")),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::admin(), "b1", move_cancelled).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_strangers_cannot_touch_a_booking() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");

        let update = BookingUpdate {
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::user("bob"), "b1", update.clone()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = update_booking(&mut conn, &Caller::anonymous(), "b1", update).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_payment_status_override_is_admin_only() {
        let mut conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
        queries::insert_payment(&conn, "b1", 3000, "pi_1", "succeeded").unwrap();

        let update = BookingUpdate {
            payment_status: Some("refunded".to_string()),
            ..Default::default()
        };
        let err = update_booking(&mut conn, &Caller::user("alice"), "b1", update.clone()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        update_booking(&mut conn, &Caller::user("boss"), "b1", update).unwrap();
        let payments = queries::get_payments_for_booking(&conn, "b1").unwrap();
        assert_eq!(payments[0].status, "refunded");
    }

    fn appointment() -> NaiveDateTime {
        d("2025-06-16").and_time(t("10:00"))
    }

    #[test]
    fn test_check_in_window_edges() {
        for minutes in [-29, 29] {
            let conn = setup();
            seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
            let now = appointment() + ChronoDuration::minutes(minutes);
            let booking = check_in(&conn, &Caller::user("alice"), "b1", now).unwrap();
            assert_eq!(booking.status, BookingStatus::CheckedIn);
        }

        for minutes in [-31, 31] {
            let conn = setup();
            seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
            let now = appointment() + ChronoDuration::minutes(minutes);
            let err = check_in(&conn, &Caller::user("alice"), "b1", now).unwrap_err();
            assert!(matches!(err, AppError::TimeWindow(_)));
        }
    }

    #[test]
    fn test_check_in_by_operator_and_admin_only() {
        let conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
        seed_booking(&conn, "b2", "alice", Some("r2"), "10:00");

        let err = check_in(&conn, &Caller::user("bob"), "b1", appointment()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // sam operates r1 but not r2
        check_in(&conn, &Caller::user("sam"), "b1", appointment()).unwrap();
        let err = check_in(&conn, &Caller::user("sam"), "b2", appointment()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        check_in(&conn, &Caller::user("boss"), "b2", appointment()).unwrap();
    }

    #[test]
    fn test_check_in_twice_is_rejected() {
        let conn = setup();
        seed_booking(&conn, "b1", "alice", Some("r1"), "10:00");
        check_in(&conn, &Caller::admin(), "b1", appointment()).unwrap();
        let err = check_in(&conn, &Caller::admin(), "b1", appointment()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
