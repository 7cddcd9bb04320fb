use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingStatus, LeaveRecord, Notification, Payment, Resource, Role, Style, Surcharge,
    User, Variation, WeeklyHours,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FMT).to_string()
}

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FMT).to_string()
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, phone, role FROM users WHERE id = ?1",
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, phone, role FROM users WHERE lower(email) = lower(?1)",
            params![email.trim()],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn insert_user(
    conn: &Connection,
    user: &User,
    credential: Option<(&str, &str)>,
) -> anyhow::Result<()> {
    let (salt, digest) = match credential {
        Some((salt, digest)) => (Some(salt), Some(digest)),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO users (id, name, email, phone, role, credential_salt, credential_digest)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.name,
            user.email,
            user.phone,
            user.role.as_str(),
            salt,
            digest,
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: Role::parse(&role),
    })
}

// ── Settings ──

const BUSINESS_HOURS_KEY: &str = "business_hours";

/// Salon-wide opening hours. No stored value means closed every day; a value that no
/// longer parses is logged and treated the same way.
pub fn get_business_hours(conn: &Connection) -> anyhow::Result<WeeklyHours> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![BUSINESS_HOURS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(WeeklyHours::default());
    };

    match serde_json::from_str(&raw) {
        Ok(hours) => Ok(hours),
        Err(e) => {
            tracing::warn!(error = %e, "stored business hours are malformed, treating as closed");
            Ok(WeeklyHours::default())
        }
    }
}

pub fn save_business_hours(conn: &Connection, hours: &WeeklyHours) -> anyhow::Result<()> {
    hours.validate().context("rejected business hours")?;
    let value = serde_json::to_string(hours)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![BUSINESS_HOURS_KEY, value],
    )?;
    Ok(())
}

// ── Catalog ──

pub fn insert_style(conn: &Connection, style: &Style) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO styles (id, name) VALUES (?1, ?2)",
        params![style.id, style.name],
    )?;
    Ok(())
}

pub fn get_style(conn: &Connection, id: &str) -> anyhow::Result<Option<Style>> {
    let style = conn
        .query_row(
            "SELECT id, name FROM styles WHERE id = ?1",
            params![id],
            |row| {
                Ok(Style {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(style)
}

pub fn insert_variation(conn: &Connection, variation: &Variation) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO variations (id, style_id, name, price_cents, duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            variation.id,
            variation.style_id,
            variation.name,
            variation.price_cents,
            variation.duration_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_variation(conn: &Connection, id: &str) -> anyhow::Result<Option<Variation>> {
    let variation = conn
        .query_row(
            "SELECT id, style_id, name, price_cents, duration_minutes FROM variations WHERE id = ?1",
            params![id],
            parse_variation_row,
        )
        .optional()?;
    Ok(variation)
}

pub fn list_variations(conn: &Connection) -> anyhow::Result<Vec<Variation>> {
    let mut stmt = conn.prepare(
        "SELECT id, style_id, name, price_cents, duration_minutes FROM variations ORDER BY id",
    )?;
    let rows = stmt.query_map([], parse_variation_row)?;

    let mut variations = vec![];
    for row in rows {
        variations.push(row?);
    }
    Ok(variations)
}

fn parse_variation_row(row: &rusqlite::Row) -> rusqlite::Result<Variation> {
    Ok(Variation {
        id: row.get(0)?,
        style_id: row.get(1)?,
        name: row.get(2)?,
        price_cents: row.get(3)?,
        duration_minutes: row.get(4)?,
    })
}

// ── Resources ──

pub fn insert_resource(conn: &Connection, resource: &Resource) -> anyhow::Result<()> {
    if let Some(hours) = &resource.working_hours {
        hours
            .validate()
            .with_context(|| format!("rejected working hours for resource {}", resource.id))?;
    }
    let working_hours = resource
        .working_hours
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let surcharge = resource
        .surcharge
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO resources (id, name, active, working_hours, surcharge, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            resource.id,
            resource.name,
            resource.active as i32,
            working_hours,
            surcharge,
            resource.user_id,
        ],
    )?;

    for style_id in &resource.style_ids {
        conn.execute(
            "INSERT INTO resource_styles (resource_id, style_id) VALUES (?1, ?2)",
            params![resource.id, style_id],
        )?;
    }
    Ok(())
}

pub fn get_resource(conn: &Connection, id: &str) -> anyhow::Result<Option<Resource>> {
    let row = conn
        .query_row(
            "SELECT id, name, active, working_hours, surcharge, user_id FROM resources WHERE id = ?1",
            params![id],
            read_resource_columns,
        )
        .optional()?;

    match row {
        Some(columns) => Ok(Some(build_resource(conn, columns)?)),
        None => Ok(None),
    }
}

pub fn list_resources(conn: &Connection) -> anyhow::Result<Vec<Resource>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, active, working_hours, surcharge, user_id FROM resources ORDER BY name, id",
    )?;
    let rows = stmt.query_map([], read_resource_columns)?;

    let mut columns = vec![];
    for row in rows {
        columns.push(row?);
    }

    columns
        .into_iter()
        .map(|c| build_resource(conn, c))
        .collect()
}

type ResourceColumns = (String, String, bool, Option<String>, Option<String>, Option<String>);

fn read_resource_columns(row: &rusqlite::Row) -> rusqlite::Result<ResourceColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get::<_, i32>(2)? != 0,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn build_resource(conn: &Connection, columns: ResourceColumns) -> anyhow::Result<Resource> {
    let (id, name, active, working_hours, surcharge, user_id) = columns;

    // A stored override that no longer parses keeps the resource off the calendar
    // rather than silently falling back to salon hours.
    let working_hours = working_hours.map(|raw| {
        serde_json::from_str::<WeeklyHours>(&raw).unwrap_or_else(|e| {
            tracing::warn!(resource = %id, error = %e, "malformed working hours, treating as closed");
            WeeklyHours::default()
        })
    });

    let surcharge = surcharge.and_then(|raw| match serde_json::from_str::<Surcharge>(&raw) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(resource = %id, error = %e, "malformed surcharge, ignoring");
            None
        }
    });

    let mut stmt = conn.prepare(
        "SELECT style_id FROM resource_styles WHERE resource_id = ?1 ORDER BY style_id",
    )?;
    let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    let mut style_ids = vec![];
    for row in rows {
        style_ids.push(row?);
    }

    Ok(Resource {
        id,
        name,
        active,
        working_hours,
        style_ids,
        surcharge,
        user_id,
    })
}

// ── Leave ──

pub fn insert_leave(conn: &Connection, leave: &LeaveRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO leave_records (resource_id, start_date, end_date, reason) VALUES (?1, ?2, ?3, ?4)",
        params![
            leave.resource_id,
            format_date(leave.start_date),
            format_date(leave.end_date),
            leave.reason,
        ],
    )?;
    Ok(())
}

/// Leave records overlapping `[start, end]`.
pub fn leave_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<LeaveRecord>> {
    let mut stmt = conn.prepare(
        "SELECT resource_id, start_date, end_date, reason FROM leave_records
         WHERE start_date <= ?2 AND end_date >= ?1",
    )?;
    let rows = stmt.query_map(params![format_date(start), format_date(end)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut leave = vec![];
    for row in rows {
        let (resource_id, start_date, end_date, reason) = row?;
        leave.push(LeaveRecord {
            resource_id,
            start_date: NaiveDate::parse_from_str(&start_date, DATE_FMT)
                .with_context(|| format!("bad leave start date: {start_date}"))?,
            end_date: NaiveDate::parse_from_str(&end_date, DATE_FMT)
                .with_context(|| format!("bad leave end date: {end_date}"))?,
            reason,
        });
    }
    Ok(leave)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, style_id, variation_id, resource_id, booking_date, booking_time, status, promo_code, price_cents, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, style_id, variation_id, resource_id, booking_date, booking_time, status, promo_code, price_cents, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.id,
            booking.customer_id,
            booking.style_id,
            booking.variation_id,
            booking.resource_id,
            format_date(booking.booking_date),
            format_time(booking.booking_time),
            booking.status.as_str(),
            booking.promo_code,
            booking.price_cents,
            booking.created_at.format(TIMESTAMP_FMT).to_string(),
            booking.updated_at.format(TIMESTAMP_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Non-cancelled bookings with a date in `[start, end]`.
pub fn live_bookings_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE booking_date >= ?1 AND booking_date <= ?2 AND status != 'cancelled'
         ORDER BY booking_date ASC, booking_time ASC"
    ))?;

    let rows = stmt.query_map(params![format_date(start), format_date(end)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn live_bookings_for_resource_on(
    conn: &Connection,
    resource_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE resource_id = ?1 AND booking_date = ?2 AND status != 'cancelled'
         ORDER BY booking_time ASC"
    ))?;

    let rows = stmt.query_map(params![resource_id, format_date(date)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Whether the customer already holds a live booking at exactly this date and time.
pub fn customer_has_booking_at(
    conn: &Connection,
    customer_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE customer_id = ?1 AND booking_date = ?2 AND booking_time = ?3
           AND status != 'cancelled' AND id != COALESCE(?4, '')",
        params![
            customer_id,
            format_date(date),
            format_time(time),
            exclude_booking_id,
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET resource_id = ?1, booking_date = ?2, booking_time = ?3, status = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            booking.resource_id,
            format_date(booking.booking_date),
            format_time(booking.booking_time),
            booking.status.as_str(),
            now_timestamp(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_timestamp(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let customer_id: Option<String> = row.get(1)?;
    let style_id: String = row.get(2)?;
    let variation_id: String = row.get(3)?;
    let resource_id: Option<String> = row.get(4)?;
    let date_str: String = row.get(5)?;
    let time_str: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let promo_code: Option<String> = row.get(8)?;
    let price_cents: i64 = row.get(9)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    let booking_date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .with_context(|| format!("booking {id} has a malformed date: {date_str}"))?;
    let booking_time = NaiveTime::parse_from_str(&time_str, TIME_FMT)
        .with_context(|| format!("booking {id} has a malformed time: {time_str}"))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("booking {id} has an unknown status: {status_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id,
        customer_id,
        style_id,
        variation_id,
        resource_id,
        booking_date,
        booking_time,
        status,
        promo_code,
        price_cents,
        created_at,
        updated_at,
    })
}

// ── Payments ──

pub fn insert_payment(
    conn: &Connection,
    booking_id: &str,
    amount_cents: i64,
    external_reference: &str,
    status: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO payments (booking_id, amount_cents, external_reference, status) VALUES (?1, ?2, ?3, ?4)",
        params![booking_id, amount_cents, external_reference, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn payment_reference_exists(conn: &Connection, external_reference: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE external_reference = ?1",
        params![external_reference],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_payments_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, amount_cents, external_reference, status FROM payments
         WHERE booking_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(Payment {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            amount_cents: row.get(2)?,
            external_reference: row.get(3)?,
            status: row.get(4)?,
        })
    })?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row?);
    }
    Ok(payments)
}

pub fn update_payment_status_for_booking(
    conn: &Connection,
    booking_id: &str,
    status: &str,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE payments SET status = ?1 WHERE booking_id = ?2",
        params![status, booking_id],
    )?;
    Ok(count)
}

// ── Notifications ──

pub fn insert_notification(conn: &Connection, notification: &Notification) -> anyhow::Result<i64> {
    let metadata = serde_json::to_string(&notification.metadata)?;
    conn.execute(
        "INSERT INTO notifications (channel, kind, recipient, subject, body, metadata, booking_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.channel.as_str(),
            notification.kind,
            notification.recipient,
            notification.subject,
            notification.body,
            metadata,
            notification.booking_id(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn mark_notification(conn: &Connection, id: i64, status: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE notifications SET status = ?1 WHERE id = ?2",
        params![status, id],
    )?;
    Ok(())
}

pub fn has_notification(conn: &Connection, booking_id: &str, kind: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE booking_id = ?1 AND kind = ?2",
        params![booking_id, kind],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
