use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::resolve_caller;
use crate::handlers::{parse_date, parse_time};
use crate::models::{BookingStatus, GuestContact};
use crate::services::duration::PricingDurationIndex;
use crate::services::reservation::{
    self, BookingDetails, BookingUpdate, ReservationRequest, ResourceAssignment,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: String,
    pub customer_id: Option<String>,
    pub style_id: String,
    pub variation_id: String,
    pub resource_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status: BookingStatus,
    pub duration_minutes: u32,
    pub price_cents: i64,
    pub promo_code: Option<String>,
    pub created_at: String,
}

impl From<BookingDetails> for BookingResponse {
    fn from(details: BookingDetails) -> Self {
        let b = details.booking;
        Self {
            date: queries::format_date(b.booking_date),
            time: queries::format_time(b.booking_time),
            created_at: b.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            id: b.id,
            customer_id: b.customer_id,
            style_id: b.style_id,
            variation_id: b.variation_id,
            resource_id: b.resource_id,
            status: b.status,
            duration_minutes: details.duration_minutes,
            price_cents: b.price_cents,
            promo_code: b.promo_code,
        }
    }
}

// POST /api/bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub style_id: Option<String>,
    pub variation_id: String,
    pub resource_id: Option<String>,
    pub date: String,
    pub time: String,
    pub guest: Option<GuestContact>,
    pub payment_reference: String,
    pub promo_code: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = resolve_caller(&headers, &state.config.admin_token)?;

    let request = ReservationRequest {
        style_id: body.style_id.filter(|s| !s.is_empty()),
        variation_id: body.variation_id,
        resource_id: body.resource_id.filter(|s| !s.is_empty()),
        date: parse_date("date", &body.date)?,
        time: parse_time("time", &body.time)?,
        guest: body.guest,
        payment_reference: body.payment_reference,
        promo_code: body.promo_code.filter(|s| !s.is_empty()),
    };

    let details = reservation::reserve(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(details))))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let caller = resolve_caller(&headers, &state.config.admin_token)?;
    let conn = state.db()?;
    let details = reservation::get_booking(&conn, &caller, &id)?;
    Ok(Json(details.into()))
}

// PATCH /api/bookings/:id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub resource_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub payment_status: Option<String>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let caller = resolve_caller(&headers, &state.config.admin_token)?;

    let status = body
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status: {s}")))
        })
        .transpose()?;

    let update = BookingUpdate {
        status,
        resource: body.resource_id.as_deref().map(ResourceAssignment::parse),
        date: body.date.as_deref().map(|d| parse_date("date", d)).transpose()?,
        time: body.time.as_deref().map(|t| parse_time("time", t)).transpose()?,
        payment_status: body.payment_status,
    };

    let mut conn = state.db()?;
    let details = reservation::update_booking(&mut conn, &caller, &id, update)?;
    Ok(Json(details.into()))
}

// POST /api/bookings/:id/check-in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let caller = resolve_caller(&headers, &state.config.admin_token)?;
    let conn = state.db()?;
    let booking = reservation::check_in(&conn, &caller, &id, Utc::now().naive_utc())?;
    let index = PricingDurationIndex::load(&conn)?;
    Ok(Json(
        BookingDetails {
            duration_minutes: index.duration_for(&booking.style_id, &booking.variation_id),
            booking,
        }
        .into(),
    ))
}
