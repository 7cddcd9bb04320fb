use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::parse_date;
use crate::models::hours::MINUTES_PER_DAY;
use crate::services::availability::{load_availability, AvailabilityFilters, MAX_RANGE_DAYS};
use crate::state::AppState;

// GET /api/availability
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub style_id: Option<String>,
    pub variation_id: Option<String>,
    pub resource_id: Option<String>,
    pub duration: Option<u32>,
    pub exclude_booking_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Response, AppError> {
    let (start, end, single) = match (
        non_empty(query.date),
        non_empty(query.start_date),
        non_empty(query.end_date),
    ) {
        (Some(date), _, _) => {
            let day = parse_date("date", &date)?;
            (day, day, true)
        }
        (None, Some(start), Some(end)) => {
            let start = parse_date("startDate", &start)?;
            let end = parse_date("endDate", &end)?;
            if end < start {
                return Err(AppError::Validation(
                    "endDate must not be before startDate".to_string(),
                ));
            }
            if (end - start).num_days() >= MAX_RANGE_DAYS {
                return Err(AppError::Validation(format!(
                    "date ranges are limited to {MAX_RANGE_DAYS} days"
                )));
            }
            (start, end, false)
        }
        _ => {
            return Err(AppError::Validation(
                "either date or startDate and endDate are required".to_string(),
            ))
        }
    };

    if query.duration.is_some_and(|m| m > MINUTES_PER_DAY) {
        return Err(AppError::Validation(format!(
            "duration must be at most {MINUTES_PER_DAY} minutes"
        )));
    }

    let filters = AvailabilityFilters {
        style_id: non_empty(query.style_id),
        variation_id: non_empty(query.variation_id),
        resource_id: non_empty(query.resource_id),
        duration_minutes: query.duration,
        exclude_booking_id: non_empty(query.exclude_booking_id),
    };

    let mut days = {
        let conn = state.db()?;
        load_availability(&conn, start, end, &filters)?
    };

    let body = if single {
        serde_json::to_value(days.remove(&start).unwrap_or_default())
    } else {
        let keyed: BTreeMap<String, _> = days
            .into_iter()
            .map(|(day, slots)| (day.format("%Y-%m-%d").to_string(), slots))
            .collect();
        serde_json::to_value(keyed)
    }
    .map_err(anyhow::Error::from)?;

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(body)).into_response())
}
