use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::handlers::auth::resolve_caller;
use crate::services::calendar::generate_ics;
use crate::services::reservation;
use crate::state::AppState;

// GET /api/bookings/:id/calendar.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let caller = resolve_caller(&headers, &state.config.admin_token)?;
    let details = {
        let conn = state.db()?;
        reservation::get_booking(&conn, &caller, &id)?
    };

    let ics = generate_ics(
        &details.booking,
        details.duration_minutes,
        &state.config.salon_name,
    );
    let disposition = format!("attachment; filename=\"booking-{id}.ics\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}
