use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity for this request. Authentication happens upstream; this only reads what the
/// gateway forwarded. A bearer token must match the admin token exactly.
pub fn resolve_caller(headers: &HeaderMap, admin_token: &str) -> Result<Caller, AppError> {
    if let Some(auth) = headers.get("authorization") {
        let token = auth
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        if admin_token.is_empty() || token != admin_token {
            return Err(AppError::Unauthorized);
        }
        return Ok(Caller::admin());
    }

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    Ok(match user_id {
        Some(id) => Caller::user(id),
        None => Caller::anonymous(),
    })
}
