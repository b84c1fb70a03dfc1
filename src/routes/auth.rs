use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::AuthGuard;
use crate::models::Identity;
use crate::services::AppServices;
use crate::utils::{ApiError, ApiResponse};

/// Identity of the caller, served from the session cache.
#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(
    services: &State<AppServices>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let identity = services
        .sessions
        .current(&auth.account_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    Ok(Json(ApiResponse::success(identity)))
}
