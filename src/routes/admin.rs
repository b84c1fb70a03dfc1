use chrono::NaiveDate;
use log::info;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::db::DbConn;
use crate::guards::AdminGuard;
use crate::models::{
    AccountFilter, AdminUserView, PlanSelection, PlanSelectionDto, SubscriptionRecord,
    SubscriptionStatus,
};
use crate::services::{accounts, classifier};
use crate::services::ports::SubscriptionStore;
use crate::services::reminder::{self, ReminderCandidate, ReminderStats};
use crate::services::renewal::ManualRenewal;
use crate::services::whatsapp::OutboxEntry;
use crate::services::AppServices;
use crate::utils::{ApiError, ApiResponse};

// ==================== USERS ====================

#[derive(FromForm, serde::Deserialize, JsonSchema)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<AdminUserView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Page and limit clamped to their bounds, plus the number of rows to skip.
fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let skip = page.saturating_sub(1).saturating_mul(limit);
    (page, limit, usize::try_from(skip).unwrap_or(usize::MAX))
}

#[openapi(tag = "Admin - Users")]
#[get("/admin/users?<query..>")]
pub async fn get_all_users(
    db: &State<DbConn>,
    services: &State<AppServices>,
    _admin: AdminGuard,
    query: UserListQuery,
) -> Result<Json<ApiResponse<UserListResponse>>, ApiError> {
    let (page, limit, skip) = page_window(query.page, query.limit);

    let filter = AccountFilter {
        status: SubscriptionStatus::parse_filter(query.status.as_deref())?,
        search: query.search.clone(),
    };
    let now = services.clock.now();
    let entries = db.list_accounts(&filter, now).await?;

    let total = entries.len() as i64;
    let users = entries
        .iter()
        .skip(skip)
        .take(limit as usize)
        .map(|entry| {
            AdminUserView::new(entry, classifier::classify(entry.subscription.as_ref(), now))
        })
        .collect();

    Ok(Json(ApiResponse::success(UserListResponse {
        users,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    })))
}

#[openapi(tag = "Admin - Users")]
#[delete("/admin/users/<user_id>?<confirm>")]
pub async fn delete_user(
    db: &State<DbConn>,
    services: &State<AppServices>,
    admin: AdminGuard,
    user_id: String,
    confirm: Option<bool>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if confirm != Some(true) {
        return Err(ApiError::bad_request("Deleting a user requires confirm=true"));
    }
    if user_id == admin.identity.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let account = accounts::remove_account(db.inner().as_ref(), &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    services.sessions.invalidate(&account.id);
    info!("{} deleted user {}", admin.identity.email, account.email);

    Ok(Json(ApiResponse::success_with_message(
        "User deleted".to_string(),
        account.id,
    )))
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionDto {
    pub user_id: String,
    pub plan: PlanSelectionDto,
    pub start_date: NaiveDate,
    pub months: i64,
}

/// Grants or replaces a subscription without payment. Requires `confirm=true`.
#[openapi(tag = "Admin - Users")]
#[post("/admin/update-subscription?<confirm>", data = "<dto>")]
pub async fn update_subscription(
    services: &State<AppServices>,
    admin: AdminGuard,
    dto: Json<UpdateSubscriptionDto>,
    confirm: Option<bool>,
) -> Result<Json<ApiResponse<SubscriptionRecord>>, ApiError> {
    let renewal = ManualRenewal {
        account_id: dto.user_id.clone(),
        plan: PlanSelection::try_from(&dto.plan)?,
        start_date: dto.start_date,
        months: dto.months,
        confirmed: confirm == Some(true),
    };

    let record = services.renewals.apply_manual_renewal(&renewal).await?;
    info!("{} renewed {} manually", admin.identity.email, record.account_id);

    Ok(Json(ApiResponse::success_with_message(
        "Subscription updated".to_string(),
        record,
    )))
}

// ==================== REMINDERS ====================

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPreview {
    #[serde(flatten)]
    pub candidate: ReminderCandidate,
    pub message: String,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderOverview {
    pub stats: ReminderStats,
    pub reminders: Vec<ReminderPreview>,
}

#[openapi(tag = "Admin - Reminders")]
#[get("/admin/reminders")]
pub async fn get_reminders(
    db: &State<DbConn>,
    services: &State<AppServices>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<ReminderOverview>>, ApiError> {
    let candidates = reminder::select_candidates(db.inner().as_ref(), services.clock.now()).await?;
    let institute = services.reminders.institute();

    Ok(Json(ApiResponse::success(ReminderOverview {
        stats: reminder::stats(&candidates),
        reminders: candidates
            .into_iter()
            .map(|candidate| ReminderPreview {
                message: reminder::build_message(&candidate, institute),
                candidate,
            })
            .collect(),
    })))
}

#[openapi(tag = "Admin - Reminders")]
#[post("/admin/reminders/<user_id>/send")]
pub async fn send_reminder(
    db: &State<DbConn>,
    services: &State<AppServices>,
    _admin: AdminGuard,
    user_id: String,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let candidates = reminder::select_candidates(db.inner().as_ref(), services.clock.now()).await?;
    let candidate = candidates
        .iter()
        .find(|c| c.account_id == user_id)
        .ok_or_else(|| ApiError::not_found("No reminder is due for this user"))?;

    services.reminders.dispatch_one(candidate).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Reminder queued".to_string(),
        candidate.account_id.clone(),
    )))
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkQueued {
    pub queued: usize,
    /// Candidates without a usable phone number.
    pub skipped: Vec<String>,
}

/// Sends every due reminder in the background, spaced by the configured
/// interval. Several recipients need `confirm=true`.
#[openapi(tag = "Admin - Reminders")]
#[post("/admin/reminders/send-all?<confirm>")]
pub async fn send_all_reminders(
    db: &State<DbConn>,
    services: &State<AppServices>,
    _admin: AdminGuard,
    confirm: Option<bool>,
) -> Result<Json<ApiResponse<BulkQueued>>, ApiError> {
    let candidates = reminder::select_candidates(db.inner().as_ref(), services.clock.now()).await?;
    let (commands, skipped) = services
        .reminders
        .plan_bulk(&candidates, confirm.unwrap_or(false))?;

    let queued = commands.len();
    if queued > 0 {
        let dispatcher = services.reminders.clone();
        let skipped = skipped.clone();
        rocket::tokio::spawn(async move {
            dispatcher.run_bulk(commands, skipped).await;
        });
    }

    Ok(Json(ApiResponse::success_with_message(
        format!("Sending {} reminders", queued),
        BulkQueued { queued, skipped },
    )))
}

#[openapi(tag = "Admin - Reminders")]
#[get("/admin/reminders/outbox")]
pub async fn drain_outbox(
    services: &State<AppServices>,
    _admin: AdminGuard,
) -> Json<ApiResponse<Vec<OutboxEntry>>> {
    Json(ApiResponse::success(services.outbox.drain()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps_and_never_overflows() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page_window(Some(-4), Some(0)), (1, 1, 0));

        let (page, limit, skip) = page_window(Some(i64::MAX), Some(100));
        assert_eq!((page, limit), (i64::MAX, 100));
        assert_eq!(skip, usize::try_from(i64::MAX).unwrap());
    }
}
