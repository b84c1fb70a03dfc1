use chrono::{DateTime, Utc};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::models::{PlanDuration, PlanSelection, PlanSelectionDto};
use crate::services::pricing::{self, PriceSheetEntry, LOCKER_FEE, REGISTRATION_FEE};
use crate::services::renewal::Quote;
use crate::services::AppServices;
use crate::utils::{ApiError, ApiResponse};

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FromPrice {
    pub duration: PlanDuration,
    pub amount: i64,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingResponse {
    pub registration_fee: i64,
    pub locker_fee: i64,
    pub from_prices: Vec<FromPrice>,
    pub plans: Vec<PriceSheetEntry>,
}

#[openapi(tag = "Pricing")]
#[get("/pricing")]
pub async fn get_pricing() -> Json<ApiResponse<PricingResponse>> {
    let from_prices = PlanDuration::ALL
        .into_iter()
        .map(|duration| FromPrice {
            duration,
            amount: pricing::from_price(duration),
        })
        .collect();

    Json(ApiResponse::success(PricingResponse {
        registration_fee: REGISTRATION_FEE,
        locker_fee: LOCKER_FEE,
        from_prices,
        plans: pricing::price_sheet(),
    }))
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDto {
    pub plan: PlanSelectionDto,
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub plan: String,
    pub plan_selection: PlanSelection,
    pub per_month: i64,
    #[serde(flatten)]
    pub quote: Quote,
}

#[openapi(tag = "Pricing")]
#[post("/pricing/quote", data = "<dto>")]
pub async fn quote(
    services: &State<AppServices>,
    dto: Json<QuoteDto>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ApiError> {
    let plan = PlanSelection::try_from(&dto.plan)?;
    let quote = services.renewals.quote(&plan, dto.start_date)?;

    Ok(Json(ApiResponse::success(QuoteResponse {
        plan: plan.label(),
        plan_selection: plan,
        per_month: pricing::per_month(quote.amount, plan.duration),
        quote,
    })))
}
