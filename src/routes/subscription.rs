use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    PaymentConfirmation, PaymentIntent, PlanSelection, PlanSelectionDto, SubscriptionRecord,
    SubscriptionStatus,
};
use crate::services::classifier;
use crate::services::ports::SubscriptionStore;
use crate::services::renewal::ConfirmationOutcome;
use crate::services::AppServices;
use crate::utils::{ApiError, ApiResponse};

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSubscription {
    pub status: SubscriptionStatus,
    pub days_remaining: i64,
    pub total_days: i64,
    pub should_prompt_renewal: bool,
    pub subscription: Option<SubscriptionRecord>,
}

#[openapi(tag = "Subscription")]
#[get("/subscription/current")]
pub async fn get_current_subscription(
    db: &State<DbConn>,
    services: &State<AppServices>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<CurrentSubscription>>, ApiError> {
    let subscription = db.get_subscription(&auth.account_id).await?;
    let report = classifier::classify(subscription.as_ref(), services.clock.now());

    Ok(Json(ApiResponse::success(CurrentSubscription {
        status: report.status,
        days_remaining: report.days_remaining,
        total_days: classifier::total_days(
            subscription.as_ref().map(|s| s.start_date),
            subscription.as_ref().map(|s| s.end_date),
        ),
        should_prompt_renewal: classifier::should_prompt_renewal(auth.role, report),
        subscription,
    })))
}

/// Opens a Razorpay order for the chosen plan. Nothing is renewed until the
/// payment is verified.
#[openapi(tag = "Subscription")]
#[post("/subscription/create", data = "<dto>")]
pub async fn create_subscription(
    services: &State<AppServices>,
    auth: AuthGuard,
    dto: Json<PlanSelectionDto>,
) -> Result<Json<ApiResponse<PaymentIntent>>, ApiError> {
    let plan = PlanSelection::try_from(&dto.into_inner())?;
    let intent = services
        .renewals
        .apply_paid_renewal(&auth.account_id, &plan)
        .await?;

    Ok(Json(ApiResponse::success(intent)))
}

fn default_success() -> bool {
    true
}

#[derive(Deserialize, JsonSchema)]
pub struct VerifySubscriptionPaymentDto {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    /// `false` when the checkout reported a failed or cancelled payment.
    #[serde(default = "default_success")]
    pub success: bool,
}

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    /// `false` when this order had already been applied.
    pub applied: bool,
    pub subscription: Option<SubscriptionRecord>,
}

#[openapi(tag = "Subscription")]
#[post("/subscription/verify", data = "<dto>")]
pub async fn verify_subscription_payment(
    services: &State<AppServices>,
    auth: AuthGuard,
    dto: Json<VerifySubscriptionPaymentDto>,
) -> Result<Json<ApiResponse<VerifyPaymentResponse>>, ApiError> {
    if dto.success {
        let (Some(payment_id), Some(signature)) =
            (dto.razorpay_payment_id.as_deref(), dto.razorpay_signature.as_deref())
        else {
            return Err(ApiError::bad_request("Payment id and signature are required"));
        };
        services
            .razorpay
            .verify_signature(&dto.razorpay_order_id, payment_id, signature)?;
    }

    let confirmation = PaymentConfirmation {
        success: dto.success,
        order_id: dto.razorpay_order_id.clone(),
        payment_id: dto.razorpay_payment_id.clone(),
    };

    match services
        .renewals
        .confirm_payment(&auth.account_id, &confirmation)
        .await?
    {
        ConfirmationOutcome::Applied(record) => Ok(Json(ApiResponse::success_with_message(
            "Payment verified, subscription renewed".to_string(),
            VerifyPaymentResponse {
                applied: true,
                subscription: Some(record),
            },
        ))),
        ConfirmationOutcome::AlreadyApplied(record) => {
            Ok(Json(ApiResponse::success_with_message(
                "Payment was already applied".to_string(),
                VerifyPaymentResponse {
                    applied: false,
                    subscription: record,
                },
            )))
        }
        ConfirmationOutcome::Failed => Err(ApiError::bad_request(
            "Payment failed, subscription unchanged",
        )),
    }
}
