use actix_web::{delete, get, post, HttpResponse};
use actix_web::web::{Data, Json, Path, Query};
use uuid::Uuid;

use crate::error::BillingError;
use crate::models::{
    common::{ApiResponse, PlanTier},
    payment::{CheckoutRequest, SessionRequest},
};
use crate::services::subscription::PlanLifecycleManager;

#[get("/plans")]
pub async fn list_plans(manager: Data<PlanLifecycleManager>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(manager.plans()))
}

#[post("/checkout")]
pub async fn create_checkout(
    manager: Data<PlanLifecycleManager>,
    payload: Json<CheckoutRequest>,
) -> Result<HttpResponse, BillingError> {
    let tier: PlanTier = payload.plan.parse()?;
    let session = manager.load_session(payload.user_id).await?;

    let checkout = manager.select_plan(&session, tier).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(checkout)))
}

#[get("/checkout/{checkout_id}")]
pub async fn get_checkout(
    manager: Data<PlanLifecycleManager>,
    path: Path<Uuid>,
    query: Query<SessionRequest>,
) -> Result<HttpResponse, BillingError> {
    let session = manager.load_session(query.user_id).await?;
    let checkout = manager.get_checkout(&session, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(checkout)))
}

#[post("/checkout/{checkout_id}/confirm")]
pub async fn confirm_checkout(
    manager: Data<PlanLifecycleManager>,
    path: Path<Uuid>,
    payload: Json<SessionRequest>,
) -> Result<HttpResponse, BillingError> {
    let session = manager.load_session(payload.user_id).await?;
    let user = manager.confirm_payment(&session, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        user,
        "Pagamento confirmado! Bem-vindo ao Premium.".to_string(),
    )))
}

#[delete("/checkout/{checkout_id}")]
pub async fn cancel_checkout(
    manager: Data<PlanLifecycleManager>,
    path: Path<Uuid>,
    query: Query<SessionRequest>,
) -> Result<HttpResponse, BillingError> {
    let session = manager.load_session(query.user_id).await?;
    let checkout = manager.cancel_checkout(&session, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(checkout)))
}

#[get("/{user_id}/status")]
pub async fn get_subscription_status(
    manager: Data<PlanLifecycleManager>,
    path: Path<Uuid>,
) -> Result<HttpResponse, BillingError> {
    let session = manager.load_session(path.into_inner()).await?;
    let status = manager.status(&session).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}
