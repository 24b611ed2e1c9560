use actix_web::{get, post, HttpResponse};
use actix_web::web::{Data, Json, Path};
use uuid::Uuid;
use validator::Validate;

use crate::error::BillingError;
use crate::models::{common::ApiResponse, user::CreateUserRequest};
use crate::services::{database::DatabaseService, subscription::PlanLifecycleManager};

#[post("/register")]
pub async fn register_user(
    db: Data<DatabaseService>,
    payload: Json<CreateUserRequest>,
) -> Result<HttpResponse, BillingError> {
    let request = payload.into_inner();
    request
        .validate()
        .map_err(|e| BillingError::Validation(e.to_string()))?;

    let user = db.create_user(request).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        user,
        "Cadastro realizado!".to_string(),
    )))
}

#[get("/{user_id}")]
pub async fn get_user(
    db: Data<DatabaseService>,
    path: Path<Uuid>,
) -> Result<HttpResponse, BillingError> {
    let user_id = path.into_inner();
    let user = db
        .get_user(&user_id)
        .await?
        .ok_or(BillingError::UserNotFound(user_id))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(user)))
}

/// Signs the user in on this device.
#[post("/{user_id}/session")]
pub async fn start_session(
    manager: Data<PlanLifecycleManager>,
    path: Path<Uuid>,
) -> Result<HttpResponse, BillingError> {
    let session = manager.open_session(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(session)))
}
