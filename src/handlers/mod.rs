pub mod health;
pub mod subscriptions;
pub mod users;

use actix_web::web;

/// Mounts the `/api/v1` routes. Expects `DatabaseService` and
/// `PlanLifecycleManager` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(subscriptions::list_plans)
            .service(
                web::scope("/users")
                    .service(users::register_user)
                    .service(users::start_session)
                    .service(users::get_user),
            )
            .service(
                web::scope("/subscriptions")
                    .service(subscriptions::create_checkout)
                    .service(subscriptions::get_checkout)
                    .service(subscriptions::confirm_checkout)
                    .service(subscriptions::cancel_checkout)
                    .service(subscriptions::get_subscription_status),
            )
            .route("/health", web::get().to(health::health_check)),
    );
}
