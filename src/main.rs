use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use dotenv::dotenv;
use std::sync::Arc;

use onlipet_billing::{
    config::Config,
    handlers,
    services::{
        database::{DatabaseService, InMemoryUserStore, JsonFileUserStore, UserStore},
        gateway::SimulatedPixGateway,
        subscription::PlanLifecycleManager,
    },
    tasks::expiry_sweep,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let store: Arc<dyn UserStore> = match &config.user_store_path {
        Some(path) => Arc::new(
            JsonFileUserStore::open(path)
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
        ),
        None => {
            log::warn!("USER_STORE_PATH not set, user records are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };
    let database_service = DatabaseService::new(store);

    let gateway = Arc::new(SimulatedPixGateway::new(config.app.payment_delay()));
    let lifecycle = PlanLifecycleManager::new(
        database_service.clone(),
        gateway,
        config.pix.merchant(),
        config.app.payment_timeout(),
    );

    actix_web::rt::spawn(expiry_sweep::start_expiry_sweep(
        lifecycle.clone(),
        config.app.expiry_sweep_interval(),
        config.app.checkout_ttl(),
    ));

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting OnliPet billing server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            )
            .app_data(web::Data::new(database_service.clone()))
            .app_data(web::Data::new(lifecycle.clone()))
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
