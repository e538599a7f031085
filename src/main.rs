use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use carmarket_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{LocalFileStorage, PayPalService, SharedFileStorage},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    std::fs::create_dir_all(&config.storage.upload_dir)?;
    let local_storage = Arc::new(LocalFileStorage::from_config(&config.storage));
    let storage: SharedFileStorage = local_storage.clone();
    let paypal_service =
        PayPalService::new(config.paypal.clone()).expect("Failed to build PayPal client");

    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let user_service = UserService::new(pool.clone(), storage.clone());
    let listing_service = ListingService::new(pool.clone(), storage.clone());
    let browse_service = BrowseService::new(pool.clone());
    let review_service = ReviewService::new(pool.clone());
    let favorite_service = FavoriteService::new(pool.clone());
    let history_service = ViewHistoryService::new(pool.clone());
    let subscription_service = SubscriptionService::new(pool.clone(), paypal_service);

    tasks::spawn_all(subscription_service.clone());

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(listing_service.clone()))
            .app_data(web::Data::new(browse_service.clone()))
            .app_data(web::Data::new(review_service.clone()))
            .app_data(web::Data::new(favorite_service.clone()))
            .app_data(web::Data::new(history_service.clone()))
            .app_data(web::Data::new(subscription_service.clone()))
            .app_data(web::Data::from(local_storage.clone()))
            .configure(swagger_config)
            .configure(handlers::uploads_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::listing_config)
                    .configure(handlers::review_config)
                    .configure(handlers::favorite_config)
                    .configure(handlers::history_config)
                    .configure(handlers::subscription_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
