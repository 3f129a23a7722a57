use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use serde_json::json;
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use fitsub_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::build_translator,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    tasks,
    utils::JwtService,
};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

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

    let config = Config::from_toml().expect("Failed to load configuration file");

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

    let translator: Arc<dyn fitsub_backend::external::Translator> = Arc::from(
        build_translator(&config.translation).expect("Failed to configure translator"),
    );

    // services
    let subscription_service = SubscriptionService::new(pool.clone(), config.pricing.clone());
    let schedule_service = ScheduleService::new(pool.clone());
    let task_queue = DbTaskQueue::new(pool.clone());
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let user_service = UserService::new(pool.clone(), subscription_service.clone());
    let catalog_service = CatalogService::new(pool.clone(), translator);
    let progress_service = ProgressService::new(
        pool.clone(),
        schedule_service.clone(),
        subscription_service.clone(),
        Arc::new(task_queue.clone()),
    );

    // payment gateways share one settlement flow
    let settlement = Settlement::new(pool.clone(), config.pricing.clone(), schedule_service);
    let payme_gateway = Arc::new(PaymeGateway::new(config.payme.clone(), settlement.clone()));
    let click_gateway = Arc::new(ClickGateway::new(config.click.clone(), settlement));
    let dispatcher = PaymentDispatcher::new(subscription_service.clone())
        .with_provider(payme_gateway.clone())
        .with_provider(click_gateway.clone());

    let payme_data = web::Data::from(payme_gateway);
    let click_data = web::Data::from(click_gateway);
    let dispatcher_data = web::Data::new(dispatcher);

    tasks::spawn_all(
        config.tasks.clone(),
        task_queue,
        progress_service.clone(),
        subscription_service.clone(),
    );

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
            .app_data(web::Data::new(subscription_service.clone()))
            .app_data(web::Data::new(catalog_service.clone()))
            .app_data(web::Data::new(progress_service.clone()))
            .app_data(payme_data.clone())
            .app_data(click_data.clone())
            .app_data(dispatcher_data.clone())
            .route("/health", web::get().to(health))
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::subscription_config)
                    .configure(handlers::program_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
