// src/main.rs
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit;
mod config;
mod consistency_handlers;
mod damaged_lost;
mod damaged_lost_handlers;
mod db;
mod error;
mod handlers;
mod import_export;
mod models;
mod monitoring;
mod store;

use config::{load_config, Config};
use monitoring::{Metrics, RequestLogger};
use store::{MemoryTreeStore, SqliteTreeStore, TreeStore};

pub struct AppState {
    pub store: Arc<dyn TreeStore>,
    pub config: Config,
    pub metrics: Arc<Metrics>,
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;

    if config.is_production() {
        validate_production_config(&config)?;
    }
    config.print_startup_info();

    let store = open_store(&config).await?;

    if let Some(seed_file) = &config.storage.seed_file {
        import_export::seed_from_file(store.as_ref(), seed_file).await?;
    }

    let metrics = Arc::new(Metrics::new());
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
        metrics: metrics.clone(),
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&server_config.security.allowed_origins, server_config.is_production());
        let security_headers = setup_security_headers(&server_config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(RequestLogger::new(metrics.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(server_config.security.max_request_size))
            .configure(configure_routes)
    })
    .keep_alive(std::time::Duration::from_secs(config.server.keep_alive));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await?;
    Ok(())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check and metrics
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/ready", web::get().to(monitoring::readiness_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint)),
        )
        .service(
            web::scope("/api/v1")
                // Data consistency
                .service(
                    web::scope("/data-consistency")
                        .route("/audit", web::post().to(consistency_handlers::run_audit))
                        .route("/fixes", web::post().to(consistency_handlers::apply_fixes)),
                )
                // Damaged / lost items
                .service(
                    web::scope("/damaged-lost")
                        .route("", web::post().to(damaged_lost_handlers::create_record))
                        .route("/stats", web::get().to(damaged_lost_handlers::get_statistics))
                        .route("/{id}/settlement", web::put().to(damaged_lost_handlers::update_settlement)),
                )
                .service(
                    web::scope("/borrowers")
                        .route("/{id}/damaged-lost", web::get().to(damaged_lost_handlers::get_borrower_records))
                        .route("/{id}/eligibility", web::get().to(damaged_lost_handlers::get_borrower_eligibility)),
                )
                .route("/restricted-users", web::get().to(damaged_lost_handlers::get_restricted_borrowers))
                // Raw tree import / export
                .service(
                    web::scope("/tree")
                        .route("/import", web::post().to(import_export::import_tree_json))
                        .route("/{collection}", web::get().to(import_export::export_collection)),
                ),
        );
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn TreeStore>> {
    match config.storage.backend.as_str() {
        "memory" => {
            log::warn!("Using in-memory tree store; data is lost on shutdown");
            Ok(Arc::new(MemoryTreeStore::new()))
        }
        _ => {
            db::setup_database(&config.database.url).await?;
            let pool = db::create_database_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            Ok(Arc::new(SqliteTreeStore::new(pool)))
        }
    }
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }
    if config.storage.backend == "memory" {
        anyhow::bail!("The in-memory store is not allowed in production!");
    }
    Ok(())
}

fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("Using wildcard CORS (*) in development mode");
        return cors.allow_any_origin();
    }

    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ));
    }

    headers
}
