use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use fraud_gateway::{config::Config, handlers, metrics, SessionManager};
use prometheus::Registry;
use signal_engine::SignalEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    info!("Starting Fraud Gateway...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let registry = Registry::new();
    metrics::register_metrics(&registry).context("Failed to register metrics")?;

    // Initialize components
    let engine = SignalEngine::from_config(config.engine.clone())
        .context("Failed to initialize signal engine")?;
    let tools: Vec<&str> = engine.tools().map(|t| t.name).collect();
    info!(tools = ?tools, "Signal engine initialized");

    let manager = web::Data::new(SessionManager::new(engine, config.session.mailbox_capacity));
    let registry = web::Data::new(registry);

    let server_config = config.server.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(manager.clone())
            .app_data(registry.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .expose_headers(vec![handlers::SESSION_HEADER])
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    Ok(())
}
