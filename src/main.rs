mod auth;
mod config;
mod middleware;

mod db;
mod drug_info;
mod error;
mod jobs;
mod mailer;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    config::Config,
    drug_info::DrugInfoClient,
    mailer::{HttpMailer, Mailer},
    models::AppState,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;
    let mailer: Arc<dyn Mailer> = Arc::new(HttpMailer::new(&cfg));
    let drug_info = DrugInfoClient::new(&cfg.fda_api_url);

    let state = AppState {
        db: pool,
        mailer,
        drug_info,
        session_ttl_hours: cfg.session_ttl_hours,
        missed_grace_minutes: cfg.missed_grace_minutes,
    };

    // Sweeper + reminder dispatcher; they stop with the process.
    jobs::spawn_background_jobs(state.clone(), &cfg);

    // Allow browser clients to call the API (frontend is served separately).
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
