mod api;
mod app;
mod config;
mod error;
mod logging;
mod middleware;
mod model;
mod service;
mod util;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env().context("failed to load configuration")?;
    logging::init(&config.logging)?;
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .context("invalid SERVER_BIND address")?;

    tracing::info!(
        %addr,
        news = %config.news.base_url,
        summary_model = %config.summarizer.model,
        "starting dashboard"
    );

    let app = app::build_router(&config)?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await.context("server failed")?;

    Ok(())
}
