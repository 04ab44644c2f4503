use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api,
    config::{AppConfig, FrontendPublicConfig, SearchConfig},
    middleware::{assign_trace_id, report_server_errors},
    service::sessions::SessionRegistry,
    util::{newsapi::NewsClient, summarizer::SummaryClient},
};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsClient>,
    /// Credential-less template; each search binds the caller's key onto a copy.
    pub summarizer: Arc<SummaryClient>,
    pub search: SearchConfig,
    pub config: FrontendPublicConfig,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let news = NewsClient::new(config.news.clone(), &config.http_client)?;
        let summarizer = SummaryClient::new(config.summarizer.clone(), &config.http_client)?;

        Ok(Self {
            news: Arc::new(news),
            summarizer: Arc::new(summarizer),
            search: config.search.clone(),
            config: config.frontend_public_config(),
            sessions: SessionRegistry::default(),
        })
    }
}

pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(config)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(assign_trace_id))
        .layer(middleware::from_fn(report_server_errors));

    Router::new()
        .route("/", get(api::dashboard::index))
        .route("/healthz", get(api::health::health_check))
        .route("/api/config", get(api::config::frontend_config))
        .route("/api/search", post(api::search::search))
        .route("/api/search/stream", post(api::search::search_stream))
        .layer(middleware)
        .with_state(state)
}
