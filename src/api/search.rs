use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

use crate::{
    app::AppState,
    error::AppResult,
    model::{SearchRequest, SearchResponse},
    service,
};

pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    let resp = service::search::search(&state, req).await?;
    Ok(Json(resp))
}

pub async fn search_stream(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = service::stream::start(&state, req).await;
    Sse::new(ReceiverStream::new(rx).map(Ok)).keep_alive(KeepAlive::default())
}
