use axum::response::sse::Event;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    model::{ArticleCard, CardSummary, SearchRequest},
    service::search::{self, PreparedSearch, SummaryNotice},
    util::summarizer::{SummaryClient, UnavailableReason},
};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Serialize)]
struct ArticlesEvent<'a> {
    region: &'a str,
    region_label: &'a str,
    summarizing: bool,
    cards: &'a [ArticleCard],
}

#[derive(Serialize)]
struct MessageEvent<'a> {
    message: &'a str,
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|err| {
            warn!(event = name, error = %err, "failed to encode sse payload");
            Event::default().event("error").data("failed to encode event")
        })
}

/// Start a streaming search. The receiver yields an `articles` event (or a
/// single `error` event), then one `summary` event per card, then `done`.
///
/// Any summary worker still running for the same session is aborted first,
/// whatever the new search turns out to be.
pub async fn start(state: &AppState, req: SearchRequest) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let session_id = match req.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            state.sessions.cancel(id);
            id.to_string()
        }
        _ => Uuid::new_v4().to_string(),
    };

    let prepared = match search::prepare(state, req).await {
        Ok(prepared) => prepared,
        Err(err) => {
            let detail = err.detail();
            let _ = tx.send(json_event("error", &detail)).await;
            return rx;
        }
    };

    let PreparedSearch {
        region,
        cards,
        summarizer,
    } = prepared;

    let summarizer = summarizer.filter(|client| {
        if !client.is_configured() {
            let _ = tx.try_send(json_event(
                "notice",
                &MessageEvent {
                    message: UnavailableReason::NotConfigured.notice(),
                },
            ));
        }
        client.is_configured()
    });

    let articles = ArticlesEvent {
        region: &region.code,
        region_label: &region.label,
        summarizing: summarizer.is_some(),
        cards: &cards,
    };
    if tx.send(json_event("articles", &articles)).await.is_err() {
        return rx;
    }

    match summarizer {
        Some(client) => {
            state
                .sessions
                .start(&session_id, summarize_all(client, cards, tx));
            debug!(session_id = %session_id, active = state.sessions.active(), "summary worker started");
        }
        None => {
            let _ = tx.send(Event::default().event("done").data("{}")).await;
        }
    }

    rx
}

async fn summarize_all(client: SummaryClient, cards: Vec<ArticleCard>, tx: mpsc::Sender<Event>) {
    let mut notice = SummaryNotice::default();
    for (index, mut card) in cards.into_iter().enumerate() {
        if tx.is_closed() {
            debug!(index, "stream closed, stopping summaries");
            return;
        }

        let result = search::summarize_card(&client, &mut card).await;
        if let Some(message) = notice.observe(&result) {
            let _ = tx.send(json_event("notice", &MessageEvent { message })).await;
        }
        if tx
            .send(json_event("summary", &CardSummary { index, card }))
            .await
            .is_err()
        {
            return;
        }
    }
    let _ = tx.send(Event::default().event("done").data("{}")).await;
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, time::Duration};

    use axum::response::{sse::Sse, IntoResponse};
    use serde_json::{json, Value};
    use tokio_stream::{wrappers::ReceiverStream, StreamExt};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::service::search::tests::{mount_news, request, state_for};

    /// Render the stream the way the handler does and split it back into events.
    async fn collect(rx: mpsc::Receiver<Event>) -> Vec<(String, Value)> {
        let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
        let body = Sse::new(stream).into_response().into_body();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        text.split("\n\n")
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| {
                let mut name = String::new();
                let mut data = String::new();
                for line in chunk.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = value.trim().to_string();
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                (name, serde_json::from_str(&data).unwrap_or(Value::Null))
            })
            .collect()
    }

    fn names(events: &[(String, Value)]) -> Vec<&str> {
        events.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn summary_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Summary." } }]
        }))
    }

    #[tokio::test]
    async fn streams_articles_then_summaries() {
        let news = MockServer::start().await;
        let llm = MockServer::start().await;
        mount_news(&news).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(summary_ok())
            .expect(2)
            .mount(&llm)
            .await;

        let state = state_for(&news, &llm);
        let mut req = request(true, Some("sk"));
        req.session_id = Some("tab".to_string());
        let events = collect(start(&state, req).await).await;

        assert_eq!(names(&events), ["articles", "summary", "summary", "done"]);

        let (_, articles) = &events[0];
        assert_eq!(articles["summarizing"], true);
        assert_eq!(articles["cards"].as_array().map(Vec::len), Some(2));
        assert_eq!(articles["cards"][0]["text_kind"], "original");

        for (position, (_, payload)) in events[1..3].iter().enumerate() {
            assert_eq!(payload["index"], position);
            assert_eq!(payload["card"]["text"], "Summary.");
            assert_eq!(payload["card"]["text_kind"], "summary");
        }
        assert_eq!(state.sessions.active(), 0);
    }

    #[tokio::test]
    async fn errors_become_a_single_event() {
        let news = MockServer::start().await;
        let llm = MockServer::start().await;
        let state = state_for(&news, &llm);
        let mut req = request(false, None);
        req.news_api_key = String::new();

        let events = collect(start(&state, req).await).await;

        assert_eq!(names(&events), ["error"]);
        assert_eq!(events[0].1["code"], "Configuration");
    }

    #[tokio::test]
    async fn without_summaries_stream_finishes_immediately() {
        let news = MockServer::start().await;
        let llm = MockServer::start().await;
        mount_news(&news).await;
        let state = state_for(&news, &llm);

        let events = collect(start(&state, request(true, None)).await).await;

        assert_eq!(names(&events), ["notice", "articles", "done"]);
        assert_eq!(events[1].1["summarizing"], false);
        assert!(llm.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn plain_search_cancels_pending_summaries_of_the_session() {
        let news = MockServer::start().await;
        let llm = MockServer::start().await;
        mount_news(&news).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(summary_ok().set_delay(Duration::from_secs(2)))
            .mount(&llm)
            .await;

        let state = state_for(&news, &llm);
        let mut first = request(true, Some("sk"));
        first.session_id = Some("tab".to_string());
        let first_rx = start(&state, first).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.sessions.active(), 1);

        let mut second = request(false, None);
        second.session_id = Some("tab".to_string());
        let second_events = collect(start(&state, second).await).await;
        assert_eq!(names(&second_events), ["articles", "done"]);
        assert_eq!(state.sessions.active(), 0);

        // The aborted worker drops its sender before any summary arrives.
        let first_events = tokio::time::timeout(Duration::from_secs(1), collect(first_rx))
            .await
            .unwrap();
        assert_eq!(names(&first_events), ["articles"]);
        assert!(llm.received_requests().await.unwrap_or_default().len() <= 1);
    }

    #[tokio::test]
    async fn failed_search_still_cancels_the_session_worker() {
        let news = MockServer::start().await;
        let llm = MockServer::start().await;
        mount_news(&news).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(summary_ok().set_delay(Duration::from_secs(2)))
            .mount(&llm)
            .await;

        let state = state_for(&news, &llm);
        let mut first = request(true, Some("sk"));
        first.session_id = Some("tab".to_string());
        let _first_rx = start(&state, first).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut second = request(false, None);
        second.session_id = Some("tab".to_string());
        second.region = "atlantis".to_string();
        let events = collect(start(&state, second).await).await;

        assert_eq!(names(&events), ["error"]);
        assert_eq!(state.sessions.active(), 0);
    }
}
