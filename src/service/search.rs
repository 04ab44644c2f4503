use tracing::{debug, info};

use crate::{
    app::AppState,
    config::RegionConfig,
    error::{AppError, AppResult},
    model::{ArticleCard, SearchRequest, SearchResponse},
    util::{
        html::{sanitize, truncate_chars},
        newsapi::NewsQuery,
        summarizer::{SummaryClient, SummaryResult, UnavailableReason},
    },
};

/// Headlines fetched and cleaned, ready for optional summarization.
pub struct PreparedSearch {
    pub region: RegionConfig,
    pub cards: Vec<ArticleCard>,
    pub summarizer: Option<SummaryClient>,
}

/// Collects the first degradation message so the page shows it once.
#[derive(Debug, Default)]
pub struct SummaryNotice(Option<String>);

impl SummaryNotice {
    pub fn observe(&mut self, result: &SummaryResult) -> Option<&str> {
        match result {
            SummaryResult::Unavailable(reason) if reason.is_failure() && self.0.is_none() => {
                self.0 = Some(reason.notice().to_string());
                self.0.as_deref()
            }
            _ => None,
        }
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

pub async fn prepare(state: &AppState, req: SearchRequest) -> AppResult<PreparedSearch> {
    let region = state
        .search
        .region(&req.region)
        .cloned()
        .ok_or_else(|| AppError::BadRequest(format!("unknown region {}", req.region.trim())))?;
    let page_size = state.search.page_size(req.page_size);

    let query = NewsQuery {
        country: (!region.is_global()).then(|| region.code.clone()),
        topic: req.topic.trim().to_string(),
        page_size,
    };

    let mut articles = state.news.fetch(&query, &req.news_api_key).await?;
    articles.truncate(page_size as usize);

    info!(
        region = %region.code,
        topic = %query.topic,
        count = articles.len(),
        summarize = req.summarize,
        "search fetched headlines"
    );

    let cards = articles
        .into_iter()
        .map(|article| {
            let cleaned = sanitize(article.raw_description.as_deref());
            ArticleCard::from_article(article, cleaned)
        })
        .collect();

    let summarizer = req
        .summarize
        .then(|| state.summarizer.with_api_key(req.summary_api_key.as_deref()));

    Ok(PreparedSearch {
        region,
        cards,
        summarizer,
    })
}

/// Summarize one card in place; the cleaned text stays when no summary comes back.
pub async fn summarize_card(client: &SummaryClient, card: &mut ArticleCard) -> SummaryResult {
    let input = truncate_chars(&card.text, client.config().max_input_chars);
    let result = client.summarize(&input).await;
    debug!(title = %card.title, outcome = ?result, "summary outcome");
    card.apply_summary(result.clone());
    result
}

pub async fn search(state: &AppState, req: SearchRequest) -> AppResult<SearchResponse> {
    let PreparedSearch {
        region,
        mut cards,
        summarizer,
    } = prepare(state, req).await?;

    let mut notice = SummaryNotice::default();
    if let Some(client) = summarizer {
        if !client.is_configured() {
            notice.0 = Some(UnavailableReason::NotConfigured.notice().to_string());
        } else {
            for card in cards.iter_mut() {
                let result = summarize_card(&client, card).await;
                notice.observe(&result);
            }
        }
    }

    Ok(SearchResponse {
        region: region.code,
        region_label: region.label,
        cards,
        summary_notice: notice.into_inner(),
    })
}
