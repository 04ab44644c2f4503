use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::{HttpClientConfig, NewsConfig},
    model::Article,
};

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("news api key missing")]
    MissingCredential,
    #[error("news api returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    Unreachable(String),
}

const UNREACHABLE: &str = "news service unreachable";
const UNREADABLE: &str = "news service sent an unreadable response";

/// What the dashboard asked for.
#[derive(Debug, Clone)]
pub struct NewsQuery {
    /// Country code, or `None` for a worldwide search.
    pub country: Option<String>,
    pub topic: String,
    pub page_size: u32,
}

pub struct NewsClient {
    http: Client,
    config: NewsConfig,
}

impl NewsClient {
    pub fn new(config: NewsConfig, http_client: &HttpClientConfig) -> anyhow::Result<Self> {
        let http = http_client
            .apply(Client::builder())
            .context("failed to apply http settings for news client")?
            .build()
            .context("failed to build news http client")?;

        Ok(Self::with_http(http, config))
    }

    pub fn with_http(http: Client, config: NewsConfig) -> Self {
        Self { http, config }
    }

    pub async fn fetch(&self, query: &NewsQuery, api_key: &str) -> Result<Vec<Article>, NewsError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(NewsError::MissingCredential);
        }

        let base = self.config.base_url.trim_end_matches('/');
        let topic = query.topic.trim();
        let page_size = query.page_size.to_string();

        let (url, params): (String, Vec<(&str, &str)>) = match query.country.as_deref() {
            None => {
                let q = if topic.is_empty() {
                    self.config.global_fallback_query.as_str()
                } else {
                    topic
                };
                (
                    format!("{base}/v2/everything"),
                    vec![
                        ("q", q),
                        ("language", self.config.language.as_str()),
                        ("sortBy", "publishedAt"),
                        ("pageSize", page_size.as_str()),
                    ],
                )
            }
            Some(country) => {
                let mut params = vec![("country", country), ("pageSize", page_size.as_str())];
                if !topic.is_empty() {
                    params.push(("q", topic));
                }
                (format!("{base}/v2/top-headlines"), params)
            }
        };

        debug!(url = %url, country = ?query.country, topic, "fetching headlines");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .query(&params)
            .send()
            .await
            .map_err(|err| {
                warn!(url = %url, error = %err, "news request failed");
                NewsError::Unreachable(UNREACHABLE.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!(status = status.as_u16(), error = %err, "failed to read news response");
            NewsError::Unreachable(UNREACHABLE.to_string())
        })?;

        let payload: NewsResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => NewsResponse::default(),
            Err(err) => {
                warn!(status = status.as_u16(), error = %err, "failed to parse news response");
                return Err(NewsError::Unreachable(UNREADABLE.to_string()));
            }
        };

        if !status.is_success() || payload.status.as_deref() == Some("error") {
            let message = payload
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(status = status.as_u16(), code = ?payload.code, "news api rejected request");
            return Err(NewsError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let articles = payload
            .articles
            .into_iter()
            .filter_map(RawArticle::into_article)
            .collect::<Vec<_>>();

        debug!(count = articles.len(), total = ?payload.total_results, "headlines fetched");
        Ok(articles)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsResponse {
    status: Option<String>,
    code: Option<String>,
    message: Option<String>,
    total_results: Option<u64>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    source: RawSource,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    name: Option<String>,
}

impl RawArticle {
    fn into_article(self) -> Option<Article> {
        let title = self.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        let raw_description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .or(self.content.filter(|c| !c.trim().is_empty()));
        let published_at = self
            .published_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(Article {
            title,
            raw_description,
            url: self.url.unwrap_or_default(),
            source_name: self.source.name.unwrap_or_default(),
            published_at,
            image_url: self.url_to_image.filter(|u| !u.trim().is_empty()),
        })
    }
}
