use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::summarizer::{SummaryResult, UnavailableReason};

/// Headline as returned by the news provider.
#[derive(Debug, Clone)]
pub struct Article {
    pub title: String,
    pub raw_description: Option<String>,
    pub url: String,
    pub source_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Summary,
    Original,
}

/// One row of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleCard {
    pub title: String,
    pub url: String,
    pub text: String,
    pub text_kind: TextKind,
    pub source: String,
    pub published: String,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_unavailable: Option<UnavailableReason>,
}

impl ArticleCard {
    pub fn from_article(article: Article, cleaned: String) -> Self {
        Self {
            title: article.title,
            url: article.url,
            text: cleaned,
            text_kind: TextKind::Original,
            source: article.source_name,
            published: article
                .published_at
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            image_url: article.image_url,
            summary_unavailable: None,
        }
    }

    /// Swap in the summary, or keep the cleaned text and remember why.
    pub fn apply_summary(&mut self, result: SummaryResult) {
        match result {
            SummaryResult::Summary(text) => {
                self.text = text;
                self.text_kind = TextKind::Summary;
                self.summary_unavailable = None;
            }
            SummaryResult::Unavailable(reason) => {
                self.text_kind = TextKind::Original;
                self.summary_unavailable = Some(reason);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub news_api_key: String,
    #[serde(default)]
    pub summary_api_key: Option<String>,
    #[serde(default)]
    pub summarize: bool,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_region() -> String {
    crate::config::GLOBAL_REGION.to_string()
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub region: String,
    pub region_label: String,
    pub cards: Vec<ArticleCard>,
    pub summary_notice: Option<String>,
}

/// Summary outcome for one card, pushed to streaming clients.
#[derive(Debug, Serialize)]
pub struct CardSummary {
    pub index: usize,
    pub card: ArticleCard,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn article() -> Article {
        Article {
            title: "Rates hold".to_string(),
            raw_description: Some("<b>desc</b>".to_string()),
            url: "https://news.test/a".to_string(),
            source_name: "Wire".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()),
            image_url: None,
        }
    }

    #[test]
    fn card_formats_publish_date() {
        let card = ArticleCard::from_article(article(), "desc".to_string());
        assert_eq!(card.published, "2026-10-18");
        assert_eq!(card.text_kind, TextKind::Original);

        let undated = ArticleCard::from_article(
            Article {
                published_at: None,
                ..article()
            },
            String::new(),
        );
        assert_eq!(undated.published, "");
    }

    #[test]
    fn unavailable_summary_keeps_cleaned_text() {
        let mut card = ArticleCard::from_article(article(), "desc".to_string());
        card.apply_summary(SummaryResult::Unavailable(UnavailableReason::QuotaExceeded));
        assert_eq!(card.text, "desc");
        assert_eq!(card.summary_unavailable, Some(UnavailableReason::QuotaExceeded));

        card.apply_summary(SummaryResult::Summary("Short.".to_string()));
        assert_eq!(card.text, "Short.");
        assert_eq!(card.text_kind, TextKind::Summary);
        assert!(card.summary_unavailable.is_none());
    }

    #[test]
    fn search_request_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"news_api_key":"k"}"#).unwrap();
        assert_eq!(req.region, "global");
        assert!(req.topic.is_empty());
        assert!(!req.summarize);
        assert!(req.page_size.is_none());
    }
}
