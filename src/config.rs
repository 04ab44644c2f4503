use anyhow::{anyhow, Context};
use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub base_url: String,
    pub language: String,
    pub global_fallback_query: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org".to_string(),
            language: "en".to_string(),
            global_fallback_query: "trending".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub total_timeout_secs: u64,
    pub max_input_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 160,
            max_retries: 3,
            backoff_base_ms: 1000,
            total_timeout_secs: 15,
            max_input_chars: 4000,
        }
    }
}

impl SummarizerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms.max(1))
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub code: String,
    pub label: String,
}

impl RegionConfig {
    fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.code == GLOBAL_REGION
    }
}

pub const GLOBAL_REGION: &str = "global";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub regions: Vec<RegionConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 20,
            regions: vec![
                RegionConfig::new(GLOBAL_REGION, "Global"),
                RegionConfig::new("us", "United States"),
                RegionConfig::new("gb", "United Kingdom"),
                RegionConfig::new("kr", "South Korea"),
                RegionConfig::new("jp", "Japan"),
                RegionConfig::new("fr", "France"),
                RegionConfig::new("de", "Germany"),
                RegionConfig::new("in", "India"),
                RegionConfig::new("au", "Australia"),
                RegionConfig::new("ca", "Canada"),
                RegionConfig::new("br", "Brazil"),
            ],
        }
    }
}

impl SearchConfig {
    pub fn region(&self, code: &str) -> Option<&RegionConfig> {
        let code = code.trim();
        self.regions
            .iter()
            .find(|region| region.code.eq_ignore_ascii_case(code))
    }

    /// Clamp a requested page size into `1..=max_page_size`, falling back to the default.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        let max = self.max_page_size.max(1);
        requested
            .filter(|size| *size > 0)
            .unwrap_or(self.default_page_size)
            .clamp(1, max)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "TrendNews/0.1".to_string(),
            proxy: None,
            request_timeout_secs: 10,
        }
    }
}

impl HttpClientConfig {
    pub fn apply(&self, builder: ClientBuilder) -> anyhow::Result<ClientBuilder> {
        let mut builder = builder
            .user_agent(self.user_agent.clone())
            .timeout(Duration::from_secs(self.request_timeout_secs.max(1)));
        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy.trim())
                .with_context(|| format!("invalid proxy url {proxy}"))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log rotation {0:?}, expected daily, hourly or never")]
pub struct UnknownRotation(String);

impl std::str::FromStr for LogRotation {
    type Err = UnknownRotation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            _ => Err(UnknownRotation(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file path. Empty keeps logging on stdout only.
    pub file: String,
    pub level: Option<String>,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "logs/trendnews.log".to_string(),
            level: Some("info".to_string()),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub news: NewsConfig,
    pub summarizer: SummarizerConfig,
    pub search: SearchConfig,
    pub http_client: HttpClientConfig,
    pub logging: LoggingConfig,
}

/// Subset of the configuration the dashboard page needs.
#[derive(Debug, Clone, Serialize)]
pub struct FrontendPublicConfig {
    pub regions: Vec<RegionConfig>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub summary_model: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let explicit_path = std::env::var("CONFIG_FILE").ok();
        let config = if let Some(path) = explicit_path {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("config file {:?} not found", path));
            }
            Self::load_from_file(&path)?
        } else {
            let path = locate_default_config();
            if let Some(path) = path {
                Self::load_from_file(&path)?
            } else {
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(config)
    }

    pub fn frontend_public_config(&self) -> FrontendPublicConfig {
        FrontendPublicConfig {
            regions: self.search.regions.clone(),
            default_page_size: self.search.page_size(None),
            max_page_size: self.search.max_page_size.max(1),
            summary_model: self.summarizer.model.clone(),
        }
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::parse_yaml(&contents).with_context(|| format!("failed to parse config file {:?}", path))
    }

    fn parse_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    fn apply_env_overrides(mut config: AppConfig) -> anyhow::Result<AppConfig> {
        if let Ok(bind) = std::env::var("SERVER_BIND") {
            config.server.bind = bind;
        }

        if let Ok(url) = std::env::var("NEWS_BASE_URL") {
            config.news.base_url = url;
        }

        if let Ok(language) = std::env::var("NEWS_LANGUAGE") {
            config.news.language = language;
        }

        if let Ok(url) = std::env::var("SUMMARY_BASE_URL") {
            config.summarizer.base_url = url;
        }

        if let Ok(model) = std::env::var("SUMMARY_MODEL") {
            config.summarizer.model = model;
        }

        if let Some(retries) = parse_optional_env("SUMMARY_MAX_RETRIES")? {
            config.summarizer.max_retries = retries;
        }

        if let Some(backoff) = parse_optional_env("SUMMARY_BACKOFF_MS")? {
            config.summarizer.backoff_base_ms = backoff;
        }

        if let Some(timeout) = parse_optional_env("SUMMARY_TOTAL_TIMEOUT_SECS")? {
            config.summarizer.total_timeout_secs = timeout;
        }

        if let Some(page_size) = parse_optional_env("SEARCH_PAGE_SIZE")? {
            config.search.default_page_size = page_size;
        }

        if let Ok(proxy) = std::env::var("HTTP_PROXY_URL") {
            config.http_client.proxy = Some(proxy);
        }

        if let Ok(log_file) = std::env::var("LOG_FILE_PATH") {
            config.logging.file = log_file;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.logging.level = Some(log_level);
        }

        if let Some(rotation) = parse_optional_env("LOG_ROTATION")? {
            config.logging.rotation = rotation;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.search.regions.is_empty() {
            return Err(anyhow!("search.regions must list at least one region"));
        }
        for base in [&self.news.base_url, &self.summarizer.base_url] {
            url::Url::parse(base).with_context(|| format!("invalid base url {base}"))?;
        }
        Ok(())
    }
}

fn parse_optional_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => Ok(Some(
            v.parse::<T>()
                .with_context(|| format!("{key} must be a valid value"))?,
        )),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn locate_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("../config/config.yaml"),
    ];

    candidates.into_iter().find(|path| path.exists())
}
