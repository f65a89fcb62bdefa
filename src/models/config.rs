//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where event links are discovered
    #[serde(default)]
    pub source: SourceConfig,

    /// Merged calendar artifact settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Freshness cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP and scheduling behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Link discovery strategies
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Calendar and description acquisition rules
    #[serde(default)]
    pub acquire: AcquireConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.listing_url)
            .map_err(|e| AppError::validation(format!("source.listing_url: {e}")))?;

        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.run_timeout_secs == 0 {
            return Err(AppError::validation("crawler.run_timeout_secs must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        if self.cache.checked_ttl().is_none() {
            return Err(AppError::validation(format!(
                "cache.ttl_secs is out of range: {}",
                self.cache.ttl_secs
            )));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(AppError::validation("output.path is empty"));
        }
        if self.discovery.strategies.is_empty() {
            return Err(AppError::validation("No discovery strategies defined"));
        }
        for strategy in &self.discovery.strategies {
            strategy.compile()?;
        }
        if self.acquire.calendar_variants.is_empty() {
            return Err(AppError::validation("No calendar URL variants defined"));
        }
        for selector in &self.acquire.description_selectors {
            parse_selector(selector)?;
        }
        if self.acquire.max_description_length == 0 {
            return Err(AppError::validation(
                "acquire.max_description_length must be > 0",
            ));
        }
        Ok(())
    }
}

/// Parse a CSS selector, mapping the error into `AppError::Selector`.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Listing page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page enumerating the events
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
        }
    }
}

/// Merged calendar output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Published `.ics` artifact
    #[serde(default = "defaults::output_path")]
    pub path: PathBuf,

    /// X-WR-CALNAME
    #[serde(default = "defaults::calendar_name")]
    pub calendar_name: String,

    /// X-WR-CALDESC
    #[serde(default = "defaults::calendar_description")]
    pub calendar_description: String,

    /// PRODID
    #[serde(default = "defaults::prod_id")]
    pub prod_id: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: defaults::output_path(),
            calendar_name: defaults::calendar_name(),
            calendar_description: defaults::calendar_description(),
            prod_id: defaults::prod_id(),
        }
    }
}

/// Freshness cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON store location
    #[serde(default = "defaults::cache_path")]
    pub path: PathBuf,

    /// Records checked more recently than this are not re-fetched
    #[serde(default = "defaults::ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Saturates at the largest representable duration.
    pub fn ttl(&self) -> chrono::Duration {
        self.checked_ttl().unwrap_or(chrono::Duration::MAX)
    }

    fn checked_ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: defaults::cache_path(),
            ttl_secs: defaults::ttl_secs(),
        }
    }
}

/// HTTP client and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between any two requests, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent workers
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Whole-run deadline
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,

    /// How long in-flight work may finish after cancellation
    #[serde(default = "defaults::grace_period")]
    pub grace_period_secs: u64,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            run_timeout_secs: defaults::run_timeout(),
            grace_period_secs: defaults::grace_period(),
        }
    }
}

/// Link discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Tried in order; the first strategy with any match wins
    #[serde(default = "defaults::strategies")]
    pub strategies: Vec<LinkStrategy>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategies: defaults::strategies(),
        }
    }
}

/// One way of finding event links on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStrategy {
    /// CSS selector for link elements
    pub selector: String,

    /// Attribute holding the URL
    #[serde(default = "defaults::link_attr")]
    pub attr: String,

    /// Regex the resolved URL must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
}

impl LinkStrategy {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: defaults::link_attr(),
            url_pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = Some(pattern.into());
        self
    }

    /// Parse the selector and pattern once for repeated use.
    pub fn compile(&self) -> Result<(Selector, Option<Regex>)> {
        let selector = parse_selector(&self.selector)?;
        let pattern = self
            .url_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AppError::validation(format!("url_pattern: {e}")))?;
        Ok((selector, pattern))
    }
}

/// Calendar and description acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// Calendar URL transforms, tried in order
    #[serde(default = "defaults::calendar_variants")]
    pub calendar_variants: Vec<CalendarUrlVariant>,

    /// Description content selectors, tried in order
    #[serde(default = "defaults::description_selectors")]
    pub description_selectors: Vec<String>,

    /// Description length cap in characters
    #[serde(default = "defaults::max_description_length")]
    pub max_description_length: usize,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            calendar_variants: defaults::calendar_variants(),
            description_selectors: defaults::description_selectors(),
            max_description_length: defaults::max_description_length(),
        }
    }
}

/// A transform from an event page URL to a candidate calendar file URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarUrlVariant {
    /// `{url}?{query}`, or `&{query}` when the URL already has a query
    AppendQuery {
        query: String,
        #[serde(default)]
        trim_trailing_slash: bool,
    },
    /// `{url}{extension}` with any trailing slash removed first
    AppendExtension { extension: String },
    /// Adds a trailing slash if missing, removes it if present
    ToggleTrailingSlash,
}

impl CalendarUrlVariant {
    /// Apply this variant to an event URL.
    ///
    /// Works on the parsed URL, so an existing query or fragment stays in
    /// place. Input that is not an absolute URL is returned unchanged.
    pub fn apply(&self, event_url: &str) -> String {
        let Ok(mut url) = url::Url::parse(event_url) else {
            log::debug!("Not an absolute URL, leaving as is: {}", event_url);
            return event_url.to_string();
        };

        match self {
            Self::AppendQuery {
                query,
                trim_trailing_slash,
            } => {
                if *trim_trailing_slash {
                    let path = url.path().trim_end_matches('/').to_string();
                    url.set_path(&path);
                }
                let merged = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                    _ => query.clone(),
                };
                url.set_query(Some(&merged));
            }
            Self::AppendExtension { extension } => {
                let path = format!("{}{}", url.path().trim_end_matches('/'), extension);
                url.set_path(&path);
            }
            Self::ToggleTrailingSlash => {
                let path = match url.path().strip_suffix('/') {
                    Some(trimmed) => trimmed.to_string(),
                    None => format!("{}/", url.path()),
                };
                url.set_path(&path);
            }
        }
        url.to_string()
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{CalendarUrlVariant, LinkStrategy};

    // Source defaults
    pub fn listing_url() -> String {
        "https://www.noblesvillemainstreet.org/events".into()
    }

    // Output defaults
    pub fn output_path() -> PathBuf {
        PathBuf::from("public/merged_calendar.ics")
    }
    pub fn calendar_name() -> String {
        "Noblesville Main Street Events".into()
    }
    pub fn calendar_description() -> String {
        "Aggregated events from Noblesville Main Street website".into()
    }
    pub fn prod_id() -> String {
        "-//Calendar Aggregator//Noblesville Events//EN".into()
    }

    // Cache defaults
    pub fn cache_path() -> PathBuf {
        PathBuf::from("data/calendar_cache.json")
    }
    pub fn ttl_secs() -> u64 {
        6 * 60 * 60
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; CalendarAggregator/1.0)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn run_timeout() -> u64 {
        600
    }
    pub fn grace_period() -> u64 {
        10
    }

    // Discovery defaults
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn strategies() -> Vec<LinkStrategy> {
        vec![
            LinkStrategy::new(
                r#".eventlist-event--upcoming a.eventlist-title-link[href*="/events/"]"#,
            ),
            LinkStrategy::new(".eventlist-event a.eventlist-title-link"),
            LinkStrategy::new(r#"article a[href*="event"]"#).with_pattern("(?i)event"),
        ]
    }

    // Acquisition defaults
    pub fn calendar_variants() -> Vec<CalendarUrlVariant> {
        vec![
            CalendarUrlVariant::AppendQuery {
                query: "format=ical".into(),
                trim_trailing_slash: false,
            },
            CalendarUrlVariant::AppendQuery {
                query: "format=ical".into(),
                trim_trailing_slash: true,
            },
        ]
    }
    pub fn description_selectors() -> Vec<String> {
        vec![
            ".eventitem-column-content".into(),
            ".sqs-block-content".into(),
            "article .entry-content".into(),
        ]
    }
    pub fn max_description_length() -> usize {
        2000
    }
}
