//! Event link discovery.
//!
//! Finds event detail links on the listing page using an ordered list of
//! selector strategies. The first strategy that matches anything wins;
//! results from different strategies are never combined, since a loose
//! fallback would pick up navigation links on pages where a precise
//! strategy already matched.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{EventLink, LinkStrategy};
use crate::services::RateLimiter;
use crate::utils::http::Fetcher;
use crate::utils::resolve_url;

/// Finite, restartable sequence of distinct event links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    links: Vec<EventLink>,
    /// Index of the strategy that produced the links
    pub strategy: Option<usize>,
}

impl DiscoveredLinks {
    pub fn iter(&self) -> impl Iterator<Item = &EventLink> + '_ {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<'a> IntoIterator for &'a DiscoveredLinks {
    type Item = &'a EventLink;
    type IntoIter = std::slice::Iter<'a, EventLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

/// A compiled [`LinkStrategy`].
struct CompiledStrategy {
    selector: Selector,
    attr: String,
    url_pattern: Option<Regex>,
}

impl CompiledStrategy {
    /// Resolved links in document order, or `None` when nothing matched.
    fn try_extract(&self, document: &Html, base: &Url) -> Option<Vec<String>> {
        let links: Vec<String> = document
            .select(&self.selector)
            .filter_map(|el| el.value().attr(&self.attr))
            .map(str::trim)
            .filter(|href| is_followable(href))
            .filter_map(|href| resolve_url(base, href))
            .filter(|url| self.url_pattern.as_ref().is_none_or(|p| p.is_match(url)))
            .collect();
        (!links.is_empty()).then_some(links)
    }
}

fn is_followable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !(href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:"))
}

/// Service for discovering event links on a listing page.
pub struct LinkDiscoverer {
    strategies: Vec<CompiledStrategy>,
}

impl LinkDiscoverer {
    /// Compile the configured strategies, failing on any invalid selector
    /// or pattern.
    pub fn new(strategies: &[LinkStrategy]) -> Result<Self> {
        let strategies = strategies
            .iter()
            .map(|s| {
                let (selector, url_pattern) = s.compile()?;
                Ok(CompiledStrategy {
                    selector,
                    attr: s.attr.clone(),
                    url_pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { strategies })
    }

    /// Fetch the listing page and extract links from it.
    ///
    /// A listing page that cannot be fetched is a [`AppError::Discovery`].
    pub async fn discover(
        &self,
        fetcher: &dyn Fetcher,
        limiter: &RateLimiter,
        listing_url: &str,
    ) -> Result<DiscoveredLinks> {
        let base = Url::parse(listing_url)
            .map_err(|e| AppError::discovery(format!("invalid listing URL {listing_url}: {e}")))?;

        limiter.acquire().await;
        let body = fetcher
            .get(listing_url)
            .await
            .map_err(|e| AppError::discovery(format!("failed to fetch {listing_url}: {e}")))?;
        let html = String::from_utf8_lossy(&body);

        Ok(self.extract(&html, &base))
    }

    /// Extract distinct links from listing HTML.
    pub fn extract(&self, html: &str, base: &Url) -> DiscoveredLinks {
        let document = Html::parse_document(html);

        for (index, strategy) in self.strategies.iter().enumerate() {
            let Some(candidates) = strategy.try_extract(&document, base) else {
                log::debug!("Link strategy #{} matched nothing", index + 1);
                continue;
            };

            let mut seen = HashSet::new();
            let links: Vec<EventLink> = candidates
                .into_iter()
                .filter(|url| seen.insert(url.clone()))
                .map(EventLink::new)
                .collect();

            log::info!(
                "Found {} event links with strategy #{}",
                links.len(),
                index + 1
            );
            return DiscoveredLinks {
                links,
                strategy: Some(index),
            };
        }

        log::warn!("No link strategy matched on {}", base);
        DiscoveredLinks::default()
    }
}
