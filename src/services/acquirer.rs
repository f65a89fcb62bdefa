// src/services/acquirer.rs

//! Per-event acquisition.
//!
//! Fetches one event's calendar file by walking the configured URL
//! variants, then scrapes the event page for a description.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AcquisitionFailure, FetchError, Result};
use crate::ics;
use crate::models::{AcquireConfig, CalendarUrlVariant, Event, EventLink, RawCalendarBlob};
use crate::services::{DescriptionExtractor, RateLimiter};
use crate::utils::cancel::Cancellation;
use crate::utils::http::Fetcher;

/// A freshly acquired event with what the cache needs to remember it.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub event: Event,
    pub blob: RawCalendarBlob,
    pub fingerprint: String,
}

/// Service that turns an [`EventLink`] into an [`Event`].
pub struct EventAcquirer {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    cancel: Cancellation,
    variants: Vec<CalendarUrlVariant>,
    descriptions: DescriptionExtractor,
}

impl EventAcquirer {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<RateLimiter>,
        cancel: Cancellation,
        config: &AcquireConfig,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            limiter,
            cancel,
            variants: config.calendar_variants.clone(),
            descriptions: DescriptionExtractor::new(
                &config.description_selectors,
                config.max_description_length,
            )?,
        })
    }

    /// Acquire the calendar object and description for one link.
    ///
    /// `previous_description` is used when the event page itself cannot be
    /// fetched.
    pub async fn acquire(
        &self,
        link: &EventLink,
        previous_description: Option<&str>,
    ) -> std::result::Result<Acquired, AcquisitionFailure> {
        let (blob, mut event) = self.fetch_calendar(link).await?;
        event.description = self
            .fetch_description(link)
            .await
            .unwrap_or_else(|| previous_description.unwrap_or_default().to_string());

        let fingerprint = ics::fingerprint(&blob.body);
        Ok(Acquired {
            event,
            blob,
            fingerprint,
        })
    }

    /// Candidate calendar URLs in configured order, without repeats.
    pub fn calendar_urls(&self, link: &EventLink) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            let url = variant.apply(link.as_str());
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }

    /// Try each variant until one yields a parseable calendar.
    pub async fn fetch_calendar(
        &self,
        link: &EventLink,
    ) -> std::result::Result<(RawCalendarBlob, Event), AcquisitionFailure> {
        let mut attempts = Vec::new();

        for url in self.calendar_urls(link) {
            log::debug!("  Trying: {}", url);
            let body = match self.polite_get(&url).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(FetchError::Cancelled) => return Err(AcquisitionFailure::Cancelled),
                Err(e) => {
                    attempts.push((url, e.to_string()));
                    continue;
                }
            };

            match ics::parse_event(&body, link.as_str(), Utc::now()) {
                Some(event) => {
                    log::debug!("  Downloaded ICS from {}", url);
                    return Ok((
                        RawCalendarBlob {
                            variant_url: url,
                            body,
                        },
                        event,
                    ));
                }
                None => attempts.push((url, "not a single-event calendar".to_string())),
            }
        }

        Err(AcquisitionFailure::Exhausted { attempts })
    }

    /// Scrape the event page. `None` when the page could not be fetched.
    pub async fn fetch_description(&self, link: &EventLink) -> Option<String> {
        match self.polite_get(link.as_str()).await {
            Ok(bytes) => Some(self.descriptions.extract(&String::from_utf8_lossy(&bytes))),
            Err(e) => {
                log::debug!("  Description fetch failed for {}: {}", link, e);
                None
            }
        }
    }

    /// One rate-limited GET, refused once the run is cancelled.
    async fn polite_get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.limiter.acquire().await;
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.fetcher.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::utils::http::mock::MockFetcher;

    const ICS: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:fair@example.com\r\nDTSTART:20250704T220000Z\r\nSUMMARY:Summer Fair\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
    const EVENT: &str = "https://example.com/events/fair";

    fn config() -> AcquireConfig {
        AcquireConfig {
            calendar_variants: vec![
                CalendarUrlVariant::AppendQuery {
                    query: "format=ical".into(),
                    trim_trailing_slash: false,
                },
                CalendarUrlVariant::AppendExtension {
                    extension: ".ics".into(),
                },
                CalendarUrlVariant::AppendQuery {
                    query: "format=ics".into(),
                    trim_trailing_slash: false,
                },
            ],
            description_selectors: vec![".eventitem-column-content".into()],
            max_description_length: 500,
        }
    }

    fn acquirer(fetcher: Arc<MockFetcher>, cancel: Cancellation) -> EventAcquirer {
        EventAcquirer::new(
            fetcher,
            Arc::new(RateLimiter::new(Duration::ZERO)),
            cancel,
            &config(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn second_variant_used_when_first_is_missing() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .status("https://example.com/events/fair?format=ical", 404)
                .ok("https://example.com/events/fair.ics", ICS)
                .ok("https://example.com/events/fair?format=ics", "BEGIN:VCALENDAR\r\nEND:VCALENDAR")
                .ok(
                    EVENT,
                    r#"<div class="eventitem-column-content">Rides and food</div>"#,
                ),
        );
        let acquired = acquirer(Arc::clone(&fetcher), Cancellation::new())
            .acquire(&EventLink::new(EVENT), None)
            .await
            .unwrap();

        assert_eq!(acquired.blob.variant_url, "https://example.com/events/fair.ics");
        assert_eq!(acquired.event.uid, "fair@example.com");
        assert_eq!(acquired.event.description, "Rides and food");
        assert_eq!(acquired.fingerprint, ics::fingerprint(ICS));
        // Stops at the first success
        assert_eq!(fetcher.calls_to("https://example.com/events/fair?format=ics"), 0);
        assert_eq!(
            fetcher.calls(),
            vec![
                "https://example.com/events/fair?format=ical".to_string(),
                "https://example.com/events/fair.ics".to_string(),
                EVENT.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn html_response_is_not_a_calendar() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .ok("https://example.com/events/fair?format=ical", "<html>event page</html>")
                .status("https://example.com/events/fair.ics", 500)
                .status("https://example.com/events/fair?format=ics", 404),
        );
        let err = acquirer(Arc::clone(&fetcher), Cancellation::new())
            .acquire(&EventLink::new(EVENT), None)
            .await
            .unwrap_err();

        let AcquisitionFailure::Exhausted { attempts } = err else {
            panic!("expected exhausted failure");
        };
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].1, "not a single-event calendar");
        assert_eq!(attempts[1].1, "HTTP status 500");
        // No description fetch after a calendar failure
        assert_eq!(fetcher.calls_to(EVENT), 0);
    }

    #[tokio::test]
    async fn description_falls_back_to_previous_when_page_fails() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .ok("https://example.com/events/fair?format=ical", ICS)
                .status(EVENT, 502),
        );
        let acquired = acquirer(fetcher, Cancellation::new())
            .acquire(&EventLink::new(EVENT), Some("Cached words"))
            .await
            .unwrap();
        assert_eq!(acquired.event.description, "Cached words");
    }

    #[test]
    fn duplicate_variant_urls_are_tried_once() {
        let fetcher = Arc::new(MockFetcher::new());
        let mut acquirer = acquirer(fetcher, Cancellation::new());
        acquirer.variants = vec![
            CalendarUrlVariant::AppendQuery {
                query: "format=ical".into(),
                trim_trailing_slash: false,
            },
            CalendarUrlVariant::AppendQuery {
                query: "format=ical".into(),
                trim_trailing_slash: true,
            },
        ];
        assert_eq!(
            acquirer.calendar_urls(&EventLink::new(EVENT)),
            vec!["https://example.com/events/fair?format=ical".to_string()]
        );
        assert_eq!(acquirer.calendar_urls(&EventLink::new(format!("{EVENT}/"))).len(), 2);
    }

    #[tokio::test]
    async fn cancelled_run_issues_no_requests() {
        let fetcher = Arc::new(MockFetcher::new().ok("https://example.com/events/fair?format=ical", ICS));
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = acquirer(Arc::clone(&fetcher), cancel)
            .acquire(&EventLink::new(EVENT), None)
            .await
            .unwrap_err();
        assert_eq!(err, AcquisitionFailure::Cancelled);
        assert!(fetcher.calls().is_empty());
    }
}
