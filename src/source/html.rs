//! Page source over a paginated HTML archive listing.
//!
//! Rows come in pairs: the first `.table-cell-item` carries the date
//! (`.weight-semibold`), the next one carries the archive link.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{DownloadDescriptor, PageSource, PageSourceError};
use crate::download::{HttpClient, target_name_for};

const ROW_SELECTOR: &str = ".table-cell-item";
const DATE_SELECTOR: &str = ".weight-semibold";
const ANY_ARCHIVE_LINK_SELECTOR: &str = "a[href*=\"/_api/archive/\"]";
const NEXT_PAGE_SELECTOR: &str = "a[data-test=\"pagination-next\"]";

/// Descriptors and pagination link extracted from one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Descriptors in row order.
    pub descriptors: Vec<DownloadDescriptor>,
    /// Absolute URL of the next page, when an enabled next link exists.
    pub next_href: Option<String>,
}

/// Extracts descriptors and the next-page link from listing markup.
///
/// Links are resolved against `page_url`. Row pairs missing either the date or
/// the archive link are skipped.
#[must_use]
pub fn parse_listing(html: &str, page_url: &Url, mirrors: &[String], prefix: &str) -> ParsedPage {
    let doc = Html::parse_document(html);

    let Ok(row_selector) = Selector::parse(ROW_SELECTOR) else {
        return ParsedPage::default();
    };
    let Ok(date_selector) = Selector::parse(DATE_SELECTOR) else {
        return ParsedPage::default();
    };
    let mirror_selectors: Vec<Selector> = mirrors
        .iter()
        .filter_map(|mirror| {
            Selector::parse(&format!("a[href^=\"https://{mirror}/_api/archive/\"]")).ok()
        })
        .collect();
    let fallback_selector = Selector::parse(ANY_ARCHIVE_LINK_SELECTOR).ok();

    let rows: Vec<ElementRef<'_>> = doc.select(&row_selector).collect();
    let mut descriptors = Vec::new();
    for pair in rows.chunks(2) {
        let [date_row, link_row] = pair else {
            continue;
        };

        let Some(date_text) = date_row
            .select(&date_selector)
            .next()
            .map(|el| el.text().collect::<String>())
        else {
            continue;
        };

        let href = mirror_selectors
            .iter()
            .chain(fallback_selector.iter())
            .find_map(|selector| link_row.select(selector).next())
            .and_then(|el| el.value().attr("href"));
        let Some(href) = href else {
            continue;
        };

        match page_url.join(href.trim()) {
            Ok(locator) => descriptors.push(DownloadDescriptor::new(
                locator,
                target_name_for(prefix, &date_text),
            )),
            Err(e) => debug!(href, error = %e, "skipping row with unresolvable link"),
        }
    }

    ParsedPage {
        descriptors,
        next_href: next_page_href(&doc, page_url),
    }
}

fn next_page_href(doc: &Html, page_url: &Url) -> Option<String> {
    let selector = Selector::parse(NEXT_PAGE_SELECTOR).ok()?;
    let link = doc.select(&selector).next()?;
    let attrs = link.value();
    if attrs.attr("disabled").is_some() || attrs.attr("aria-disabled") == Some("true") {
        return None;
    }
    let href = attrs.attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    page_url.join(href).ok().map(String::from)
}

/// [`PageSource`] that walks a live listing over HTTP.
///
/// Each page is fetched once, on first use, and cached until the source
/// advances.
#[derive(Debug, Clone)]
pub struct HtmlListingSource {
    client: HttpClient,
    start_url: Url,
    page_url: Url,
    mirrors: Vec<String>,
    prefix: String,
    loaded: Option<ParsedPage>,
}

impl HtmlListingSource {
    /// Creates a source starting at `listing_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PageSourceError::InvalidUrl`] when `listing_url` does not parse.
    pub fn new(
        client: HttpClient,
        listing_url: &str,
        mirrors: Vec<String>,
        prefix: impl Into<String>,
    ) -> Result<Self, PageSourceError> {
        let page_url =
            Url::parse(listing_url).map_err(|e| PageSourceError::invalid_url(listing_url, e))?;
        Ok(Self {
            client,
            start_url: page_url.clone(),
            page_url,
            mirrors,
            prefix: prefix.into(),
            loaded: None,
        })
    }

    /// URL of the page currently being walked.
    #[must_use]
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Host the listing is served from.
    #[must_use]
    pub fn current_host(&self) -> Option<&str> {
        self.page_url.host_str()
    }

    async fn load(&mut self) -> Result<&ParsedPage, PageSourceError> {
        if self.loaded.is_none() {
            let url = self.page_url.as_str();
            let html = self
                .client
                .get_text(url)
                .await
                .map_err(|e| PageSourceError::fetch(url, e))?;
            let parsed = parse_listing(&html, &self.page_url, &self.mirrors, &self.prefix);
            if parsed.descriptors.is_empty() {
                warn!(url, "no data rows found on listing page");
            } else {
                debug!(url, rows = parsed.descriptors.len(), "listing page parsed");
            }
            self.loaded = Some(parsed);
        }
        Ok(self.loaded.get_or_insert_with(ParsedPage::default))
    }
}

#[async_trait]
impl PageSource for HtmlListingSource {
    #[instrument(skip(self), fields(url = %self.page_url))]
    async fn current_page_descriptors(&mut self) -> Result<Vec<DownloadDescriptor>, PageSourceError> {
        Ok(self.load().await?.descriptors.clone())
    }

    async fn has_next_page(&mut self) -> Result<bool, PageSourceError> {
        Ok(self.load().await?.next_href.is_some())
    }

    #[instrument(skip(self), fields(url = %self.page_url))]
    async fn advance_page(&mut self) -> Result<bool, PageSourceError> {
        let Some(next) = self.load().await?.next_href.clone() else {
            return Ok(false);
        };
        let next_url = Url::parse(&next).map_err(|e| PageSourceError::invalid_url(&next, e))?;
        info!(next = %next_url, "navigating to next listing page");
        self.page_url = next_url;
        self.loaded = None;
        self.load().await?;
        Ok(true)
    }

    async fn rewind(&mut self) -> Result<(), PageSourceError> {
        if self.page_url != self.start_url {
            self.page_url = self.start_url.clone();
            self.loaded = None;
        }
        Ok(())
    }
}
