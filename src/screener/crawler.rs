// src/screener/crawler.rs

// --- Imports ---
use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::config::Config;
use crate::screener::extract::{extract_company_documents, extract_descriptor};
use crate::screener::models::{CompanyRef, DocumentDescriptor};
use crate::screener::session::PageFetcher;
use crate::utils::error::ScrapeError;

// --- Constants ---
// Pause between company-page fetches in the fallback strategy.
const COMPANY_PAGE_DELAY: Duration = Duration::from_millis(300);

// --- CSS Selectors (Lazy Static) ---
static PRIMARY_ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table tbody tr, .transcript-item, .document-row")
        .expect("Failed to compile PRIMARY_ROW_SELECTOR")
});

// Used when a page carries no recognizable rows: treat document-like
// anchors themselves as entries.
static FALLBACK_ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href*='transcript'], a[href*='.pdf']")
        .expect("Failed to compile FALLBACK_ROW_SELECTOR")
});

static NEXT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.next, a[rel='next']").expect("Failed to compile NEXT_LINK_SELECTOR")
});

static COMPANY_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href*='/company/']").expect("Failed to compile COMPANY_LINK_SELECTOR")
});

// --- Crawler ---

/// Paginates the remote document index, collecting descriptors eagerly.
pub struct Crawler<'a, F: PageFetcher> {
    fetcher: &'a F,
    cfg: &'a Config,
}

struct ListingPage {
    rows_found: usize,
    descriptors: Vec<DocumentDescriptor>,
    has_next: bool,
}

impl<'a, F: PageFetcher> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, cfg: &'a Config) -> Self {
        Self { fetcher, cfg }
    }

    /// Collects descriptors from the transcripts listing; if that yields
    /// nothing, falls back to enumerating company pages directly.
    pub async fn crawl(&self) -> Result<Vec<DocumentDescriptor>, ScrapeError> {
        let mut descriptors = self.scrape_listing().await?;

        if descriptors.is_empty() {
            tracing::warn!("No transcripts found on main listing. Trying company-wise...");
            let companies = self.list_companies().await?;
            let total = companies.len();

            for (i, company) in companies.iter().take(self.cfg.company_scan_limit).enumerate() {
                tracing::info!("[{}/{}] Checking {}...", i + 1, total, company.name);
                match self.fetcher.fetch_page(&company.url).await {
                    Ok(html) => descriptors.extend(extract_company_documents(
                        &html,
                        &self.cfg.base_url,
                        &company.name,
                    )),
                    // A single unreachable company never aborts the crawl.
                    Err(e) => {
                        tracing::debug!("Error getting transcripts for {}: {}", company.url, e)
                    }
                }
                tokio::time::sleep(COMPANY_PAGE_DELAY).await;
            }
        }

        tracing::info!("Total transcripts found: {}", descriptors.len());
        Ok(descriptors)
    }

    /// Primary strategy: page through the transcripts index. Termination is
    /// driven by an empty page or the hard page cap; the "next page" link is
    /// observed as a soft signal only and never stops iteration.
    async fn scrape_listing(&self) -> Result<Vec<DocumentDescriptor>, ScrapeError> {
        tracing::info!("Fetching transcripts from main listing...");

        let mut descriptors = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = format!("{}/transcripts/?page={}", self.cfg.base_url, page);
            let html = self.fetcher.fetch_page(&url).await?;
            let listing = parse_listing_page(&html, &self.cfg.base_url);

            if listing.rows_found == 0 {
                tracing::info!("No more transcripts found on page {}", page);
                break;
            }

            tracing::info!("Page {}: Found {} items", page, listing.rows_found);
            descriptors.extend(listing.descriptors);

            if !listing.has_next {
                tracing::debug!("Page {} has no next-page link", page);
            }

            page += 1;
            if page > self.cfg.max_listing_pages {
                tracing::warn!(
                    "Reached listing page cap ({}), stopping",
                    self.cfg.max_listing_pages
                );
                break;
            }
        }

        Ok(descriptors)
    }

    /// Fallback strategy, step 1: enumerate the all-companies listing.
    /// Two caps apply: a soft cap when no next link is present and a hard
    /// cap regardless.
    async fn list_companies(&self) -> Result<Vec<CompanyRef>, ScrapeError> {
        tracing::info!("Fetching company list...");

        let mut companies = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = format!(
                "{}/screens/71064/all-companies/?page={}",
                self.cfg.base_url, page
            );
            let html = self.fetcher.fetch_page(&url).await?;
            let (links_found, found, has_next) = parse_company_listing(&html, &self.cfg.base_url);

            if links_found == 0 {
                break;
            }
            tracing::info!("Page {}: Found {} companies", page, links_found);
            companies.extend(found);

            if !has_next && page > self.cfg.soft_company_pages {
                break;
            }
            page += 1;
            if page > self.cfg.max_company_pages {
                break;
            }
        }

        // Dedupe by URL, preserving discovery order.
        let mut seen = HashSet::new();
        companies.retain(|c: &CompanyRef| seen.insert(c.url.clone()));

        tracing::info!("Total unique companies: {}", companies.len());
        Ok(companies)
    }
}

// --- Page parsing (sync; Html is never held across an await) ---

fn parse_listing_page(html: &str, base_url: &str) -> ListingPage {
    let document = Html::parse_document(html);

    let rows: Vec<_> = document.select(&PRIMARY_ROW_SELECTOR).collect();
    let rows = if rows.is_empty() {
        document.select(&FALLBACK_ROW_SELECTOR).collect()
    } else {
        rows
    };

    let descriptors = rows
        .iter()
        .filter_map(|row| extract_descriptor(*row, base_url))
        .collect();

    ListingPage {
        rows_found: rows.len(),
        descriptors,
        has_next: document.select(&NEXT_LINK_SELECTOR).next().is_some(),
    }
}

fn parse_company_listing(html: &str, base_url: &str) -> (usize, Vec<CompanyRef>, bool) {
    let document = Html::parse_document(html);

    let links: Vec<_> = document.select(&COMPANY_LINK_SELECTOR).collect();
    let companies = links
        .iter()
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let name = link.text().collect::<String>().trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(CompanyRef {
                name,
                url: crate::screener::extract::absolutize(href, base_url),
            })
        })
        .collect();

    let has_next = document.select(&NEXT_LINK_SELECTOR).next().is_some();
    (links.len(), companies, has_next)
}
