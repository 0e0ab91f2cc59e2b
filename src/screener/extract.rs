// src/screener/extract.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::period::{expand_fiscal_year, Quarter};
use crate::screener::models::DocumentDescriptor;

// --- Constants ---
pub const MAX_COMPANY_LEN: usize = 50;
pub const MAX_RAW_TEXT_LEN: usize = 100;

// --- CSS Selectors (Lazy Static) ---
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to compile ANCHOR_SELECTOR")
});

// --- Regex Patterns for Text Matching (Lazy Static) ---
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})").expect("Failed to compile DATE_RE")
});

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Q(\d)").expect("Failed to compile QUARTER_RE")
});

static FISCAL_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FY\s*(\d{2,4})").expect("Failed to compile FISCAL_YEAR_RE")
});

// The company name is whatever precedes the first digit or Q/FY marker.
static COMPANY_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Q\d|FY|\d").expect("Failed to compile COMPANY_BOUNDARY_RE")
});

// --- Descriptor extraction ---

/// Pattern-matches one listing entry into a [`DocumentDescriptor`].
///
/// Returns `None` (skip, not an error) when the entry carries no
/// document-like link; a bad row never aborts the surrounding crawl.
pub fn extract_descriptor(row: ElementRef, base_url: &str) -> Option<DocumentDescriptor> {
    // 1. First hyperlink whose target looks like a document. The row itself
    //    may be the anchor when the crawler fell back to bare-link selection.
    let href = find_document_href(row)?;

    // 2. Normalize to an absolute URL.
    let source_url = absolutize(&href, base_url);

    // 3. Flattened row text, bounded for diagnostics.
    let text = flatten_text(row);

    // 4. Independent signal extraction from the text.
    let raw_date = DATE_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let quarter_hint = quarter_from_text(&text);
    let fiscal_year_hint = fiscal_year_from_text(&text);

    // 5. Company name: text before the first digit / quarter / FY marker.
    let company = derive_company_name(&text);

    Some(DocumentDescriptor {
        company,
        source_url,
        raw_date,
        quarter_hint,
        fiscal_year_hint,
        raw_text: truncate_chars(&text, MAX_RAW_TEXT_LEN),
    })
}

/// Scans a company page for its own transcript links (fallback strategy).
/// Only anchors whose target or text mentions "transcript" qualify.
pub fn extract_company_documents(
    html: &str,
    base_url: &str,
    company: &str,
) -> Vec<DocumentDescriptor> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = flatten_text(anchor);
        let href_lower = href.to_lowercase();
        if !href_lower.contains("transcript") && !text.to_lowercase().contains("transcript") {
            continue;
        }

        out.push(DocumentDescriptor {
            company: truncate_chars(company, MAX_COMPANY_LEN),
            source_url: absolutize(href, base_url),
            raw_date: None,
            quarter_hint: quarter_from_text(&text),
            fiscal_year_hint: fiscal_year_from_text(&text),
            raw_text: truncate_chars(&text, MAX_RAW_TEXT_LEN),
        });
    }

    out
}

// --- Helpers ---

fn find_document_href(row: ElementRef) -> Option<String> {
    let is_document = |href: &str| {
        let lower = href.to_lowercase();
        lower.contains(".pdf") || lower.contains("transcript")
    };

    if row.value().name() == "a" {
        if let Some(href) = row.value().attr("href") {
            if is_document(href) {
                return Some(href.to_string());
            }
        }
    }

    row.select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| is_document(href))
        .map(|href| href.to_string())
}

/// Normalizes a link target to an absolute URL under the site root.
pub fn absolutize(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url, href)
    } else {
        format!("{}/{}", base_url, href)
    }
}

fn quarter_from_text(text: &str) -> Option<Quarter> {
    QUARTER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .and_then(Quarter::from_digit)
}

fn fiscal_year_from_text(text: &str) -> Option<String> {
    FISCAL_YEAR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| expand_fiscal_year(m.as_str()))
}

fn derive_company_name(text: &str) -> String {
    let head = match COMPANY_BOUNDARY_RE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };
    let cleaned = head.replace("Transcript", "");
    truncate_chars(cleaned.trim(), MAX_COMPANY_LEN)
}

/// Whitespace-normalized text content of an element.
fn flatten_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Char-boundary-safe truncation.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
