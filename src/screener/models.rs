// src/screener/models.rs
use crate::period::Quarter;

/// One discovered transcript candidate, created during crawling and
/// consumed exactly once by the fetch-and-store pipeline.
///
/// `source_url` is always present and absolute; every other field may be
/// empty and is resolved downstream.
#[derive(Debug, Clone)]
pub struct DocumentDescriptor {
    /// Display name, bounded length.
    pub company: String,
    /// Absolute URL of the PDF resource.
    pub source_url: String,
    /// Unparsed date text lifted from the listing row, if any.
    pub raw_date: Option<String>,
    /// Quarter marker found in the row text; `None` means unknown.
    pub quarter_hint: Option<Quarter>,
    /// Fiscal-year marker, normalized to "FY" + 4-digit year.
    pub fiscal_year_hint: Option<String>,
    /// Bounded snippet of the row text, diagnostics only.
    pub raw_text: String,
}

/// A company discovered on the all-companies listing (fallback strategy).
#[derive(Debug, Clone)]
pub struct CompanyRef {
    pub name: String,
    pub url: String,
}
