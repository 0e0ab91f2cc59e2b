// src/pipeline/mod.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;
use crate::drive::DriveStore;
use crate::period::{self, Clock, ResolvedPeriod};
use crate::screener::models::DocumentDescriptor;
use crate::screener::session::BinaryFetcher;
use crate::utils::error::PipelineError;

// --- Regex Patterns (Lazy Static) ---
// Characters not allowed in the canonical filename.
static FILENAME_FORBIDDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*]"#).expect("Failed to compile FILENAME_FORBIDDEN_RE")
});

// --- Data Structures ---

/// Counters accumulated across the sequential run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Classified result for one descriptor. Failures are carried as `Err` by
/// `process_one`, so the caller's continue-on-error behavior is an explicit
/// branch rather than a catch-all handler.
#[derive(Debug)]
enum ItemOutcome {
    Uploaded,
    SkippedExisting,
    /// Descriptor without a source URL: skipped silently, not counted.
    NoSourceUrl,
}

// --- Pipeline ---

/// Sequential fetch-and-store: one descriptor is processed fully before the
/// next begins. Per-descriptor errors become counters; they never abort the
/// overall run.
pub struct FetchStorePipeline<'a, F, S, C>
where
    F: BinaryFetcher,
    S: DriveStore,
    C: Clock,
{
    fetcher: &'a F,
    store: &'a S,
    clock: &'a C,
    cfg: &'a Config,
}

impl<'a, F, S, C> FetchStorePipeline<'a, F, S, C>
where
    F: BinaryFetcher,
    S: DriveStore,
    C: Clock,
{
    pub fn new(fetcher: &'a F, store: &'a S, clock: &'a C, cfg: &'a Config) -> Self {
        Self { fetcher, store, clock, cfg }
    }

    pub async fn run(&self, descriptors: &[DocumentDescriptor]) -> RunStats {
        let mut stats = RunStats::default();
        let total = descriptors.len();

        for (i, descriptor) in descriptors.iter().enumerate() {
            match self.process_one(descriptor, i + 1, total).await {
                Ok(ItemOutcome::Uploaded) => {
                    stats.downloaded += 1;
                    // Ease off the remote between successive downloads.
                    tokio::time::sleep(self.cfg.download_delay).await;
                }
                Ok(ItemOutcome::SkippedExisting) => stats.skipped += 1,
                Ok(ItemOutcome::NoSourceUrl) => {}
                Err(e) => {
                    tracing::error!("  Failed: {}", e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    async fn process_one(
        &self,
        descriptor: &DocumentDescriptor,
        index: usize,
        total: usize,
    ) -> Result<ItemOutcome, PipelineError> {
        if descriptor.source_url.is_empty() {
            return Ok(ItemOutcome::NoSourceUrl);
        }

        // Resolve the fiscal period; explicit hints from the listing row
        // override whatever the resolver derives.
        let mut period = period::resolve(
            descriptor.raw_date.as_deref(),
            &descriptor.raw_text,
            self.clock,
        );
        if let Some(quarter) = descriptor.quarter_hint {
            period.quarter = quarter;
        }
        if let Some(fy) = &descriptor.fiscal_year_hint {
            period.fiscal_year = fy.clone();
        }

        tracing::info!(
            "[{}/{}] {} - {} {}",
            index,
            total,
            descriptor.company,
            period.fiscal_year,
            period.quarter
        );

        // Destination: root -> FY folder -> quarter folder, get-or-create.
        let fy_folder_id = self
            .store
            .ensure_folder(&period.fiscal_year, &self.cfg.drive_folder_id)
            .await?;
        let quarter_folder_id = self
            .store
            .ensure_folder(period.quarter.as_str(), &fy_folder_id)
            .await?;

        let filename = build_filename(&descriptor.company, &period);

        if self.store.file_exists(&filename, &quarter_folder_id).await? {
            tracing::info!("  Skipped (exists): {}", filename);
            return Ok(ItemOutcome::SkippedExisting);
        }

        let content = self
            .fetcher
            .fetch_binary(&descriptor.source_url)
            .await
            .map_err(PipelineError::Scrape)?;
        self.store
            .upload_pdf(&filename, &quarter_folder_id, content)
            .await?;
        tracing::info!("  Uploaded: {}", filename);

        Ok(ItemOutcome::Uploaded)
    }
}

// --- Naming ---

/// Strips the characters `< > : " / \ | ? *` from a company name.
pub fn sanitize_company(name: &str) -> String {
    FILENAME_FORBIDDEN_RE.replace_all(name, "").into_owned()
}

/// Canonical filename for a transcript in its quarter folder.
pub fn build_filename(company: &str, period: &ResolvedPeriod) -> String {
    format!(
        "{} - {} {} Transcript.pdf",
        sanitize_company(company),
        period.fiscal_year,
        period.quarter
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSource;
    use crate::period::Quarter;
    use crate::utils::error::{DriveError, ScrapeError};
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap())
    }

    fn test_config() -> Config {
        Config {
            drive_folder_id: "root".to_string(),
            base_url: "https://test.local".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            credential_source: CredentialSource::File(PathBuf::from("unused.json")),
            request_timeout: Duration::from_secs(5),
            transfer_timeout: Duration::from_secs(10),
            download_delay: Duration::from_millis(10),
            max_listing_pages: 200,
            max_company_pages: 100,
            soft_company_pages: 50,
            company_scan_limit: 100,
        }
    }

    fn descriptor(company: &str, url: &str, text: &str, date: Option<&str>) -> DocumentDescriptor {
        DocumentDescriptor {
            company: company.to_string(),
            source_url: url.to_string(),
            raw_date: date.map(str::to_string),
            quarter_hint: None,
            fiscal_year_hint: None,
            raw_text: text.to_string(),
        }
    }

    // In-memory Drive: folders as (id, name, parent), files as (name, folder id).
    #[derive(Default)]
    struct FakeDrive {
        folders: Mutex<Vec<(String, String, String)>>,
        files: Mutex<Vec<(String, String)>>,
    }

    impl FakeDrive {
        fn folder_count(&self) -> usize {
            self.folders.lock().unwrap().len()
        }

        fn file_names(&self) -> Vec<String> {
            self.files.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
        }
    }

    impl DriveStore for FakeDrive {
        async fn ensure_folder(&self, name: &str, parent_id: &str) -> Result<String, DriveError> {
            let mut folders = self.folders.lock().unwrap();
            if let Some((id, _, _)) = folders
                .iter()
                .find(|(_, n, p)| n == name && p == parent_id)
            {
                return Ok(id.clone());
            }
            let id = format!("folder-{}", folders.len() + 1);
            folders.push((id.clone(), name.to_string(), parent_id.to_string()));
            Ok(id)
        }

        async fn file_exists(&self, name: &str, folder_id: &str) -> Result<bool, DriveError> {
            let files = self.files.lock().unwrap();
            Ok(files.iter().any(|(n, f)| n == name && f == folder_id))
        }

        async fn upload_pdf(
            &self,
            name: &str,
            folder_id: &str,
            _content: Vec<u8>,
        ) -> Result<String, DriveError> {
            let mut files = self.files.lock().unwrap();
            files.push((name.to_string(), folder_id.to_string()));
            Ok(format!("file-{}", files.len()))
        }
    }

    struct FakeFetcher {
        fail_urls: HashSet<String>,
    }

    impl FakeFetcher {
        fn ok() -> Self {
            Self { fail_urls: HashSet::new() }
        }

        fn failing(urls: &[&str]) -> Self {
            Self {
                fail_urls: urls.iter().map(|u| u.to_string()).collect(),
            }
        }
    }

    impl BinaryFetcher for FakeFetcher {
        async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
            if self.fail_urls.contains(url) {
                return Err(ScrapeError::Http(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(b"%PDF-1.4 fake".to_vec())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_into_fy_quarter_hierarchy() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::ok();
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        let descriptors = vec![descriptor(
            "Acme Corp",
            "https://test.local/a.pdf",
            "Acme Corp Q2 FY24 Transcript",
            None,
        )];
        let stats = pipeline.run(&descriptors).await;

        assert_eq!(stats, RunStats { downloaded: 1, skipped: 0, failed: 0 });
        assert_eq!(
            drive.file_names(),
            vec!["Acme Corp - FY2024 Q2 Transcript.pdf".to_string()]
        );
        // root/FY2024 and FY2024/Q2
        assert_eq!(drive.folder_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rerun_is_idempotent() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::ok();
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        let descriptors = vec![
            descriptor("Acme Corp", "https://test.local/a.pdf", "Q1 FY24", None),
            descriptor("Beta Ltd", "https://test.local/b.pdf", "Q1 FY24", None),
        ];

        let first = pipeline.run(&descriptors).await;
        assert_eq!(first, RunStats { downloaded: 2, skipped: 0, failed: 0 });
        let folders_after_first = drive.folder_count();

        let second = pipeline.run(&descriptors).await;
        assert_eq!(second, RunStats { downloaded: 0, skipped: 2, failed: 0 });
        // No duplicate uploads and no duplicate folders.
        assert_eq!(drive.file_names().len(), 2);
        assert_eq!(drive.folder_count(), folders_after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_period_reuses_folders() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::ok();
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        let descriptors = vec![
            descriptor("Acme Corp", "https://test.local/a.pdf", "Q3 FY25", None),
            descriptor("Beta Ltd", "https://test.local/b.pdf", "Q3 FY25", None),
        ];
        pipeline.run(&descriptors).await;

        // Both land in the same FY2025/Q3 pair.
        assert_eq!(drive.folder_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hints_override_resolution() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::ok();
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        // The date alone would resolve to Q4 FY2023; the hints say otherwise.
        let mut d = descriptor("Acme Corp", "https://test.local/a.pdf", "", Some("01-02-2023"));
        d.quarter_hint = Some(Quarter::Q2);
        d.fiscal_year_hint = Some("FY2026".to_string());

        pipeline.run(&[d]).await;
        assert_eq!(
            drive.file_names(),
            vec!["Acme Corp - FY2026 Q2 Transcript.pdf".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_url_is_silently_skipped() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::ok();
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        let descriptors = vec![
            descriptor("No Url Co", "", "Q1 FY24", None),
            descriptor("Acme Corp", "https://test.local/a.pdf", "Q1 FY24", None),
        ];
        let stats = pipeline.run(&descriptors).await;

        // The url-less descriptor is not counted in any bucket.
        assert_eq!(stats, RunStats { downloaded: 1, skipped: 0, failed: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn failed_download_counts_and_run_continues() {
        let cfg = test_config();
        let drive = FakeDrive::default();
        let fetcher = FakeFetcher::failing(&["https://test.local/bad.pdf"]);
        let clock = fixed_clock();
        let pipeline = FetchStorePipeline::new(&fetcher, &drive, &clock, &cfg);

        let descriptors = vec![
            descriptor("Bad Co", "https://test.local/bad.pdf", "Q1 FY24", None),
            descriptor("Good Co", "https://test.local/good.pdf", "Q1 FY24", None),
        ];
        let stats = pipeline.run(&descriptors).await;

        assert_eq!(stats, RunStats { downloaded: 1, skipped: 0, failed: 1 });
        assert_eq!(
            drive.file_names(),
            vec!["Good Co - FY2024 Q1 Transcript.pdf".to_string()]
        );
    }

    #[test]
    fn sanitization_strips_forbidden_characters() {
        assert_eq!(sanitize_company("A/B: Corp*"), "AB Corp");
        assert_eq!(sanitize_company(r#"We<ird>"Na|me?\"#), "WeirdName");
        assert_eq!(sanitize_company("Plain Name"), "Plain Name");
    }

    #[test]
    fn filename_embeds_sanitized_company_and_period() {
        let period = ResolvedPeriod {
            quarter: Quarter::Q2,
            fiscal_year: "FY2024".to_string(),
        };
        assert_eq!(
            build_filename("A/B: Corp*", &period),
            "AB Corp - FY2024 Q2 Transcript.pdf"
        );
    }
}
