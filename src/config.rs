// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::error::AppError;

/// Where the Drive service-account credentials come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Base64-encoded service account JSON (GOOGLE_CREDENTIALS_BASE64).
    Base64(String),
    /// Path to a service account JSON file on disk.
    File(PathBuf),
}

/// Runtime configuration, built once at startup and threaded explicitly
/// into each component. No ambient mutable globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root Drive folder that receives the FY/Quarter hierarchy.
    pub drive_folder_id: String,
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub credential_source: CredentialSource,
    /// Hard timeout for page and metadata requests (also the connect bound).
    pub request_timeout: Duration,
    /// Larger whole-request bound for binary transfers (PDF downloads,
    /// Drive uploads), which can legitimately outlast a page fetch.
    pub transfer_timeout: Duration,
    /// Pause inserted after each successful download to ease rate limiting.
    pub download_delay: Duration,
    /// Hard cap on transcripts-listing pages (primary strategy).
    pub max_listing_pages: u32,
    /// Hard cap on all-companies listing pages (fallback strategy).
    pub max_company_pages: u32,
    /// Soft cap on company listing pages when no "next" link is present.
    pub soft_company_pages: u32,
    /// How many companies the fallback strategy visits at most.
    pub company_scan_limit: usize,
}

const DEFAULT_DRIVE_FOLDER_ID: &str = "1ezP5ez-SOuHuU5C13RU-Ndl-g4aa9VVe";
const DEFAULT_BASE_URL: &str = "https://www.screener.in";
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

impl Config {
    /// Assembles the configuration from the process environment, with
    /// optional CLI overrides applied on top. Missing login credentials
    /// are a fatal configuration error.
    pub fn from_env(
        folder_id_override: Option<String>,
        credentials_file_override: Option<PathBuf>,
        delay_ms_override: Option<u64>,
        max_pages_override: Option<u32>,
    ) -> Result<Self, AppError> {
        let username = env::var("SCREENER_USERNAME")
            .map_err(|_| AppError::Config("SCREENER_USERNAME is required".to_string()))?;
        let password = env::var("SCREENER_PASSWORD")
            .map_err(|_| AppError::Config("SCREENER_PASSWORD is required".to_string()))?;

        let drive_folder_id = folder_id_override
            .or_else(|| env::var("DRIVE_FOLDER_ID").ok())
            .unwrap_or_else(|| DEFAULT_DRIVE_FOLDER_ID.to_string());

        let credential_source = Self::resolve_credential_source(credentials_file_override);

        Ok(Config {
            drive_folder_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            username,
            password,
            credential_source,
            request_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(300),
            download_delay: Duration::from_millis(delay_ms_override.unwrap_or(500)),
            max_listing_pages: max_pages_override.unwrap_or(200),
            max_company_pages: 100,
            soft_company_pages: 50,
            company_scan_limit: 100,
        })
    }

    // Base64 env var wins (CI usage); a file path is the local fallback.
    // The path is not validated here: a missing file surfaces as a Drive
    // credential error when it is first read.
    fn resolve_credential_source(file_override: Option<PathBuf>) -> CredentialSource {
        if let Ok(blob) = env::var("GOOGLE_CREDENTIALS_BASE64") {
            if !blob.is_empty() {
                return CredentialSource::Base64(blob);
            }
        }
        let path = file_override
            .or_else(|| env::var("GOOGLE_CREDENTIALS_FILE").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));
        CredentialSource::File(path)
    }

    /// Deep link to the destination folder, reported in the final summary.
    pub fn drive_folder_url(&self) -> String {
        format!("https://drive.google.com/drive/folders/{}", self.drive_folder_id)
    }
}
