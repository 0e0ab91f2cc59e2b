// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden

    #[error("Login to source site failed: {0}")]
    LoginFailed(String),

    #[error("Failed to parse listing page: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Drive API returned HTTP {status}: {body}")]
    Api { status: reqwest::StatusCode, body: String },

    #[error("No Google credentials found (set GOOGLE_CREDENTIALS_BASE64 or GOOGLE_CREDENTIALS_FILE)")]
    NoCredentials,

    #[error("Invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Unexpected Drive API response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Drive operation failed: {0}")]
    Drive(#[from] DriveError),
}

// Per-descriptor pipeline errors are folded into counters by the run loop
// and never reach the top level, so AppError carries no variant for them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scraping failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Drive interaction failed: {0}")]
    Drive(#[from] DriveError),
}
