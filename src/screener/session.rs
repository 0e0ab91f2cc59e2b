// src/screener/session.rs

// --- Imports ---
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::header;
use scraper::{Html, Selector};

use crate::config::Config;
use crate::utils::error::ScrapeError;

// --- Constants ---
// Fixed browser-like identity; the source site rejects default client UAs.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Transport-level retry policy for binary downloads: transient statuses are
// retried with exponential backoff before surfacing as a per-item failure.
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

static CSRF_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("input[name='csrfmiddlewaretoken']")
        .expect("Failed to compile CSRF_SELECTOR")
});

// --- Collaborator boundaries ---

/// Fetches rendered listing markup. The crawler only depends on this.
pub trait PageFetcher {
    fn fetch_page(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<String, ScrapeError>>;
}

/// Fetches binary document content. The pipeline only depends on this.
pub trait BinaryFetcher {
    fn fetch_binary(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ScrapeError>>;
}

// --- Session ---

/// Cookie-holding HTTP session against the source site.
pub struct ScreenerSession {
    client: reqwest::Client,
    base_url: String,
    transfer_timeout: std::time::Duration,
}

impl ScreenerSession {
    pub fn new(cfg: &Config) -> Result<Self, ScrapeError> {
        // The client-level timeout bounds page fetches; binary downloads
        // override it per request with the larger transfer bound.
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .connect_timeout(cfg.request_timeout)
            .timeout(cfg.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            transfer_timeout: cfg.transfer_timeout,
        })
    }

    /// Logs in to the source site. Failure here is fatal to the run.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ScrapeError> {
        tracing::info!("Logging in to {}...", self.base_url);

        let login_url = format!("{}/login/", self.base_url);
        let response = self.client.get(&login_url).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Http(response.status()));
        }
        let body = response.text().await?;

        // Lift the CSRF token out of the login form. Html is parsed in its
        // own scope so it is dropped before the next await.
        let token = {
            let document = Html::parse_document(&body);
            document
                .select(&CSRF_SELECTOR)
                .next()
                .and_then(|input| input.value().attr("value"))
                .map(|v| v.to_string())
                .ok_or_else(|| {
                    ScrapeError::Parse("CSRF token not found on login page".to_string())
                })?
        };

        let response = self
            .client
            .post(&login_url)
            .header(header::REFERER, login_url.as_str())
            .form(&[
                ("username", username),
                ("password", password),
                ("csrfmiddlewaretoken", token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http(status));
        }

        // A successful login redirects away from the login page.
        if response.url().path().to_lowercase().contains("login") {
            return Err(ScrapeError::LoginFailed(
                "still on login page after submitting credentials".to_string(),
            ));
        }

        tracing::info!("Login successful");
        Ok(())
    }
}

impl PageFetcher for ScreenerSession {
    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        tracing::debug!("Fetching page: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            return Err(ScrapeError::Http(status));
        }
        let body = response.text().await?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl BinaryFetcher for ScreenerSession {
    /// Downloads binary content with bounded retry on transient failures.
    /// The pipeline is unaware of retries happening underneath this call.
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let mut attempt = 0u32;
        loop {
            let request = self.client.get(url).timeout(self.transfer_timeout);
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        tracing::debug!("Downloaded {} bytes from {}", bytes.len(), url);
                        return Ok(bytes.to_vec());
                    }
                    if is_retryable(status) && attempt < MAX_RETRIES {
                        backoff(attempt, &format!("HTTP {}", status)).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::error!("HTTP error status: {} for URL: {}", status, url);
                    return Err(ScrapeError::Http(status));
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_RETRIES => {
                    backoff(attempt, "transport error").await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

async fn backoff(attempt: u32, reason: &str) {
    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt));
    tracing::warn!("Retrying after {} (attempt {}, waiting {:?})", reason, attempt + 1, delay);
    tokio::time::sleep(delay).await;
}
