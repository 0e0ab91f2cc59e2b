// src/drive/client.rs

// --- Imports ---
use serde::Deserialize;

use crate::config::Config;
use crate::drive::auth;
use crate::utils::error::DriveError;

// --- Constants ---
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PDF_MIME: &str = "application/pdf";

// --- Collaborator boundary ---

/// Remote-storage operations the pipeline depends on. `ensure_folder` is
/// the get-or-create upsert; the real API only exposes list-then-create,
/// so a narrow race window exists if two runs execute concurrently, which
/// is not a supported mode.
pub trait DriveStore {
    fn ensure_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> impl std::future::Future<Output = Result<String, DriveError>>;

    fn file_exists(
        &self,
        name: &str,
        folder_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, DriveError>>;

    fn upload_pdf(
        &self,
        name: &str,
        folder_id: &str,
        content: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<String, DriveError>>;
}

// --- REST client ---

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}

/// Google Drive v3 REST client authenticated as a service account.
pub struct DriveClient {
    http: reqwest::Client,
    token: String,
    upload_timeout: std::time::Duration,
}

impl DriveClient {
    /// Loads credentials from the configured source and exchanges them for
    /// an access token. Any failure here is fatal to the run.
    pub async fn connect(cfg: &Config) -> Result<Self, DriveError> {
        // Metadata calls use the client-level timeout; uploads carry whole
        // PDF bodies and override it per request with the transfer bound.
        let http = reqwest::Client::builder()
            .connect_timeout(cfg.request_timeout)
            .timeout(cfg.request_timeout)
            .build()?;

        let key = auth::load_service_account_key(&cfg.credential_source)?;
        let token = auth::fetch_access_token(&http, &key).await?;

        Ok(Self {
            http,
            token,
            upload_timeout: cfg.transfer_timeout,
        })
    }

    async fn list_matching(&self, query: &str) -> Result<Vec<FileRef>, DriveError> {
        let response = self
            .http
            .get(FILES_URL)
            .bearer_auth(&self.token)
            .query(&[("q", query), ("fields", "files(id, name)")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Api { status, body });
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| DriveError::Parse(format!("file list: {}", e)))?;
        Ok(list.files)
    }
}

impl DriveStore for DriveClient {
    async fn ensure_folder(&self, name: &str, parent_id: &str) -> Result<String, DriveError> {
        let query = folder_query(name, parent_id);
        if let Some(existing) = self.list_matching(&query).await?.into_iter().next() {
            return Ok(existing.id);
        }

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id],
        });
        let response = self
            .http
            .post(FILES_URL)
            .bearer_auth(&self.token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Api { status, body });
        }

        let created: FileRef = response
            .json()
            .await
            .map_err(|e| DriveError::Parse(format!("created folder: {}", e)))?;
        tracing::info!("Created folder: {}", name);
        Ok(created.id)
    }

    async fn file_exists(&self, name: &str, folder_id: &str) -> Result<bool, DriveError> {
        let query = file_query(name, folder_id);
        Ok(!self.list_matching(&query).await?.is_empty())
    }

    async fn upload_pdf(
        &self,
        name: &str,
        folder_id: &str,
        content: Vec<u8>,
    ) -> Result<String, DriveError> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
        });
        let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
            .mime_str("application/json")?;
        let media_part = reqwest::multipart::Part::bytes(content).mime_str(PDF_MIME)?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let response = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Api { status, body });
        }

        let created: FileRef = response
            .json()
            .await
            .map_err(|e| DriveError::Parse(format!("uploaded file: {}", e)))?;
        Ok(created.id)
    }
}

// --- Query builders ---

// Drive query values are single-quoted; embedded quotes and backslashes
// must be escaped.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name='{}' and mimeType='{}' and '{}' in parents and trashed=false",
        escape_query_value(name),
        FOLDER_MIME,
        escape_query_value(parent_id)
    )
}

fn file_query(name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_value(name),
        escape_query_value(folder_id)
    )
}
