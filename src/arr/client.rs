//! HTTP plumbing shared by the Radarr and Sonarr clients.
//!
//! Every call carries the API key header and a request timeout, and is
//! retried exactly once after a short pause before the error is surfaced.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::error::ArrError;
use super::models::{PaginatedResponse, SystemStatus};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const PAGE_SIZE: u32 = 50;

const SYSTEM_STATUS_PATH: &str = "/api/v3/system/status";

/// Client for one Radarr/Sonarr instance.
#[derive(Clone)]
pub struct ArrClient {
    app_name: &'static str,
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl ArrClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `app_name` - Name used in log lines (e.g. "Radarr")
    /// * `base_url` - Base URL of the instance (e.g. "http://radarr:7878")
    /// * `api_key` - Value sent in the `X-Api-Key` header
    /// * `timeout` - Per-request timeout
    pub fn new(
        app_name: &'static str,
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, ArrError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ArrError::Config("API key contains invalid characters".into()))?;
        key.set_sensitive(true);
        headers.insert("X-Api-Key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ArrError::Config(e.to_string()))?;

        Ok(Self {
            app_name,
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Override the pause before the single retry.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn app_name(&self) -> &'static str {
        self.app_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Low-level requests
    // =========================================================================

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ArrError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArrError::from_reqwest(path, e))?;

        if !response.status().is_success() {
            return Err(ArrError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ArrError> {
        match self.send_once(method.clone(), path, query, body).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_retryable() => {
                debug!(
                    "{}: Request to {} failed ({}), retrying in {:?}",
                    self.app_name, path, err, self.retry_delay
                );
                tokio::time::sleep(self.retry_delay).await;
                self.send_once(method, path, query, body)
                    .await
                    .inspect_err(|err| {
                        warn!("{}: Retry failed for {}: {}", self.app_name, path, err)
                    })
            }
            Err(err) => Err(err),
        }
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ArrError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArrError::from_reqwest(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ArrError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ArrError> {
        let response = self.send_with_retry(Method::GET, path, query, None).await?;
        Self::decode(path, response).await
    }

    /// POST a JSON body. The response body is not inspected.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<(), ArrError> {
        self.send_with_retry(Method::POST, path, &[], Some(body))
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Fetch every page of a paginated endpoint, 1-indexed, sorted by id.
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        extra_params: &[(&str, &str)],
    ) -> Result<Vec<T>, ArrError> {
        let mut all_records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("sortKey", "id".to_string()),
            ];
            query.extend(extra_params.iter().map(|(k, v)| (*k, v.to_string())));

            let data: PaginatedResponse<T> = self.get_json(path, &query).await?;
            if data.total_records == 0 {
                debug!("{}: Fetched 0 items from {} (0 total)", self.app_name, path);
                return Ok(Vec::new());
            }

            let page_len = data.records.len();
            all_records.extend(data.records);

            if page_len == 0 || page as u64 * PAGE_SIZE as u64 >= data.total_records {
                debug!(
                    "{}: Fetched {} items from {} ({} total)",
                    self.app_name,
                    all_records.len(),
                    path,
                    data.total_records
                );
                return Ok(all_records);
            }
            page += 1;
        }
    }

    // =========================================================================
    // Connection validation
    // =========================================================================

    /// Single, non-retried status call.
    pub async fn system_status(&self) -> Result<SystemStatus, ArrError> {
        let response = self
            .send_once(Method::GET, SYSTEM_STATUS_PATH, &[], None)
            .await?;
        Self::decode(SYSTEM_STATUS_PATH, response).await
    }

    /// Returns true when the instance answers with a valid status payload.
    /// Never fails; the reason is logged instead.
    pub async fn validate_connection(&self) -> bool {
        match self.system_status().await {
            Ok(status) => {
                info!("Connected to {} v{}", self.app_name, status.version);
                true
            }
            Err(err) if err.is_unauthorized() => {
                error!("{}: API key is invalid (401 Unauthorized)", self.app_name);
                false
            }
            Err(ArrError::Timeout { .. }) => {
                warn!("{}: Connection timed out", self.app_name);
                false
            }
            Err(ArrError::Connection { .. }) => {
                warn!("{}: Connection refused at configured URL", self.app_name);
                false
            }
            Err(err) => {
                warn!("{}: Unexpected error: {}", self.app_name, err);
                false
            }
        }
    }
}
