//! HTTP client for the facility bulk upload endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use facility_import_core::{BulkUploadItem, BulkUploadResult, ImportConfig};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::session::{Session, TokenPair, TokenRefresher};
use crate::ClientError;

const USER_AGENT: &str = concat!("facility-import/", env!("CARGO_PKG_VERSION"));

fn build_http_client(config: &ImportConfig) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ClientError::Network(e.to_string()))
}

/// Submits prepared facility batches. One submission at a time.
pub struct FacilityClient {
    http_client: reqwest::Client,
    upload_url: String,
    session: Arc<Session>,
    submitting: AtomicBool,
}

impl FacilityClient {
    pub fn new(config: &ImportConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            upload_url: config.upload_url(),
            session,
            submitting: AtomicBool::new(false),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// True while a submission is awaiting its response.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// POST `items` to the upload endpoint and return the validated result.
    ///
    /// A 401 triggers one session refresh and one retry. Calling this while
    /// another submission is pending fails with
    /// [`ClientError::SubmissionInFlight`]; nothing is retried automatically.
    pub async fn submit(&self, items: &[BulkUploadItem]) -> Result<BulkUploadResult, ClientError> {
        let _guard = SubmitGuard::acquire(&self.submitting)?;

        tracing::info!(items = items.len(), url = %self.upload_url, "Submitting facility batch");

        let mut response = self.post_items(items, self.session.token()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Facility upload returned 401, refreshing session");
            let token = self.session.refresh().await?;
            response = self.post_items(items, Some(token)).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ClientError::Unauthorized);
            }
        }

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Facility upload failed");
            return Err(ClientError::Api(status.as_u16(), error_text));
        }

        let result: BulkUploadResult = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        result.validate()?;

        tracing::info!(
            total = result.total_processed,
            successful = result.successful,
            skipped = result.skipped,
            failed = result.failed,
            "Facility upload finished"
        );

        Ok(result)
    }

    async fn post_items(
        &self,
        items: &[BulkUploadItem],
        token: Option<String>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http_client.post(&self.upload_url).json(items);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))
    }
}

/// Holds the in-flight flag for the lifetime of one submission.
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ClientError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::SubmissionInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refreshes tokens against `{api_base_url}{refresh_path}`.
pub struct HttpTokenRefresher {
    http_client: reqwest::Client,
    refresh_url: String,
}

impl HttpTokenRefresher {
    pub fn new(config: &ImportConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            refresh_url: config.refresh_url(),
        })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let response = self
            .http_client
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::RefreshFailed(format!(
                "{}: {error_text}",
                status.as_u16()
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        // Some deployments rotate only the access token.
        Ok(TokenPair {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}
