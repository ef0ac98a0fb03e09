//! HTTP backend for the asset, content and migration APIs

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::MigrationBackend;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::types::*;

/// HTTP backend
///
/// # Example
///
/// ```rust,no_run
/// use elohim_migration::{HttpBackend, MigrationConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpBackend::new(MigrationConfig::new("my-repo", "write-token"))?;
/// # Ok(())
/// # }
/// ```
pub struct HttpBackend {
    config: MigrationConfig,
    client: Client,
}

impl HttpBackend {
    /// Create a backend with its own HTTP client
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create a backend around a caller-supplied HTTP client
    pub fn with_client(config: MigrationConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    // ==================== Request helpers ====================

    fn endpoint(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    /// Attach write credentials
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.write_token),
            )
            .header("repository", &self.config.repository)
    }

    /// Attach write credentials plus the migration API key
    fn authorize_migration(&self, request: RequestBuilder) -> RequestBuilder {
        let request = self.authorize(request);
        match &self.config.migration_api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    fn access_token_param(&self) -> Option<String> {
        self.config
            .access_token
            .as_ref()
            .map(|token| format!("access_token={}", urlencoding::encode(token)))
    }

    /// Send a request, retrying while the server answers 429
    ///
    /// The request is rebuilt for every attempt since multipart bodies
    /// cannot be cloned.
    async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            let response = build()?.send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(MigrationError::RateLimited {
                    url: url.to_string(),
                    attempts: attempt,
                });
            }

            let delay = retry_after(&response).unwrap_or_else(|| {
                Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(attempt as u64))
            });
            warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::Unauthorized(body));
        }

        if status == StatusCode::NOT_FOUND {
            let url = response.url().to_string();
            return Err(MigrationError::NotFound(url));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            MigrationError::InvalidResponse(format!("{}: {}", e, String::from_utf8_lossy(&body)))
        })
    }
}

/// Delay requested by a `Retry-After` header, in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl MigrationBackend for HttpBackend {
    // ==================== Asset API ====================

    async fn list_assets(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetsPage> {
        let mut url = Self::endpoint(&self.config.asset_api_url, "assets");
        url.push_str(&format!("?pageSize={}", page_size));
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }

        let response = self
            .send(&url, || Ok(self.authorize(self.client.get(&url))))
            .await?;
        self.handle_response(response).await
    }

    async fn create_asset(&self, upload: AssetUpload) -> Result<Asset> {
        let url = Self::endpoint(&self.config.asset_api_url, "assets");
        debug!(filename = %upload.filename, size = upload.file.len(), "Uploading asset");

        let response = self
            .send(&url, || {
                let mut file = Part::bytes(upload.file.to_vec()).file_name(upload.filename.clone());
                if let Some(content_type) = &upload.content_type {
                    file = file.mime_str(content_type)?;
                }

                let mut form = Form::new().part("file", file);
                for (name, value) in [
                    ("notes", &upload.notes),
                    ("credits", &upload.credits),
                    ("alt", &upload.alt),
                ] {
                    if let Some(value) = value {
                        form = form.text(name, value.clone());
                    }
                }

                Ok(self.authorize(self.client.post(&url)).multipart(form))
            })
            .await?;
        self.handle_response(response).await
    }

    async fn update_asset(&self, id: &str, update: AssetUpdate) -> Result<Asset> {
        let url = Self::endpoint(
            &self.config.asset_api_url,
            &format!("assets/{}", urlencoding::encode(id)),
        );

        let response = self
            .send(&url, || {
                Ok(self
                    .authorize(self.client.patch(&url))
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&update))
            })
            .await?;
        self.handle_response(response).await
    }

    async fn list_tags(&self) -> Result<Vec<AssetTag>> {
        let url = Self::endpoint(&self.config.asset_api_url, "tags");

        let response = self
            .send(&url, || Ok(self.authorize(self.client.get(&url))))
            .await?;
        let tags: TagsResponse = self.handle_response(response).await?;
        Ok(tags.items)
    }

    async fn create_tag(&self, name: &str) -> Result<AssetTag> {
        let url = Self::endpoint(&self.config.asset_api_url, "tags");
        let body = CreateTagRequest {
            name: name.to_string(),
        };

        let response = self
            .send(&url, || {
                Ok(self
                    .authorize(self.client.post(&url))
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&body))
            })
            .await?;
        self.handle_response(response).await
    }

    // ==================== Content API ====================

    async fn repository(&self) -> Result<Repository> {
        let mut url = self.config.content_api_url.trim_end_matches('/').to_string();
        if let Some(token) = self.access_token_param() {
            url.push('?');
            url.push_str(&token);
        }

        let response = self.send(&url, || Ok(self.client.get(&url))).await?;
        self.handle_response(response).await
    }

    async fn list_documents(
        &self,
        master_ref: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<DocumentsPage> {
        let mut url = Self::endpoint(&self.config.content_api_url, "documents/search");

        let mut params = Vec::new();
        if let Some(reference) = master_ref {
            params.push(format!("ref={}", urlencoding::encode(reference)));
        }
        params.push("lang=*".to_string());
        params.push(format!("page={}", page));
        params.push(format!("pageSize={}", page_size));
        if let Some(token) = self.access_token_param() {
            params.push(token);
        }
        url.push('?');
        url.push_str(&params.join("&"));

        let response = self.send(&url, || Ok(self.client.get(&url))).await?;
        self.handle_response(response).await
    }

    // ==================== Migration API ====================

    async fn create_document(&self, request: CreateDocumentRequest) -> Result<CreatedDocument> {
        let url = Self::endpoint(&self.config.migration_api_url, "documents");

        let response = self
            .send(&url, || {
                Ok(self
                    .authorize_migration(self.client.post(&url))
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&request))
            })
            .await?;
        self.handle_response(response).await
    }

    async fn update_document(
        &self,
        id: &str,
        request: UpdateDocumentRequest,
    ) -> Result<CreatedDocument> {
        let url = Self::endpoint(
            &self.config.migration_api_url,
            &format!("documents/{}", urlencoding::encode(id)),
        );

        let response = self
            .send(&url, || {
                Ok(self
                    .authorize_migration(self.client.put(&url))
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&request))
            })
            .await?;
        self.handle_response(response).await
    }

    // ==================== Foreign assets ====================

    async fn fetch_asset(&self, url: &str) -> Result<FetchedAsset> {
        let fetch_error = |reason: String| MigrationError::AssetFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("status {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        Ok(FetchedAsset {
            bytes,
            content_type,
        })
    }
}
