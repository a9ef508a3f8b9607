//! [`MenuSource`] over the Stride API.
//!
//! Wire contract:
//! - `GET {base}/api/menus` returns a [`MenuSnapshot`] as
//!   `{"payload": ..., "serverVersion": "..."}`
//! - `GET {base}/api/menus/version` returns a [`MenuVersionResponse`] as
//!   `{"serverVersion": "..."}`
//!
//! Transport failures, non-2xx statuses and undecodable bodies all map to
//! [`FetchError::Upstream`] under the `menus` tag.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use stride_core::{FetchError, MenuSnapshot, MenuVersionResponse, StrideResult};
use tracing::{debug, warn};

use super::loader::MenuSource;

/// Tag attached to upstream errors from this source.
const MENUS_TAG: &str = "menus";

/// Request timeout used by [`HttpMenuSource::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const MENUS_PATH: &str = "/api/menus";
const VERSION_PATH: &str = "/api/menus/version";

fn upstream(message: impl Into<String>) -> FetchError {
    FetchError::Upstream {
        tag: MENUS_TAG.to_string(),
        message: message.into(),
    }
}

/// Fetches menu snapshots from a running Stride API.
#[derive(Debug, Clone)]
pub struct HttpMenuSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMenuSource {
    /// Source for the API at `base_url` (scheme and authority, e.g.
    /// `https://app.example.com`) with [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn new(base_url: impl AsRef<str>) -> StrideResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> StrideResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| upstream(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Menu request failed");
            upstream(format!("GET {}: {}", path, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(upstream(format!("GET {}: HTTP {}: {}", path, status.as_u16(), text)));
        }

        debug!(url = %url, status = status.as_u16(), "Menu request succeeded");
        response
            .json::<T>()
            .await
            .map_err(|e| upstream(format!("GET {}: invalid body: {}", path, e)))
    }
}

#[async_trait]
impl MenuSource for HttpMenuSource {
    async fn fetch_menus(&self) -> StrideResult<MenuSnapshot> {
        Ok(self.get_json::<MenuSnapshot>(MENUS_PATH).await?)
    }

    async fn fetch_version(&self) -> StrideResult<String> {
        let body = self.get_json::<MenuVersionResponse>(VERSION_PATH).await?;
        Ok(body.server_version)
    }
}
