//! Menu data source and its cached fetcher.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use stride_core::{FetchError, MenuSnapshot};

use crate::constants::MENUS_TAG;
use crate::server_cache::{CachedFetcher, FetchResult, FetcherOptions, ServerCache};

/// Upstream store of the menu configuration.
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn load_menus(&self) -> FetchResult<Value>;
}

/// Menu document read from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FileMenuRepository {
    path: PathBuf,
}

impl FileMenuRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MenuRepository for FileMenuRepository {
    async fn load_menus(&self) -> FetchResult<Value> {
        let upstream = |message: String| FetchError::Upstream {
            tag: MENUS_TAG.to_string(),
            message,
        };
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| upstream(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_slice(&raw).map_err(|e| upstream(format!("invalid menu JSON: {}", e)))
    }
}

/// Fixed in-memory menu document.
#[derive(Debug, Clone)]
pub struct StaticMenuRepository {
    payload: Value,
}

impl StaticMenuRepository {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl MenuRepository for StaticMenuRepository {
    async fn load_menus(&self) -> FetchResult<Value> {
        Ok(self.payload.clone())
    }
}

/// Minimal navigation served when the repository cannot be reached.
pub fn default_menu_payload() -> Value {
    json!({
        "menus": [
            { "id": "home", "label": "Home", "href": "/" }
        ]
    })
}

/// Cached fetcher over `repository` under the `menus` tag.
pub fn menu_fetcher(
    cache: &ServerCache,
    repository: Arc<dyn MenuRepository>,
) -> CachedFetcher<MenuSnapshot> {
    let fallback = MenuSnapshot::from_payload(default_menu_payload());
    cache.create_cached_fetcher(FetcherOptions::new(MENUS_TAG, fallback), move || {
        let repository = repository.clone();
        async move {
            let payload = repository.load_menus().await?;
            Ok(MenuSnapshot::from_payload(payload))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stride_core::compute_server_version;

    #[tokio::test]
    async fn test_file_repository_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"menus": [{{"id": "leagues"}}]}}"#).unwrap();

        let repo = FileMenuRepository::new(file.path());
        assert_eq!(repo.load_menus().await.unwrap(), json!({"menus": [{"id": "leagues"}]}));
    }

    #[tokio::test]
    async fn test_file_repository_errors_are_upstream() {
        let repo = FileMenuRepository::new("/nonexistent/stride/menus.json");
        assert!(matches!(repo.load_menus().await, Err(FetchError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_menu_fetcher_versions_payload() {
        let cache = ServerCache::with_defaults();
        let payload = json!({"menus": ["a"]});
        let fetcher = menu_fetcher(&cache, Arc::new(StaticMenuRepository::new(payload.clone())));

        let snapshot = fetcher.get().await;
        assert_eq!(snapshot.server_version, compute_server_version(&payload));
    }
}
