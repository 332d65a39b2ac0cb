//! Model cache manager.
//!
//! Keeps a local copy of the trained model so inference never depends on the
//! network. While online the copy is refreshed from the canonical artifact;
//! offline the last copy (or the canonical artifact itself) is used.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::connectivity::Connectivity;
use super::inference::labels_path;
use crate::config::ModelConfig;

/// Errors resolving the model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Neither the cached copy nor the canonical artifact exists.
    #[error("model unavailable: neither {cache} nor {canonical} exists")]
    Unavailable { cache: PathBuf, canonical: PathBuf },
}

/// Resolves which model file inference should load.
#[derive(Debug, Clone)]
pub struct ModelCache {
    canonical_path: PathBuf,
    cache_path: PathBuf,
}

impl ModelCache {
    #[must_use]
    pub fn new(canonical_path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            canonical_path: canonical_path.into(),
            cache_path: cache_path.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.canonical_path, &config.cache_path)
    }

    #[must_use]
    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Pick the model file to load.
    ///
    /// 1. Online: copy the canonical artifact over the cache. A failed copy is
    ///    logged and the existing cache is kept.
    /// 2. If a cached copy exists, use it.
    /// 3. Otherwise use the canonical artifact.
    ///
    /// Being offline is never an error.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Unavailable` if no model file exists at all.
    #[tracing::instrument(skip(self, connectivity), fields(cache = %self.cache_path.display()))]
    pub async fn resolve_model_path(
        &self,
        connectivity: &dyn Connectivity,
    ) -> Result<PathBuf, ModelError> {
        if connectivity.is_online().await {
            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "Couldn't update model cache");
            }
        }

        if exists(&self.cache_path).await {
            return Ok(self.cache_path.clone());
        }

        if exists(&self.canonical_path).await {
            tracing::debug!("No cached model, using canonical artifact");
            return Ok(self.canonical_path.clone());
        }

        Err(ModelError::Unavailable {
            cache: self.cache_path.clone(),
            canonical: self.canonical_path.clone(),
        })
    }

    /// Copy the canonical artifact over the cached copy.
    ///
    /// The copy goes to a temporary sibling first, so a failure part-way
    /// through leaves the previous cache intact.
    async fn refresh(&self) -> std::io::Result<()> {
        if let Some(parent) = self.cache_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.cache_path.with_extension("partial");
        if let Err(e) = tokio::fs::copy(&self.canonical_path, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        tokio::fs::rename(&staging, &self.cache_path).await?;

        // The label manifest travels with the model. A manifest left over from
        // an earlier model must not outlive it.
        let manifest = labels_path(&self.canonical_path);
        let cached_manifest = labels_path(&self.cache_path);
        if exists(&manifest).await {
            tokio::fs::copy(&manifest, &cached_manifest).await?;
        } else {
            match tokio::fs::remove_file(&cached_manifest).await {
                Ok(()) => tracing::debug!("Removed stale cached label manifest"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!("Model cache refreshed");
        Ok(())
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::connectivity::FixedConnectivity;

    struct Fixture {
        _dir: tempfile::TempDir,
        cache: ModelCache,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(
            dir.path().join("trained_model2.onnx"),
            dir.path().join("local_cache/model.onnx"),
        );
        Fixture { _dir: dir, cache }
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_offline_uses_existing_cache() {
        let f = fixture();
        write(f.cache.canonical_path(), "v2");
        write(f.cache.cache_path(), "v1");

        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(false))
            .await
            .unwrap();

        assert_eq!(path, f.cache.cache_path());
        // Offline never refreshes.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_offline_cache_without_canonical() {
        let f = fixture();
        write(f.cache.cache_path(), "v1");

        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(false))
            .await
            .unwrap();
        assert_eq!(path, f.cache.cache_path());
    }

    #[tokio::test]
    async fn test_online_refreshes_cache() {
        let f = fixture();
        write(f.cache.canonical_path(), "v2");
        write(f.cache.cache_path(), "v1");

        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(true))
            .await
            .unwrap();

        assert_eq!(path, f.cache.cache_path());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_refresh_copies_label_manifest() {
        let f = fixture();
        write(f.cache.canonical_path(), "v2");
        write(&labels_path(f.cache.canonical_path()), "[]");

        f.cache
            .resolve_model_path(&FixedConnectivity(true))
            .await
            .unwrap();

        let copied = std::fs::read_to_string(labels_path(f.cache.cache_path())).unwrap();
        assert_eq!(copied, "[]");
    }

    #[tokio::test]
    async fn test_refresh_drops_manifest_of_previous_model() {
        let f = fixture();
        write(f.cache.canonical_path(), "v2");
        write(&labels_path(f.cache.canonical_path()), "[]");
        f.cache
            .resolve_model_path(&FixedConnectivity(true))
            .await
            .unwrap();

        // The next model ships without a manifest.
        std::fs::remove_file(labels_path(f.cache.canonical_path())).unwrap();
        write(f.cache.canonical_path(), "v3");
        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(true))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v3");
        assert!(!labels_path(f.cache.cache_path()).exists());
    }

    #[tokio::test]
    async fn test_online_refresh_failure_keeps_cache() {
        let f = fixture();
        write(f.cache.cache_path(), "v1");

        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(true))
            .await
            .unwrap();

        assert_eq!(path, f.cache.cache_path());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_canonical() {
        let f = fixture();
        write(f.cache.canonical_path(), "v2");

        let path = f
            .cache
            .resolve_model_path(&FixedConnectivity(false))
            .await
            .unwrap();
        assert_eq!(path, f.cache.canonical_path());
    }

    #[tokio::test]
    async fn test_nothing_available() {
        let f = fixture();
        let result = f.cache.resolve_model_path(&FixedConnectivity(false)).await;
        assert!(matches!(result, Err(ModelError::Unavailable { .. })));

        let result = f.cache.resolve_model_path(&FixedConnectivity(true)).await;
        assert!(matches!(result, Err(ModelError::Unavailable { .. })));
    }
}
