// File-backed Command Catalog
// <root>/common/<verb> and <root>/<family>/<verb>, cached with a refresh interval.

use async_trait::async_trait;
use hostward_core::port::{CatalogScope, CommandCatalog, TimeProvider, Verb};
use hostward_core::{AppError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};

#[derive(Debug, Clone)]
struct CachedTemplate {
    text: String,
    loaded_at: i64,
}

/// Template cache over a catalog directory.
///
/// Each template is read lazily and kept for `refresh_interval`; the next
/// lookup after that re-reads it, so edits on disk show up without a restart.
pub struct FsCommandCatalog {
    root: PathBuf,
    refresh_interval_millis: i64,
    time_provider: Arc<dyn TimeProvider>,
    cache: RwLock<HashMap<(CatalogScope, Verb), CachedTemplate>>,
}

impl FsCommandCatalog {
    /// # Errors
    /// - `AppError::Config` if `root` is not a directory
    pub fn new(
        root: impl Into<PathBuf>,
        refresh_interval: Duration,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AppError::Config(format!(
                "command catalog root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            refresh_interval_millis: refresh_interval.as_millis() as i64,
            time_provider,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn path_of(&self, scope: CatalogScope, verb: Verb) -> PathBuf {
        self.root.join(scope.dir_name()).join(verb.as_str())
    }

    fn is_fresh(&self, cached: &CachedTemplate, now: i64) -> bool {
        now - cached.loaded_at < self.refresh_interval_millis
    }
}

#[async_trait]
impl CommandCatalog for FsCommandCatalog {
    async fn template(&self, scope: CatalogScope, verb: Verb) -> Result<String> {
        let now = self.time_provider.now_millis();
        if let Some(cached) = self.cache.read().await.get(&(scope, verb)) {
            if self.is_fresh(cached, now) {
                return Ok(cached.text.clone());
            }
        }

        let path = self.path_of(scope, verb);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "command template unreadable");
            AppError::Config(format!(
                "missing command template {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(scope = %scope, verb = %verb, bytes = text.len(), "command template loaded");

        self.cache.write().await.insert(
            (scope, verb),
            CachedTemplate {
                text: text.clone(),
                loaded_at: now,
            },
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::domain::OsFamily;
    use hostward_core::port::time_provider::mocks::ManualTimeProvider;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("common")).unwrap();
        fs::create_dir_all(dir.path().join("ubuntu")).unwrap();
        fs::write(dir.path().join("common/mv"), "sudo mv %s %s\n").unwrap();
        fs::write(dir.path().join("ubuntu/user_add"), "sudo useradd -m -p '%s' %s\n").unwrap();
        dir
    }

    fn catalog(dir: &TempDir, clock: Arc<ManualTimeProvider>) -> FsCommandCatalog {
        FsCommandCatalog::new(dir.path(), Duration::from_secs(60), clock).unwrap()
    }

    #[tokio::test]
    async fn test_loads_by_scope() {
        let dir = catalog_dir();
        let catalog = catalog(&dir, Arc::new(ManualTimeProvider::new(0)));

        let mv = catalog.template(CatalogScope::Common, Verb::Move).await.unwrap();
        assert_eq!(mv, "sudo mv %s %s\n");
        let add = catalog
            .template(CatalogScope::Family(OsFamily::Ubuntu), Verb::UserAdd)
            .await
            .unwrap();
        assert!(add.starts_with("sudo useradd"));
    }

    #[tokio::test]
    async fn test_missing_template_is_config_error() {
        let dir = catalog_dir();
        let catalog = catalog(&dir, Arc::new(ManualTimeProvider::new(0)));

        let err = catalog
            .template(CatalogScope::Family(OsFamily::CentOS), Verb::UserAdd)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_edits_show_up_after_refresh_interval() {
        let dir = catalog_dir();
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let catalog = catalog(&dir, clock.clone());

        catalog.template(CatalogScope::Common, Verb::Move).await.unwrap();
        fs::write(dir.path().join("common/mv"), "sudo mv -n %s %s\n").unwrap();

        clock.advance_millis(59_999);
        let cached = catalog.template(CatalogScope::Common, Verb::Move).await.unwrap();
        assert_eq!(cached, "sudo mv %s %s\n");

        clock.advance_millis(1);
        let refreshed = catalog.template(CatalogScope::Common, Verb::Move).await.unwrap();
        assert_eq!(refreshed, "sudo mv -n %s %s\n");
    }

    #[test]
    fn test_root_must_exist() {
        let result = FsCommandCatalog::new(
            "/nonexistent/hostward/commands",
            Duration::from_secs(60),
            Arc::new(ManualTimeProvider::new(0)),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
