use crate::data::TableCache;
use crate::error::DataAccessError;
use crate::table::Table;
use crate::traits::DataSource;
use crate::traits::data::table_key;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Files under a local directory, addressed by their path relative to it.
/// This is where a synced copy of the object-store bucket lives.
pub struct LocalDataSource {
    root: PathBuf,
    cache: TableCache,
}

impl LocalDataSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: TableCache::new(),
        }
    }

    fn scan(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let is_hidden = relative
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
                if is_hidden {
                    return None;
                }
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        files.sort();
        files
    }

    /// Map a requested name to a listed file. Accepts the relative path or,
    /// when it is unambiguous, just the file name.
    fn resolve(&self, name: &str) -> Result<String, DataAccessError> {
        let not_found = || DataAccessError::FileNotFound(name.to_string());
        let requested = name.trim().trim_start_matches("./");
        if is_unsafe_name(requested) {
            return Err(not_found());
        }

        let files = self.scan();
        if files.iter().any(|f| f == requested) {
            return Ok(requested.to_string());
        }

        let mut by_basename = files
            .iter()
            .filter(|f| f.rsplit('/').next() == Some(requested));
        match (by_basename.next(), by_basename.next()) {
            (Some(file), None) => Ok(file.clone()),
            _ => Err(not_found()),
        }
    }
}

fn is_unsafe_name(name: &str) -> bool {
    name.is_empty()
        || name.contains("..")
        || name.starts_with('/')
        || name.contains('\\')
        || name.contains('\0')
}

#[async_trait]
impl DataSource for LocalDataSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_files(&self) -> Result<Vec<String>, DataAccessError> {
        let files = self.scan();
        debug!(root = %self.root.display(), count = files.len(), "Listed data files");
        Ok(files)
    }

    async fn get_file_bytes(&self, name: &str) -> Result<Vec<u8>, DataAccessError> {
        let relative = self.resolve(name)?;
        tokio::fs::read(self.root.join(&relative))
            .await
            .map_err(|_| DataAccessError::FileNotFound(name.to_string()))
    }

    async fn load_table(&self, name: &str, sheet: Option<&str>) -> Result<Arc<Table>, DataAccessError> {
        let relative = self.resolve(name)?;
        self.cache
            .get_or_load(&table_key(&relative, sheet), || async {
                let bytes = tokio::fs::read(self.root.join(&relative))
                    .await
                    .map_err(|_| DataAccessError::FileNotFound(name.to_string()))?;
                let table = Table::from_bytes_with_sheet(&relative, &bytes, sheet)?;
                info!(
                    file = %relative,
                    sheet = table.sheet.as_deref().unwrap_or("-"),
                    rows = table.num_rows(),
                    columns = table.num_columns(),
                    "Loaded table"
                );
                Ok(table)
            })
            .await
    }

    async fn refresh(&self) {
        let dropped = self.cache.len().await;
        self.cache.clear().await;
        debug!(root = %self.root.display(), dropped, "Cleared table cache");
    }
}
