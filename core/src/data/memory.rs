use crate::data::TableCache;
use crate::error::DataAccessError;
use crate::table::Table;
use crate::traits::DataSource;
use crate::traits::data::table_key;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Files held in memory, e.g. bytes already fetched from the object store.
#[derive(Default)]
pub struct MemoryDataSource {
    files: BTreeMap<String, Vec<u8>>,
    cache: TableCache,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), bytes.into());
        self
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_files(&self) -> Result<Vec<String>, DataAccessError> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn get_file_bytes(&self, name: &str) -> Result<Vec<u8>, DataAccessError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| DataAccessError::FileNotFound(name.to_string()))
    }

    async fn load_table(&self, name: &str, sheet: Option<&str>) -> Result<Arc<Table>, DataAccessError> {
        self.cache
            .get_or_load(&table_key(name, sheet), || async {
                let bytes = self.get_file_bytes(name).await?;
                Table::from_bytes_with_sheet(name, &bytes, sheet)
            })
            .await
    }

    async fn refresh(&self) {
        self.cache.clear().await;
    }
}
