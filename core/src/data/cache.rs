use crate::error::DataAccessError;
use crate::table::Table;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-through cache of parsed tables keyed by file name.
///
/// Two sessions loading the same name concurrently may both parse it, but
/// only the first insert is kept and both get that copy back.
#[derive(Default)]
pub struct TableCache {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().await.get(name).cloned()
    }

    pub async fn get_or_load<F, Fut>(&self, name: &str, load: F) -> Result<Arc<Table>, DataAccessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table, DataAccessError>>,
    {
        if let Some(table) = self.get(name).await {
            return Ok(table);
        }

        let table = Arc::new(load().await?);
        let mut tables = self.tables.write().await;
        Ok(tables.entry(name.to_string()).or_insert(table).clone())
    }

    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
