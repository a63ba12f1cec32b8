use crate::error::DataAccessError;
use crate::table::Table;
use async_trait::async_trait;
use std::sync::Arc;

/// Where the tabular files come from. Implementations own any caching;
/// callers only consult it.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn list_files(&self) -> Result<Vec<String>, DataAccessError>;

    async fn get_file_bytes(&self, name: &str) -> Result<Vec<u8>, DataAccessError>;

    /// Parsed table for `name`, or for one worksheet of it when `sheet` is
    /// given. The default reads the bytes on every call; sources with a
    /// cache override it.
    async fn load_table(&self, name: &str, sheet: Option<&str>) -> Result<Arc<Table>, DataAccessError> {
        let bytes = self.get_file_bytes(name).await?;
        Table::from_bytes_with_sheet(name, &bytes, sheet).map(Arc::new)
    }

    /// Drop any cached tables so the next load re-reads the files.
    async fn refresh(&self) {}
}

/// Cache key for one sheet of a file.
pub(crate) fn table_key(name: &str, sheet: Option<&str>) -> String {
    match sheet {
        Some(sheet) => format!("{name}#{sheet}"),
        None => name.to_string(),
    }
}
