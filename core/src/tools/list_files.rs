use crate::error::DataAccessError;
use crate::traits::{DataSource, ToolSpec};
use serde_json::{Value, json};

pub const NAME: &str = "list_available_files";

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: "List every data file available for analysis.".to_string(),
        parameters: vec![],
    }
}

pub async fn run(source: &dyn DataSource) -> Result<Value, DataAccessError> {
    let files = source.list_files().await?;
    Ok(json!({
        "num_files": files.len(),
        "files": files,
    }))
}
