use crate::agent::ValidatedArgs;
use crate::error::{AgentError, DataAccessError};
use crate::tools::{ToolArgs, column_values, list_files, query_rows, read_structure};
use crate::traits::{DataSource, ToolResult};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs validated tool calls against the data source. Data failures come
/// back as unsuccessful [`ToolResult`]s; only a broken registry/executor
/// contract is an error.
#[derive(Clone)]
pub struct ToolExecutor {
    source: Arc<dyn DataSource>,
}

impl ToolExecutor {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub async fn execute(
        &self,
        call_id: &str,
        validated: &ValidatedArgs,
    ) -> Result<ToolResult, AgentError> {
        let args = ToolArgs::from_validated(validated).ok_or_else(|| {
            AgentError::InternalContractViolation {
                tool: validated.tool.clone(),
            }
        })?;

        let source = self.source.as_ref();
        let outcome = match &args {
            ToolArgs::ListAvailableFiles => list_files::run(source).await,
            ToolArgs::ReadStructure {
                file_name,
                sheet_name,
                sample_rows,
            } => read_structure::run(source, file_name, sheet_name.as_deref(), *sample_rows).await,
            ToolArgs::QueryRows {
                file_name,
                sheet_name,
                filter_expression,
                limit,
            } => {
                query_rows::run(source, file_name, sheet_name.as_deref(), filter_expression, *limit)
                    .await
            }
            ToolArgs::ColumnValues {
                file_name,
                sheet_name,
                column_name,
                distinct,
            } => {
                column_values::run(source, file_name, sheet_name.as_deref(), column_name, *distinct)
                    .await
            }
        };

        let result = match outcome {
            Ok(payload) => {
                info!(tool = args.tool_name(), call_id, "Tool call succeeded");
                ToolResult::success(call_id, payload)
            }
            Err(e) => {
                warn!(tool = args.tool_name(), call_id, error = %e, "Tool call failed");
                self.failure(call_id, args.sheet_name(), e).await
            }
        };
        Ok(result)
    }

    /// Failure result with hints the model can use to correct itself.
    async fn failure(&self, call_id: &str, sheet: Option<&str>, error: DataAccessError) -> ToolResult {
        let result = ToolResult::error(call_id, error.kind(), error.to_string());
        match &error {
            DataAccessError::FileNotFound(_) => match self.source.list_files().await {
                Ok(files) => result.with_hint("available_files", json!(files)),
                Err(_) => result,
            },
            DataAccessError::UnknownColumn { file, .. } => {
                match self.source.load_table(file, sheet).await {
                    Ok(table) => result.with_hint("available_columns", json!(table.columns)),
                    Err(_) => result,
                }
            }
            DataAccessError::SheetNotFound { file, .. } => {
                match self.source.load_table(file, None).await {
                    Ok(table) => result.with_hint("available_sheets", json!(table.sheets)),
                    Err(_) => result,
                }
            }
            _ => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryDataSource;
    use serde_json::Value;

    fn studies_csv(rows: usize) -> String {
        let mut csv = String::from("id,fecha,tipo,edad,resultado\n");
        for i in 1..=rows {
            let tipo = if i % 2 == 0 { "venoso" } else { "arterial" };
            let resultado = if i % 3 == 0 { "estenosis" } else { "normal" };
            csv.push_str(&format!(
                "{},2025-07-{:02},{},{},{}\n",
                i,
                i,
                tipo,
                40 + i,
                resultado
            ));
        }
        csv
    }

    fn executor() -> ToolExecutor {
        let source = MemoryDataSource::new().with_file("estudios.csv", studies_csv(21));
        ToolExecutor::new(Arc::new(source))
    }

    fn args(tool: &str, values: Value) -> ValidatedArgs {
        ValidatedArgs {
            tool: tool.to_string(),
            values: values.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn lists_files() {
        let result = executor()
            .execute("call_1", &args("list_available_files", json!({})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.payload["files"], json!(["estudios.csv"]));
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn read_structure_reports_row_count() {
        let result = executor()
            .execute(
                "call_1",
                &args("read_structure", json!({ "file_name": "estudios.csv", "sample_rows": 2 })),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.payload["num_rows"], json!(21));
        assert_eq!(result.payload["sample_rows"].as_array().unwrap().len(), 2);
        assert_eq!(result.payload["column_types"]["edad"], json!("integer"));
    }

    #[tokio::test]
    async fn missing_file_is_data_not_error() {
        let result = executor()
            .execute(
                "call_9",
                &args("read_structure", json!({ "file_name": "missing.xlsx" })),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some("FileNotFound"));
        assert_eq!(result.payload["available_files"], json!(["estudios.csv"]));
    }

    #[tokio::test]
    async fn query_rows_counts_all_matches_and_truncates() {
        let result = executor()
            .execute(
                "call_1",
                &args(
                    "query_rows",
                    json!({ "file_name": "estudios.csv", "filter_expression": "tipo == 'venoso'", "limit": 3 }),
                ),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.payload["num_results"], json!(10));
        assert_eq!(result.payload["truncated"], json!(true));
        assert_eq!(result.payload["rows"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn query_rows_is_idempotent() {
        let executor = executor();
        let call = args(
            "query_rows",
            json!({ "file_name": "estudios.csv", "filter_expression": "edad > 50 and resultado == 'normal'" }),
        );
        let first = executor.execute("a", &call).await.unwrap();
        let second = executor.execute("a", &call).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_filter_is_reported() {
        let result = executor()
            .execute(
                "call_1",
                &args(
                    "query_rows",
                    json!({ "file_name": "estudios.csv", "filter_expression": "paciente == 'Ana'" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some("InvalidFilter"));
    }

    #[tokio::test]
    async fn column_values_distinct_and_unknown_column() {
        let executor = executor();
        let distinct = executor
            .execute(
                "c1",
                &args(
                    "column_values",
                    json!({ "file_name": "estudios.csv", "column_name": "tipo", "distinct": true }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(distinct.payload["values"], json!(["arterial", "venoso"]));

        let unknown = executor
            .execute(
                "c2",
                &args(
                    "column_values",
                    json!({ "file_name": "estudios.csv", "column_name": "paciente" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(unknown.error_kind(), Some("UnknownColumn"));
        assert_eq!(unknown.payload["available_columns"][0], json!("id"));
    }

    fn workbook_executor() -> ToolExecutor {
        let source = MemoryDataSource::new()
            .with_file("estudios.xlsx", crate::table::fixtures::doppler_workbook());
        ToolExecutor::new(Arc::new(source))
    }

    #[tokio::test]
    async fn read_structure_lists_workbook_sheets() {
        let result = workbook_executor()
            .execute("c1", &args("read_structure", json!({ "file_name": "estudios.xlsx" })))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.payload["sheet_name"], json!("Julio"));
        assert_eq!(result.payload["sheets"], json!(["Julio", "Agosto"]));
        assert_eq!(result.payload["num_rows"], json!(3));
        assert_eq!(result.payload["column_types"]["id"], json!("integer"));
    }

    #[tokio::test]
    async fn tools_read_the_requested_sheet() {
        let executor = workbook_executor();
        let rows = executor
            .execute(
                "c1",
                &args(
                    "query_rows",
                    json!({ "file_name": "estudios.xlsx", "sheet_name": "Agosto", "filter_expression": "tipo == 'venoso'" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(rows.payload["sheet_name"], json!("Agosto"));
        assert_eq!(rows.payload["num_results"], json!(1));
        assert_eq!(rows.payload["rows"][0]["id"], json!(5));

        let values = executor
            .execute(
                "c2",
                &args(
                    "column_values",
                    json!({ "file_name": "estudios.xlsx", "sheet_name": "Julio", "column_name": "fecha" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(values.payload["values"][0], json!("2025-07-02"));
    }

    #[tokio::test]
    async fn unknown_sheet_lists_available_sheets() {
        let result = workbook_executor()
            .execute(
                "c1",
                &args(
                    "query_rows",
                    json!({ "file_name": "estudios.xlsx", "sheet_name": "Marzo", "filter_expression": "true" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some("SheetNotFound"));
        assert_eq!(result.payload["available_sheets"], json!(["Julio", "Agosto"]));
    }

    #[tokio::test]
    async fn unknown_column_hint_uses_the_same_sheet() {
        let result = workbook_executor()
            .execute(
                "c1",
                &args(
                    "column_values",
                    json!({ "file_name": "estudios.xlsx", "sheet_name": "Agosto", "column_name": "edad" }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(result.error_kind(), Some("UnknownColumn"));
        assert_eq!(result.payload["available_columns"], json!(["id", "tipo"]));
    }

    #[tokio::test]
    async fn unexecutable_tool_is_a_contract_violation() {
        let err = executor()
            .execute("c1", &args("drop_table", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::InternalContractViolation { ref tool } if tool == "drop_table"
        ));
    }
}
