use crate::agent::ValidatedArgs;
use crate::traits::{ParamKind, ParamSpec, ToolSpec};
use serde_json::{Map, Value};

pub mod column_values;
pub mod executor;
pub mod list_files;
pub mod query_rows;
pub mod read_structure;

pub use executor::ToolExecutor;

/// Arguments of one tool call, typed per tool. Built only from arguments
/// the registry has already checked against the tool's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgs {
    ListAvailableFiles,
    ReadStructure {
        file_name: String,
        sheet_name: Option<String>,
        sample_rows: usize,
    },
    QueryRows {
        file_name: String,
        sheet_name: Option<String>,
        filter_expression: String,
        limit: usize,
    },
    ColumnValues {
        file_name: String,
        sheet_name: Option<String>,
        column_name: String,
        distinct: bool,
    },
}

impl ToolArgs {
    /// `None` when no tool of this name exists, which means the registry
    /// advertised something this crate cannot run.
    pub fn from_validated(args: &ValidatedArgs) -> Option<ToolArgs> {
        let values = &args.values;
        let parsed = match args.tool.as_str() {
            list_files::NAME => ToolArgs::ListAvailableFiles,
            read_structure::NAME => ToolArgs::ReadStructure {
                file_name: extract_string_arg(values, "file_name"),
                sheet_name: extract_string_arg_opt(values, "sheet_name"),
                sample_rows: extract_usize_arg_opt(
                    values,
                    "sample_rows",
                    read_structure::DEFAULT_SAMPLE_ROWS,
                )
                .min(read_structure::MAX_SAMPLE_ROWS),
            },
            query_rows::NAME => ToolArgs::QueryRows {
                file_name: extract_string_arg(values, "file_name"),
                sheet_name: extract_string_arg_opt(values, "sheet_name"),
                filter_expression: extract_string_arg(values, "filter_expression"),
                limit: extract_usize_arg_opt(values, "limit", query_rows::DEFAULT_LIMIT)
                    .min(query_rows::MAX_LIMIT),
            },
            column_values::NAME => ToolArgs::ColumnValues {
                file_name: extract_string_arg(values, "file_name"),
                sheet_name: extract_string_arg_opt(values, "sheet_name"),
                column_name: extract_string_arg(values, "column_name"),
                distinct: extract_bool_arg_opt(values, "distinct", false),
            },
            _ => return None,
        };
        Some(parsed)
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::ListAvailableFiles => list_files::NAME,
            Self::ReadStructure { .. } => read_structure::NAME,
            Self::QueryRows { .. } => query_rows::NAME,
            Self::ColumnValues { .. } => column_values::NAME,
        }
    }

    pub fn sheet_name(&self) -> Option<&str> {
        match self {
            Self::ListAvailableFiles => None,
            Self::ReadStructure { sheet_name, .. }
            | Self::QueryRows { sheet_name, .. }
            | Self::ColumnValues { sheet_name, .. } => sheet_name.as_deref(),
        }
    }
}

/// Optional `sheet_name` parameter shared by the per-file tools.
pub(crate) fn sheet_param() -> ParamSpec {
    ParamSpec::optional(
        "sheet_name",
        ParamKind::String,
        "Worksheet to read when the file is a spreadsheet (default: the first sheet)",
    )
}

/// The fixed tool catalog, in the order it is advertised to the model.
pub fn default_specs() -> Vec<ToolSpec> {
    vec![
        list_files::spec(),
        read_structure::spec(),
        query_rows::spec(),
        column_values::spec(),
    ]
}

pub fn extract_string_arg(args: &Map<String, Value>, key: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Blank strings count as absent.
pub fn extract_string_arg_opt(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn extract_usize_arg_opt(args: &Map<String, Value>, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

pub fn extract_bool_arg_opt(args: &Map<String, Value>, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validated(tool: &str, values: Value) -> ValidatedArgs {
        ValidatedArgs {
            tool: tool.to_string(),
            values: values.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn optional_arguments_take_defaults() {
        let args = ToolArgs::from_validated(&validated(
            "read_structure",
            json!({ "file_name": "estudios.csv" }),
        ));
        assert_eq!(
            args,
            Some(ToolArgs::ReadStructure {
                file_name: "estudios.csv".into(),
                sheet_name: None,
                sample_rows: read_structure::DEFAULT_SAMPLE_ROWS,
            })
        );
    }

    #[test]
    fn sheet_name_is_carried_when_given() {
        let args = ToolArgs::from_validated(&validated(
            "column_values",
            json!({ "file_name": "estudios.xlsx", "sheet_name": " Agosto ", "column_name": "tipo" }),
        ))
        .unwrap();
        assert_eq!(args.sheet_name(), Some("Agosto"));

        let blank = ToolArgs::from_validated(&validated(
            "query_rows",
            json!({ "file_name": "a.csv", "sheet_name": "", "filter_expression": "true" }),
        ))
        .unwrap();
        assert_eq!(blank.sheet_name(), None);
    }

    #[test]
    fn oversized_limits_are_capped() {
        let args = ToolArgs::from_validated(&validated(
            "query_rows",
            json!({ "file_name": "a.csv", "filter_expression": "true", "limit": 1_000_000 }),
        ));
        match args {
            Some(ToolArgs::QueryRows { limit, .. }) => assert_eq!(limit, query_rows::MAX_LIMIT),
            other => panic!("unexpected args {:?}", other),
        }
    }

    #[test]
    fn unknown_tool_has_no_variant() {
        assert_eq!(ToolArgs::from_validated(&validated("drop_table", json!({}))), None);
    }

    #[test]
    fn catalog_order_is_fixed() {
        let names: Vec<String> = default_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["list_available_files", "read_structure", "query_rows", "column_values"]
        );
    }
}
