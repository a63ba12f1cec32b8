use crate::error::DataAccessError;
use crate::traits::{DataSource, ParamKind, ParamSpec, ToolSpec};
use serde_json::{Value, json};

pub const NAME: &str = "column_values";

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: "List the values of one column of a data file, in row order, or only \
                      its distinct values in order of first appearance."
            .to_string(),
        parameters: vec![
            ParamSpec::required("file_name", ParamKind::String, "Name of the file"),
            super::sheet_param(),
            ParamSpec::required("column_name", ParamKind::String, "Exact column name"),
            ParamSpec::optional(
                "distinct",
                ParamKind::Boolean,
                "Return only distinct values (default false)",
            ),
        ],
    }
}

pub async fn run(
    source: &dyn DataSource,
    file_name: &str,
    sheet_name: Option<&str>,
    column_name: &str,
    distinct: bool,
) -> Result<Value, DataAccessError> {
    let table = source.load_table(file_name, sheet_name).await?;
    let column = table
        .column_index(column_name)
        .ok_or_else(|| DataAccessError::UnknownColumn {
            file: table.name.clone(),
            column: column_name.to_string(),
        })?;

    let values: Vec<Value> = if distinct {
        table
            .distinct_values(column)
            .iter()
            .map(|v| v.to_json())
            .collect()
    } else {
        table.column_values(column).map(|v| v.to_json()).collect()
    };

    Ok(json!({
        "file_name": table.name,
        "sheet_name": table.sheet,
        "column_name": table.columns[column],
        "distinct": distinct,
        "num_values": values.len(),
        "values": values,
    }))
}
