use crate::error::DataAccessError;
use crate::traits::{DataSource, ParamKind, ParamSpec, ToolSpec};
use serde_json::{Value, json};

pub const NAME: &str = "read_structure";
pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const MAX_SAMPLE_ROWS: usize = 50;

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: "Describe a data file: total row count, column names, inferred column \
                      types, summary statistics for numeric columns and a few example rows. \
                      For spreadsheets it also lists the sheet names. \
                      Call this before filtering so you know the exact column names."
            .to_string(),
        parameters: vec![
            ParamSpec::required("file_name", ParamKind::String, "Name of the file to inspect"),
            super::sheet_param(),
            ParamSpec::optional(
                "sample_rows",
                ParamKind::Count,
                "Number of example rows to include (default 5, max 50)",
            ),
        ],
    }
}

pub async fn run(
    source: &dyn DataSource,
    file_name: &str,
    sheet_name: Option<&str>,
    sample_rows: usize,
) -> Result<Value, DataAccessError> {
    let table = source.load_table(file_name, sheet_name).await?;

    let column_types: serde_json::Map<String, Value> = table
        .columns
        .iter()
        .zip(table.column_types())
        .map(|(name, kind)| (name.clone(), json!(kind)))
        .collect();

    let samples: Vec<Value> = (0..table.num_rows().min(sample_rows))
        .map(|row| table.record(row))
        .collect();

    Ok(json!({
        "file_name": table.name,
        "sheet_name": table.sheet,
        "sheets": table.sheets,
        "num_rows": table.num_rows(),
        "num_columns": table.num_columns(),
        "columns": table.columns,
        "column_types": column_types,
        "summary_stats": table.summary_stats(),
        "sample_rows": samples,
    }))
}
