use crate::error::DataAccessError;
use crate::table::Filter;
use crate::traits::{DataSource, ParamKind, ParamSpec, ToolSpec};
use serde_json::{Value, json};

pub const NAME: &str = "query_rows";
pub const DEFAULT_LIMIT: usize = 200;
pub const MAX_LIMIT: usize = 1000;

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: "Return the rows of a data file that match a boolean filter. \
                      `num_results` always counts every match even when `rows` is truncated. \
                      Filter syntax: comparisons with == != < <= > >= and `contains`, \
                      combined with and / or / not and parentheses; `col in ['a', 'b']`; \
                      quote text with '...' and column names containing spaces with backticks; \
                      `null` matches empty cells; the filter `true` selects every row."
            .to_string(),
        parameters: vec![
            ParamSpec::required("file_name", ParamKind::String, "Name of the file to query"),
            super::sheet_param(),
            ParamSpec::required(
                "filter_expression",
                ParamKind::String,
                "Filter, e.g. edad >= 60 and `Tipo de estudio` == 'venoso'",
            ),
            ParamSpec::optional(
                "limit",
                ParamKind::Count,
                "Maximum number of rows to return (default 200, max 1000)",
            ),
        ],
    }
}

pub async fn run(
    source: &dyn DataSource,
    file_name: &str,
    sheet_name: Option<&str>,
    filter_expression: &str,
    limit: usize,
) -> Result<Value, DataAccessError> {
    let table = source.load_table(file_name, sheet_name).await?;
    let filter = Filter::compile(filter_expression, &table.columns)?;
    let matches = filter.apply(&table);

    let rows: Vec<Value> = matches
        .iter()
        .take(limit)
        .map(|&row| table.record(row))
        .collect();

    Ok(json!({
        "file_name": table.name,
        "sheet_name": table.sheet,
        "filter_expression": filter_expression,
        "num_results": matches.len(),
        "truncated": matches.len() > rows.len(),
        "rows": rows,
    }))
}
