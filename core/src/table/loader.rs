use crate::error::DataAccessError;
use crate::table::{CellValue, Table};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::Timelike;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

impl Table {
    /// Parse raw file bytes, choosing the format from the file extension.
    /// Workbooks yield their first sheet.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Table, DataAccessError> {
        Self::from_bytes_with_sheet(name, bytes, None)
    }

    /// Like [`Table::from_bytes`], selecting a worksheet by name. The sheet
    /// is ignored for formats that hold a single table.
    pub fn from_bytes_with_sheet(
        name: &str,
        bytes: &[u8],
        sheet: Option<&str>,
    ) -> Result<Table, DataAccessError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            return parse_workbook(name, bytes, sheet);
        }

        let text = decode_utf8(name, bytes)?;
        match extension.as_str() {
            "csv" => parse_delimited(name, text, detect_delimiter(text)),
            "tsv" => parse_delimited(name, text, '\t'),
            "json" => parse_json_records(name, text),
            _ => Err(DataAccessError::UnsupportedFormat(name.to_string())),
        }
    }
}

pub fn parse_workbook(name: &str, bytes: &[u8], sheet: Option<&str>) -> Result<Table, DataAccessError> {
    let failed = |reason: String| DataAccessError::ParseFailed {
        file: name.to_string(),
        reason,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| failed(e.to_string()))?;
    let sheets = workbook.sheet_names();

    let selected = match sheet {
        Some(wanted) => sheets
            .iter()
            .find(|s| s.as_str() == wanted)
            .or_else(|| sheets.iter().find(|s| s.eq_ignore_ascii_case(wanted.trim())))
            .cloned()
            .ok_or_else(|| DataAccessError::SheetNotFound {
                file: name.to_string(),
                sheet: wanted.to_string(),
            })?,
        None => sheets
            .first()
            .cloned()
            .ok_or_else(|| failed("workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&selected)
        .map_err(|e| failed(format!("sheet '{}': {}", selected, e)))?;
    let mut records = range.rows();

    let header: Vec<String> = records
        .next()
        .map(|cells| cells.iter().map(|c| sheet_cell(c).to_text()).collect())
        .unwrap_or_default();
    let columns = normalize_headers(header);

    let rows = records
        .map(|cells| {
            let mut row: Vec<CellValue> = cells.iter().map(sheet_cell).collect();
            row.resize(columns.len(), CellValue::Empty);
            row
        })
        .filter(|row| !row.iter().all(CellValue::is_empty))
        .collect();

    Ok(Table::new(name, columns, rows).with_sheets(selected, sheets))
}

/// Whole floats become integers, since spreadsheets store every number as
/// a float. Dates render as ISO text so they order and filter as strings.
fn sheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Int(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.trim().to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.num_seconds_from_midnight() == 0 => {
                CellValue::Text(value.format("%Y-%m-%d").to_string())
            }
            Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn decode_utf8<'a>(name: &str, bytes: &'a [u8]) -> Result<&'a str, DataAccessError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DataAccessError::ParseFailed {
        file: name.to_string(),
        reason: format!("not valid UTF-8: {}", e),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Spreadsheet exports in Spanish locales use `;` because `,` is the decimal
/// separator. Pick whichever appears more often in the header line.
fn detect_delimiter(text: &str) -> char {
    let header = text.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas { ';' } else { ',' }
}

pub fn parse_delimited(name: &str, text: &str, delimiter: char) -> Result<Table, DataAccessError> {
    let mut records = split_records(name, text, delimiter)?.into_iter();

    let Some(header) = records.next() else {
        return Err(DataAccessError::ParseFailed {
            file: name.to_string(),
            reason: "file is empty".to_string(),
        });
    };
    let columns = normalize_headers(header);

    let mut rows = Vec::new();
    for (line_no, record) in records.enumerate() {
        if record.len() > columns.len() {
            return Err(DataAccessError::ParseFailed {
                file: name.to_string(),
                reason: format!(
                    "record {} has {} fields, header has {}",
                    line_no + 2,
                    record.len(),
                    columns.len()
                ),
            });
        }
        let mut row: Vec<CellValue> = record.iter().map(|f| CellValue::parse(f)).collect();
        row.resize(columns.len(), CellValue::Empty);
        rows.push(row);
    }

    Ok(Table::new(name, columns, rows))
}

/// Split delimited text into records, honouring double-quoted fields with
/// `""` escapes and embedded newlines. Blank lines are skipped.
fn split_records(name: &str, text: &str, delimiter: char) -> Result<Vec<Vec<String>>, DataAccessError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(DataAccessError::ParseFailed {
            file: name.to_string(),
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(record);
    }
}

/// Trim header names, name blank headers by position and suffix duplicates
/// with `.1`, `.2`, ...
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = match name.trim() {
            "" => format!("column_{}", idx + 1),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while columns.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        columns.push(candidate);
    }
    columns
}

/// A JSON file is a table when it is an array of objects, or an object
/// holding such an array (e.g. `{"records": [...]}`).
pub fn parse_json_records(name: &str, text: &str) -> Result<Table, DataAccessError> {
    let value: Value = serde_json::from_str(text).map_err(|e| DataAccessError::ParseFailed {
        file: name.to_string(),
        reason: e.to_string(),
    })?;

    let records = match &value {
        Value::Array(items) => Some(items),
        Value::Object(fields) => fields.values().find_map(|v| match v {
            Value::Array(items) if items.iter().any(Value::is_object) => Some(items),
            _ => None,
        }),
        _ => None,
    }
    .ok_or_else(|| DataAccessError::ParseFailed {
        file: name.to_string(),
        reason: "expected an array of records".to_string(),
    })?;

    let mut columns: Vec<String> = Vec::new();
    for item in records {
        if let Value::Object(fields) = item {
            for key in fields.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(Value::as_object)
        .map(|fields| {
            columns
                .iter()
                .map(|c| fields.get(c).map(CellValue::from_json).unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    Ok(Table::new(name, columns, rows))
}
