pub mod filter;
pub mod loader;

pub use filter::Filter;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::HashSet;

/// One cell of a parsed table. Serializes to the plain JSON scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Infer a typed value from raw delimited text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Self::Int(n);
        }
        if let Ok(f) = trimmed.parse::<f64>()
            && f.is_finite()
        {
            return Self::Float(f);
        }
        Self::Text(trimmed.to_string())
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Empty),
            },
            Value::String(s) if s.trim().is_empty() => Self::Empty,
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric view: numbers, and text that reads as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Float(f) => json!(f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Ordering used by filters. `None` means the values are not comparable
    /// (an empty cell against anything but another empty cell).
    pub fn compare(&self, other: &CellValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Empty, Self::Empty) => Some(Ordering::Equal),
            (Self::Empty, _) | (_, Self::Empty) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(self.to_text().cmp(&other.to_text())),
            },
        }
    }

    fn kind(&self) -> Option<ColumnType> {
        match self {
            Self::Empty => None,
            Self::Bool(_) => Some(ColumnType::Boolean),
            Self::Int(_) => Some(ColumnType::Integer),
            Self::Float(_) => Some(ColumnType::Number),
            Self::Text(_) => Some(ColumnType::Text),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Number,
    Boolean,
    Text,
    Empty,
    Mixed,
}

impl ColumnType {
    fn merge(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (Empty, x) | (x, Empty) => x,
            (a, b) if a == b => a,
            (Integer, Number) | (Number, Integer) => Number,
            _ => Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// Worksheet this table was read from, for workbooks.
    pub sheet: Option<String>,
    /// Every worksheet of the workbook, in workbook order. Empty for
    /// single-table formats.
    pub sheets: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
            sheet: None,
            sheets: Vec::new(),
        }
    }

    pub fn with_sheets(mut self, sheet: impl Into<String>, sheets: Vec<String>) -> Self {
        self.sheet = Some(sheet.into());
        self.sheets = sheets;
        self
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Exact name first, then a unique case-insensitive match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        resolve_column(&self.columns, name)
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&CellValue::Empty)
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &CellValue> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, column))
    }

    pub fn distinct_values(&self, column: usize) -> Vec<CellValue> {
        let mut seen = HashSet::new();
        self.column_values(column)
            .filter(|v| seen.insert(v.to_json().to_string()))
            .cloned()
            .collect()
    }

    /// Row as a JSON object keyed by column name, in column order.
    pub fn record(&self, row: usize) -> Value {
        let mut record = Map::new();
        for (idx, column) in self.columns.iter().enumerate() {
            record.insert(column.clone(), self.cell(row, idx).to_json());
        }
        Value::Object(record)
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|idx| {
                self.column_values(idx)
                    .filter_map(CellValue::kind)
                    .fold(ColumnType::Empty, ColumnType::merge)
            })
            .collect()
    }

    /// Count, min, max and mean for every integer or number column.
    pub fn summary_stats(&self) -> Value {
        let mut stats = Map::new();
        for (idx, column_type) in self.column_types().into_iter().enumerate() {
            if !matches!(column_type, ColumnType::Integer | ColumnType::Number) {
                continue;
            }
            let values: Vec<f64> = self.column_values(idx).filter_map(CellValue::as_f64).collect();
            if values.is_empty() {
                continue;
            }
            let count = values.len();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / count as f64;
            stats.insert(
                self.columns[idx].clone(),
                json!({ "count": count, "min": min, "max": max, "mean": mean }),
            );
        }
        Value::Object(stats)
    }
}

pub(crate) fn resolve_column(columns: &[String], name: &str) -> Option<usize> {
    if let Some(idx) = columns.iter().position(|c| c == name) {
        return Some(idx);
    }
    let lowered = name.to_lowercase();
    let mut matches = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.to_lowercase() == lowered);
    match (matches.next(), matches.next()) {
        (Some((idx, _)), None) => Some(idx),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

    fn build() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let date = Format::new().set_num_format("yyyy-mm-dd");

        let julio = workbook.add_worksheet();
        julio.set_name("Julio")?;
        for (col, header) in ["id", "fecha", "tipo", "edad"].into_iter().enumerate() {
            julio.write_string(0, col as u16, header)?;
        }
        let rows = [
            (1.0, (2025, 7, 2), "carotídeo", Some(54.0)),
            (2.0, (2025, 7, 15), "venoso", Some(61.5)),
            (3.0, (2025, 7, 28), "venoso", None),
        ];
        for (idx, (id, (y, m, d), tipo, edad)) in rows.into_iter().enumerate() {
            let row = idx as u32 + 1;
            julio.write_number(row, 0, id)?;
            julio.write_datetime_with_format(row, 1, &ExcelDateTime::from_ymd(y, m, d)?, &date)?;
            julio.write_string(row, 2, tipo)?;
            if let Some(edad) = edad {
                julio.write_number(row, 3, edad)?;
            }
        }

        let agosto = workbook.add_worksheet();
        agosto.set_name("Agosto")?;
        agosto.write_string(0, 0, "id")?;
        agosto.write_string(0, 1, "tipo")?;
        agosto.write_number(1, 0, 4.0)?;
        agosto.write_string(1, 1, "arterial")?;
        agosto.write_number(2, 0, 5.0)?;
        agosto.write_string(2, 1, "venoso")?;

        workbook.save_to_buffer()
    }

    /// Two-sheet workbook: `Julio` (id, fecha, tipo, edad; 3 rows) and
    /// `Agosto` (id, tipo; 2 rows).
    pub(crate) fn doppler_workbook() -> Vec<u8> {
        build().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn studies() -> Table {
        Table::new(
            "estudios.csv",
            vec!["paciente".into(), "edad".into(), "resultado".into()],
            vec![
                vec![CellValue::Text("Ana".into()), CellValue::Int(54), CellValue::Text("normal".into())],
                vec![CellValue::Text("Luis".into()), CellValue::Float(61.5), CellValue::Text("estenosis".into())],
                vec![CellValue::Text("Eva".into()), CellValue::Empty, CellValue::Text("normal".into())],
            ],
        )
    }

    #[test]
    fn parse_infers_scalar_types() {
        assert_eq!(CellValue::parse(" 42 "), CellValue::Int(42));
        assert_eq!(CellValue::parse("3.5"), CellValue::Float(3.5));
        assert_eq!(CellValue::parse("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("2025-07-14"), CellValue::Text("2025-07-14".into()));
    }

    #[test]
    fn column_types_merge_numbers_and_skip_empty() {
        let table = studies();
        assert_eq!(
            table.column_types(),
            vec![ColumnType::Text, ColumnType::Number, ColumnType::Text]
        );
    }

    #[test]
    fn distinct_keeps_first_occurrence_order() {
        let table = studies();
        assert_eq!(
            table.distinct_values(2),
            vec![CellValue::Text("normal".into()), CellValue::Text("estenosis".into())]
        );
    }

    #[test]
    fn record_preserves_column_order() {
        let table = studies();
        let record = table.record(0);
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["paciente", "edad", "resultado"]);
        assert_eq!(record["edad"], json!(54));
    }

    #[test]
    fn summary_stats_cover_numeric_columns_only() {
        let stats = studies().summary_stats();
        assert!(stats.get("paciente").is_none());
        assert_eq!(stats["edad"]["count"], json!(2));
        assert_eq!(stats["edad"]["max"], json!(61.5));
    }

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let table = studies();
        assert_eq!(table.column_index("Edad"), Some(1));
        assert_eq!(table.column_index("fecha"), None);
    }

    #[test]
    fn empty_cells_are_not_ordered() {
        assert_eq!(CellValue::Empty.compare(&CellValue::Int(1)), None);
        assert_eq!(
            CellValue::Text("10".into()).compare(&CellValue::Int(9)),
            Some(Ordering::Greater)
        );
    }
}
