use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt;
use std::io::Read;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// A single cell of a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Value {
    /// Parse a raw text cell: empty and `nan` cells are missing, finite numbers are
    /// numbers, everything else (`inf` included) stays text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Value::Missing,
            Ok(v) if v.is_finite() => Value::Number(v),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view used by range and statistics code. Dates map to epoch seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            Value::Date(d) => Some(d.and_utc().timestamp_millis() as f64 / 1000.0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "nan"),
            Value::Number(v) => write!(f, "{}", format_number(*v)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => {
                if d.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if !v.is_finite() {
            Value::Missing
        } else {
            Value::Number(v)
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Integral values print without a trailing `.0` so group labels read naturally.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Parse a date or datetime string using the formats the loader understands.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Column-oriented table. Every operation returns a new table; nothing mutates in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    headers: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build from named columns. All columns must have the same length.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if let Some((name, _)) = columns.iter().find(|(_, v)| v.len() != n_rows) {
            return Err(anyhow!(
                "Column '{}' has a different length than the other columns",
                name
            ));
        }
        let (headers, columns) = columns.into_iter().unzip();
        Ok(Self { headers, columns })
    }

    /// Build from row-major text cells (the shape a CSV reader produces).
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut columns = vec![Vec::with_capacity(rows.len()); headers.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(anyhow!(
                    "Row {} has {} fields but the header has {}",
                    i + 1,
                    row.len(),
                    headers.len()
                ));
            }
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(Value::parse(cell));
            }
        }
        Ok(Self { headers, columns })
    }

    /// Read a CSV document with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV record {}", i + 1))?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        Self::from_rows(headers, rows)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    /// Create a Dataset from a JSON array of objects. Headers come from the first object.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Input data must be a JSON array of objects"))?;

        let first_obj = match array.first() {
            Some(first) => first
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?,
            None => return Ok(Self::default()),
        };

        let headers: Vec<String> = first_obj.keys().cloned().collect();
        let mut columns = vec![Vec::with_capacity(array.len()); headers.len()];

        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;

            for (header, col) in headers.iter().zip(columns.iter_mut()) {
                let cell = match obj.get(header) {
                    Some(JsonValue::String(s)) => Value::parse(s),
                    Some(JsonValue::Number(n)) => n.as_f64().map(Value::from).unwrap_or(Value::Missing),
                    Some(JsonValue::Bool(b)) => Value::Text(b.to_string()),
                    Some(JsonValue::Null) | None => Value::Missing,
                    _ => return Err(anyhow!("Unsupported value type for field '{}'", header)),
                };
                col.push(cell);
            }
        }

        Ok(Self { headers, columns })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn has_columns(&self, names: &[String]) -> bool {
        names.iter().all(|n| self.has_column(n))
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.get(row))
    }

    /// Same headers, zero rows.
    pub fn empty_like(&self) -> Self {
        Self {
            headers: self.headers.clone(),
            columns: vec![Vec::new(); self.headers.len()],
        }
    }

    /// Copy the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|col| rows.iter().map(|&r| col[r].clone()).collect())
            .collect();
        Self {
            headers: self.headers.clone(),
            columns,
        }
    }

    /// Copy the rows whose mask entry is true.
    pub fn mask(&self, mask: &[bool]) -> Self {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&rows)
    }

    /// Replace (or append) a column, returning the new table.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Self {
        let mut out = self.clone();
        match out.column_index(name) {
            Some(i) => out.columns[i] = values,
            None => {
                out.headers.push(name.to_string());
                out.columns.push(values);
            }
        }
        out
    }

    /// Same data under new headers. Header count must match.
    pub fn with_headers(&self, headers: Vec<String>) -> Self {
        debug_assert_eq!(headers.len(), self.headers.len());
        Self {
            headers,
            columns: self.columns.clone(),
        }
    }

    /// Keep only the named columns that exist, in the given order.
    pub fn select(&self, names: &[String]) -> Self {
        let mut headers = Vec::new();
        let mut columns = Vec::new();
        for name in names {
            if let Some(i) = self.column_index(name) {
                if !headers.contains(name) {
                    headers.push(name.clone());
                    columns.push(self.columns[i].clone());
                }
            }
        }
        Self { headers, columns }
    }

    /// Append the rows of `other`, matching columns by name. Columns absent from
    /// either side are filled with missing values.
    pub fn concat(&self, other: &Dataset) -> Self {
        if self.headers.is_empty() {
            return other.clone();
        }
        let mut out = self.clone();
        for header in &other.headers {
            if !out.has_column(header) {
                let n = out.n_rows();
                out.headers.push(header.clone());
                out.columns.push(vec![Value::Missing; n]);
            }
        }
        let n_other = other.n_rows();
        for (header, col) in out.headers.iter().zip(out.columns.iter_mut()) {
            match other.column(header) {
                Some(values) => col.extend(values.iter().cloned()),
                None => col.extend(std::iter::repeat(Value::Missing).take(n_other)),
            }
        }
        out
    }

    /// Non-missing numeric values of a column.
    pub fn numeric_values(&self, name: &str) -> Vec<f64> {
        self.column(name)
            .map(|c| c.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default()
    }

    /// True if every non-missing entry is a number.
    pub fn is_numeric(&self, name: &str) -> bool {
        self.column(name)
            .map(|c| c.iter().all(|v| matches!(v, Value::Missing | Value::Number(_))))
            .unwrap_or(false)
    }

    /// Convert a column to numbers or dates. Returns `None` when some entry is neither.
    pub fn coerce_numeric_or_date(&self, name: &str) -> Option<Self> {
        let col = self.column(name)?;
        if col.iter().all(|v| matches!(v, Value::Missing | Value::Number(_) | Value::Date(_))) {
            return Some(self.clone());
        }
        let converted: Option<Vec<Value>> = col
            .iter()
            .map(|v| match v {
                Value::Text(s) => parse_date(s).map(Value::Date),
                other => Some(other.clone()),
            })
            .collect();
        converted.map(|values| self.with_column(name, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(Value::parse("1.5"), Value::Number(1.5));
        assert_eq!(Value::parse(""), Value::Missing);
        assert_eq!(Value::parse("NaN"), Value::Missing);
        assert_eq!(Value::parse("Die 2"), Value::Text("Die 2".to_string()));
        assert_eq!(Value::parse("inf"), Value::Text("inf".to_string()));
        assert_eq!(Value::parse("-Infinity"), Value::Text("-Infinity".to_string()));
        assert_eq!(Value::from(f64::INFINITY), Value::Missing);
        assert_eq!(Value::Number(f64::NEG_INFINITY).as_f64(), None);
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_from_csv() {
        let data = Dataset::from_csv_str("x,y,g\n1,10,A\n2,,B\n").unwrap();
        assert_eq!(data.headers(), &["x", "y", "g"]);
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.value(1, "y"), Some(&Value::Missing));
        assert_eq!(data.numeric_values("y"), vec![10.0]);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!([
            {"a": 1, "b": "x"},
            {"a": 2.5, "b": null}
        ]);
        let data = Dataset::from_json(&json).unwrap();
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.value(1, "a"), Some(&Value::Number(2.5)));
        assert_eq!(data.value(1, "b"), Some(&Value::Missing));
    }

    #[test]
    fn test_from_json_rejects_scalars() {
        assert!(Dataset::from_json(&serde_json::json!(3)).is_err());
        assert!(Dataset::from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_mask_and_take_copy() {
        let data = Dataset::from_csv_str("x\n1\n2\n3\n").unwrap();
        let sub = data.mask(&[true, false, true]);
        assert_eq!(sub.numeric_values("x"), vec![1.0, 3.0]);
        // parent untouched
        assert_eq!(data.n_rows(), 3);
    }

    #[test]
    fn test_coerce_dates() {
        let data = Dataset::from_csv_str("t\n2024-01-01\n2024-01-02 12:00:00\n").unwrap();
        let coerced = data.coerce_numeric_or_date("t").unwrap();
        assert!(matches!(coerced.value(0, "t"), Some(Value::Date(_))));
        assert_eq!(coerced.numeric_values("t").len(), 2);

        let bad = Dataset::from_csv_str("t\nhello\n").unwrap();
        assert!(bad.coerce_numeric_or_date("t").is_none());
    }

    #[test]
    fn test_concat_fills_missing() {
        let a = Dataset::from_csv_str("x,y\n1,2\n").unwrap();
        let b = Dataset::from_csv_str("x,z\n3,4\n").unwrap();
        let c = a.concat(&b);
        assert_eq!(c.headers(), &["x", "y", "z"]);
        assert_eq!(c.n_rows(), 2);
        assert_eq!(c.value(1, "y"), Some(&Value::Missing));
        assert_eq!(c.value(0, "z"), Some(&Value::Missing));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let res = Dataset::from_columns(vec![
            ("a".to_string(), vec![Value::Number(1.0)]),
            ("b".to_string(), vec![]),
        ]);
        assert!(res.is_err());
    }
}
