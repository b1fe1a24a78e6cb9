//! Cell and record model shared by every stage of the engine.
//!
//! A [`Record`] is an ordered mapping from column name to [`Cell`]. Cells keep
//! whatever the loader produced (text from delimited files, typed values from
//! JSON); semantic interpretation happens on demand in [`crate::coerce`].

use std::{borrow::Cow, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type Record = IndexMap<String, Cell>;

static ABSENT: Cell = Cell::Absent;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Absent,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl Cell {
    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    /// Absent cells and empty text carry no value for inference purposes.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Absent => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            Cell::Absent => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Absent)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Absent,
            serde_json::Value::Bool(b) => Cell::Boolean(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Cell::Number(f),
                None => Cell::Text(n.to_string()),
            },
            serde_json::Value::String(s) => Cell::Text(s),
            nested => Cell::Text(nested.to_string()),
        }
    }
}

/// Returns the cell stored under `column`, treating missing keys as absent.
pub fn cell<'a>(record: &'a Record, column: &str) -> &'a Cell {
    record.get(column).unwrap_or(&ABSENT)
}

pub fn display_value(record: &Record, column: &str) -> String {
    cell(record, column).as_display().into_owned()
}

/// Builds a record from `(column, value)` pairs, preserving their order.
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Cell>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Avoid rendering negative zero as "-0".
        "0".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_normalizes_absent_to_empty() {
        assert_eq!(Cell::Absent.as_display(), "");
        assert_eq!(Cell::from("abc").as_display(), "abc");
        assert_eq!(Cell::Number(10.0).as_display(), "10");
        assert_eq!(Cell::Number(1.5).as_display(), "1.5");
        assert_eq!(Cell::Number(-0.0).as_display(), "0");
        assert_eq!(Cell::Boolean(true).as_display(), "true");
    }

    #[test]
    fn blank_covers_absent_and_empty_text_only() {
        assert!(Cell::Absent.is_blank());
        assert!(Cell::from("").is_blank());
        assert!(!Cell::from(" ").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert!(!Cell::Boolean(false).is_blank());
    }

    #[test]
    fn missing_column_reads_as_absent() {
        let row = record([("city", "A")]);
        assert!(cell(&row, "amount").is_absent());
        assert_eq!(display_value(&row, "city"), "A");
        assert_eq!(display_value(&row, "amount"), "");
    }

    #[test]
    fn json_values_map_onto_cells() {
        let value: serde_json::Value =
            serde_json::from_str(r#"[null, true, 3.25, "x", {"a": 1}]"#).unwrap();
        let cells: Vec<Cell> = value
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .map(Cell::from)
            .collect();
        assert_eq!(
            cells,
            vec![
                Cell::Absent,
                Cell::Boolean(true),
                Cell::Number(3.25),
                Cell::from("x"),
                Cell::from(r#"{"a":1}"#),
            ]
        );
    }

    #[test]
    fn record_preserves_insertion_order() {
        let row = record([("b", "1"), ("a", "2"), ("c", "3")]);
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
