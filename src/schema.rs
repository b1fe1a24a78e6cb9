//! Column descriptors and sample-based type inference.
//!
//! Inference looks at the first [`SCHEMA_SAMPLE_ROWS`] records, takes the
//! column set from the first of them, and classifies each column from its
//! first [`TYPE_SAMPLE_VALUES`] non-blank values. Candidates are ruled out as
//! values are observed and the survivor with the highest priority wins:
//! number, then boolean, then date, then string.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    coerce,
    data::{Cell, Record, cell},
};

pub const SCHEMA_SAMPLE_ROWS: usize = 200;
pub const TYPE_SAMPLE_VALUES: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "number", "boolean", "date"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ColumnType::String),
            "number" => Ok(ColumnType::Number),
            "boolean" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            other => Err(anyhow!(
                "Unknown column type '{other}'. Expected one of: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    /// A schema with no columns means "no data loaded", not "nothing to filter".
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.datatype)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Adds `column`, replacing an existing descriptor of the same name in place.
    pub fn upsert(&mut self, column: ColumnMeta) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_number: bool,
    possible_boolean: bool,
    possible_date: bool,
    observed: usize,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_number: true,
            possible_boolean: true,
            possible_date: true,
            observed: 0,
        }
    }

    fn update(&mut self, value: &Cell) {
        self.observed += 1;
        if self.possible_number && coerce::to_number(value).is_none() {
            self.possible_number = false;
        }
        if self.possible_boolean && coerce::to_boolean(value).is_none() {
            self.possible_boolean = false;
        }
        if self.possible_date && coerce::to_date(value).is_none() {
            self.possible_date = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if self.observed == 0 {
            ColumnType::String
        } else if self.possible_number {
            ColumnType::Number
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_date {
            ColumnType::Date
        } else {
            ColumnType::String
        }
    }
}

/// Classifies a column from its values, skipping blanks and stopping after
/// [`TYPE_SAMPLE_VALUES`] non-blank values.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a Cell>,
{
    let mut candidate = TypeCandidate::new();
    for value in values
        .into_iter()
        .filter(|v| !v.is_blank())
        .take(TYPE_SAMPLE_VALUES)
    {
        candidate.update(value);
    }
    candidate.decide()
}

pub fn infer_schema(records: &[Record]) -> Schema {
    let Some(first) = records.first() else {
        return Schema::default();
    };
    let names = first.keys().cloned().collect::<Vec<_>>();
    Schema {
        columns: infer_columns(records, &names),
    }
}

/// Infers descriptors for `names` only, sampling the same leading records as
/// [`infer_schema`]. Used when columns are appended after the initial load.
pub fn infer_columns(records: &[Record], names: &[String]) -> Vec<ColumnMeta> {
    let sample = &records[..records.len().min(SCHEMA_SAMPLE_ROWS)];
    names
        .iter()
        .map(|name| ColumnMeta {
            name: name.clone(),
            datatype: infer_column_type(sample.iter().map(|row| cell(row, name))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record;

    fn column(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from(*v)).collect()
    }

    #[test]
    fn numeric_check_runs_before_boolean() {
        assert_eq!(
            infer_column_type(&column(&["0", "1", "1", "0"])),
            ColumnType::Number
        );
    }

    #[test]
    fn boolean_words_infer_boolean() {
        assert_eq!(
            infer_column_type(&column(&["true", "FALSE", "1"])),
            ColumnType::Boolean
        );
    }

    #[test]
    fn date_column_detected_after_number_and_boolean() {
        assert_eq!(
            infer_column_type(&column(&["2024-01-01", "03/15/2024", "31-12-2024"])),
            ColumnType::Date
        );
    }

    #[test]
    fn mixed_values_fall_back_to_string() {
        assert_eq!(
            infer_column_type(&column(&["10", "20", "x"])),
            ColumnType::String
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let mut values = column(&["", "5", "", "7"]);
        values.push(Cell::Absent);
        assert_eq!(infer_column_type(&values), ColumnType::Number);
        assert_eq!(infer_column_type(&column(&["", ""])), ColumnType::String);
    }

    #[test]
    fn only_first_hundred_non_blank_values_are_tested() {
        let mut values = vec![Cell::from("1"); TYPE_SAMPLE_VALUES];
        values.push(Cell::from("not a number"));
        assert_eq!(infer_column_type(&values), ColumnType::Number);
    }

    #[test]
    fn empty_record_set_yields_empty_schema() {
        let schema = infer_schema(&[]);
        assert!(schema.is_empty());
    }

    #[test]
    fn columns_come_from_first_record_only() {
        let records = vec![
            record([("city", "A"), ("amt", "10")]),
            record([("city", "B"), ("amt", "20"), ("extra", "ignored")]),
        ];
        let schema = infer_schema(&records);
        assert_eq!(schema.headers(), vec!["city", "amt"]);
        assert_eq!(schema.column_type("amt"), Some(ColumnType::Number));
        assert_eq!(schema.column_type("city"), Some(ColumnType::String));
        assert_eq!(schema.column_type("extra"), None);
    }

    #[test]
    fn sample_is_limited_to_leading_records() {
        let mut records = (0..SCHEMA_SAMPLE_ROWS)
            .map(|i| record([("n", i.to_string())]))
            .collect::<Vec<_>>();
        records.push(record([("n", "oops")]));
        assert_eq!(
            infer_schema(&records).column_type("n"),
            Some(ColumnType::Number)
        );
    }

    #[test]
    fn typed_cells_infer_directly() {
        let records = vec![
            record([("flag", Cell::Boolean(true)), ("n", Cell::Number(1.5))]),
            record([("flag", Cell::Boolean(false)), ("n", Cell::Number(2.0))]),
        ];
        let schema = infer_schema(&records);
        assert_eq!(schema.column_type("flag"), Some(ColumnType::Boolean));
        assert_eq!(schema.column_type("n"), Some(ColumnType::Number));
    }

    #[test]
    fn column_type_round_trips_through_strings() {
        for variant in ColumnType::variants() {
            let parsed: ColumnType = variant.parse().unwrap();
            assert_eq!(parsed.as_str(), *variant);
        }
        assert!("decimal".parse::<ColumnType>().is_err());
    }

    #[test]
    fn upsert_replaces_existing_descriptor() {
        let mut schema = Schema {
            columns: vec![ColumnMeta {
                name: "lat".into(),
                datatype: ColumnType::String,
            }],
        };
        schema.upsert(ColumnMeta {
            name: "lat".into(),
            datatype: ColumnType::Number,
        });
        schema.upsert(ColumnMeta {
            name: "lng".into(),
            datatype: ColumnType::Number,
        });
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column_type("lat"), Some(ColumnType::Number));
    }
}
