//! Value-domain summaries used to build filter controls.
//!
//! Numeric columns report their min and max, date columns their earliest and
//! latest day, everything else its distinct display values with counts.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::{
    cli::FacetsArgs,
    coerce,
    data::{Cell, Record, cell},
    error::StudioError,
    schema::{ColumnType, Schema},
    table,
};

const EMPTY_LABEL: &str = "<empty>";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Facet {
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    DateRange {
        earliest: Option<NaiveDate>,
        latest: Option<NaiveDate>,
    },
    Categorical {
        values: Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnFacet {
    pub column: String,
    pub datatype: ColumnType,
    pub facet: Facet,
}

/// Summarizes `columns` (or every schema column when empty) over `rows`.
/// Categorical values are ordered by descending count, then by value.
pub fn compute_facets<'a, I>(
    rows: I,
    schema: &Schema,
    columns: &[String],
) -> Result<Vec<ColumnFacet>, StudioError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let selected = if columns.is_empty() {
        schema.columns.clone()
    } else {
        columns
            .iter()
            .map(|name| {
                schema
                    .column(name)
                    .cloned()
                    .ok_or_else(|| StudioError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut accumulators = selected
        .iter()
        .map(|column| FacetAccumulator::new(column.datatype))
        .collect::<Vec<_>>();
    for row in rows {
        for (column, acc) in selected.iter().zip(accumulators.iter_mut()) {
            acc.ingest(cell(row, &column.name));
        }
    }

    Ok(selected
        .into_iter()
        .zip(accumulators)
        .map(|(column, acc)| ColumnFacet {
            column: column.name,
            datatype: column.datatype,
            facet: acc.finish(),
        })
        .collect())
}

enum FacetAccumulator {
    Range(Option<f64>, Option<f64>),
    DateRange(Option<NaiveDate>, Option<NaiveDate>),
    Categorical(HashMap<String, usize>),
}

impl FacetAccumulator {
    fn new(datatype: ColumnType) -> Self {
        match datatype {
            ColumnType::Number => FacetAccumulator::Range(None, None),
            ColumnType::Date => FacetAccumulator::DateRange(None, None),
            ColumnType::String | ColumnType::Boolean => {
                FacetAccumulator::Categorical(HashMap::new())
            }
        }
    }

    fn ingest(&mut self, value: &Cell) {
        match self {
            FacetAccumulator::Range(min, max) => {
                if let Some(n) = coerce::to_number(value) {
                    *min = Some(min.map_or(n, |m| m.min(n)));
                    *max = Some(max.map_or(n, |m| m.max(n)));
                }
            }
            FacetAccumulator::DateRange(earliest, latest) => {
                if let Some(d) = coerce::to_date(value).map(|dt| dt.date()) {
                    *earliest = Some(earliest.map_or(d, |e| e.min(d)));
                    *latest = Some(latest.map_or(d, |l| l.max(d)));
                }
            }
            FacetAccumulator::Categorical(counts) => {
                *counts.entry(value.as_display().into_owned()).or_insert(0) += 1;
            }
        }
    }

    fn finish(self) -> Facet {
        match self {
            FacetAccumulator::Range(min, max) => Facet::Range { min, max },
            FacetAccumulator::DateRange(earliest, latest) => Facet::DateRange { earliest, latest },
            FacetAccumulator::Categorical(counts) => {
                let mut values = counts.into_iter().collect::<Vec<_>>();
                values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                Facet::Categorical { values }
            }
        }
    }
}

/// Table rows of `column, type, value, count`. `top` limits categorical
/// values per column; 0 lists them all.
pub fn render_rows(facets: &[ColumnFacet], top: usize) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for facet in facets {
        let mut push = |value: String, count: String| {
            rows.push(vec![
                facet.column.clone(),
                facet.datatype.to_string(),
                value,
                count,
            ]);
        };
        match &facet.facet {
            Facet::Range { min, max } => {
                push(format!("min {}", format_bound(*min)), String::new());
                push(format!("max {}", format_bound(*max)), String::new());
            }
            Facet::DateRange { earliest, latest } => {
                push(format!("from {}", format_date(*earliest)), String::new());
                push(format!("to {}", format_date(*latest)), String::new());
            }
            Facet::Categorical { values } => {
                let limit = if top == 0 { values.len() } else { top };
                for (value, count) in values.iter().take(limit) {
                    let label = if value.is_empty() {
                        EMPTY_LABEL.to_string()
                    } else {
                        value.clone()
                    };
                    push(label, count.to_string());
                }
            }
        }
    }
    rows
}

fn format_bound(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| Cell::Number(v).to_string())
}

fn format_date(value: Option<NaiveDate>) -> String {
    value.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

pub fn execute(args: &FacetsArgs) -> Result<()> {
    let session = crate::open_session(&args.input, Some(&args.filter))?;
    let facets = compute_facets(session.filtered_rows(), session.schema(), &args.columns)?;
    let headers = ["column", "type", "value", "count"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    table::print_table(&headers, &render_rows(&facets, args.top));
    info!(
        "Summarized {} column(s) over {} filtered row(s)",
        facets.len(),
        session.total_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::record, schema::infer_schema};

    fn rows() -> Vec<Record> {
        vec![
            record([("city", "B"), ("amt", "20"), ("day", "2024-02-01")]),
            record([("city", "A"), ("amt", "5"), ("day", "2024-01-15")]),
            record([("city", "B"), ("amt", ""), ("day", "")]),
            record([("city", ""), ("amt", "12"), ("day", "2024-03-01")]),
        ]
    }

    #[test]
    fn facets_follow_column_types() {
        let data = rows();
        let schema = infer_schema(&data);
        let facets = compute_facets(&data, &schema, &[]).unwrap();
        assert_eq!(facets.len(), 3);
        assert_eq!(
            facets[0].facet,
            Facet::Categorical {
                values: vec![("B".into(), 2), (String::new(), 1), ("A".into(), 1)]
            }
        );
        assert_eq!(
            facets[1].facet,
            Facet::Range {
                min: Some(5.0),
                max: Some(20.0)
            }
        );
        assert_eq!(
            facets[2].facet,
            Facet::DateRange {
                earliest: NaiveDate::from_ymd_opt(2024, 1, 15),
                latest: NaiveDate::from_ymd_opt(2024, 3, 1),
            }
        );
    }

    #[test]
    fn rendering_labels_empty_values_and_honours_top() {
        let data = rows();
        let schema = infer_schema(&data);
        let facets = compute_facets(&data, &schema, &["city".to_string()]).unwrap();
        let all = render_rows(&facets, 0);
        assert_eq!(all.len(), 3);
        assert_eq!(all[1][2], EMPTY_LABEL);
        let top = render_rows(&facets, 1);
        assert_eq!(top, vec![vec!["city", "string", "B", "2"]]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let data = rows();
        let schema = infer_schema(&data);
        assert_eq!(
            compute_facets(&data, &schema, &["nope".to_string()]),
            Err(StudioError::UnknownColumn("nope".into()))
        );
    }
}
