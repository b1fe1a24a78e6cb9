//! Group-by aggregation feeding chart series.
//!
//! Groups keep first-seen order. Non-numeric values count towards `count`
//! but are ignored by the other aggregators, and a group with no numeric
//! values reduces to `0` rather than `NaN`.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    coerce,
    data::{Record, cell},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregator::Count => "count",
            Aggregator::Sum => "sum",
            Aggregator::Avg => "avg",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregator {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Aggregator::Count),
            "sum" => Ok(Aggregator::Sum),
            "avg" | "average" | "mean" => Ok(Aggregator::Avg),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            other => Err(anyhow!(
                "Unknown aggregation '{other}' (expected count, sum, avg, min or max)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
    Doughnut,
    PolarArea,
    Radar,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::PolarArea => "polar_area",
            ChartKind::Radar => "radar",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative chart recipe. Rendering is someone else's job; the engine only
/// turns a chart spec plus the current filtered rows into a [`Series`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default = "generate_chart_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ChartKind,
    #[serde(alias = "x")]
    pub x_field: String,
    #[serde(alias = "y", default)]
    pub y_field: Option<String>,
    #[serde(alias = "agg", default)]
    pub aggregation: Aggregator,
}

impl ChartSpec {
    pub fn new(
        kind: ChartKind,
        x_field: impl Into<String>,
        y_field: Option<String>,
        aggregation: Aggregator,
    ) -> Self {
        Self {
            id: generate_chart_id(),
            kind,
            x_field: x_field.into(),
            y_field,
            aggregation,
        }
    }

    /// The value column, falling back to the grouping column for `count`.
    pub fn value_field(&self) -> &str {
        self.y_field.as_deref().unwrap_or(&self.x_field)
    }

    pub fn title(&self) -> String {
        match (&self.y_field, self.aggregation) {
            (Some(y), agg) if agg != Aggregator::Count => {
                format!("{agg} of {y} by {}", self.x_field)
            }
            _ => format!("count by {}", self.x_field),
        }
    }
}

pub fn generate_chart_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("chart_{}", &simple[..7])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    count: usize,
    numeric_count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl GroupAccumulator {
    fn ingest(&mut self, value: Option<f64>) {
        self.count += 1;
        let Some(number) = value else {
            return;
        };
        self.numeric_count += 1;
        self.sum += number;
        self.min = Some(self.min.map_or(number, |current| current.min(number)));
        self.max = Some(self.max.map_or(number, |current| current.max(number)));
    }

    fn reduce(&self, aggregator: Aggregator) -> f64 {
        match aggregator {
            Aggregator::Count => self.count as f64,
            Aggregator::Sum => self.sum,
            Aggregator::Avg => {
                if self.numeric_count == 0 {
                    0.0
                } else {
                    self.sum / self.numeric_count as f64
                }
            }
            Aggregator::Min => self.min.unwrap_or(0.0),
            Aggregator::Max => self.max.unwrap_or(0.0),
        }
    }
}

pub fn aggregate<'a, I>(rows: I, x_field: &str, y_field: &str, aggregator: Aggregator) -> Series
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups: IndexMap<String, GroupAccumulator> = IndexMap::new();
    for row in rows {
        let key = cell(row, x_field).as_display().into_owned();
        groups
            .entry(key)
            .or_default()
            .ingest(coerce::to_number(cell(row, y_field)));
    }
    let (labels, values): (Vec<String>, Vec<f64>) = groups
        .into_iter()
        .map(|(label, group)| (label, group.reduce(aggregator)))
        .unzip();
    Series { labels, values }
}
