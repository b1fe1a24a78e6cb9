//! Per-column filter state and the global search predicate.
//!
//! [`Filters`] holds exactly one [`FilterState`] per schema column plus the
//! free-text search. Its setters only change state; the owning
//! [`crate::session::Session`] recomputes the filtered rows and rewinds the
//! page after every mutation.

use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    coerce,
    data::{Cell, Record, cell},
    error::StudioError,
    schema::{ColumnMeta, ColumnType, Schema},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterState {
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Categorical {
        selected: BTreeSet<String>,
    },
}

impl FilterState {
    pub fn for_type(datatype: ColumnType) -> Self {
        match datatype {
            ColumnType::Number => FilterState::Range {
                min: None,
                max: None,
            },
            ColumnType::Date => FilterState::DateRange {
                from: None,
                to: None,
            },
            ColumnType::String | ColumnType::Boolean => FilterState::Categorical {
                selected: BTreeSet::new(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FilterState::Range { .. } => "range",
            FilterState::DateRange { .. } => "date range",
            FilterState::Categorical { .. } => "categorical",
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            FilterState::Range { min, max } => min.is_some() || max.is_some(),
            FilterState::DateRange { from, to } => from.is_some() || to.is_some(),
            FilterState::Categorical { selected } => !selected.is_empty(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            FilterState::Range { min, max } => {
                *min = None;
                *max = None;
            }
            FilterState::DateRange { from, to } => {
                *from = None;
                *to = None;
            }
            FilterState::Categorical { selected } => selected.clear(),
        }
    }

    pub fn matches(&self, value: &Cell) -> bool {
        if !self.is_active() {
            return true;
        }
        match self {
            FilterState::Range { min, max } => {
                let Some(number) = coerce::to_number(value) else {
                    return false;
                };
                min.is_none_or(|m| number >= m) && max.is_none_or(|m| number <= m)
            }
            FilterState::DateRange { from, to } => {
                let Some(date) = coerce::to_date(value).map(|dt| dt.date()) else {
                    return false;
                };
                from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t)
            }
            FilterState::Categorical { selected } => selected.contains(&*value.as_display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    states: IndexMap<String, FilterState>,
    search: String,
}

impl Filters {
    pub fn for_schema(schema: &Schema) -> Self {
        let mut filters = Filters::default();
        filters.add_columns(&schema.columns);
        filters
    }

    /// Installs a fresh "no restriction" state for each column, replacing any
    /// existing state under the same name.
    pub fn add_columns(&mut self, columns: &[ColumnMeta]) {
        for column in columns {
            self.states
                .insert(column.name.clone(), FilterState::for_type(column.datatype));
        }
    }

    pub fn get(&self, column: &str) -> Option<&FilterState> {
        self.states.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterState)> {
        self.states.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.states.values().filter(|s| s.is_active()).count()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn set_range(
        &mut self,
        column: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), StudioError> {
        match self.state_mut(column)? {
            FilterState::Range { min: lo, max: hi } => {
                *lo = min;
                *hi = max;
                Ok(())
            }
            other => Err(mismatch(column, other, "range")),
        }
    }

    pub fn set_date_range(
        &mut self,
        column: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<(), StudioError> {
        match self.state_mut(column)? {
            FilterState::DateRange { from: lo, to: hi } => {
                *lo = from;
                *hi = to;
                Ok(())
            }
            other => Err(mismatch(column, other, "date range")),
        }
    }

    /// Flips membership of `value`; returns whether it is selected afterwards.
    pub fn toggle_category(&mut self, column: &str, value: &str) -> Result<bool, StudioError> {
        let selected = self.categories_mut(column)?;
        if selected.remove(value) {
            Ok(false)
        } else {
            selected.insert(value.to_string());
            Ok(true)
        }
    }

    pub fn select_categories<I, S>(&mut self, column: &str, values: I) -> Result<(), StudioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected = self.categories_mut(column)?;
        selected.clear();
        selected.extend(values.into_iter().map(Into::into));
        Ok(())
    }

    pub fn add_category(&mut self, column: &str, value: &str) -> Result<(), StudioError> {
        self.categories_mut(column)?.insert(value.to_string());
        Ok(())
    }

    /// Restores every column to "no restriction" and clears the search.
    pub fn reset(&mut self) {
        for state in self.states.values_mut() {
            state.reset();
        }
        self.search.clear();
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.states
            .iter()
            .all(|(column, state)| state.matches(cell(record, column)))
            && matches_search(record, &self.search)
    }

    fn state_mut(&mut self, column: &str) -> Result<&mut FilterState, StudioError> {
        self.states
            .get_mut(column)
            .ok_or_else(|| StudioError::UnknownColumn(column.to_string()))
    }

    fn categories_mut(&mut self, column: &str) -> Result<&mut BTreeSet<String>, StudioError> {
        match self.state_mut(column)? {
            FilterState::Categorical { selected } => Ok(selected),
            other => Err(mismatch(column, other, "categorical")),
        }
    }
}

fn mismatch(column: &str, state: &FilterState, requested: &'static str) -> StudioError {
    StudioError::FilterKindMismatch {
        column: column.to_string(),
        expected: state.kind(),
        requested,
    }
}

/// Case-insensitive substring test across every field of the record.
pub fn matches_search(record: &Record, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record
        .values()
        .any(|value| value.as_display().to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    AtLeast,
    AtMost,
    Equals,
}

/// A textual filter such as `amount>=100`, `ordered_at<=2024-06-30` or
/// `city=Paris`, resolved against the schema when applied to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: ConditionOperator,
    pub raw_value: String,
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<FilterCondition>> {
    filters.iter().map(|f| parse_filter(f)).collect()
}

fn parse_filter(filter: &str) -> Result<FilterCondition> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    for needle in [">=", "<=", "="] {
        if let Some(idx) = trimmed.find(needle) {
            let operator = match needle {
                ">=" => ConditionOperator::AtLeast,
                "<=" => ConditionOperator::AtMost,
                _ => ConditionOperator::Equals,
            };
            let column = trimmed[..idx].trim();
            if column.is_empty() {
                return Err(anyhow!("Filter expression '{trimmed}' is missing a column"));
            }
            let right = trimmed[idx + needle.len()..].trim();
            return Ok(FilterCondition {
                column: column.to_string(),
                operator,
                raw_value: unquote(right).to_string(),
            });
        }
    }

    Err(anyhow!(
        "Failed to parse filter expression '{trimmed}' (expected column>=value, column<=value or column=value)"
    ))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}
