//! The explicit context object that owns one loaded dataset and its view state.
//!
//! Every mutation that can change the filtered set (filters, search, reload,
//! appended columns) recomputes it synchronously and rewinds to page 1 before
//! returning. Sorting and page navigation leave the filtered set alone.

use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info};

use crate::{
    aggregate::{self, ChartSpec, Series},
    coerce,
    data::{Cell, Record},
    error::StudioError,
    filter::{ConditionOperator, FilterCondition, FilterState, Filters},
    geo::{self, Bounds, GeoPoint, Geocoder, MapMarker},
    query::{self, Pagination, QueryPage, SortDirection},
    schema::{self, Schema},
};

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetInfo {
    pub source: Option<String>,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeSummary {
    pub resolved: usize,
    pub missing: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct Session {
    records: Vec<Record>,
    schema: Schema,
    filters: Filters,
    pagination: Pagination,
    filtered: Vec<usize>,
    charts: Vec<ChartSpec>,
    source: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>, source: Option<String>) -> Self {
        let mut session = Self::new();
        session.load(records, source);
        session
    }

    /// Replaces the dataset, rebuilding schema and filter state from scratch.
    /// Sort settings and page size carry over; charts referencing columns that
    /// no longer exist are dropped.
    pub fn load(&mut self, records: Vec<Record>, source: Option<String>) {
        let started = Instant::now();
        self.schema = schema::infer_schema(&records);
        self.filters = Filters::for_schema(&self.schema);
        self.records = records;
        self.source = source;

        let before = self.charts.len();
        let schema = &self.schema;
        self.charts.retain(|chart| {
            schema.column(&chart.x_field).is_some()
                && chart
                    .y_field
                    .as_deref()
                    .is_none_or(|y| schema.column(y).is_some())
        });
        if self.charts.len() < before {
            info!(
                "Dropped {} chart(s) whose fields are missing from the new dataset",
                before - self.charts.len()
            );
        }

        self.refresh();
        info!(
            "Loaded {} row(s) with {} column(s) from {} in {:.2?}",
            self.records.len(),
            self.schema.len(),
            self.source.as_deref().unwrap_or("memory"),
            started.elapsed()
        );
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.charts
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            source: self.source.clone(),
            rows: self.records.len(),
            columns: self.schema.len(),
        }
    }

    pub fn total_count(&self) -> usize {
        self.filtered.len()
    }

    pub fn page_count(&self) -> usize {
        self.pagination.page_count(self.filtered.len())
    }

    /// Filtered rows in dataset order.
    pub fn filtered_rows(&self) -> impl Iterator<Item = &Record> {
        self.filtered.iter().map(|&idx| &self.records[idx])
    }

    /// Recomputes the filtered set and returns to the first page.
    pub fn refresh(&mut self) {
        let filters = &self.filters;
        self.filtered = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| filters.matches(record))
            .map(|(idx, _)| idx)
            .collect();
        self.pagination.reset_page();
        debug!(
            "Filtered {} of {} row(s) ({} active filter(s), search '{}')",
            self.filtered.len(),
            self.records.len(),
            self.filters.active_count(),
            self.filters.search()
        );
    }

    pub fn set_range(
        &mut self,
        column: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), StudioError> {
        self.filters.set_range(column, min, max)?;
        self.refresh();
        Ok(())
    }

    pub fn set_date_range(
        &mut self,
        column: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<(), StudioError> {
        self.filters.set_date_range(column, from, to)?;
        self.refresh();
        Ok(())
    }

    pub fn toggle_category(&mut self, column: &str, value: &str) -> Result<bool, StudioError> {
        let selected = self.filters.toggle_category(column, value)?;
        self.refresh();
        Ok(selected)
    }

    pub fn select_categories<I, S>(&mut self, column: &str, values: I) -> Result<(), StudioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.select_categories(column, values)?;
        self.refresh();
        Ok(())
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.filters.set_search(query);
        self.refresh();
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.refresh();
    }

    /// Applies a textual condition according to the column's filter kind.
    /// `>=`/`<=` narrow one bound of a range, `=` pins both bounds of a range
    /// or adds a member to a categorical selection.
    pub fn apply_condition(&mut self, condition: &FilterCondition) -> Result<(), StudioError> {
        let column = condition.column.as_str();
        let state = self
            .filters
            .get(column)
            .ok_or_else(|| StudioError::UnknownColumn(column.to_string()))?
            .clone();
        match state {
            FilterState::Range { min, max } => {
                let value = coerce::parse_number(&condition.raw_value).ok_or_else(|| {
                    invalid_value(condition, "number")
                })?;
                let (min, max) = match condition.operator {
                    ConditionOperator::AtLeast => (Some(value), max),
                    ConditionOperator::AtMost => (min, Some(value)),
                    ConditionOperator::Equals => (Some(value), Some(value)),
                };
                self.filters.set_range(column, min, max)?;
            }
            FilterState::DateRange { from, to } => {
                let value = coerce::parse_date(&condition.raw_value)
                    .map(|dt| dt.date())
                    .ok_or_else(|| invalid_value(condition, "date"))?;
                let (from, to) = match condition.operator {
                    ConditionOperator::AtLeast => (Some(value), to),
                    ConditionOperator::AtMost => (from, Some(value)),
                    ConditionOperator::Equals => (Some(value), Some(value)),
                };
                self.filters.set_date_range(column, from, to)?;
            }
            FilterState::Categorical { .. } => {
                if condition.operator != ConditionOperator::Equals {
                    return Err(StudioError::FilterKindMismatch {
                        column: column.to_string(),
                        expected: "categorical",
                        requested: "range",
                    });
                }
                self.filters.add_category(column, &condition.raw_value)?;
            }
        }
        self.refresh();
        Ok(())
    }

    pub fn page(&self) -> QueryPage<'_> {
        query::sort_and_paginate(self.filtered_rows().collect(), &self.pagination)
    }

    pub fn next_page(&mut self) -> bool {
        self.pagination.next_page(self.filtered.len())
    }

    pub fn prev_page(&mut self) -> bool {
        self.pagination.prev_page()
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.pagination.go_to_page(page, self.filtered.len());
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), StudioError> {
        if page_size == 0 {
            return Err(StudioError::InvalidPageSize);
        }
        self.pagination.page_size = page_size;
        self.pagination.reset_page();
        Ok(())
    }

    pub fn toggle_sort(&mut self, column: &str) -> Result<(), StudioError> {
        self.ensure_column(column)?;
        self.pagination.toggle_sort(column);
        Ok(())
    }

    pub fn set_sort(&mut self, column: &str, direction: SortDirection) -> Result<(), StudioError> {
        self.ensure_column(column)?;
        self.pagination.set_sort(Some(column.to_string()), direction);
        Ok(())
    }

    /// Validates the chart's fields and keeps it; returns its id.
    pub fn add_chart(&mut self, spec: ChartSpec) -> Result<String, StudioError> {
        self.validate_chart(&spec)?;
        let id = spec.id.clone();
        debug!("Added chart '{}' ({})", id, spec.title());
        self.charts.push(spec);
        Ok(id)
    }

    pub fn remove_chart(&mut self, id: &str) -> Result<ChartSpec, StudioError> {
        let position = self
            .charts
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StudioError::UnknownChart(id.to_string()))?;
        Ok(self.charts.remove(position))
    }

    pub fn chart_series(&self, id: &str) -> Result<Series, StudioError> {
        let spec = self
            .charts
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StudioError::UnknownChart(id.to_string()))?;
        self.series_for(spec)
    }

    /// Aggregates the current filtered rows according to `spec`.
    pub fn series_for(&self, spec: &ChartSpec) -> Result<Series, StudioError> {
        self.validate_chart(spec)?;
        Ok(aggregate::aggregate(
            self.filtered_rows(),
            &spec.x_field,
            spec.value_field(),
            spec.aggregation,
        ))
    }

    /// Resolves an address for every record, appends latitude/longitude
    /// columns, infers types for just those columns and refreshes. Fails
    /// without touching any record if either column is already present.
    pub fn apply_geocoding(
        &mut self,
        address_columns: &[String],
        geocoder: &mut dyn Geocoder,
    ) -> Result<GeocodeSummary> {
        for column in address_columns {
            self.ensure_column(column)?;
        }
        for column in [LATITUDE_COLUMN, LONGITUDE_COLUMN] {
            if self.schema.column(column).is_some() {
                return Err(StudioError::ColumnExists(column.to_string()).into());
            }
        }
        let mut summary = GeocodeSummary::default();
        let mut points: Vec<Option<GeoPoint>> = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let address = geo::address_for(record, address_columns);
            if address.is_empty() {
                summary.skipped += 1;
                points.push(None);
                continue;
            }
            let point = geocoder.lookup(&address)?;
            match point {
                Some(_) => summary.resolved += 1,
                None => summary.missing += 1,
            }
            points.push(point);
        }

        for (record, point) in self.records.iter_mut().zip(points) {
            let (lat, lng) = match point {
                Some(p) => (Cell::Number(p.lat), Cell::Number(p.lng)),
                None => (Cell::Absent, Cell::Absent),
            };
            record.insert(LATITUDE_COLUMN.to_string(), lat);
            record.insert(LONGITUDE_COLUMN.to_string(), lng);
        }

        let added = [LATITUDE_COLUMN.to_string(), LONGITUDE_COLUMN.to_string()];
        let columns = schema::infer_columns(&self.records, &added);
        for column in &columns {
            self.schema.upsert(column.clone());
        }
        self.filters.add_columns(&columns);
        self.refresh();
        info!(
            "Geocoded {} row(s); {} not found, {} without an address",
            summary.resolved, summary.missing, summary.skipped
        );
        Ok(summary)
    }

    /// Map markers for filtered rows whose coordinates are numeric.
    pub fn markers(
        &self,
        lat_column: &str,
        lng_column: &str,
        label_columns: &[String],
    ) -> Result<(Vec<MapMarker>, Option<Bounds>), StudioError> {
        self.ensure_column(lat_column)?;
        self.ensure_column(lng_column)?;
        for column in label_columns {
            self.ensure_column(column)?;
        }
        let markers = geo::markers(self.filtered_rows(), lat_column, lng_column, label_columns);
        let bounds = geo::bounds(&markers);
        Ok((markers, bounds))
    }

    fn ensure_column(&self, column: &str) -> Result<(), StudioError> {
        if self.schema.column(column).is_some() {
            Ok(())
        } else {
            Err(StudioError::UnknownColumn(column.to_string()))
        }
    }

    fn validate_chart(&self, spec: &ChartSpec) -> Result<(), StudioError> {
        self.ensure_column(&spec.x_field)?;
        if let Some(y) = spec.y_field.as_deref() {
            self.ensure_column(y)?;
        }
        Ok(())
    }
}

fn invalid_value(condition: &FilterCondition, expected: &'static str) -> StudioError {
    StudioError::InvalidFilterValue {
        column: condition.column.clone(),
        value: condition.raw_value.clone(),
        expected,
    }
}
