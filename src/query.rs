//! Filter, sort and paginate.
//!
//! [`run`] is the whole pipeline over a borrowed record slice. The session
//! caches the filtered set itself and calls [`sort_and_paginate`] directly.

use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    coerce,
    data::{Cell, Record, cell},
    error::StudioError,
};

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortDirection::Asc)
    }

    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(anyhow!("Unknown sort direction '{other}'")),
        }
    }
}

/// `column[:asc|desc]` as accepted by `--sort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub column: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn parse(spec: &str) -> Result<Self> {
        let (column, direction) = match spec.rsplit_once(':') {
            Some((column, direction)) => (column, direction.parse()?),
            None => (spec, SortDirection::Asc),
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("Sort directive is missing a column"));
        }
        Ok(SortDirective {
            column: column.to_string(),
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: usize,
    pub page_size: usize,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_column: None,
            sort_direction: SortDirection::Asc,
        }
    }
}

impl Pagination {
    pub fn with_page_size(page_size: usize) -> Result<Self, StudioError> {
        if page_size == 0 {
            return Err(StudioError::InvalidPageSize);
        }
        Ok(Self {
            page_size,
            ..Self::default()
        })
    }

    pub fn page_count(&self, total: usize) -> usize {
        page_count(total, self.page_size)
    }

    pub fn offset(&self) -> usize {
        self.current_page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }

    pub fn reset_page(&mut self) {
        self.current_page = 1;
    }

    /// Returns `false` when already on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Returns `false` when already on the last page for `total` rows.
    pub fn next_page(&mut self, total: usize) -> bool {
        if self.current_page < self.page_count(total) {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn go_to_page(&mut self, page: usize, total: usize) {
        self.current_page = page.clamp(1, self.page_count(total));
    }

    /// Clicking the active sort column flips direction; a new column starts ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        if self.sort_column.as_deref() == Some(column) {
            self.sort_direction = self.sort_direction.reversed();
        } else {
            self.sort_column = Some(column.to_string());
            self.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_sort(&mut self, column: Option<String>, direction: SortDirection) {
        self.sort_column = column;
        self.sort_direction = direction;
    }
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// How the present cells of a sorted column compare. Decided once per column
/// so the ordering stays total on columns that mix numbers and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Numeric,
    Text,
}

impl SortMode {
    /// Numeric only when every present cell coerces to a number.
    pub fn for_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        let all_numeric = cells
            .into_iter()
            .filter(|c| !c.is_absent())
            .all(|c| coerce::to_number(c).is_some());
        if all_numeric {
            SortMode::Numeric
        } else {
            SortMode::Text
        }
    }
}

/// Absent cells sort last in both directions. Under [`SortMode::Numeric`]
/// present cells compare as numbers, otherwise as lowercase text.
pub fn compare_cells(a: &Cell, b: &Cell, mode: SortMode, direction: SortDirection) -> Ordering {
    match (a.is_absent(), b.is_absent()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let numeric = match mode {
        SortMode::Numeric => coerce::to_number(a).zip(coerce::to_number(b)),
        SortMode::Text => None,
    };
    let base = match numeric {
        Some((x, y)) => x.total_cmp(&y),
        None => a
            .as_display()
            .to_lowercase()
            .cmp(&b.as_display().to_lowercase()),
    };
    if direction.is_ascending() {
        base
    } else {
        base.reverse()
    }
}

/// Stable sort, so equal keys keep their filtered order.
pub fn sort_rows(rows: &mut [&Record], column: &str, direction: SortDirection) {
    let mode = SortMode::for_cells(rows.iter().map(|r| cell(r, column)));
    rows.sort_by(|a, b| compare_cells(cell(a, column), cell(b, column), mode, direction));
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<'a> {
    pub rows: Vec<&'a Record>,
    pub total_count: usize,
    pub page_count: usize,
    pub current_page: usize,
    pub page_size: usize,
}

impl QueryPage<'_> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based position of the first row on this page, 0 for an empty page.
    pub fn first_row_number(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.current_page.saturating_sub(1) * self.page_size + 1
        }
    }

    pub fn last_row_number(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.first_row_number() + self.rows.len() - 1
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "Showing {} to {} of {} row(s) (page {} of {})",
            self.first_row_number(),
            self.last_row_number(),
            self.total_count,
            self.current_page,
            self.page_count
        )
    }
}

pub fn run<'a, P>(records: &'a [Record], predicate: P, pagination: &Pagination) -> QueryPage<'a>
where
    P: Fn(&Record) -> bool,
{
    let filtered = records.iter().filter(|r| predicate(r)).collect::<Vec<_>>();
    sort_and_paginate(filtered, pagination)
}

/// Out-of-range pages yield an empty slice rather than an error.
pub fn sort_and_paginate<'a>(mut rows: Vec<&'a Record>, pagination: &Pagination) -> QueryPage<'a> {
    if let Some(column) = pagination.sort_column.as_deref() {
        sort_rows(&mut rows, column, pagination.sort_direction);
    }
    let total_count = rows.len();
    let page_rows = rows
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.page_size)
        .collect();
    QueryPage {
        rows: page_rows,
        total_count,
        page_count: pagination.page_count(total_count),
        current_page: pagination.current_page,
        page_size: pagination.page_size,
    }
}
