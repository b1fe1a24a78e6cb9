//! Address geocoding and map marker extraction.
//!
//! Geocoding goes through the [`Geocoder`] trait so the session never cares
//! where coordinates come from. [`LookupGeocoder`] answers from a local
//! `address,lat,lng` table; [`CachedGeocoder`] memoizes any geocoder,
//! remembering misses as well as hits.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    coerce,
    data::{Record, cell},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

pub trait Geocoder {
    /// Resolves a free-form address; `Ok(None)` means the address is unknown.
    fn lookup(&mut self, address: &str) -> Result<Option<GeoPoint>>;
}

fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Static lookup table keyed by normalized address.
#[derive(Debug, Default, Clone)]
pub struct LookupGeocoder {
    entries: HashMap<String, GeoPoint>,
}

impl LookupGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str, point: GeoPoint) {
        self.entries.insert(normalize_address(address), point);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads a delimited file whose first three columns are address,
    /// latitude and longitude. A header row is expected.
    pub fn from_path(path: &Path, delimiter: Option<u8>) -> Result<Self> {
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
        let mut geocoder = Self::new();
        for (idx, row) in reader.records().enumerate() {
            let line = idx + 2;
            let row = row.with_context(|| format!("Reading geocode table row {line}"))?;
            let (Some(address), Some(lat), Some(lng)) = (row.get(0), row.get(1), row.get(2))
            else {
                return Err(anyhow!(
                    "Geocode table row {line} needs address, latitude and longitude"
                ));
            };
            let lat = coerce::parse_number(lat)
                .ok_or_else(|| anyhow!("Invalid latitude '{lat}' on geocode table row {line}"))?;
            let lng = coerce::parse_number(lng)
                .ok_or_else(|| anyhow!("Invalid longitude '{lng}' on geocode table row {line}"))?;
            geocoder.insert(address, GeoPoint { lat, lng });
        }
        debug!("Loaded {} geocode entries from {path:?}", geocoder.len());
        Ok(geocoder)
    }
}

impl Geocoder for LookupGeocoder {
    fn lookup(&mut self, address: &str) -> Result<Option<GeoPoint>> {
        Ok(self.entries.get(&normalize_address(address)).copied())
    }
}

pub struct CachedGeocoder<G> {
    inner: G,
    cache: HashMap<String, Option<GeoPoint>>,
    hits: usize,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn lookup(&mut self, address: &str) -> Result<Option<GeoPoint>> {
        let key = normalize_address(address);
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(*cached);
        }
        let resolved = self.inner.lookup(address)?;
        self.cache.insert(key, resolved);
        Ok(resolved)
    }
}

/// Joins the non-blank address parts of a record with `", "`.
pub fn address_for(record: &Record, columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| cell(record, column).as_display().trim().to_string())
        .filter(|part| !part.is_empty())
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lng: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Rows whose coordinates do not both coerce to in-range numbers are skipped.
pub fn markers<'a, I>(rows: I, lat_column: &str, lng_column: &str, labels: &[String]) -> Vec<MapMarker>
where
    I: IntoIterator<Item = &'a Record>,
{
    rows.into_iter()
        .filter_map(|row| {
            let lat = coerce::to_number(cell(row, lat_column))?;
            let lng = coerce::to_number(cell(row, lng_column))?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return None;
            }
            let label = labels
                .iter()
                .map(|column| cell(row, column).as_display())
                .join(" | ");
            Some(MapMarker { lat, lng, label })
        })
        .collect()
}

pub fn bounds(markers: &[MapMarker]) -> Option<Bounds> {
    let first = markers.first()?;
    let initial = Bounds {
        south: first.lat,
        west: first.lng,
        north: first.lat,
        east: first.lng,
    };
    Some(markers.iter().skip(1).fold(initial, |acc, m| Bounds {
        south: acc.south.min(m.lat),
        west: acc.west.min(m.lng),
        north: acc.north.max(m.lat),
        east: acc.east.max(m.lng),
    }))
}
