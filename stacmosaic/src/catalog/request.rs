//! Search parameters.

use chrono::NaiveDate;
use thiserror::Error;

use crate::geo::{BoundingBox, Geometry};

/// Rejected search parameters.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("Collection id must not be empty")]
    EmptyCollection,

    #[error("Start date {start} is after end date {end}")]
    InvertedDates { start: NaiveDate, end: NaiveDate },

    #[error("Invalid spatial resolution: {0} (must be positive)")]
    InvalidResolution(f64),
}

/// What to search for: collection, inclusive date range and area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    collection: String,
    start: NaiveDate,
    end: NaiveDate,
    area: Geometry,
    resolution: Option<f64>,
}

impl SearchRequest {
    /// Creates a validated request.
    ///
    /// # Errors
    ///
    /// Fails when the collection id is empty or `start` is after `end`.
    pub fn new(
        collection: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        area: Geometry,
    ) -> Result<Self, RequestError> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(RequestError::EmptyCollection);
        }
        if start > end {
            return Err(RequestError::InvertedDates { start, end });
        }
        Ok(Self {
            collection,
            start,
            end,
            area,
            resolution: None,
        })
    }

    /// Restricts bands to one spatial resolution.
    pub fn with_resolution(mut self, resolution: f64) -> Result<Self, RequestError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(RequestError::InvalidResolution(resolution));
        }
        self.resolution = Some(resolution);
        Ok(self)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn area(&self) -> &Geometry {
        &self.area
    }

    pub fn resolution(&self) -> Option<f64> {
        self.resolution
    }

    /// Query bounding box.
    pub fn bbox(&self) -> BoundingBox {
        self.area.bbox()
    }

    /// STAC `datetime` interval covering both end dates entirely.
    pub fn datetime_range(&self) -> String {
        format!("{}T00:00:00Z/{}T23:59:59Z", self.start, self.end)
    }

    /// Directory-friendly identifier of the search, e.g.
    /// `CB4-16D-2_2024-01-01_2024-01-31_-48.0000_-16.0000_-47.0000_-15.0000`.
    pub fn search_tag(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.collection,
            self.start,
            self.end,
            self.bbox().tag()
        )
    }

    /// True when both requests hit the catalog with the same parameters.
    ///
    /// The resolution only affects band selection, not the search.
    pub fn same_search(&self, other: &SearchRequest) -> bool {
        self.collection == other.collection
            && self.start == other.start
            && self.end == other.end
            && self.area == other.area
    }
}
