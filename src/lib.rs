//! # livekml
//!
//! Near-live KML rendering of vehicle telemetry (GPS position, speed and
//! derived fuel economy) for 3-D earth viewers that re-poll a network link.
//!
//! This library provides:
//! - Segmentation of an ordered sample stream into colour-classified polylines
//! - A typed KML element tree with the trace document and polling envelope
//! - A SQLite sample source for the logger's `gps`/`obd` tables
//! - A three-mode request router and a small HTTP front end
//!
//! ## Features
//!
//! - **`persistence`** - SQLite sample source (default)
//! - **`server`** - HTTP front end and command line (default)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use livekml::{segment_samples, Classification, Sample, SegmentationConfig};
//!
//! let samples = vec![
//!     Sample::new(100, -122.08, 37.42).with_speed(40.0).with_metric(25.0),
//!     Sample::new(101, -122.09, 37.43).with_speed(42.0).with_metric(31.0),
//!     Sample::new(102, -122.10, 37.44).with_speed(45.0).with_metric(12.0),
//! ];
//!
//! let segments = segment_samples(samples, &SegmentationConfig::with_target(20.0));
//! assert_eq!(segments.len(), 2);
//! assert_eq!(segments[0].classification, Some(Classification::AboveTarget));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LiveKmlError, Result};

// Per-request configuration
pub mod config;
pub use config::LiveConfig;

// Trace segmentation (dedup + threshold classification)
pub mod segmentation;
pub use segmentation::{
    segment_samples, BoundaryMode, SegmentationConfig, SegmentationStats, Segmenter,
};

// Two-entry style catalog
pub mod styles;
pub use styles::{Style, StyleCatalog};

// KML element tree and documents
pub mod kml;

// HTML configuration form
pub mod form;

// Sample sources (SQLite behind `persistence`)
pub mod source;
pub use source::{SampleSource, TimeWindow};
#[cfg(feature = "persistence")]
pub use source::{SqliteSampleSource, StoreDirectory};

// Request routing (form / polling envelope / trace document)
pub mod router;
pub use router::{Operation, Request, RequestContext, Response};

// HTTP front end
#[cfg(all(feature = "server", feature = "persistence"))]
pub mod server;
#[cfg(all(feature = "server", feature = "persistence"))]
pub use server::{LiveKmlServer, ServerOptions};

// ============================================================================
// Core Types
// ============================================================================

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// One telemetry reading.
///
/// `speed` and `metric` come from the secondary OBD signal and are absent
/// when no OBD row lines up with the GPS fix, or when the metric's
/// denominator was zero.
///
/// # Example
/// ```
/// use livekml::Sample;
/// let sample = Sample::new(1262889649, -115.1523, 36.1312)
///     .with_speed(55.0)
///     .with_metric(21.4);
/// assert_eq!(sample.metric, Some(21.4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    pub longitude: f64,
    pub latitude: f64,
    /// Vehicle speed signal
    pub speed: Option<f64>,
    /// Derived fuel economy; `None` when undefined
    pub metric: Option<f64>,
}

impl Sample {
    /// Create a sample with no speed and an undefined metric.
    pub fn new(timestamp: i64, longitude: f64, latitude: f64) -> Self {
        Self {
            timestamp,
            longitude,
            latitude,
            speed: None,
            metric: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.longitude, self.latitude)
    }

    /// The point this sample contributes to a segment.
    pub fn trace_point(&self) -> TracePoint {
        TracePoint {
            timestamp: self.timestamp,
            longitude: self.longitude,
            latitude: self.latitude,
            speed: self.speed,
        }
    }
}

/// A rendered vertex: position plus speed (used as height above ground).
///
/// The source timestamp is carried along so callers can relate segments back
/// to the sample stream; it is not written to the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub timestamp: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub speed: Option<f64>,
}

/// Above/below-target tag derived from a sample's metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    AboveTarget,
    BelowTarget,
}

impl Classification {
    /// Classify a metric against a target.
    ///
    /// The comparison is inclusive. An undefined (or NaN) metric has no
    /// third visual state and classifies as below target.
    pub fn classify(metric: Option<f64>, target: f64) -> Self {
        match metric {
            Some(value) if value >= target => Classification::AboveTarget,
            _ => Classification::BelowTarget,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::AboveTarget => "above_target",
            Classification::BelowTarget => "below_target",
        }
    }
}

/// A maximal run of consecutive samples sharing one classification.
///
/// `classification` is `None` only for the single default segment produced
/// from an empty sample stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub classification: Option<Classification>,
    pub points: Vec<TracePoint>,
}

impl Segment {
    pub fn new(classification: Option<Classification>, points: Vec<TracePoint>) -> Self {
        Self {
            classification,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_point(&self) -> Option<&TracePoint> {
        self.points.first()
    }

    pub fn last_point(&self) -> Option<&TracePoint> {
        self.points.last()
    }
}

// ============================================================================
// Tests
// ============================================================================
