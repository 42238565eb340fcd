//! # Trace Segmentation
//!
//! Turns an ordered, noisy sample stream into the minimal list of
//! colour-classified polylines.
//!
//! ## Algorithm
//! For each sample, in the order supplied:
//! 1. Drop it if its position equals the last accepted position
//! 2. Append its point to the open run
//! 3. Classify its metric against the target (inclusive, undefined = below)
//! 4. If the classification differs from the open run's, close the run
//!    (ending on the sample's point) and reseed a new one with that point
//!
//! At the end of the stream the open run is closed as well. An empty stream
//! still closes one empty, unclassified segment.
//!
//! ## Boundary policy
//! [`BoundaryMode::Shared`] (the default) keeps the point that changed the
//! classification on the closing run too, so adjacent polylines meet with no
//! visible gap. [`BoundaryMode::Split`] closes a run without that point, so
//! every accepted sample lands in exactly one segment.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{Classification, Position, Sample, Segment, TracePoint};

/// How the sample that changes classification is split between segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Boundary point ends the closing segment and starts the next one
    #[default]
    Shared,
    /// Closing segment ends before the boundary point; next one starts on it
    Split,
}

/// Configuration for segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Target metric; `metric >= target` is above target.
    /// Default: 20.0
    pub target: f64,

    /// Treat (0, 0) as already seen before the first sample, so a genuine
    /// first fix at the origin is dropped as a duplicate.
    /// Default: false
    pub legacy_origin_sentinel: bool,

    /// Boundary policy. Default: [`BoundaryMode::Shared`]
    pub boundary: BoundaryMode,
}

impl SegmentationConfig {
    pub fn with_target(target: f64) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Count a first fix at the origin as a duplicate, as older renderers did.
    pub fn legacy(self, legacy: bool) -> Self {
        Self {
            legacy_origin_sentinel: legacy,
            ..self
        }
    }

    pub fn with_boundary(self, boundary: BoundaryMode) -> Self {
        Self { boundary, ..self }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            target: 20.0,
            legacy_origin_sentinel: false,
            boundary: BoundaryMode::Shared,
        }
    }
}

/// Counters collected over one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationStats {
    /// Samples offered to the segmenter
    pub samples_seen: usize,
    /// Samples that contributed a point
    pub samples_accepted: usize,
    /// Samples dropped as consecutive duplicates
    pub duplicates_dropped: usize,
    /// Segments closed so far
    pub segments_emitted: usize,
}

/// Streaming segmenter: feed samples with [`push`](Segmenter::push), collect
/// closed segments as they come out, then [`finish`](Segmenter::finish).
///
/// A closed segment is handed over by value; the segmenter keeps nothing of it.
#[derive(Debug)]
pub struct Segmenter {
    config: SegmentationConfig,
    last_position: Option<Position>,
    current_run: Vec<TracePoint>,
    previous: Option<Classification>,
    stats: SegmentationStats,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        let last_position = if config.legacy_origin_sentinel {
            Some(Position::new(0.0, 0.0))
        } else {
            None
        };

        Self {
            config,
            last_position,
            current_run: Vec::new(),
            previous: None,
            stats: SegmentationStats::default(),
        }
    }

    /// Offer the next sample. Returns the segment it closed, if any.
    pub fn push(&mut self, sample: &Sample) -> Option<Segment> {
        self.stats.samples_seen += 1;

        let position = sample.position();
        if self.last_position == Some(position) {
            self.stats.duplicates_dropped += 1;
            trace!(
                "[Segmentation] Dropped duplicate at {},{} (t={})",
                position.longitude,
                position.latitude,
                sample.timestamp
            );
            return None;
        }
        self.last_position = Some(position);
        self.stats.samples_accepted += 1;

        let point = sample.trace_point();
        self.current_run.push(point);

        let tag = Classification::classify(sample.metric, self.config.target);

        let closed = match self.previous {
            Some(previous) if previous != tag => {
                let mut points = std::mem::replace(&mut self.current_run, vec![point]);
                if self.config.boundary == BoundaryMode::Split {
                    points.pop();
                }
                self.stats.segments_emitted += 1;
                debug!(
                    "[Segmentation] Closed {} segment with {} points at t={}",
                    previous.as_str(),
                    points.len(),
                    sample.timestamp
                );
                Some(Segment::new(Some(previous), points))
            }
            _ => None,
        };

        self.previous = Some(tag);
        closed
    }

    /// Close the open run. Always yields a segment, empty and unclassified
    /// if no sample was ever accepted.
    pub fn finish(mut self) -> (Segment, SegmentationStats) {
        self.stats.segments_emitted += 1;
        let segment = Segment::new(self.previous, self.current_run);
        (segment, self.stats)
    }

    pub fn stats(&self) -> &SegmentationStats {
        &self.stats
    }
}

/// Segment a whole sample stream.
///
/// # Example
/// ```
/// use livekml::{segment_samples, Sample, SegmentationConfig};
///
/// let samples = (0..5).map(|i| {
///     Sample::new(i, -0.1278 + i as f64 * 0.001, 51.5074).with_metric(30.0)
/// });
/// let segments = segment_samples(samples, &SegmentationConfig::default());
/// assert_eq!(segments.len(), 1);
/// assert_eq!(segments[0].len(), 5);
/// ```
pub fn segment_samples<I>(samples: I, config: &SegmentationConfig) -> Vec<Segment>
where
    I: IntoIterator<Item = Sample>,
{
    segment_samples_with_stats(samples, config).0
}

/// Segment a whole sample stream and report the walk's counters.
pub fn segment_samples_with_stats<I>(
    samples: I,
    config: &SegmentationConfig,
) -> (Vec<Segment>, SegmentationStats)
where
    I: IntoIterator<Item = Sample>,
{
    let mut segmenter = Segmenter::new(config.clone());
    let mut segments = Vec::new();

    for sample in samples {
        if let Some(segment) = segmenter.push(&sample) {
            segments.push(segment);
        }
    }

    let (last, stats) = segmenter.finish();
    segments.push(last);

    debug!(
        "[Segmentation] {} samples -> {} accepted, {} duplicates, {} segments",
        stats.samples_seen, stats.samples_accepted, stats.duplicates_dropped, stats.segments_emitted
    );

    (segments, stats)
}

// ============================================================================
// Tests
// ============================================================================
