//! Sample sources.
//!
//! A source hands back the samples of a closed time window in ascending time
//! order. Speed and metric come from the secondary OBD signal and may be
//! absent; that is never a reason to drop the GPS fix.
//!
//! The SQLite source reads the logger's two tables:
//!
//! ```sql
//! CREATE TABLE gps (lat REAL, lon REAL, alt REAL, time INTEGER);
//! CREATE TABLE obd (vss INTEGER, maf INTEGER, ..., time REAL);
//! ```
//!
//! and derives fuel economy as `7.107 * vss / maf` (mpg from km/h and g/s).
//! A zero or missing `maf` makes the metric NULL, i.e. undefined.

use serde::{Deserialize, Serialize};

use crate::{Result, Sample};

#[cfg(feature = "persistence")]
use std::path::{Component, Path, PathBuf};

#[cfg(feature = "persistence")]
use log::{debug, info};

#[cfg(feature = "persistence")]
use rusqlite::{params, Connection, OpenFlags};

#[cfg(feature = "persistence")]
use crate::LiveKmlError;

/// Closed interval `[start, end]` of Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Anything that can supply the samples of a time window.
pub trait SampleSource {
    /// Samples with `timestamp` in `window`, ascending by timestamp.
    fn samples(&self, window: TimeWindow) -> Result<Vec<Sample>>;

    /// Earliest and latest timestamps available, if any.
    fn time_range(&self) -> Result<Option<TimeWindow>>;
}

/// In-memory source; samples are assumed to be in time order already.
impl SampleSource for Vec<Sample> {
    fn samples(&self, window: TimeWindow) -> Result<Vec<Sample>> {
        Ok(self
            .iter()
            .filter(|s| window.contains(s.timestamp))
            .copied()
            .collect())
    }

    fn time_range(&self) -> Result<Option<TimeWindow>> {
        Ok(match (self.first(), self.last()) {
            (Some(first), Some(last)) => Some(TimeWindow::new(first.timestamp, last.timestamp)),
            _ => None,
        })
    }
}

/// Opens a sample source by store identifier.
pub trait SourceOpener {
    type Source: SampleSource;

    fn open(&self, name: &str) -> Result<Self::Source>;
}

// ============================================================================
// SQLite
// ============================================================================

#[cfg(feature = "persistence")]
pub const SAMPLE_SQL: &str = "SELECT CAST(gps.time AS INTEGER) AS time, gps.lon AS lon, gps.lat AS lat, \
     obd.vss AS vss, (7.107 * obd.vss / obd.maf) AS mpg \
     FROM gps LEFT JOIN obd ON gps.time = obd.time \
     WHERE gps.time >= ?1 AND gps.time <= ?2 \
     AND gps.lat IS NOT NULL AND gps.lon IS NOT NULL \
     ORDER BY gps.time, gps.rowid";

#[cfg(feature = "persistence")]
const TIME_RANGE_SQL: &str =
    "SELECT CAST(MIN(time) AS INTEGER), CAST(MAX(time) AS INTEGER) FROM gps";

/// Sample source over a logger SQLite database.
///
/// The connection lives exactly as long as the source, so dropping the source
/// at the end of a request releases the store whatever happened.
#[cfg(feature = "persistence")]
pub struct SqliteSampleSource {
    db: Connection,
    label: String,
}

#[cfg(feature = "persistence")]
impl SqliteSampleSource {
    /// Open an existing store read-only. A missing file is an error, never
    /// silently created.
    pub fn open(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let db = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LiveKmlError::StoreOpen {
            path: label.clone(),
            message: e.to_string(),
        })?;

        debug!("[Source] Opened {}", label);
        Ok(Self { db, label })
    }

    /// Wrap an already open connection (e.g. an in-memory database).
    pub fn from_connection(db: Connection) -> Self {
        Self {
            db,
            label: ":memory:".to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn prepare(&self, sql: &str) -> Result<rusqlite::Statement<'_>> {
        self.db.prepare(sql).map_err(|e| LiveKmlError::QueryPrepare {
            sql: sql.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(feature = "persistence")]
fn query_error(e: rusqlite::Error) -> LiveKmlError {
    LiveKmlError::Query {
        message: e.to_string(),
    }
}

#[cfg(feature = "persistence")]
impl SampleSource for SqliteSampleSource {
    fn samples(&self, window: TimeWindow) -> Result<Vec<Sample>> {
        let mut stmt = self.prepare(SAMPLE_SQL)?;

        let samples = stmt
            .query_map(params![window.start, window.end], |row| {
                Ok(Sample {
                    timestamp: row.get(0)?,
                    longitude: row.get(1)?,
                    latitude: row.get(2)?,
                    speed: row.get(3)?,
                    metric: row.get(4)?,
                })
            })
            .map_err(query_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(query_error)?;

        info!(
            "[Source] {} samples from {} in [{}, {}]",
            samples.len(),
            self.label,
            window.start,
            window.end
        );
        Ok(samples)
    }

    fn time_range(&self) -> Result<Option<TimeWindow>> {
        let mut stmt = self.prepare(TIME_RANGE_SQL)?;
        let (first, last): (Option<i64>, Option<i64>) = stmt
            .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(query_error)?;

        Ok(match (first, last) {
            (Some(first), Some(last)) => Some(TimeWindow::new(first, last)),
            _ => None,
        })
    }
}

/// Resolves store identifiers to files inside one data directory.
#[cfg(feature = "persistence")]
#[derive(Debug, Clone)]
pub struct StoreDirectory {
    root: PathBuf,
}

#[cfg(feature = "persistence")]
impl StoreDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a store. Only plain file names are accepted.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) if !name.contains('\\') => {
                Ok(self.root.join(file))
            }
            _ => Err(LiveKmlError::InvalidStoreName {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(feature = "persistence")]
impl SourceOpener for StoreDirectory {
    type Source = SqliteSampleSource;

    fn open(&self, name: &str) -> Result<SqliteSampleSource> {
        SqliteSampleSource::open(&self.resolve(name)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
