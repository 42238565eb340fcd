//! Per-request configuration.
//!
//! Every request builds one immutable [`LiveConfig`] from its query string and
//! hands it (or the slice of it they need) to the components. Missing, empty
//! or malformed parameters silently take their defaults.

use serde::{Deserialize, Serialize};

use crate::segmentation::SegmentationConfig;
use crate::source::TimeWindow;

pub const DEFAULT_SAMPLE_LENGTH: i64 = 10;
pub const DEFAULT_START_DELTA: i64 = 10;
pub const DEFAULT_UPDATE_RATE: i64 = 4;
pub const DEFAULT_TARGET_MPG: i64 = 20;
pub const DEFAULT_DB_FILENAME: &str = "ces2010.db";

/// Start-delta value meaning "the most recent window".
pub const LIVE_START_DELTA: i64 = -1;

/// Request parameters, resolved and defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Window length in seconds
    pub sample_length: i64,
    /// How far before now the window starts, in seconds (already resolved:
    /// never the live sentinel)
    pub start_delta: i64,
    /// Viewer refresh interval in seconds; non-positive disables refresh
    pub update_rate: i64,
    /// Store file name inside the server's data directory
    pub db_filename: String,
    /// Fuel-economy target in mpg
    pub target_mpg: i64,
    /// Mode selector (0 form, 1 polling envelope, 2 trace document)
    pub stage: i64,
    /// Serve documents as plain text for inspection in a browser
    pub debug: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            sample_length: DEFAULT_SAMPLE_LENGTH,
            start_delta: DEFAULT_START_DELTA,
            update_rate: DEFAULT_UPDATE_RATE,
            db_filename: DEFAULT_DB_FILENAME.to_string(),
            target_mpg: DEFAULT_TARGET_MPG,
            stage: 0,
            debug: false,
        }
    }
}

impl LiveConfig {
    /// Build from a URL query string (without the leading `?`).
    ///
    /// # Example
    /// ```
    /// use livekml::LiveConfig;
    /// let config = LiveConfig::from_query("samplelength=30&startdelta=-1&targetmpg=abc");
    /// assert_eq!(config.sample_length, 30);
    /// assert_eq!(config.start_delta, 30);
    /// assert_eq!(config.target_mpg, 20);
    /// ```
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Build from decoded key/value pairs. Later duplicates win.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        let mut start_delta = None;

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "samplelength" => {
                    config.sample_length = coerce_int(value).unwrap_or(DEFAULT_SAMPLE_LENGTH)
                }
                "startdelta" => start_delta = coerce_int(value),
                "updaterate" => {
                    config.update_rate = coerce_int(value).unwrap_or(DEFAULT_UPDATE_RATE)
                }
                "dbfilename" => config.db_filename = value.to_string(),
                "targetmpg" => config.target_mpg = coerce_int(value).unwrap_or(DEFAULT_TARGET_MPG),
                "stage" => config.stage = coerce_int(value).unwrap_or(0),
                "debug" => config.debug = coerce_int(value).map(|v| v != 0).unwrap_or(false),
                _ => {}
            }
        }

        // Resolved after the loop so parameter order doesn't matter
        config.start_delta = match start_delta {
            Some(LIVE_START_DELTA) => config.sample_length,
            Some(delta) => delta,
            None => DEFAULT_START_DELTA,
        };

        config
    }

    /// The closed sample window relative to `now` (Unix seconds). Extreme
    /// parameters clamp at the ends of the timestamp range.
    pub fn window(&self, now: i64) -> TimeWindow {
        let start = now.saturating_sub(self.start_delta);
        TimeWindow::new(start, start.saturating_add(self.sample_length))
    }

    /// Segmentation settings for this request.
    pub fn segmentation(&self, legacy: bool) -> SegmentationConfig {
        SegmentationConfig::with_target(self.target_mpg as f64).legacy(legacy)
    }

    /// Query string that asks for the trace document with the same window,
    /// store and target.
    pub fn trace_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("startdelta", &self.start_delta.to_string())
            .append_pair("samplelength", &self.sample_length.to_string())
            .append_pair("dbfilename", &self.db_filename)
            .append_pair("targetmpg", &self.target_mpg.to_string());
        if self.debug {
            query.append_pair("debug", "1");
        }
        query.append_pair("stage", "2");
        query.finish()
    }
}

/// Integer coercion: integer text, else decimal text truncated toward zero.
fn coerce_int(value: &str) -> Option<i64> {
    if let Ok(v) = value.parse::<i64>() {
        return Some(v);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= i64::MIN as f64 && *v <= i64::MAX as f64)
        .map(|v| v.trunc() as i64)
}
