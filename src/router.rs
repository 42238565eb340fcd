//! Request routing.
//!
//! One request selects exactly one [`Operation`] and runs it to completion:
//!
//! - [`Operation::ConfigForm`]: the HTML launch form
//! - [`Operation::PollingEnvelope`]: a `NetworkLink` back to the trace document
//! - [`Operation::TraceDocument`]: source -> segmentation -> KML
//!
//! Nothing is shared between requests; the store is opened for the trace
//! document only and closed when the request ends.

use log::{error, info, warn};

use crate::kml::document::{trace_document, GaugeOverlay};
use crate::kml::envelope::polling_envelope;
use crate::kml::node::{to_xml, Element};
use crate::kml::KML_CONTENT_TYPE;
use crate::segmentation::{segment_samples_with_stats, SegmentationConfig, SegmentationStats};
use crate::source::{SampleSource, SourceOpener, TimeWindow};
use crate::{form, LiveConfig, LiveKmlError, Result, Segment, StyleCatalog};

pub const ENVELOPE_FILENAME: &str = "liveobdseed.kml";
pub const DOCUMENT_FILENAME: &str = "liveobd.kml";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// The closed set of things a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ConfigForm,
    PollingEnvelope,
    TraceDocument,
}

impl Operation {
    /// Map the `stage` selector. Anything unknown shows the form.
    pub fn from_stage(stage: i64) -> Self {
        match stage {
            1 => Operation::PollingEnvelope,
            2 => Operation::TraceDocument,
            _ => Operation::ConfigForm,
        }
    }
}

/// A parsed request: the operation plus its immutable configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub config: LiveConfig,
}

impl Request {
    pub fn from_query(query: &str) -> Self {
        let config = LiveConfig::from_query(query);
        Self {
            operation: Operation::from_stage(config.stage),
            config,
        }
    }
}

/// Facts about the serving environment a request needs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Current Unix time in seconds
    pub now: i64,
    /// Absolute URL of this endpoint, without a query
    pub endpoint_url: String,
    /// Absolute URL of the gauge image renderer
    pub gauge_url: String,
    /// Serve every document as plain text
    pub force_debug: bool,
    /// A first fix at the origin counts as a duplicate
    pub legacy: bool,
}

/// A complete response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    /// Download file name hint
    pub attachment: Option<String>,
    pub body: String,
}

impl Response {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_CONTENT_TYPE.to_string(),
            attachment: None,
            body: body.into(),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: HTML_CONTENT_TYPE.to_string(),
            attachment: None,
            body,
        }
    }

    /// KML body; in debug mode served as plain text so a browser shows it.
    pub fn kml(body: String, filename: &str, debug: bool) -> Self {
        if debug {
            return Self::text(200, body);
        }
        Self {
            status: 200,
            content_type: KML_CONTENT_TYPE.to_string(),
            attachment: Some(filename.to_string()),
            body,
        }
    }

    pub fn content_disposition(&self) -> Option<String> {
        self.attachment
            .as_ref()
            .map(|name| format!("attachment; filename={}", name))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything produced for one trace document.
#[derive(Debug, Clone)]
pub struct TraceOutput {
    pub segments: Vec<Segment>,
    pub stats: SegmentationStats,
    pub document: Element,
}

/// Fetch, segment and build the trace document for one window.
pub fn build_trace<S>(
    source: &S,
    window: TimeWindow,
    segmentation: &SegmentationConfig,
    gauge: &GaugeOverlay,
) -> Result<TraceOutput>
where
    S: SampleSource + ?Sized,
{
    let samples = source.samples(window)?;
    let (segments, stats) = segment_samples_with_stats(samples, segmentation);
    let document = trace_document(&segments, &StyleCatalog::default(), gauge);

    Ok(TraceOutput {
        segments,
        stats,
        document,
    })
}

/// Run one request.
pub fn handle<O: SourceOpener>(request: &Request, ctx: &RequestContext, opener: &O) -> Response {
    let response = match request.operation {
        Operation::ConfigForm => config_form(&request.config, ctx, opener),
        Operation::PollingEnvelope => envelope(&request.config, ctx),
        Operation::TraceDocument => {
            trace(&request.config, ctx, opener).unwrap_or_else(|e| store_failure(&e))
        }
    };

    info!(
        "[Router] {:?} -> {} ({} bytes)",
        request.operation,
        response.status,
        response.body.len()
    );
    response
}

fn config_form<O: SourceOpener>(config: &LiveConfig, ctx: &RequestContext, opener: &O) -> Response {
    // Only used to offer a replay start; any store problem just hides it
    let recording_start = opener
        .open(&config.db_filename)
        .and_then(|source| source.time_range())
        .map(|range| range.map(|r| ctx.now.saturating_sub(r.start)));

    let recording_start = match recording_start {
        Ok(delta) => delta,
        Err(e) => {
            warn!("[Router] No replay start for {}: {}", config.db_filename, e);
            None
        }
    };

    Response::html(form::render_form(config, recording_start))
}

fn envelope(config: &LiveConfig, ctx: &RequestContext) -> Response {
    let href = format!("{}?{}", ctx.endpoint_url, config.trace_query());
    let root = polling_envelope(&href, config.update_rate);
    Response::kml(
        to_xml(&root),
        ENVELOPE_FILENAME,
        config.debug || ctx.force_debug,
    )
}

fn trace<O: SourceOpener>(
    config: &LiveConfig,
    ctx: &RequestContext,
    opener: &O,
) -> Result<Response> {
    let window = config.window(ctx.now);
    let gauge = GaugeOverlay::vehicle_speed(&ctx.gauge_url, ctx.now.saturating_sub(window.end));

    let output = {
        let source = opener.open(&config.db_filename)?;
        build_trace(&source, window, &config.segmentation(ctx.legacy), &gauge)?
    };

    info!(
        "[Router] {} [{}, {}]: {} samples, {} duplicates, {} segments",
        config.db_filename,
        window.start,
        window.end,
        output.stats.samples_seen,
        output.stats.duplicates_dropped,
        output.stats.segments_emitted
    );

    Ok(Response::kml(
        to_xml(&output.document),
        DOCUMENT_FILENAME,
        config.debug || ctx.force_debug,
    ))
}

fn store_failure(e: &LiveKmlError) -> Response {
    error!("[Router] Request aborted: {}", e);
    Response::text(500, format!("{}\n", e))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Classification, Sample};

    const NOW: i64 = 1_000_000;

    /// Opens in-memory sources; names starting with "missing" fail.
    struct MemoryStores {
        samples: Vec<Sample>,
    }

    impl SourceOpener for MemoryStores {
        type Source = Vec<Sample>;

        fn open(&self, name: &str) -> Result<Vec<Sample>> {
            if name.starts_with("missing") {
                return Err(LiveKmlError::StoreOpen {
                    path: name.to_string(),
                    message: "unable to open database file".to_string(),
                });
            }
            Ok(self.samples.clone())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext {
            now: NOW,
            endpoint_url: "http://localhost:8080/livekml".to_string(),
            gauge_url: "http://localhost:8080/gauge".to_string(),
            force_debug: false,
            legacy: false,
        }
    }

    fn stores() -> MemoryStores {
        let t0 = NOW - 10;
        MemoryStores {
            samples: vec![
                Sample::new(t0, -122.0, 37.0).with_speed(30.0).with_metric(25.0),
                Sample::new(t0 + 1, -122.1, 37.0).with_speed(31.0).with_metric(26.0),
                Sample::new(t0 + 2, -122.1, 37.0).with_speed(31.0).with_metric(26.0),
                Sample::new(t0 + 3, -122.2, 37.0).with_speed(32.0).with_metric(10.0),
                Sample::new(t0 + 4, -122.3, 37.0).with_speed(33.0),
                // Outside the default window
                Sample::new(t0 + 20, -122.4, 37.0).with_speed(34.0).with_metric(30.0),
            ],
        }
    }

    #[test]
    fn test_operation_from_stage() {
        assert_eq!(Operation::from_stage(0), Operation::ConfigForm);
        assert_eq!(Operation::from_stage(1), Operation::PollingEnvelope);
        assert_eq!(Operation::from_stage(2), Operation::TraceDocument);
        assert_eq!(Operation::from_stage(7), Operation::ConfigForm);
        assert_eq!(Request::from_query("").operation, Operation::ConfigForm);
    }

    #[test]
    fn test_form_mode() {
        let response = handle(&Request::from_query("stage=0"), &ctx(), &stores());
        assert_eq!(response.status, 200);
        assert!(response.content_type.starts_with("text/html"));
        // First sample is 10s before now
        assert!(response.body.contains(r#"<option value="10" selected="selected">"#));
    }

    #[test]
    fn test_form_mode_replay_start_clamps() {
        let skewed = RequestContext {
            now: i64::MIN,
            ..ctx()
        };
        let response = handle(&Request::from_query("stage=0"), &skewed, &stores());
        assert_eq!(response.status, 200);
        assert!(response
            .body
            .contains(r#"<option value="-9223372036854775808" selected="selected">"#));
    }

    #[test]
    fn test_form_mode_survives_store_failure() {
        let response = handle(
            &Request::from_query("dbfilename=missing.db"),
            &ctx(),
            &stores(),
        );
        assert_eq!(response.status, 200);
        assert!(response.body.contains("Live Data"));
    }

    #[test]
    fn test_envelope_mode() {
        let response = handle(
            &Request::from_query("stage=1&startdelta=-1&samplelength=20&updaterate=8"),
            &ctx(),
            &stores(),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, KML_CONTENT_TYPE);
        assert_eq!(
            response.content_disposition().as_deref(),
            Some("attachment; filename=liveobdseed.kml")
        );
        assert!(response.body.contains(
            "<![CDATA[http://localhost:8080/livekml?startdelta=20&samplelength=20&dbfilename=ces2010.db&targetmpg=20&stage=2]]>"
        ));
        assert!(response.body.contains("<refreshInterval>8</refreshInterval>"));
    }

    #[test]
    fn test_envelope_mode_zero_refresh() {
        let response = handle(
            &Request::from_query("stage=1&updaterate=0"),
            &ctx(),
            &stores(),
        );
        assert!(!response.body.contains("refreshMode"));
        assert!(!response.body.contains("refreshInterval"));
    }

    #[test]
    fn test_envelope_never_touches_store() {
        let response = handle(
            &Request::from_query("stage=1&dbfilename=missing.db"),
            &ctx(),
            &stores(),
        );
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_trace_mode() {
        let response = handle(&Request::from_query("stage=2"), &ctx(), &stores());
        assert_eq!(response.status, 200);
        assert_eq!(
            response.content_disposition().as_deref(),
            Some("attachment; filename=liveobd.kml")
        );

        let body = &response.body;
        assert_eq!(body.matches("<Placemark>").count(), 2);
        assert!(body.contains("<styleUrl>#LiveOBDKMLStyleGreen</styleUrl>"));
        assert!(body.contains("<styleUrl>#LiveOBDKMLStyleRed</styleUrl>"));
        assert!(body.contains("-122,37,30\n-122.1,37,31\n"));
        assert!(!body.contains("-122.4"));
        // Window ends at now, gauge looks back 0s from the end
        assert!(body.contains("startdelta=0&amp;datacolumn=vss"));
    }

    #[test]
    fn test_trace_mode_debug_is_plain_text() {
        let response = handle(&Request::from_query("stage=2&debug=1"), &ctx(), &stores());
        assert!(response.content_type.starts_with("text/plain"));
        assert!(response.attachment.is_none());
        assert!(response.body.contains("<Placemark>"));

        let forced = RequestContext {
            force_debug: true,
            ..ctx()
        };
        let response = handle(&Request::from_query("stage=2"), &forced, &stores());
        assert!(response.content_type.starts_with("text/plain"));
    }

    #[test]
    fn test_trace_mode_store_failure() {
        let response = handle(
            &Request::from_query("stage=2&dbfilename=missing.db"),
            &ctx(),
            &stores(),
        );
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert!(response.content_type.starts_with("text/plain"));
        assert!(response.body.starts_with("Error opening database missing.db"));
    }

    #[test]
    fn test_trace_mode_empty_window() {
        let response = handle(
            &Request::from_query("stage=2&startdelta=5000"),
            &ctx(),
            &stores(),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body.matches("<Placemark>").count(), 1);
        assert!(response.body.contains("<styleUrl>#</styleUrl>"));
    }

    #[test]
    fn test_trace_mode_extreme_window_parameters() {
        for query in [
            "stage=2&samplelength=9223372036854775807&startdelta=0",
            "stage=2&startdelta=-9223372036854775807&samplelength=10",
            "stage=2&startdelta=9223372036854775807",
        ] {
            let response = handle(&Request::from_query(query), &ctx(), &stores());
            assert_eq!(response.status, 200, "{}", query);
            assert!(response.body.contains("<Placemark>"));
        }
    }

    #[test]
    fn test_build_trace() {
        let stores = stores();
        let gauge = GaugeOverlay::vehicle_speed("http://g", 0);
        let output = build_trace(
            &stores.samples,
            TimeWindow::new(NOW - 10, NOW),
            &SegmentationConfig::with_target(20.0),
            &gauge,
        )
        .unwrap();

        assert_eq!(output.stats.samples_seen, 5);
        assert_eq!(output.stats.duplicates_dropped, 1);
        assert_eq!(output.segments.len(), 2);
        assert_eq!(
            output.segments[0].classification,
            Some(Classification::AboveTarget)
        );
        // The crossing fix closes the first line and opens the second
        assert_eq!(output.segments[0].len(), 3);
        assert_eq!(output.segments[1].len(), 2);
        assert_eq!(
            output.segments[0].last_point(),
            output.segments[1].first_point()
        );
    }
}
