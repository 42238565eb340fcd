use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use log::{error, info};

use livekml::kml::{to_xml, GaugeOverlay};
use livekml::router::build_trace;
use livekml::server::{DEFAULT_BIND, DEFAULT_ENDPOINT};
use livekml::{
    BoundaryMode, LiveKmlServer, SampleSource, SegmentationConfig, ServerOptions,
    SqliteSampleSource, TimeWindow,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live OBD/GPS trace to KML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the form, polling envelope and live trace over HTTP
    Serve(ServeArgs),
    /// Render one trace document from a logger database
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Path the endpoint answers on
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory holding the logger databases
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Gauge renderer URL (defaults to `gauge` next to the endpoint)
    #[arg(long)]
    gauge_url: Option<String>,

    /// Serve documents as plain text
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,

    /// A first fix at the origin counts as a duplicate
    #[arg(long, action = ArgAction::SetTrue)]
    legacy: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Logger database
    #[arg(long, value_hint = ValueHint::FilePath)]
    db: PathBuf,

    /// Window start (unix seconds); defaults to the first fix
    #[arg(long)]
    start: Option<i64>,

    /// Window end (unix seconds); defaults to the last fix
    #[arg(long)]
    end: Option<i64>,

    /// Target fuel economy (mpg)
    #[arg(long, default_value_t = 20)]
    target: i64,

    /// Gauge renderer URL for the overlay
    #[arg(long, default_value = "gauge")]
    gauge_url: String,

    /// Output path (stdout when omitted)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Write the segments as JSON instead of KML
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Leave the point where economy crosses the target on the later segment only
    #[arg(long, action = ArgAction::SetTrue)]
    split_boundaries: bool,

    /// A first fix at the origin counts as a duplicate
    #[arg(long, action = ArgAction::SetTrue)]
    legacy: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve(args) => serve(args),
        Command::Render(args) => render(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let server = LiveKmlServer::new(ServerOptions {
        bind: args.bind,
        endpoint_path: args.endpoint,
        data_dir: args.data_dir,
        gauge_url: args.gauge_url,
        force_debug: args.debug,
        legacy: args.legacy,
    });
    server.serve()?;
    Ok(())
}

fn render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = SqliteSampleSource::open(&args.db)?;

    let window = match (args.start, args.end) {
        (Some(start), Some(end)) => TimeWindow::new(start, end),
        (start, end) => {
            let range = source
                .time_range()?
                .ok_or_else(|| format!("{} holds no GPS fixes", source.label()))?;
            TimeWindow::new(start.unwrap_or(range.start), end.unwrap_or(range.end))
        }
    };

    let boundary = if args.split_boundaries {
        BoundaryMode::Split
    } else {
        BoundaryMode::Shared
    };
    let segmentation = SegmentationConfig::with_target(args.target as f64)
        .legacy(args.legacy)
        .with_boundary(boundary);
    let gauge = GaugeOverlay::vehicle_speed(
        &args.gauge_url,
        Utc::now().timestamp().saturating_sub(window.end),
    );

    let output = build_trace(&source, window, &segmentation, &gauge)?;
    info!(
        "[Render] {}..{}: {} samples, {} duplicates, {} segments",
        window.start,
        window.end,
        output.stats.samples_seen,
        output.stats.duplicates_dropped,
        output.stats.segments_emitted
    );

    let body = if args.json {
        serde_json::to_string_pretty(&serde_json::json!({
            "window": { "start": window.start, "end": window.end },
            "stats": output.stats,
            "segments": output.segments,
        }))?
    } else {
        to_xml(&output.document)
    };

    write_output(args.output.as_deref(), &body)?;
    Ok(())
}

fn write_output(path: Option<&Path>, body: &str) -> livekml::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, body)?;
            info!("[Render] Wrote {}", path.display());
        }
        None => io::stdout().lock().write_all(body.as_bytes())?,
    }
    Ok(())
}
