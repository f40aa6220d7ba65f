use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use poiscout::api::SearchStatus;
use poiscout::config::{FileConfig, Settings};
use poiscout::domain::Tag;
use poiscout::geometry::AreaStrategy;
use poiscout::output::CsvFileSink;
use poiscout::{Pipeline, RunEvent, RunOutcome, SearchRequest};

/// Find businesses around an address in OpenStreetMap and export them to CSV
///
/// Examples:
///   # Cafés within 350m of an address
///   poiscout "Hermannstraße 100, Berlin"
///
///   # Up to 50 bakeries within 1km
///   poiscout "Hermannstraße 100, Berlin" --tag shop=bakery -n 50 -r 1000
///
///   # Search the geocoder's own bounding box instead of a radius
///   poiscout "Tempelhofer Feld, Berlin" --tag amenity=restaurant --strategy bbox
#[derive(Parser, Debug)]
#[command(name = "poiscout")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to search around (optional if set in the config file)
    address: Option<String>,

    /// Path to config file (optional, auto-searches poiscout.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// OSM tag to match, e.g. amenity=cafe or shop=bakery
    #[arg(short = 't', long)]
    tag: Option<Tag>,

    /// Maximum number of elements returned by Overpass
    #[arg(short = 'n', long)]
    max_results: Option<u32>,

    /// Search radius in meters (radius strategy only)
    #[arg(short = 'r', long)]
    radius: Option<f64>,

    /// How to derive the search area from the geocoded address
    #[arg(long, value_enum)]
    strategy: Option<AreaStrategy>,

    /// Output CSV path (defaults to results.csv)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve the whole configuration first so `verbose` from any config
    // file reaches the log filter
    let (file_config, skipped) = match args.config {
        Some(ref path) => (Some(FileConfig::from_path(path)?), Vec::new()),
        None => FileConfig::load(),
    };
    let settings = merge_settings(&args, Settings::from_file(file_config));
    init_tracing(settings.verbose);
    for error in &skipped {
        tracing::warn!("skipping config file: {error}");
    }

    let Some(address) = settings.address.clone() else {
        bail!("Must provide an address, either as an argument or in the config file");
    };

    println!("poiscout - OpenStreetMap business finder");
    println!("========================================");
    println!();

    if settings.verbose {
        println!("Configuration:");
        println!("  Address: {}", address);
        println!("  Tag: {}", settings.tag);
        println!("  Max results: {}", settings.max_results);
        println!("  Strategy: {:?}", settings.strategy);
        if settings.strategy == AreaStrategy::Radius {
            println!("  Radius: {}m", settings.radius_m);
        }
        println!("  Output: {}", settings.output.display());
        println!("  Overpass mirrors: {}", settings.overpass.urls.len());
        println!();
    }

    let total_start = Instant::now();
    let pipeline = Pipeline::from_settings(&settings).context("Invalid configuration")?;
    let request = SearchRequest::new(address, settings.tag.clone(), settings.max_results);
    let mut sink = CsvFileSink::new(&settings.output);

    let mut spinner: Option<ProgressBar> = None;
    let mut start = Instant::now();

    let result = pipeline.run_with_progress(&request, &mut sink, |event| match event {
        RunEvent::Geocoding { .. } => {
            spinner = Some(create_spinner("Geocoding address..."));
            start = Instant::now();
        }
        RunEvent::Geocoded(geocoded) => {
            let (lat, lon) = geocoded.reference_point;
            finish_spinner(
                &mut spinner,
                format!(
                    "Geocoded: {} -> ({:.5}, {:.5}) [{:.1}s]",
                    geocoded.display_name,
                    lat,
                    lon,
                    start.elapsed().as_secs_f32()
                ),
            );
        }
        RunEvent::AreaDerived(area) => println!(
            "Search area: S {:.5} W {:.5} N {:.5} E {:.5}",
            area.south, area.west, area.north, area.east
        ),
        RunEvent::Searching { tag } => {
            spinner = Some(create_spinner(&format!("Querying Overpass for {}...", tag)));
            start = Instant::now();
        }
        RunEvent::Searched(outcome) => {
            let message = match &outcome.status {
                SearchStatus::Answered { endpoint } => format!(
                    "Fetched {} elements from {} [{:.1}s]",
                    outcome.elements.len(),
                    endpoint,
                    start.elapsed().as_secs_f32()
                ),
                SearchStatus::Exhausted => format!(
                    "All {} Overpass servers failed, writing an empty result [{:.1}s]",
                    outcome.failures.len(),
                    start.elapsed().as_secs_f32()
                ),
            };
            finish_spinner(&mut spinner, message);
            if settings.verbose {
                for (endpoint, failure) in &outcome.failures {
                    println!("  {}: {}", endpoint, failure);
                }
            }
        }
        RunEvent::Written { .. } => {}
    });

    // Geocoding or area derivation may have failed mid-spinner
    if let Some(pb) = spinner.take() {
        pb.abandon();
    }

    match result.context("Search failed")? {
        RunOutcome::AddressNotFound { address } => {
            println!("Address not found: {}", address);
        }
        RunOutcome::Completed(summary) => {
            println!();
            println!(
                "Saved {} with {} records! Total time: {:.1}s",
                sink.path().display(),
                summary.records,
                total_start.elapsed().as_secs_f32()
            );
        }
    }

    Ok(())
}

fn finish_spinner(spinner: &mut Option<ProgressBar>, message: String) {
    if let Some(pb) = spinner.take() {
        pb.finish_with_message(message);
    }
}

/// Command-line arguments take precedence over the config file
fn merge_settings(args: &Args, mut settings: Settings) -> Settings {
    if let Some(ref address) = args.address {
        settings.address = Some(address.clone());
    }
    if let Some(ref tag) = args.tag {
        settings.tag = tag.clone();
    }
    if let Some(max_results) = args.max_results {
        settings.max_results = max_results;
    }
    if let Some(radius) = args.radius {
        settings.radius_m = radius;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(ref output) = args.output {
        settings.output = output.clone();
    }
    settings.verbose |= args.verbose;
    settings
}

fn default_log_filter(verbose: bool) -> &'static str {
    if verbose { "poiscout=debug" } else { "warn" }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
