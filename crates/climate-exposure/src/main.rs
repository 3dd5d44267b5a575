//! Climate Exposure CLI
//!
//! Scores a trip portfolio for physical climate risk.
//!
//! Usage:
//!   climate-exposure resolve "Maroc (Sud)" "USA - Floride"
//!   climate-exposure report --input trips.csv --month 7 --scenario pessimistic \
//!                           --output report.json --geojson map.geojson
//!   climate-exposure recommend --input trips.csv --destination Egypte --safe 50
//!   climate-exposure segment --input trips.json

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use climate_exposure::aggregator::{self, RecordFilter};
use climate_exposure::portfolio::{PortfolioSummary, PortfolioView};
use climate_exposure::resolver::resolve_with;
use climate_exposure::scorer::{enrich, Scenario};
use climate_exposure::segment::{segment_destinations, KMeans, DESTINATION_FEATURES};
use climate_exposure::{
    export, loader, recommender, AggregatedDestination, EngineConfig, EnrichedRecord,
    KnowledgeBase, Month,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "climate-exposure",
    about = "Climate-risk scoring and exposure for a travel portfolio"
)]
struct Cli {
    /// JSON config file (defaults < file < CLIMATE_* env < flags)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ScoringArgs {
    /// Month to score for (1-12), defaults to the current month
    #[arg(short, long)]
    month: Option<Month>,

    /// Climate scenario: current or pessimistic
    #[arg(short, long)]
    scenario: Option<Scenario>,

    /// Spend per traveler for rows without their own spend
    #[arg(long)]
    avg_spend: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve destination names to risk profiles
    Resolve {
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Score, aggregate and summarize a portfolio
    Report {
        /// Trips file (.csv or .json)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        scoring: ScoringArgs,

        /// Keep only this region (e.g. Afrique, Europe/Polaire)
        #[arg(long)]
        region: Option<String>,

        /// Keep only rows scoring at least this
        #[arg(long)]
        min_score: Option<f64>,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the map GeoJSON here
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// Suggest a safer substitute for a critical destination
    Recommend {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        scoring: ScoringArgs,

        /// Destination to replace
        #[arg(short, long)]
        destination: String,

        /// Substitutes must score below this
        #[arg(long)]
        safe: Option<f64>,

        /// Destination must score above this
        #[arg(long)]
        critical: Option<f64>,
    },

    /// Split destinations into best / neutral / worst segments
    Segment {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        scoring: ScoringArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    month: Month,
    scenario: Scenario,
    average_spend: f64,
    summary: PortfolioSummary,
    destinations: &'a [AggregatedDestination],
}

fn init_tracing(verbose: bool) -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_config(path: Option<&Path>, scoring: &ScoringArgs) -> Result<EngineConfig> {
    let mut config = match path {
        Some(p) => {
            let mut config = EngineConfig::from_file(p)
                .with_context(|| format!("Failed to load config {}", p.display()))?;
            config.apply_env()?;
            config
        }
        None => EngineConfig::from_env()?,
    };

    if let Some(month) = scoring.month {
        config.month = Some(month);
    }
    if let Some(scenario) = scoring.scenario {
        config.scenario = scenario;
    }
    if let Some(spend) = scoring.avg_spend {
        config.average_spend = spend;
    }
    // Pin the month once for the whole run
    config.month = Some(config.month_or_current());
    Ok(config)
}

fn load_and_enrich(
    input: &Path,
    kb: &KnowledgeBase,
    config: &EngineConfig,
) -> Result<Vec<EnrichedRecord>> {
    let trips = loader::load_trips(input)
        .with_context(|| format!("Failed to load trips from {}", input.display()))?;
    Ok(enrich(trips, kb, &config.scoring_params()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            info!("Writing output to {:?}", path);
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, value)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

fn run_report(
    kb: &KnowledgeBase,
    config: &EngineConfig,
    input: &Path,
    filter: &RecordFilter,
    output: Option<&Path>,
    geojson: Option<&Path>,
) -> Result<()> {
    let records = load_and_enrich(input, kb, config)?;
    let PortfolioView {
        summary,
        destinations: portfolio,
    } = PortfolioView::build(&records, filter, config);
    let params = config.scoring_params();

    info!("{}", "=".repeat(60));
    info!("PORTFOLIO SUMMARY (month {}, {} scenario)", params.month, params.scenario);
    info!("{}", "=".repeat(60));
    info!("Destinations: {}", summary.destinations);
    info!(
        "Travelers: {} ({} at high risk)",
        summary.total_travelers, summary.high_risk_travelers
    );
    info!("Cash at risk: {:.0} / {:.0}", summary.high_risk_exposure, summary.total_exposure);
    for zone in &summary.alert_zones {
        info!(
            "  ALERT {:30} | score {:5.1} | {} travelers",
            zone.destination, zone.score, zone.travelers
        );
    }
    if !summary.unresolved.is_empty() {
        info!("Unresolved: {}", summary.unresolved.join(", "));
    }

    if let Some(path) = geojson {
        info!("Writing GeoJSON to {:?}", path);
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &export::to_geojson(&portfolio, &params))?;
    }

    let report = Report {
        month: params.month,
        scenario: params.scenario,
        average_spend: params.average_spend,
        summary,
        destinations: &portfolio,
    };
    write_json(&report, output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let config_path = cli.config.as_deref();
    let kb = KnowledgeBase::global();

    match &cli.command {
        Command::Resolve { texts } => {
            let resolved: Vec<serde_json::Value> = texts
                .iter()
                .map(|text| serde_json::json!({ "input": text, "profile": resolve_with(kb, text) }))
                .collect();
            write_json(&resolved, None)?;
        }

        Command::Report {
            input,
            scoring,
            region,
            min_score,
            output,
            geojson,
        } => {
            let config = build_config(config_path, scoring)?;
            config.validate()?;
            let filter = RecordFilter {
                region: region.clone(),
                min_score: *min_score,
            };
            filter.validate(kb)?;
            run_report(
                kb,
                &config,
                input,
                &filter,
                output.as_deref(),
                geojson.as_deref(),
            )?;
        }

        Command::Recommend {
            input,
            scoring,
            destination,
            safe,
            critical,
        } => {
            let mut config = build_config(config_path, scoring)?;
            if let Some(safe) = safe {
                config.safe_threshold = *safe;
            }
            if let Some(critical) = critical {
                config.critical_threshold = *critical;
            }
            config.validate()?;

            let records = load_and_enrich(input, kb, &config)?;
            let portfolio = aggregator::aggregate(&records);
            let thresholds = config.recommender_config();
            match recommender::recommend(kb, &portfolio, destination, &thresholds)? {
                Some(recommendation) => write_json(&recommendation, None)?,
                None => println!(
                    "No recommendation available: nothing in the portfolio scores below {:.1}",
                    config.safe_threshold
                ),
            }
        }

        Command::Segment {
            input,
            scoring,
            output,
        } => {
            let config = build_config(config_path, scoring)?;
            config.validate()?;

            let records = load_and_enrich(input, kb, &config)?;
            let portfolio = aggregator::aggregate(&records);
            let segments = segment_destinations(&portfolio, &KMeans::default())?;
            for s in &segments {
                info!(
                    "{:?}: {} destinations, mean score {:.1}",
                    s.label,
                    s.members.len(),
                    s.feature_means[0]
                );
            }
            let out = serde_json::json!({ "features": DESTINATION_FEATURES, "segments": segments });
            write_json(&out, output.as_deref())?;
        }
    }

    Ok(())
}
