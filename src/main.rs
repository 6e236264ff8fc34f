//! Tally CLI
//!
//! Command-line interface for aggregator state files:
//! - Create a state file for a unit combination
//! - Add to and read counters
//! - List entries and export counters
//! - Merge state files

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tally::aggregation::{Entry, TimeAggregator};
use tally::config::{self, Config};

#[derive(Parser)]
#[command(name = "tally")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Calendar-bucketed counters")]
#[command(long_about = "Tally keeps signed counters grouped by calendar periods.\nState lives in a compact binary file that can be merged with others.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty state file
    Init {
        /// State file path
        state: PathBuf,
        /// Units, coarsest first (e.g. "year,month,hour"). Default: from config
        #[arg(short, long)]
        units: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Add a delta to the counter a time falls in
    Add {
        /// State file path
        state: PathBuf,
        /// Value to add, may be negative
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        /// Time (default: now). Supports: "now", "yesterday", RFC 3339, Unix milliseconds
        #[arg(short = 'a', long = "at")]
        time: Option<String>,
    },

    /// Read the counter a time falls in
    Get {
        /// State file path
        state: PathBuf,
        /// Time (default: now). Supports: "now", "yesterday", RFC 3339, Unix milliseconds
        #[arg(short = 'a', long = "at")]
        time: Option<String>,
    },

    /// List every non-zero counter
    Entries {
        /// State file path
        state: PathBuf,
    },

    /// Print period components and raw counters as JSON
    Export {
        /// State file path
        state: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sum several state files into one
    Merge {
        /// Output state file
        output: PathBuf,
        /// State files to merge, all with the same units
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Show units and periods of a state file
    Inspect {
        /// State file path
        state: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Err(e) = tally::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Init {
            state,
            units,
            force,
        } => {
            if state.exists() && !force {
                bail!("{} already exists, use --force to overwrite", state.display());
            }

            let units = match units {
                Some(list) => config::parse_units(&list)?,
                None => config.aggregator.units.clone(),
            };
            let aggregator = TimeAggregator::new(&units)?;
            save(&state, &aggregator)?;

            println!("Created {} ({})", state.display(), aggregator.flags());
        }

        Commands::Add { state, delta, time } => {
            let date = parse_time(time.as_deref())?;
            let mut aggregator = load(&state)?;
            aggregator.add(&date, delta)?;
            save(&state, &aggregator)?;

            tracing::info!(delta, at = %date, "added to {}", state.display());
            match aggregator.get(&date) {
                Some(value) => println!("{}", value),
                None => println!("0"),
            }
        }

        Commands::Get { state, time } => {
            let date = parse_time(time.as_deref())?;
            let aggregator = load(&state)?;

            match (cli.format.as_str(), aggregator.get(&date)) {
                ("json", value) => println!("{}", serde_json::json!({ "time": date, "value": value })),
                (_, Some(value)) => println!("{}", value),
                (_, None) => println!("no data"),
            }
        }

        Commands::Entries { state } => {
            let aggregator = load(&state)?;
            let entries = aggregator.entries()?;
            let columns: Vec<&'static str> = aggregator.units().iter().map(|u| u.name()).collect();

            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
                "csv" => print_csv(&entries, &columns)?,
                _ => print_table(&entries, &columns),
            }
        }

        Commands::Export { state, output } => {
            let aggregator = load(&state)?;
            let json = serde_json::to_string_pretty(&aggregator.export()?)?;

            if let Some(path) = output {
                std::fs::write(&path, &json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Exported {} periods to {}", aggregator.len(), path.display());
            } else {
                println!("{}", json);
            }
        }

        Commands::Merge { output, inputs } => {
            let mut merged: Option<TimeAggregator> = None;
            for input in &inputs {
                let aggregator = load(input)?;
                match merged.as_mut() {
                    Some(target) => target
                        .merge(aggregator)
                        .with_context(|| format!("Cannot merge {}", input.display()))?,
                    None => merged = Some(aggregator),
                }
            }

            let Some(merged) = merged else {
                bail!("No input files");
            };
            save(&output, &merged)?;
            println!(
                "Merged {} files into {} ({} periods)",
                inputs.len(),
                output.display(),
                merged.len()
            );
        }

        Commands::Inspect { state } => {
            let aggregator = load(&state)?;

            if cli.format == "json" {
                let info = serde_json::json!({
                    "kind": aggregator.kind(),
                    "units": aggregator.units(),
                    "flags": aggregator.flags().bits(),
                    "periods": aggregator.len(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("State:   {}", state.display());
                println!("Kind:    {}", aggregator.kind());
                println!("Units:   {} ({})", aggregator.flags(), aggregator.flags().bits());
                println!("Periods: {}", aggregator.len());
                if !aggregator.is_empty() {
                    println!();
                    print!("{}", aggregator);
                }
            }
        }

        Commands::Config { output } => {
            let config = config::generate_default_config();

            if let Some(path) = output {
                std::fs::write(&path, &config)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Config written to {:?}", path);
            } else {
                print!("{}", config);
            }
        }
    }

    Ok(())
}

/// Parse a CLI time argument
fn parse_time(input: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match input {
        None | Some("now") => Ok(Utc::now()),
        Some("yesterday") => Ok(Utc::now() - Duration::days(1)),
        Some(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                Ok(dt.with_timezone(&Utc))
            } else if let Some(dt) = s.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
                Ok(dt)
            } else {
                bail!("Invalid time format: {}", s)
            }
        }
    }
}

fn load(path: &Path) -> anyhow::Result<TimeAggregator> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    TimeAggregator::from_bytes(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
}

fn save(path: &Path, aggregator: &TimeAggregator) -> anyhow::Result<()> {
    std::fs::write(path, aggregator.marshal())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_table(entries: &[Entry], columns: &[&str]) {
    if entries.is_empty() {
        println!("No data");
        return;
    }

    // Header
    for column in columns {
        print!("{:<8} ", column);
    }
    println!("{:>12}", "value");

    // Separator
    println!("{}", "-".repeat(columns.len() * 9 + 12));

    // Data rows
    for entry in entries {
        for column in columns {
            let component = entry.period.get(*column).copied().unwrap_or_default();
            print!("{:<8} ", component);
        }
        println!("{:>12}", entry.value);
    }
}

fn print_csv(entries: &[Entry], columns: &[&str]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    let mut header: Vec<&str> = columns.to_vec();
    header.push("value");
    writer.write_record(&header)?;

    for entry in entries {
        let mut record: Vec<String> = columns
            .iter()
            .map(|column| entry.period.get(*column).copied().unwrap_or_default().to_string())
            .collect();
        record.push(entry.value.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    std::io::stdout().flush()?;
    Ok(())
}
