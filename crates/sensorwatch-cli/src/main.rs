// Sensorwatch CLI - anomaly detection for sensor telemetry

mod loader;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use sensorwatch_anomaly::{
    load_config, AnalysisPipeline, AnalysisReport, AnalyzeOptions, AppConfig, ArtifactError,
    DetectorError, SchemaMismatchPolicy,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{warn, Level};

#[derive(Parser)]
#[command(name = "sensorwatch")]
#[command(version = "0.1.0")]
#[command(about = "Isolation forest anomaly detection for sensor CSV exports", long_about = None)]
struct Cli {
    /// Config file (or set SENSORWATCH_CONFIG env var)
    #[arg(short, long, env = "SENSORWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model on a CSV file
    Train {
        /// Path to CSV file
        file: PathBuf,
    },

    /// Score a CSV file against the saved model
    Analyze {
        /// Path to CSV file
        file: PathBuf,

        /// Train on this file when no model exists yet
        #[arg(long)]
        train_if_missing: bool,

        /// Analyze generated sample data when the file lacks model columns
        #[arg(long)]
        fallback_sample: bool,

        /// Override chart.max_points
        #[arg(short, long)]
        max_points: Option<usize>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the JSON report instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Retrain on generated sample data and analyze it
    Sample {
        /// Number of points to generate
        #[arg(short, long, default_value = "1000")]
        points: usize,

        /// Print the JSON report instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show model status
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Train { file } => {
            train(&config, &file)?;
        }
        Commands::Analyze {
            file,
            train_if_missing,
            fallback_sample,
            max_points,
            output,
            json,
        } => {
            if let Some(max_points) = max_points {
                config.chart.max_points = max_points;
                config.validate()?;
            }
            let options = AnalyzeOptions {
                train_if_missing,
                on_schema_mismatch: if fallback_sample {
                    SchemaMismatchPolicy::SubstituteSample
                } else {
                    SchemaMismatchPolicy::Reject
                },
                now: None,
            };
            analyze(&config, &file, &options, output.as_deref(), json)?;
        }
        Commands::Sample { points, json } => {
            let pipeline = AnalysisPipeline::from_config(&config);
            let now = chrono::Utc::now().naive_utc();
            let report = pipeline.analyze_sample(points, now)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Status => {
            status(&config)?;
        }
    }

    Ok(())
}

// activate the saved model if there is a usable one
fn load_existing(pipeline: &AnalysisPipeline) -> Result<(), DetectorError> {
    match pipeline.detector().load() {
        Ok(_) => Ok(()),
        Err(DetectorError::Artifact(
            err @ (ArtifactError::NotFound(_) | ArtifactError::Corrupt(_)),
        )) => {
            warn!(error = %err, "No usable saved model");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn train(config: &AppConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{} {}", "Training on".cyan().bold(), file.display());
    println!("{}", "─".repeat(50).dimmed());

    let data = loader::load_csv(file)?;
    let pipeline = AnalysisPipeline::from_config(config);
    let artifact = pipeline.train(&data)?;

    println!(
        "{} {} of {} rows",
        "✓ Trained on".green(),
        artifact.training_rows.to_string().yellow(),
        data.len()
    );
    println!(
        "{} {}",
        "Features:".dimmed(),
        artifact.feature_list.columns().join(", ")
    );
    println!(
        "{} {}",
        "Saved to:".dimmed(),
        pipeline.detector().store().path().display()
    );
    Ok(())
}

fn analyze(
    config: &AppConfig,
    file: &Path,
    options: &AnalyzeOptions,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = loader::load_csv(file)?;
    let pipeline = AnalysisPipeline::from_config(config);
    load_existing(&pipeline)?;

    let report = pipeline.analyze(&data, options)?;

    if let Some(path) = output {
        serde_json::to_writer_pretty(File::create(path)?, &report)?;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        if let Some(path) = output {
            println!("{} {}", "Report written to".dimmed(), path.display());
        }
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("\n{}", report.message.cyan().bold());
    println!("{}", "─".repeat(60).dimmed());

    if report.sample_substituted {
        println!("{}", "⚠ Upload did not match the model, sample data analyzed".yellow());
    }
    if report.timestamps_generated {
        println!("{}", "⚠ Timestamps were generated".yellow());
    }

    println!(
        "{} {} | {} {} | {} {}%",
        "Points:".dimmed(),
        report.total_points.to_string().yellow(),
        "Anomalies:".dimmed(),
        report.num_anomalies.to_string().red(),
        "Share:".dimmed(),
        report.anomaly_percentage
    );

    let chart = &report.chart_data;
    let flagged: Vec<usize> = (0..chart.len()).filter(|&i| chart.is_anomaly[i]).collect();
    if flagged.is_empty() {
        println!("{}", "No anomalies found.".green());
        return;
    }

    let mut header = vec!["Row".to_string(), "Time".to_string(), "Score".to_string()];
    header.extend(chart.features.iter().cloned());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);

    for &i in flagged.iter().take(25) {
        let mut row = vec![
            chart.row_index[i].to_string(),
            chart.timestamps[i].clone().unwrap_or_else(|| "-".to_string()),
            format!("{:.4}", chart.anomaly_score[i]).red().to_string(),
        ];
        for feature in &chart.features {
            let value = chart.metrics.get(feature).and_then(|m| m[i]);
            row.push(value.map_or_else(|| "-".to_string(), |v| v.to_string()));
        }
        table.add_row(row);
    }

    println!("{table}");
    if flagged.len() > 25 {
        println!("{} {} more", "...".dimmed(), flagged.len() - 25);
    }
}

fn status(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "Model Status".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let pipeline = AnalysisPipeline::from_config(config);
    load_existing(&pipeline)?;
    let status = pipeline.detector().status();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![
        "Model".to_string(),
        if status.model_loaded {
            "✓ Loaded".green().to_string()
        } else {
            "✗ Not trained".red().to_string()
        },
    ]);
    table.add_row(vec!["Path".to_string(), status.model_path.display().to_string()]);
    table.add_row(vec!["Features".to_string(), status.features.join(", ")]);
    table.add_row(vec!["Training rows".to_string(), status.training_rows.to_string()]);
    table.add_row(vec![
        "Contamination".to_string(),
        status
            .contamination
            .map_or_else(|| "-".to_string(), |c| c.to_string()),
    ]);

    println!("{table}");
    Ok(())
}
