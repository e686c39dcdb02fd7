// Sensorwatch simulator - writes synthetic IoT telemetry as CSV
// Injected anomalies are labelled in the is_anomaly column

use chrono::{Duration, NaiveDateTime, Utc};
use clap::Parser;
use colored::Colorize;
use sensorwatch_core::{generate, timestamp, Dataset, SampleSpec, Value};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorwatch-simulate")]
#[command(about = "Generate sensor telemetry with injected anomalies")]
struct Args {
    /// Number of one-minute readings
    #[arg(short, long, default_value = "1000")]
    points: usize,

    /// Share of rows pushed out of range (0-1)
    #[arg(short, long, default_value = "0.03")]
    anomaly_fraction: f64,

    /// RNG seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// First timestamp (default: points minutes before now)
    #[arg(long)]
    start: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn field(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Timestamp(ts) => timestamp::format_display(ts),
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
    }
}

fn write_csv<W: Write>(dataset: &Dataset, output: W) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(dataset.columns())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(field))?;
    }
    writer.flush()?;
    Ok(())
}

fn start_time(args: &Args) -> Result<NaiveDateTime, Box<dyn std::error::Error>> {
    match &args.start {
        Some(raw) => timestamp::parse(raw)
            .ok_or_else(|| format!("unrecognized start time: {}", raw).into()),
        None => Ok(Utc::now().naive_utc() - Duration::minutes(args.points as i64)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.anomaly_fraction) {
        return Err("anomaly fraction must be between 0 and 1".into());
    }

    let spec = SampleSpec {
        points: args.points,
        anomaly_fraction: args.anomaly_fraction,
        seed: args.seed,
        start: start_time(&args)?,
    };
    let data = generate(&spec);

    match &args.output {
        Some(path) => {
            write_csv(&data, File::create(path)?)?;
            let injected = data
                .numeric_column("is_anomaly")
                .map_or(0, |c| c.iter().filter(|v| **v == Some(1.0)).count());
            eprintln!(
                "{} {} readings ({} anomalies) to {}",
                "✓ Wrote".green(),
                data.len().to_string().yellow(),
                injected.to_string().red(),
                path.display()
            );
        }
        None => write_csv(&data, io::stdout().lock())?,
    }

    Ok(())
}
