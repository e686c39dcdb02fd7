// Synthetic IoT telemetry - used for demos and when an upload cannot be used

use crate::{Dataset, Value};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;

pub const SAMPLE_COLUMNS: [&str; 6] = [
    "timestamp",
    "temperature",
    "humidity",
    "pressure",
    "power_consumption",
    "is_anomaly",
];

/// Parameters for a generated series
#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub points: usize,
    pub anomaly_fraction: f64,
    pub seed: u64,
    pub start: NaiveDateTime,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            points: 1000,
            anomaly_fraction: 0.03,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2023, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
        }
    }
}

// normal sample via Box-Muller
fn normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Generate one-minute telemetry with `anomaly_fraction` of the rows pushed
/// out of range (temperature spikes or dips plus a power surge). The
/// `is_anomaly` column holds the injected label as 0/1.
pub fn generate(spec: &SampleSpec) -> Dataset {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n = spec.points;

    // pick anomaly rows without replacement (partial Fisher-Yates)
    let num_anomalies = ((n as f64) * spec.anomaly_fraction.clamp(0.0, 1.0)) as usize;
    let mut order: Vec<usize> = (0..n).collect();
    for i in 0..num_anomalies {
        let j = rng.random_range(i..n);
        order.swap(i, j);
    }
    let mut flagged = vec![false; n];
    for &idx in &order[..num_anomalies] {
        flagged[idx] = true;
    }

    // header is static and unique
    let mut dataset = Dataset::new(SAMPLE_COLUMNS).unwrap_or_default();

    for (i, &is_anomaly) in flagged.iter().enumerate() {
        let timestamp = spec.start + Duration::minutes(i as i64);
        let mut temperature = normal(&mut rng, 25.0, 2.0);
        let humidity = normal(&mut rng, 60.0, 5.0);
        let pressure = normal(&mut rng, 1000.0, 10.0);
        let mut power = normal(&mut rng, 50.0, 5.0);

        if is_anomaly {
            temperature = if rng.random_bool(0.5) {
                rng.random_range(35.0..45.0)
            } else {
                rng.random_range(5.0..15.0)
            };
            power = rng.random_range(100.0..150.0);
        }

        let row = vec![
            Value::Timestamp(timestamp),
            Value::Number(temperature),
            Value::Number(humidity),
            Value::Number(pressure),
            Value::Number(power),
            Value::Number(if is_anomaly { 1.0 } else { 0.0 }),
        ];
        // width matches SAMPLE_COLUMNS
        let _ = dataset.push_row(row);
    }

    dataset
}
