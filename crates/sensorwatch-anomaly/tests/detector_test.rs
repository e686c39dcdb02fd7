use sensorwatch_anomaly::error::{DetectorError, FeatureError};
use sensorwatch_anomaly::features::{self, FeatureMode, FeatureSet};
use sensorwatch_anomaly::{AnomalyDetector, ArtifactStore, ChartSampler, ForestParams};
use sensorwatch_core::{Dataset, SampleSpec, Value, generate};
use std::sync::Arc;
use std::thread;

fn sample(points: usize, seed: u64) -> Dataset {
    generate(&SampleSpec {
        points,
        seed,
        ..SampleSpec::default()
    })
}

fn iot_features() -> FeatureSet {
    features::resolve(sample(1, 1).columns(), &FeatureMode::fixed_default()).unwrap()
}

#[test]
fn test_training_is_deterministic() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let data = sample(500, 42);

    let first = AnomalyDetector::new(ArtifactStore::new(a.path().join("m.json")));
    let second = AnomalyDetector::new(ArtifactStore::new(b.path().join("m.json")));
    first
        .train(&data, &iot_features(), &ForestParams::default())
        .unwrap();
    second
        .train(&data, &iot_features(), &ForestParams::default())
        .unwrap();

    let bytes_a = std::fs::read(a.path().join("m.json")).unwrap();
    let bytes_b = std::fs::read(b.path().join("m.json")).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_reload_keeps_feature_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models/isolation_forest.json");
    let data = sample(300, 3);

    let trainer = AnomalyDetector::new(ArtifactStore::new(&path));
    let trained = trainer
        .train(&data, &iot_features(), &ForestParams::default())
        .unwrap();

    let fresh = AnomalyDetector::new(ArtifactStore::new(&path));
    let loaded = fresh.load().unwrap();
    assert_eq!(loaded.feature_list, iot_features());
    assert_eq!(loaded, trained);

    // same model, same verdicts
    let a = trainer.predict(&data).unwrap();
    let b = fresh.predict(&data).unwrap();
    assert_eq!(a.is_anomaly, b.is_anomaly);
    assert_eq!(a.anomaly_score, b.anomaly_score);
}

#[test]
fn test_non_numeric_rows_give_empty_training_set() {
    let dir = tempfile::tempdir().unwrap();
    let detector = AnomalyDetector::new(ArtifactStore::new(dir.path().join("m.json")));

    let mut data = Dataset::new(["temperature", "humidity"]).unwrap();
    for word in ["hot", "cold", "n/a", "warm", "?"] {
        data.push_row(vec![Value::Text(word.to_string()), Value::Text("wet".to_string())])
            .unwrap();
    }
    let features = FeatureSet::new(["temperature", "humidity"]).unwrap();

    let err = detector
        .train(&data, &features, &ForestParams::default())
        .unwrap_err();
    assert!(matches!(err, DetectorError::EmptyTrainingSet));
    assert!(!dir.path().join("m.json").exists());
}

#[test]
fn test_predict_names_missing_feature() {
    let dir = tempfile::tempdir().unwrap();
    let detector = AnomalyDetector::new(ArtifactStore::new(dir.path().join("m.json")));

    let mut train = Dataset::new(["temperature", "humidity"]).unwrap();
    for i in 0..64 {
        train
            .push_row(vec![
                Value::Number(21.0 + (i % 5) as f64),
                Value::Number(40.0 + (i % 11) as f64),
            ])
            .unwrap();
    }
    let features = FeatureSet::new(["temperature", "humidity"]).unwrap();
    detector
        .train(&train, &features, &ForestParams::default())
        .unwrap();

    let mut upload = Dataset::new(["temperature"]).unwrap();
    upload.push_row(vec![Value::Number(22.0)]).unwrap();

    match detector.predict(&upload) {
        Err(DetectorError::FeatureMismatch { missing }) => {
            assert_eq!(missing, vec!["humidity".to_string()])
        }
        other => panic!("expected FeatureMismatch, got {:?}", other.is_ok()),
    }
}

#[test]
fn test_fixed_schema_rejects_partial_upload() {
    let columns: Vec<String> = ["timestamp", "temperature"].map(String::from).to_vec();
    let err = features::resolve(&columns, &FeatureMode::fixed_default()).unwrap_err();
    match err {
        FeatureError::MissingColumns(missing) => assert_eq!(missing.len(), 3),
        other => panic!("unexpected: {}", other),
    }
}

#[test]
fn test_injected_anomalies_are_found() {
    let dir = tempfile::tempdir().unwrap();
    let detector = AnomalyDetector::new(ArtifactStore::new(dir.path().join("m.json")));
    let data = sample(1000, 42);
    detector
        .train(&data, &iot_features(), &ForestParams::default())
        .unwrap();

    let result = detector.predict(&data).unwrap();
    let labels = data.numeric_column("is_anomaly").unwrap();
    let injected: Vec<usize> = (0..data.len())
        .filter(|&i| labels[i] == Some(1.0))
        .collect();
    let caught = injected.iter().filter(|&&i| result.is_anomaly[i]).count();

    assert_eq!(injected.len(), 30);
    assert!(caught >= 24, "only {} of 30 injected anomalies flagged", caught);
}

#[test]
fn test_chart_keeps_every_anomaly() {
    let dir = tempfile::tempdir().unwrap();
    let detector = AnomalyDetector::new(ArtifactStore::new(dir.path().join("m.json")));
    let data = sample(2000, 9);
    detector
        .train(&data, &iot_features(), &ForestParams::default())
        .unwrap();

    let result = detector.predict(&data).unwrap();
    let payload = ChartSampler::new(200).reduce(&result);
    assert_eq!(payload.len(), 200);
    assert_eq!(
        payload.is_anomaly.iter().filter(|a| **a).count(),
        result.num_anomalies()
    );
}

#[test]
fn test_concurrent_predict_during_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(AnomalyDetector::new(ArtifactStore::new(
        dir.path().join("m.json"),
    )));
    detector
        .train(&sample(300, 1), &iot_features(), &ForestParams::default())
        .unwrap();

    let upload = Arc::new(sample(250, 77));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let detector = Arc::clone(&detector);
            let upload = Arc::clone(&upload);
            thread::spawn(move || {
                for _ in 0..20 {
                    let result = detector.predict(&upload).unwrap();
                    assert_eq!(result.len(), 250);
                }
            })
        })
        .collect();

    for seed in 2..6 {
        let params = ForestParams {
            seed,
            ..ForestParams::default()
        };
        detector
            .train(&sample(300, seed), &iot_features(), &params)
            .unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }

    // disk and memory agree on the last writer
    let on_disk = ArtifactStore::new(dir.path().join("m.json")).load().unwrap();
    assert_eq!(on_disk, *detector.active().unwrap());
    assert_eq!(on_disk.seed, 5);
}
