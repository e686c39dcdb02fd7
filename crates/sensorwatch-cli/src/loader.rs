// CSV upload reading

use sensorwatch_core::{Dataset, Value};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read a CSV with a header row. Numeric cells become numbers, empty cells
/// become nulls, everything else is kept as text.
pub fn load_csv(path: &Path) -> Result<Dataset, Box<dyn Error>> {
    let file = File::open(path)
        .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    read_csv(BufReader::new(file))
}

pub fn read_csv<R: std::io::Read>(input: R) -> Result<Dataset, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let mut dataset = Dataset::new(headers.iter())?;

    for record in reader.records() {
        let record = record?;
        dataset.push_row(record.iter().map(Value::from_field).collect())?;
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mixed_upload() {
        let raw = "timestamp, temperature ,humidity\n\
                   2024-01-01 00:00:00,21.5,\n\
                   2024-01-01 00:01:00,sensor offline,48\n";
        let ds = read_csv(raw.as_bytes()).unwrap();

        assert_eq!(ds.columns(), ["timestamp", "temperature", "humidity"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(0, "temperature"), Some(&Value::Number(21.5)));
        assert_eq!(ds.value(0, "humidity"), Some(&Value::Null));
        assert_eq!(
            ds.numeric_column("temperature").unwrap(),
            vec![Some(21.5), None]
        );
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let raw = "a,b\n1,2\n3\n";
        assert!(read_csv(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        assert!(read_csv("a,a\n1,2\n".as_bytes()).is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(
            &path,
            "timestamp,temperature\n2024-01-01 00:00:00,20.5\n2024-01-01 00:01:00,21\n",
        )
        .unwrap();

        let ds = load_csv(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(
            ds.numeric_column("temperature").unwrap(),
            vec![Some(20.5), Some(21.0)]
        );
        assert!(ds.timestamps("timestamp").iter().all(|t| t.is_some()));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_csv(Path::new("/nonexistent/upload.csv")).is_err());
    }
}
