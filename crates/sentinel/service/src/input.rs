//! Metric batch input formats for the CLI.

use std::path::Path;

use sentinel_types::MetricSample;

use crate::error::ServiceResult;

/// Parse one batch: a JSON array of metric samples.
pub fn parse_batch(text: &str) -> ServiceResult<Vec<MetricSample>> {
    Ok(serde_json::from_str(text)?)
}

/// Read a batch file.
pub fn read_batch_file(path: impl AsRef<Path>) -> ServiceResult<Vec<MetricSample>> {
    let text = std::fs::read_to_string(path)?;
    parse_batch(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::io::Write;

    const BATCH: &str = r#"[
        {"name": "cpu_usage", "value": 0.5, "labels": {"service": "api"},
         "timestamp": "2024-05-01T12:00:00Z"},
        {"name": "memory_rss", "value": 1024, "timestamp": "2024-05-01T12:00:01Z"}
    ]"#;

    #[test]
    fn parses_array_of_samples() {
        let batch = parse_batch(BATCH).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].service(), "api");
        assert_eq!(batch[1].value, 1024.0);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse_batch("[{\"name\": 1}]"), Err(ServiceError::Json(_))));
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BATCH.as_bytes()).unwrap();
        assert_eq!(read_batch_file(file.path()).unwrap().len(), 2);
        assert!(matches!(
            read_batch_file("/nonexistent/batch.json"),
            Err(ServiceError::Io(_))
        ));
    }
}
