use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{BusinessRecord, COLUMNS};

/// Output file used when none is configured
pub const DEFAULT_OUTPUT: &str = "results.csv";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("failed to flush output: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for normalized records
pub trait RecordSink {
    fn write_records(&mut self, records: &[BusinessRecord]) -> Result<(), SinkError>;
}

/// Write records as UTF-8 CSV with the fixed header.
///
/// The header is written even when there are no records.
pub fn write_csv<W: Write>(writer: W, records: &[BusinessRecord]) -> Result<(), SinkError> {
    let mut csv = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(COLUMNS)?;
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;

    Ok(())
}

/// Writes records to a CSV file, replacing any previous contents
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for CsvFileSink {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT)
    }
}

impl RecordSink for CsvFileSink {
    fn write_records(&mut self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        let file = File::create(&self.path).map_err(|source| SinkError::Create {
            path: self.path.clone(),
            source,
        })?;
        write_csv(BufWriter::new(file), records)?;

        tracing::info!(path = %self.path.display(), records = records.len(), "wrote CSV");
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<BusinessRecord>,
    /// Number of `write_records` calls
    pub writes: usize,
}

impl RecordSink for MemorySink {
    fn write_records(&mut self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        self.records.extend_from_slice(records);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "osm_id,name,street,housenumber,postcode,city,email,phone,website,lat,lon,date_scraped";

    fn record(osm_id: &str, name: Option<&str>) -> BusinessRecord {
        BusinessRecord {
            osm_id: osm_id.to_string(),
            name: name.map(str::to_string),
            street: Some("Hermannstraße".to_string()),
            housenumber: Some("100".to_string()),
            postcode: Some("12051".to_string()),
            city: Some("Berlin".to_string()),
            email: None,
            phone: None,
            website: None,
            lat: Some(52.4777),
            lon: Some(13.4253),
            date_scraped: "2024-05-01T12:30:05Z".to_string(),
        }
    }

    fn render(records: &[BusinessRecord]) -> String {
        let mut out = Vec::new();
        write_csv(&mut out, records).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_only_when_empty() {
        assert_eq!(render(&[]), format!("{HEADER}\n"));
    }

    #[test]
    fn test_rows_follow_record_order() {
        let text = render(&[record("node/1", Some("Café A")), record("way/2", None)]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "node/1,Café A,Hermannstraße,100,12051,Berlin,,,,52.4777,13.4253,2024-05-01T12:30:05Z"
        );
        assert!(lines[2].starts_with("way/2,,Hermannstraße"));
    }

    #[test]
    fn test_quotes_fields_with_commas() {
        let text = render(&[record("node/1", Some("Kaffee, Kuchen & Co"))]);
        assert!(text.contains("node/1,\"Kaffee, Kuchen & Co\",Hermannstraße"));
    }

    #[test]
    fn test_file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvFileSink::new(&path);

        sink.write_records(&[record("node/1", None), record("node/2", None)])
            .unwrap();
        sink.write_records(&[record("node/3", None)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("node/3"));
        assert!(!text.contains("node/1"));
    }

    #[test]
    fn test_file_sink_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileSink::new(dir.path().join("missing").join("out.csv"));

        let err = sink.write_records(&[]).unwrap_err();
        assert!(matches!(err, SinkError::Create { .. }));
    }
}
