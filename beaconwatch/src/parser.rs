//! CSV log parsing. Missing required columns is a configuration error;
//! per-row parse failures are silently dropped and counted.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::model::LogRecord;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

const REQUIRED_COLUMNS: &[&str] = &[
    "timestamp",
    "username",
    "department",
    "src_ip",
    "dst_ip",
    "protocol",
    "http_method",
    "url",
    "status_code",
    "bytes_sent",
    "bytes_received",
    "action",
    "url_category",
    "threat_category",
    "risk_score",
    "user_agent",
];

#[derive(Debug, Deserialize)]
struct RawRow {
    timestamp: String,
    username: String,
    department: String,
    src_ip: String,
    dst_ip: String,
    protocol: String,
    http_method: String,
    url: String,
    status_code: String,
    bytes_sent: String,
    bytes_received: String,
    action: String,
    url_category: String,
    threat_category: String,
    risk_score: String,
    user_agent: String,
}

fn convert(raw: RawRow) -> std::result::Result<LogRecord, String> {
    let timestamp = NaiveDateTime::parse_from_str(&raw.timestamp, TIMESTAMP_FMT)
        .map_err(|e| format!("bad timestamp {:?}: {e}", raw.timestamp))?;
    let status_code: u16 = raw
        .status_code
        .parse()
        .map_err(|e| format!("bad status_code {:?}: {e}", raw.status_code))?;
    let bytes_sent: u64 = raw
        .bytes_sent
        .parse()
        .map_err(|e| format!("bad bytes_sent {:?}: {e}", raw.bytes_sent))?;
    let bytes_received: u64 = raw
        .bytes_received
        .parse()
        .map_err(|e| format!("bad bytes_received {:?}: {e}", raw.bytes_received))?;
    let risk_score: u8 = raw
        .risk_score
        .parse()
        .map_err(|e| format!("bad risk_score {:?}: {e}", raw.risk_score))?;

    Ok(LogRecord {
        timestamp,
        username: raw.username,
        department: raw.department,
        src_ip: raw.src_ip,
        dst_ip: raw.dst_ip,
        protocol: raw.protocol,
        http_method: raw.http_method,
        url: raw.url,
        status_code,
        bytes_sent,
        bytes_received,
        action: raw.action,
        url_category: raw.url_category,
        threat_category: raw.threat_category,
        risk_score,
        user_agent: raw.user_agent,
    })
}

/// Parse a log CSV file into an in-order sequence of [`LogRecord`]s.
pub fn parse_log_file(path: &Path) -> Result<Vec<LogRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    {
        let headers = reader.headers()?.clone();
        for col in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *col) {
                return Err(PipelineError::Config(format!(
                    "log file {} is missing required column '{}'",
                    path.display(),
                    col
                )));
            }
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, result) in reader.deserialize::<RawRow>().enumerate() {
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                debug!(row = idx, error = %e, "skipping malformed row");
                continue;
            }
        };
        match convert(raw) {
            Ok(rec) => records.push(rec),
            Err(reason) => {
                skipped += 1;
                debug!(row = idx, %reason, "skipping row with invalid field");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed rows while parsing log file");
    }
    info!(parsed = records.len(), skipped, path = %path.display(), "parsed log file");

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(body: &str) -> tempfile_path::TempCsv {
        tempfile_path::TempCsv::new(body)
    }

    mod tempfile_path {
        use std::fs::File;
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempCsv {
            pub path: PathBuf,
        }

        impl TempCsv {
            pub fn new(body: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("beaconwatch_test_{}.csv", rand_suffix()));
                let mut f = File::create(&path).unwrap();
                f.write_all(body.as_bytes()).unwrap();
                Self { path }
            }
        }

        fn rand_suffix() -> u64 {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
        }

        impl Drop for TempCsv {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    const HEADER: &str = "timestamp,username,department,src_ip,dst_ip,protocol,http_method,url,status_code,bytes_sent,bytes_received,action,url_category,threat_category,risk_score,user_agent\n";

    #[test]
    fn parses_valid_rows() {
        let body = format!(
            "{HEADER}2026-01-01 03:00:00,alice,Engineering,10.0.0.1,1.2.3.4,HTTPS,GET,example.com/a,200,100,200,ALLOWED,Technology,None,5,ua\n"
        );
        let tmp = write_csv(&body);
        let records = parse_log_file(&tmp.path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alice");
        assert_eq!(records[0].domain(), "example.com");
    }

    #[test]
    fn drops_rows_with_bad_numeric_fields() {
        let body = format!(
            "{HEADER}2026-01-01 03:00:00,alice,Engineering,10.0.0.1,1.2.3.4,HTTPS,GET,example.com/a,not-a-number,100,200,ALLOWED,Technology,None,5,ua\n\
             2026-01-01 03:05:00,bob,Finance,10.0.0.2,1.2.3.5,HTTPS,GET,example.com/b,200,100,200,ALLOWED,Technology,None,5,ua\n"
        );
        let tmp = write_csv(&body);
        let records = parse_log_file(&tmp.path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "bob");
    }

    #[test]
    fn missing_required_column_is_configuration_error() {
        let body = "timestamp,username\n2026-01-01 03:00:00,alice\n";
        let tmp = write_csv(body);
        let err = parse_log_file(&tmp.path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn empty_file_with_header_yields_no_records_and_no_error() {
        let tmp = write_csv(HEADER);
        let records = parse_log_file(&tmp.path).unwrap();
        assert!(records.is_empty());
    }
}
