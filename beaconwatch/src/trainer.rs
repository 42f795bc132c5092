//! Fits the scaler and isolation forest on clean logs, excluding any group
//! whose domain is a known-bad domain, and persists the resulting artifacts.

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::forest::IsolationForestModel;
use crate::grouper::group_records;
use crate::model::FEATURE_NAMES;
use crate::parser::parse_log_file;
use crate::scaler::Scaler;

pub struct TrainResult {
    pub vectors_used: usize,
    pub vectors_excluded: usize,
    pub scaler: Scaler,
    pub model: IsolationForestModel,
}

pub fn train(log_path: &Path, cfg: &Config) -> Result<TrainResult> {
    let records = parse_log_file(log_path)?;
    let groups = group_records(&records);
    let vectors = crate::features::extract_features(&groups, cfg.group_min);

    let (kept, excluded): (Vec<_>, Vec<_>) = vectors
        .into_iter()
        .partition(|v| !cfg.known_bad_domains.iter().any(|d| d == &v.key.domain));

    let rows: Vec<[f64; FEATURE_NAMES.len()]> = kept.iter().map(|v| v.to_row()).collect();
    let (scaler, scaled_rows) = Scaler::fit_transform(&rows);
    let model = IsolationForestModel::fit(&scaled_rows, &cfg.forest);

    info!(
        vectors_used = kept.len(),
        vectors_excluded = excluded.len(),
        "trained isolation forest"
    );

    Ok(TrainResult {
        vectors_used: kept.len(),
        vectors_excluded: excluded.len(),
        scaler,
        model,
    })
}

pub fn persist(result: &TrainResult, model_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(model_dir)?;
    let scaler_path = model_dir.join("scaler.json");
    let model_path = model_dir.join("forest.json");

    let scaler_json = serde_json::to_string(&result.scaler).map_err(|e| {
        crate::error::PipelineError::ModelArtifact(format!("failed to serialise scaler: {e}"))
    })?;
    std::fs::write(&scaler_path, scaler_json)?;
    result.model.save(&model_path)?;
    Ok(())
}

pub fn load_artifacts(model_dir: &Path) -> Result<(Scaler, IsolationForestModel)> {
    let scaler_path = model_dir.join("scaler.json");
    let model_path = model_dir.join("forest.json");
    let scaler_json = std::fs::read_to_string(&scaler_path)?;
    let scaler: Scaler = serde_json::from_str(&scaler_json).map_err(|e| {
        crate::error::PipelineError::ModelArtifact(format!("failed to parse {}: {e}", scaler_path.display()))
    })?;
    let model = IsolationForestModel::load(&model_path)?;
    Ok((scaler, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogRecord;
    use chrono::NaiveDate;

    fn write_records(records: &[LogRecord]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("beaconwatch_trainer_test_{}.csv", std::process::id()));
        let mut w = csv::Writer::from_path(&path).unwrap();
        w.write_record([
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
        ])
        .unwrap();
        for r in records {
            w.write_record([
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.username.clone(),
                r.department.clone(),
                r.src_ip.clone(),
                r.dst_ip.clone(),
                r.protocol.clone(),
                r.http_method.clone(),
                r.url.clone(),
                r.status_code.to_string(),
                r.bytes_sent.to_string(),
                r.bytes_received.to_string(),
                r.action.clone(),
                r.url_category.clone(),
                r.threat_category.clone(),
                r.risk_score.to_string(),
                r.user_agent.clone(),
            ])
            .unwrap();
        }
        w.flush().unwrap();
        path
    }

    fn rec(src_ip: &str, domain: &str, minute: i64) -> LogRecord {
        LogRecord {
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
                + chrono::Duration::minutes(minute),
            username: "alice".into(),
            department: "Engineering".into(),
            src_ip: src_ip.into(),
            dst_ip: "1.2.3.4".into(),
            protocol: "HTTPS".into(),
            http_method: "GET".into(),
            url: format!("{domain}/a{minute}"),
            status_code: 200,
            bytes_sent: 150,
            bytes_received: 300,
            action: "ALLOWED".into(),
            url_category: "Technology".into(),
            threat_category: "None".into(),
            risk_score: 5,
            user_agent: "ua".into(),
        }
    }

    #[test]
    fn known_bad_domains_are_excluded_from_training() {
        let mut records: Vec<LogRecord> = (0..40).map(|i| rec("10.0.0.1", "news.example.com", i)).collect();
        records.extend((0..40).map(|i| rec("10.0.0.2", "malware-c2.ru", i)));
        let path = write_records(&records);
        let cfg = Config::default();
        let result = train(&path, &cfg).unwrap();
        assert_eq!(result.vectors_used, 1);
        assert_eq!(result.vectors_excluded, 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn persist_and_load_round_trip() {
        let records: Vec<LogRecord> = (0..40).map(|i| rec("10.0.0.1", "news.example.com", i)).collect();
        let path = write_records(&records);
        let cfg = Config::default();
        let result = train(&path, &cfg).unwrap();

        let mut dir = std::env::temp_dir();
        dir.push(format!("beaconwatch_model_test_{}", std::process::id()));
        persist(&result, &dir).unwrap();
        let (scaler, model) = load_artifacts(&dir).unwrap();
        assert_eq!(scaler.mean, result.scaler.mean);
        assert_eq!(model.score_samples(&[]), result.model.score_samples(&[]));

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
