//! Synthetic log generation: normal per-department traffic plus injected
//! beaconing bursts, exported as a sanitised log CSV and a ground-truth CSV.

pub mod profiles;

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::LogRecord;
use profiles::{DepartmentProfile, BEACON_PROFILES, C2_DOMAINS, DEPARTMENTS};

pub struct GeneratorConfig {
    pub num_users: usize,
    pub num_days: u32,
    pub seed: u64,
    pub start_date: NaiveDate,
}

struct UserProfile {
    username: String,
    src_ip: String,
    dept: &'static DepartmentProfile,
}

fn build_company(num_users: usize) -> Vec<UserProfile> {
    (0..num_users)
        .map(|i| {
            let dept = &DEPARTMENTS[i % DEPARTMENTS.len()];
            UserProfile {
                username: format!("user{i:03}"),
                src_ip: format!("10.{}.{}.{}", (i / 65536) % 256, (i / 256) % 256, i % 256),
                dept,
            }
        })
        .collect()
}

/// Standard-normal sample via the Box-Muller transform, so the generator
/// needs nothing beyond the `rand` crate's uniform sampling.
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRow {
    pub record: LogRecord,
    pub is_anomaly: bool,
    pub anomaly_type: String,
    pub anomaly_severity: String,
    pub tier_detection: String,
}

fn sample_timestamp(rng: &mut ChaCha8Rng, day: NaiveDate, dept: &DepartmentProfile) -> NaiveDateTime {
    let in_work_hours = rng.gen_bool(0.8);
    let (start, end) = if in_work_hours {
        (dept.work_start_hour, dept.work_end_hour)
    } else {
        (0, 24)
    };
    let span = (end - start).max(1);
    let hour = start + rng.gen_range(0..span);
    let minute = rng.gen_range(0..60);
    let second = rng.gen_range(0..60);
    day.and_hms_opt(hour % 24, minute, second).unwrap()
}

fn sample_domain(rng: &mut ChaCha8Rng, dept: &DepartmentProfile) -> (&'static str, &'static str) {
    if rng.gen_bool(0.9) {
        let idx = rng.gen_range(0..dept.domains.len());
        (dept.domains[idx], dept.url_categories[idx % dept.url_categories.len()])
    } else {
        ("random-site.com", "Uncategorized")
    }
}

fn normal_row(user: &UserProfile, timestamp: NaiveDateTime, domain: &str, category: &str, path_id: u32, rng: &mut ChaCha8Rng) -> GeneratedRow {
    let bytes_sent = (user.dept.avg_bytes_sent + standard_normal(rng) * user.dept.avg_bytes_sent * 0.2).max(64.0);
    let ua = user.dept.user_agents[rng.gen_range(0..user.dept.user_agents.len())];
    GeneratedRow {
        record: LogRecord {
            timestamp,
            username: user.username.clone(),
            department: user.dept.name.to_string(),
            src_ip: user.src_ip.clone(),
            dst_ip: format!("93.184.{}.{}", path_id % 256, (path_id / 256) % 256),
            protocol: "HTTPS".to_string(),
            http_method: "GET".to_string(),
            url: format!("{domain}/page{path_id}"),
            status_code: 200,
            bytes_sent: bytes_sent as u64,
            bytes_received: (bytes_sent * 2.0) as u64,
            action: "ALLOWED".to_string(),
            url_category: category.to_string(),
            threat_category: "None".to_string(),
            risk_score: 5,
            user_agent: ua.to_string(),
        },
        is_anomaly: false,
        anomaly_type: String::new(),
        anomaly_severity: String::new(),
        tier_detection: String::new(),
    }
}

fn generate_normal_traffic(users: &[UserProfile], cfg: &GeneratorConfig, rng: &mut ChaCha8Rng) -> Vec<GeneratedRow> {
    let mut rows = Vec::new();
    for user in users {
        for day_offset in 0..cfg.num_days {
            let day = cfg.start_date + Duration::days(day_offset as i64);
            let is_weekend = day.format("%u").to_string().parse::<u32>().unwrap() >= 6;
            if is_weekend && !rng.gen_bool(0.2) {
                continue;
            }
            let daily_mean = if is_weekend { user.dept.avg_daily_requests * 0.15 } else { user.dept.avg_daily_requests };
            let n = ((daily_mean + standard_normal(rng) * daily_mean * 0.25).max(1.0)) as u32;
            for i in 0..n {
                let timestamp = sample_timestamp(rng, day, user.dept);
                let (domain, category) = sample_domain(rng, user.dept);
                rows.push(normal_row(user, timestamp, domain, category, i, rng));
            }
        }
    }
    rows
}

fn inject_beaconing(users: &[UserProfile], cfg: &GeneratorConfig, rng: &mut ChaCha8Rng) -> Vec<GeneratedRow> {
    let mut rows = Vec::new();
    for (profile_idx, (name, period_s, jitter_s, num_days)) in BEACON_PROFILES.iter().enumerate() {
        let Some(user) = users.get(profile_idx % users.len().max(1)) else { continue };
        let c2_domain = C2_DOMAINS[rng.gen_range(0..C2_DOMAINS.len())];
        let start = cfg.start_date.and_hms_opt(0, 0, 0).unwrap();
        let total_seconds = *num_days as i64 * 86_400;
        let mut t = start;
        let mut beat = 0u32;
        while (t - start).num_seconds() < total_seconds {
            let jitter = standard_normal(rng) * *jitter_s as f64;
            let ts = t + Duration::seconds(jitter.round() as i64);
            rows.push(GeneratedRow {
                record: LogRecord {
                    timestamp: ts,
                    username: user.username.clone(),
                    department: user.dept.name.to_string(),
                    src_ip: user.src_ip.clone(),
                    dst_ip: format!("185.220.{}.{}", profile_idx, beat % 256),
                    protocol: "HTTPS".to_string(),
                    http_method: "POST".to_string(),
                    url: format!("{c2_domain}/beacon?id={beat}"),
                    status_code: 200,
                    bytes_sent: 256,
                    bytes_received: 64,
                    action: "ALLOWED".to_string(),
                    url_category: "Uncategorized".to_string(),
                    threat_category: "C2".to_string(),
                    risk_score: 90,
                    user_agent: "BeaconAgent/1.0".to_string(),
                },
                is_anomaly: true,
                anomaly_type: format!("beaconing_{name}"),
                anomaly_severity: "critical".to_string(),
                tier_detection: String::new(),
            });
            beat += 1;
            t += Duration::seconds(*period_s as i64);
        }
    }
    rows
}

pub fn generate(cfg: &GeneratorConfig) -> Vec<GeneratedRow> {
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let users = build_company(cfg.num_users);
    let mut rows = generate_normal_traffic(&users, cfg, &mut rng);
    rows.extend(inject_beaconing(&users, cfg, &mut rng));
    rows.sort_by_key(|r| r.record.timestamp);
    info!(rows = rows.len(), users = users.len(), "generated synthetic traffic");
    rows
}

#[derive(Serialize)]
struct LogCsvRow<'a> {
    timestamp: String,
    username: &'a str,
    department: &'a str,
    src_ip: &'a str,
    dst_ip: &'a str,
    protocol: &'a str,
    http_method: &'a str,
    url: &'a str,
    status_code: u16,
    bytes_sent: u64,
    bytes_received: u64,
    action: &'a str,
    url_category: &'a str,
    threat_category: &'a str,
    risk_score: u8,
    user_agent: &'a str,
}

/// Writes the sanitised log CSV (no anomaly labels) in the exact column
/// format the parser expects: `timestamp` as `%Y-%m-%d %H:%M:%S`.
pub fn export_logs(rows: &[GeneratedRow], path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    for row in rows {
        let r = &row.record;
        w.serialize(LogCsvRow {
            timestamp: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            username: &r.username,
            department: &r.department,
            src_ip: &r.src_ip,
            dst_ip: &r.dst_ip,
            protocol: &r.protocol,
            http_method: &r.http_method,
            url: &r.url,
            status_code: r.status_code,
            bytes_sent: r.bytes_sent,
            bytes_received: r.bytes_received,
            action: &r.action,
            url_category: &r.url_category,
            threat_category: &r.threat_category,
            risk_score: r.risk_score,
            user_agent: &r.user_agent,
        })?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct GroundTruthRow<'a> {
    timestamp: String,
    username: &'a str,
    src_ip: &'a str,
    url: &'a str,
    is_anomaly: bool,
    anomaly_type: &'a str,
    anomaly_severity: &'a str,
    tier_detection: &'a str,
}

pub fn export_ground_truth(rows: &[GeneratedRow], path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    for row in rows.iter().filter(|r| r.is_anomaly) {
        w.serialize(GroundTruthRow {
            timestamp: row.record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            username: &row.record.username,
            src_ip: &row.record.src_ip,
            url: &row.record.url,
            is_anomaly: row.is_anomaly,
            anomaly_type: &row.anomaly_type,
            anomaly_severity: &row.anomaly_severity,
            tier_detection: &row.tier_detection,
        })?;
    }
    w.flush()?;
    Ok(())
}
