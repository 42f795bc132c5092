//! Statistical rules over grouped records: population z-score, interval
//! regularity, and interval IQR. A finding requires at least two methods to
//! fire.

use std::collections::BTreeMap;

use crate::config::Tier1Config;
use crate::model::{GroupKey, LogRecord, Severity, Tier1Finding, Tier1Method};
use crate::stats::{intervals, mean, percentile, population_std};

pub fn run_tier1(groups: &BTreeMap<GroupKey, Vec<&LogRecord>>, cfg: &Tier1Config) -> Vec<Tier1Finding> {
    let counts: Vec<f64> = groups.values().map(|g| g.len() as f64).collect();
    let pop_mean = mean(&counts);
    let pop_std = population_std(&counts);

    let mut findings = Vec::new();

    for (key, records) in groups {
        let count = records.len();
        let mut methods_fired = Vec::new();
        let mut descriptions = Vec::new();
        let mut evidence = BTreeMap::new();

        // Method 1: population z-score, applies regardless of MIN_REQUESTS.
        let z = if pop_std > 0.0 {
            (count as f64 - pop_mean) / pop_std
        } else {
            0.0
        };
        evidence.insert("population_mean".to_string(), pop_mean);
        evidence.insert("population_std".to_string(), pop_std);
        evidence.insert("zscore".to_string(), z);
        if z >= cfg.zscore_threshold {
            methods_fired.push(Tier1Method::Zscore);
            descriptions.push(format!(
                "request count {count} is {z:.2} standard deviations above the population mean ({pop_mean:.1})"
            ));
        }

        if count >= cfg.min_requests {
            let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp.and_utc().timestamp()).collect();
            let gaps = intervals(&timestamps);
            let avg_interval = mean(&gaps);
            let jitter = population_std(&gaps);
            evidence.insert("avg_interval_s".to_string(), avg_interval);
            evidence.insert("jitter_s".to_string(), jitter);

            if avg_interval <= cfg.interval_max_avg_s && jitter <= cfg.interval_max_jitter_s {
                methods_fired.push(Tier1Method::IntervalThreshold);
                descriptions.push(format!(
                    "requests repeat every {avg_interval:.1}s with only {jitter:.1}s jitter"
                ));
            }

            let mut sorted_gaps = gaps.clone();
            sorted_gaps.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let q1 = percentile(&sorted_gaps, 25.0);
            let q3 = percentile(&sorted_gaps, 75.0);
            let iqr = q3 - q1;
            evidence.insert("q1".to_string(), q1);
            evidence.insert("q3".to_string(), q3);
            evidence.insert("iqr".to_string(), iqr);

            if iqr <= cfg.iqr_max {
                methods_fired.push(Tier1Method::Iqr);
                descriptions.push(format!("interval IQR of {iqr:.1}s indicates clock-driven regularity"));
            }
        }

        if methods_fired.len() >= 2 {
            findings.push(Tier1Finding {
                key: key.clone(),
                username: records[0].username.clone(),
                severity: Severity::from_method_count(methods_fired.len()),
                methods_fired,
                descriptions,
                request_count: count,
                evidence,
            });
        }
    }

    findings.sort_by(|a, b| b.methods_fired.len().cmp(&a.methods_fired.len()).then_with(|| a.key.cmp(&b.key)));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouper::group_records;
    use chrono::NaiveDate;

    fn rec(src_ip: &str, offset_s: i64) -> LogRecord {
        LogRecord {
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
                + chrono::Duration::seconds(offset_s),
            username: "alice".into(),
            department: "Engineering".into(),
            src_ip: src_ip.into(),
            dst_ip: "1.2.3.4".into(),
            protocol: "HTTPS".into(),
            http_method: "GET".into(),
            url: "malware-c2.ru/beacon".into(),
            status_code: 200,
            bytes_sent: 100,
            bytes_received: 200,
            action: "ALLOWED".into(),
            url_category: "Technology".into(),
            threat_category: "None".into(),
            risk_score: 5,
            user_agent: "ua".into(),
        }
    }

    fn benign(src_ip: &str, n: usize) -> Vec<LogRecord> {
        (0..n)
            .map(|i| {
                let mut r = rec(src_ip, i as i64 * 3600);
                r.url = "news.example.com/a".into();
                r
            })
            .collect()
    }

    #[test]
    fn obvious_beacon_fires_all_three_methods() {
        let beacon: Vec<LogRecord> = (0..50).map(|i| rec("10.0.0.5", i * 300)).collect();
        let groups = group_records(&beacon);
        let findings = run_tier1(&groups, &Tier1Config::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].methods_fired.len(), 3);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn below_two_methods_emits_nothing() {
        let mut records = benign("10.0.0.6", 12);
        records.extend(benign("10.0.0.7", 12));
        let groups = group_records(&records);
        let findings = run_tier1(&groups, &Tier1Config::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn population_zscore_alone_does_not_emit_a_finding() {
        // One huge group among many small ones triggers z-score only, since
        // irregular intervals keep interval_threshold/iqr from firing.
        let mut records = Vec::new();
        for i in 0..150 {
            let offset = (i as i64 * 137) % 36000;
            records.push(rec("10.0.0.9", offset));
        }
        for u in 0..5 {
            records.extend(benign(&format!("10.0.1.{u}"), 11));
        }
        let groups = group_records(&records);
        let findings = run_tier1(&groups, &Tier1Config::default());
        assert!(findings.iter().all(|f| f.key.src_ip != "10.0.0.9"));
    }

    #[test]
    fn findings_sorted_by_method_count_then_key() {
        let mut records: Vec<LogRecord> = (0..40).map(|i| rec("10.0.0.1", i * 300)).collect();
        records.extend((0..40).map(|i| rec("10.0.0.2", i * 300)));
        let groups = group_records(&records);
        let findings = run_tier1(&groups, &Tier1Config::default());
        assert_eq!(findings.len(), 2);
        assert!(findings[0].key <= findings[1].key);
    }
}
