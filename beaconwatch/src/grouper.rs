//! Deterministic partitioning of log records by `(src_ip, domain)`.

use std::collections::BTreeMap;

use crate::model::{GroupKey, LogRecord};

/// Partition records by group key, sorting each group ascending by timestamp.
/// A `BTreeMap` keeps iteration order deterministic regardless of input order.
pub fn group_records(records: &[LogRecord]) -> BTreeMap<GroupKey, Vec<&LogRecord>> {
    let mut groups: BTreeMap<GroupKey, Vec<&LogRecord>> = BTreeMap::new();
    for record in records {
        let key = GroupKey {
            src_ip: record.src_ip.clone(),
            domain: record.domain().to_string(),
        };
        groups.entry(key).or_default().push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.timestamp);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(src_ip: &str, url: &str, minute: u32) -> LogRecord {
        LogRecord {
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
            username: "alice".into(),
            department: "Engineering".into(),
            src_ip: src_ip.into(),
            dst_ip: "1.2.3.4".into(),
            protocol: "HTTPS".into(),
            http_method: "GET".into(),
            url: url.into(),
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

    #[test]
    fn groups_by_src_ip_and_domain() {
        let records = vec![
            rec("10.0.0.1", "a.com/x", 0),
            rec("10.0.0.1", "b.com/y", 1),
            rec("10.0.0.2", "a.com/z", 2),
        ];
        let groups = group_records(&records);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn within_group_order_is_by_timestamp_regardless_of_input_order() {
        let records = vec![rec("10.0.0.1", "a.com/late", 5), rec("10.0.0.1", "a.com/early", 0)];
        let groups = group_records(&records);
        let key = GroupKey {
            src_ip: "10.0.0.1".into(),
            domain: "a.com".into(),
        };
        let g = &groups[&key];
        assert_eq!(g[0].path(), "early");
        assert_eq!(g[1].path(), "late");
    }

    #[test]
    fn grouping_is_order_independent_over_permutations() {
        let a = vec![rec("10.0.0.1", "a.com/1", 0), rec("10.0.0.1", "a.com/2", 1)];
        let b = vec![rec("10.0.0.1", "a.com/2", 1), rec("10.0.0.1", "a.com/1", 0)];
        let ga = group_records(&a);
        let gb = group_records(&b);
        assert_eq!(ga.keys().collect::<Vec<_>>(), gb.keys().collect::<Vec<_>>());
        for (ka, va) in &ga {
            let vb = &gb[ka];
            assert_eq!(va.iter().map(|r| &r.url).collect::<Vec<_>>(), vb.iter().map(|r| &r.url).collect::<Vec<_>>());
        }
    }
}
