//! Department profiles and C2/beacon constants for the synthetic generator.

pub struct DepartmentProfile {
    pub name: &'static str,
    pub domains: &'static [&'static str],
    pub url_categories: &'static [&'static str],
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub avg_daily_requests: f64,
    pub avg_bytes_sent: f64,
    pub user_agents: &'static [&'static str],
}

pub const DEPARTMENTS: &[DepartmentProfile] = &[
    DepartmentProfile {
        name: "Engineering",
        domains: &["github.com", "stackoverflow.com", "docs.rs", "crates.io", "news.ycombinator.com"],
        url_categories: &["Technology", "Software Development"],
        work_start_hour: 8,
        work_end_hour: 18,
        avg_daily_requests: 120.0,
        avg_bytes_sent: 1400.0,
        user_agents: &["Mozilla/5.0 (X11; Linux x86_64) Chrome/124.0", "Mozilla/5.0 (Macintosh) Chrome/124.0"],
    },
    DepartmentProfile {
        name: "Finance",
        domains: &["bloomberg.com", "wsj.com", "sec.gov", "adp.com", "sap.com"],
        url_categories: &["Finance", "Business"],
        work_start_hour: 7,
        work_end_hour: 17,
        avg_daily_requests: 80.0,
        avg_bytes_sent: 900.0,
        user_agents: &["Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/124.0"],
    },
];

/// `(profile_name, period_seconds, jitter_seconds, num_days)`
pub const BEACON_PROFILES: &[(&str, u64, u64, u64)] =
    &[("obvious", 300, 4, 5), ("subtle", 1800, 45, 5), ("fast", 60, 3, 3)];

pub const C2_DOMAINS: &[&str] = &["malware-c2.ru", "botnet-cmd.cn", "evil-update.net", "payload-drop.xyz", "c2-handler.io"];
