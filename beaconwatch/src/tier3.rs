//! Outer-join Tier 1 and Tier 2 findings by key, produce ranked, explained
//! output.

use std::collections::BTreeMap;

use tracing::warn;

use crate::explain::{rule_template, Explainer};
use crate::model::{GroupKey, Severity, Tier1Finding, Tier2Finding, Tier3Finding};

pub fn run_tier3(
    tier1: &[Tier1Finding],
    tier2: &[Tier2Finding],
    explainer: &dyn Explainer,
) -> Vec<Tier3Finding> {
    let t1_map: BTreeMap<&GroupKey, &Tier1Finding> = tier1.iter().map(|f| (&f.key, f)).collect();
    let t2_map: BTreeMap<&GroupKey, &Tier2Finding> = tier2.iter().map(|f| (&f.key, f)).collect();

    let mut keys: Vec<&GroupKey> = t1_map.keys().chain(t2_map.keys()).cloned().collect();
    keys.sort();
    keys.dedup();

    let mut findings = Vec::with_capacity(keys.len());
    for key in keys {
        let t1 = t1_map.get(key).copied();
        let t2 = t2_map.get(key).copied();

        let confidence = t2.map(|f| f.confidence).unwrap_or(1.0);
        let severity = t1.map(|f| f.severity).unwrap_or_else(|| Severity::from_confidence(confidence));
        let username = t1
            .map(|f| f.username.clone())
            .or_else(|| t2.map(|f| f.username.clone()))
            .unwrap_or_default();

        // Fall back to the deterministic rule template on any explainer
        // failure, no retries, so this guarantee holds for every caller
        // regardless of which Explainer they pass in.
        let narrative = explainer.explain(t1, t2).unwrap_or_else(|| {
            warn!(key = %key, "explainer failed, falling back to rule template");
            rule_template(t1, t2)
        });

        findings.push(Tier3Finding {
            key: key.clone(),
            username,
            threat_summary: narrative.threat_summary,
            what_happened: narrative.what_happened,
            why_suspicious: narrative.why_suspicious,
            recommended_action: narrative.recommended_action,
            confidence,
            severity,
            tier1_fired: t1.is_some(),
            tier2_fired: t2.is_some(),
        });
    }

    findings.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap().then_with(|| a.key.cmp(&b.key)));
    findings
}
