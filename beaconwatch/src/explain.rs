//! Narrative generation for Tier 3 findings. The built-in rule-template
//! implementation is deterministic and is what the pipeline ships with; an
//! LLM-backed variant is a documented extension point, not wired by default.

use tracing::warn;

use crate::model::{Tier1Finding, Tier2Finding};
use crate::tier2::feature_explanation;

pub struct Narrative {
    pub threat_summary: String,
    pub what_happened: String,
    pub why_suspicious: String,
    pub recommended_action: String,
}

/// A pluggable narrative generator. The pipeline always falls back to the
/// rule-template explainer on any failure — no retries.
pub trait Explainer {
    fn explain(&self, tier1: Option<&Tier1Finding>, tier2: Option<&Tier2Finding>) -> Option<Narrative>;
}

#[derive(Default)]
pub struct RuleTemplateExplainer;

impl Explainer for RuleTemplateExplainer {
    fn explain(&self, tier1: Option<&Tier1Finding>, tier2: Option<&Tier2Finding>) -> Option<Narrative> {
        Some(rule_template(tier1, tier2))
    }
}

pub fn rule_template(tier1: Option<&Tier1Finding>, tier2: Option<&Tier2Finding>) -> Narrative {
    match (tier1, tier2) {
        (Some(t1), Some(t2)) => Narrative {
            threat_summary: format!(
                "Statistical rules and the anomaly model both flagged {} to {} as likely beaconing.",
                t1.key.src_ip, t1.key.domain
            ),
            what_happened: format!(
                "{} made {} requests to {}; {} statistical rule(s) fired ({}), and the anomaly model \
                 scored this traffic at {:.2} confidence.",
                t1.username,
                t1.request_count,
                t1.key.domain,
                t1.methods_fired.len(),
                t1.methods_fired.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", "),
                t2.confidence
            ),
            why_suspicious: format!(
                "{} The anomaly model's strongest signals were {}.",
                t1.descriptions.join(" "),
                describe_top_features(&t2.top_features)
            ),
            recommended_action: action_for_confidence(t2.confidence),
        },
        (Some(t1), None) => Narrative {
            threat_summary: format!(
                "Statistical rules flagged {} to {} as likely beaconing.",
                t1.key.src_ip, t1.key.domain
            ),
            what_happened: format!(
                "{} made {} requests to {}; {} statistical rule(s) fired: {}.",
                t1.username,
                t1.request_count,
                t1.key.domain,
                t1.methods_fired.len(),
                t1.methods_fired.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
            ),
            why_suspicious: t1.descriptions.join(" "),
            recommended_action: action_for_confidence(1.0),
        },
        (None, Some(t2)) => Narrative {
            threat_summary: format!(
                "The anomaly model flagged {} to {} as unusual.",
                t2.key.src_ip, t2.key.domain
            ),
            what_happened: format!(
                "{} generated traffic to {} that scored {:.2} confidence against the trained baseline.",
                t2.username, t2.key.domain, t2.confidence
            ),
            why_suspicious: format!("The strongest signals were {}.", describe_top_features(&t2.top_features)),
            recommended_action: action_for_confidence(t2.confidence),
        },
        (None, None) => Narrative {
            threat_summary: "No finding.".to_string(),
            what_happened: "No finding.".to_string(),
            why_suspicious: "No finding.".to_string(),
            recommended_action: "No action required.".to_string(),
        },
    }
}

fn describe_top_features(top: &[String]) -> String {
    top.iter()
        .map(|name| feature_explanation(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn action_for_confidence(confidence: f64) -> String {
    if confidence >= 0.9 {
        "Isolate the host and escalate to the incident response team immediately.".to_string()
    } else if confidence >= 0.7 {
        "Flag the host for analyst review within the next shift.".to_string()
    } else {
        "Add the host to a watchlist for continued monitoring.".to_string()
    }
}

/// Extension point for a remote-API narrative generator. No network client
/// is wired up because nothing in this crate calls it yet. `run_tier3`
/// already falls back to [`rule_template`] for any explainer that returns
/// `None`, so wrapping with this type is optional — it exists for callers
/// who want the fallback (and its log line) attached to the explainer
/// itself rather than left to the caller.
pub struct FallbackExplainer<E> {
    inner: E,
}

impl<E: Explainer> FallbackExplainer<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: Explainer> Explainer for FallbackExplainer<E> {
    fn explain(&self, tier1: Option<&Tier1Finding>, tier2: Option<&Tier2Finding>) -> Option<Narrative> {
        match self.inner.explain(tier1, tier2) {
            Some(n) => Some(n),
            None => {
                warn!("explainer failed, falling back to rule template");
                Some(rule_template(tier1, tier2))
            }
        }
    }
}
