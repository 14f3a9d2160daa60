use chrono::{DateTime, Utc};
use dossier_core::Plan;
use serde::{Deserialize, Serialize};

/// One discovered fact about the target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub kind: String,
    pub value: String,
    pub source: String,
}

impl Finding {
    fn new(kind: &str, value: String, source: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value,
            source: source.to_string(),
        }
    }
}

/// Structured result of the data-gathering stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub target: String,
    pub generated_at: DateTime<Utc>,
    pub findings: Vec<Finding>,
}

/// Gathers findings for a target. Stubbed: produces a deterministic
/// findings set shaped like the real collectors would.
// TODO: wire up the real collectors (search APIs, registries).
pub fn gather(target: &str, plan: Plan) -> ReportData {
    let slug: String = target
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();

    let mut findings = vec![
        Finding::new("email", format!("{slug}@example.com"), "directory"),
        Finding::new(
            "profile",
            format!("https://social.example/{slug}"),
            "social",
        ),
    ];

    // Pro plans include the deeper lookups.
    if plan == Plan::Pro {
        findings.push(Finding::new(
            "domain",
            format!("{slug}.example.org"),
            "registry",
        ));
        findings.push(Finding::new(
            "breach",
            format!("no known breaches for {slug}"),
            "breach-index",
        ));
    }

    ReportData {
        target: target.to_string(),
        generated_at: Utc::now(),
        findings,
    }
}
