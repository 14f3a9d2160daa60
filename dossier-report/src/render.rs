use crate::findings::ReportData;
use dossier_core::Plan;
use std::fmt::Write;

/// Renders the report document. Layout mirrors the production template:
/// title, target, generation date, numbered findings with their source.
pub fn render_document(data: &ReportData, plan: Plan) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "DOSSIER {} report", plan.as_str());
    let _ = writeln!(out, "Target: {}", data.target);
    let _ = writeln!(out, "Generated: {}", data.generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Findings:");
    for (i, f) in data.findings.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {}", i + 1, f.kind, f.value);
        let _ = writeln!(out, "   Source: {}", f.source);
    }
    out.into_bytes()
}

/// Renders the downloadable bundle: a manifest describing the package
/// contents, followed by the findings as machine-readable lines.
pub fn render_bundle(data: &ReportData, plan: Plan) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "bundle: {} report for {}", plan.as_str(), data.target);
    let _ = writeln!(out, "generated: {}", data.generated_at.to_rfc3339());
    let _ = writeln!(out, "entries: {}", data.findings.len());
    for f in &data.findings {
        let _ = writeln!(out, "{}\t{}\t{}", f.kind, f.value, f.source);
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::gather;

    #[test]
    fn test_document_mentions_target_and_findings() {
        let data = gather("acme", Plan::Pro);
        let doc = String::from_utf8(render_document(&data, Plan::Pro)).unwrap();
        assert!(doc.contains("Target: acme"));
        assert!(doc.contains("1. [email]"));
        assert!(doc.contains("PRO report"));
    }

    #[test]
    fn test_bundle_entry_count_matches() {
        let data = gather("acme", Plan::Basic);
        let bundle = String::from_utf8(render_bundle(&data, Plan::Basic)).unwrap();
        assert!(bundle.contains("entries: 2"));
    }
}
