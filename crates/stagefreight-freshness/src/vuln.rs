//! OSV vulnerability correlation: for every resolved dependency whose
//! ecosystem maps onto an OSV ecosystem name, queries the OSV batch API and
//! attaches [`VulnInfo`] entries filtered by the configured minimum
//! severity. Network failures here are non-fatal — a dependency with an
//! unreachable OSV query simply reports no vulnerabilities.

use serde::Deserialize;
use stagefreight_core::{Dependency, VulnInfo, VulnSeverity};

const OSV_QUERY_URL: &str = "https://api.osv.dev/v1/query";

#[derive(Debug, Deserialize)]
struct OsvQueryResponse {
    #[serde(default)]
    vulns: Vec<OsvVulnDetail>,
}

#[derive(Debug, Deserialize)]
struct OsvVulnDetail {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    severity: Vec<OsvSeverityEntry>,
    #[serde(default)]
    database_specific: Option<OsvDatabaseSpecific>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
}

#[derive(Debug, Deserialize)]
struct OsvSeverityEntry {
    #[serde(rename = "type")]
    kind: String,
    score: String,
}

#[derive(Debug, Deserialize)]
struct OsvDatabaseSpecific {
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    #[serde(default)]
    package: Option<OsvPackage>,
    #[serde(default)]
    ranges: Vec<OsvRange>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    name: String,
    ecosystem: String,
}

#[derive(Debug, Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Vec<OsvEvent>,
}

#[derive(Debug, Deserialize)]
struct OsvEvent {
    fixed: Option<String>,
}

/// Approximates a CVSS base score by summing fixed weights for the
/// substrings present in the vector — a deliberately coarse heuristic
/// rather than a full CVSS parser, since OSV advisories frequently carry
/// partial or malformed vectors. Peak score maps to a label: `>=9
/// CRITICAL, >=7 HIGH, >=4 MODERATE, >0 LOW, else UNKNOWN`.
fn severity_from_cvss(vector: &str) -> VulnSeverity {
    let v = vector.to_uppercase();
    let mut score = 0.0;
    if v.contains("/AV:N") {
        score += 2.5;
    }
    if v.contains("/AC:L") {
        score += 1.5;
    }
    if v.contains("/PR:N") {
        score += 1.5;
    }
    if v.contains("/C:H") {
        score += 1.5;
    }
    if v.contains("/I:H") {
        score += 1.5;
    }
    if v.contains("/A:H") {
        score += 1.5;
    }

    if score >= 9.0 {
        VulnSeverity::Critical
    } else if score >= 7.0 {
        VulnSeverity::High
    } else if score >= 4.0 {
        VulnSeverity::Moderate
    } else if score > 0.0 {
        VulnSeverity::Low
    } else {
        VulnSeverity::Unknown
    }
}

fn severity_from_label(label: &str) -> Option<VulnSeverity> {
    match label.to_uppercase().as_str() {
        "CRITICAL" => Some(VulnSeverity::Critical),
        "HIGH" => Some(VulnSeverity::High),
        "MODERATE" | "MEDIUM" => Some(VulnSeverity::Moderate),
        "LOW" => Some(VulnSeverity::Low),
        _ => None,
    }
}

fn derive_severity(detail: &OsvVulnDetail) -> VulnSeverity {
    if let Some(label) = detail.database_specific.as_ref().and_then(|d| d.severity.as_deref()) {
        if let Some(severity) = severity_from_label(label) {
            return severity;
        }
    }

    detail
        .severity
        .iter()
        .filter(|s| s.kind.starts_with("CVSS"))
        .map(|s| severity_from_cvss(&s.score))
        .max()
        .unwrap_or(VulnSeverity::Unknown)
}

/// Whether `detail` carries any severity information at all (a database-
/// specific label or a `CVSS_V2`/`CVSS_V3` vector) — used to tell "really
/// unknown/unscored" apart from a scored vuln whose label happens to be
/// `UNKNOWN`, per §4.4's "no CVSS score present, include by default".
fn has_severity_score(detail: &OsvVulnDetail) -> bool {
    detail.database_specific.as_ref().and_then(|d| d.severity.as_deref()).is_some()
        || detail.severity.iter().any(|s| s.kind.starts_with("CVSS"))
}

/// Extracts `fixed_in` from the first affected-range event whose package
/// name (case-insensitive) and ecosystem match `name`/`ecosystem`.
fn derive_fixed_in(detail: &OsvVulnDetail, name: &str, ecosystem: &str) -> Option<String> {
    detail
        .affected
        .iter()
        .filter(|a| a.package.as_ref().is_some_and(|p| p.name.eq_ignore_ascii_case(name) && p.ecosystem == ecosystem))
        .flat_map(|a| a.ranges.iter())
        .flat_map(|r| r.events.iter())
        .find_map(|e| e.fixed.clone())
}

/// Queries OSV for every dependency whose ecosystem maps onto an OSV
/// ecosystem name, attaching matching vulnerabilities above `min_severity`
/// to each. Vulns with no severity score at all are kept regardless of
/// `min_severity` (conservative default per §4.4); only scored vulns below
/// the floor are dropped. Dependencies with no OSV mapping (Docker
/// images/tools) and network failures are skipped silently — this is
/// best-effort enrichment, never a hard failure of the freshness run.
pub async fn correlate(client: &reqwest::Client, deps: &mut [Dependency], min_severity: VulnSeverity) {
    for dep in deps.iter_mut() {
        let Some(ecosystem) = dep.ecosystem.osv_ecosystem() else { continue };
        let version = dep.current_version.strip_prefix('v').unwrap_or(&dep.current_version);

        let query = serde_json::json!({
            "package": { "name": dep.name, "ecosystem": ecosystem },
            "version": version,
        });

        let Ok(response) = client.post(OSV_QUERY_URL).json(&query).send().await else { continue };
        let Ok(result) = response.json::<OsvQueryResponse>().await else { continue };

        for detail in result.vulns {
            let severity = derive_severity(&detail);
            if has_severity_score(&detail) && severity < min_severity {
                continue;
            }
            let fixed_in = derive_fixed_in(&detail, &dep.name, ecosystem);
            dep.vulnerabilities.push(VulnInfo { id: detail.id, summary: detail.summary, severity, fixed_in });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cvss_network_plus_high_confidentiality_is_critical() {
        assert_eq!(severity_from_cvss("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"), VulnSeverity::Critical);
    }

    #[test]
    fn cvss_local_high_without_network_is_moderate() {
        // AC:L(1.5) + PR:N(1.5) + C:H(1.5) = 4.5 -> moderate, not high; AV:L
        // doesn't earn the AV:N weight.
        assert_eq!(severity_from_cvss("CVSS:3.1/AV:L/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N"), VulnSeverity::Moderate);
    }

    #[test]
    fn cvss_all_low_impact_is_moderate() {
        assert_eq!(severity_from_cvss("CVSS:3.1/AV:N/AC:H/PR:N/UI:N/S:U/C:L/I:N/A:N"), VulnSeverity::Moderate);
    }

    #[test]
    fn cvss_single_weight_is_low() {
        // Only AC:L matches (1.5) -> low.
        assert_eq!(severity_from_cvss("CVSS:3.1/AV:P/AC:L/PR:H/UI:R/S:U/C:N/I:N/A:N"), VulnSeverity::Low);
    }

    #[test]
    fn database_specific_label_takes_precedence_over_cvss() {
        let detail = OsvVulnDetail {
            id: "GHSA-xxxx".to_string(),
            summary: String::new(),
            severity: vec![OsvSeverityEntry { kind: "CVSS_V3".to_string(), score: "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:N".to_string() }],
            database_specific: Some(OsvDatabaseSpecific { severity: Some("CRITICAL".to_string()) }),
            affected: vec![],
        };
        assert_eq!(derive_severity(&detail), VulnSeverity::Critical);
    }

    #[test]
    fn fixed_in_takes_the_first_matching_event() {
        let detail = OsvVulnDetail {
            id: "GHSA-xxxx".to_string(),
            summary: String::new(),
            severity: vec![],
            database_specific: None,
            affected: vec![OsvAffected {
                package: Some(OsvPackage { name: "Foo".to_string(), ecosystem: "npm".to_string() }),
                ranges: vec![OsvRange {
                    events: vec![
                        OsvEvent { fixed: Some("1.0.0".to_string()) },
                        OsvEvent { fixed: Some("1.2.0".to_string()) },
                    ],
                }],
            }],
        };
        assert_eq!(derive_fixed_in(&detail, "foo", "npm"), Some("1.0.0".to_string()));
    }

    #[test]
    fn fixed_in_ignores_non_matching_package() {
        let detail = OsvVulnDetail {
            id: "GHSA-xxxx".to_string(),
            summary: String::new(),
            severity: vec![],
            database_specific: None,
            affected: vec![OsvAffected {
                package: Some(OsvPackage { name: "bar".to_string(), ecosystem: "npm".to_string() }),
                ranges: vec![OsvRange { events: vec![OsvEvent { fixed: Some("1.0.0".to_string()) }] }],
            }],
        };
        assert_eq!(derive_fixed_in(&detail, "foo", "npm"), None);
    }
}
