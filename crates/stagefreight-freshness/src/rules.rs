//! Rule engine and finding generation (§4.5): ignore globs, top-down
//! first-match package rules, axis-priority severity mapping, and the
//! per-dependency finding emission order.
//!
//! Grounded on the teacher's `generate_diagnostics` idiom — walk the
//! resolved set once, build a flat `Vec<Finding>` — generalized from LSP
//! `Diagnostic`s to this toolkit's `Finding` shape.

use glob::Pattern;
use stagefreight_core::config::{PackageRuleConfig, ToleranceConfig};
use stagefreight_core::version::{UpdateDelta, apk_delta, apt_delta, semver_delta};
use stagefreight_core::{Dependency, Ecosystem, Finding, FindingSeverity, VulnSeverity};

/// A compiled package rule; globs pre-parsed so matching a large dependency
/// set doesn't recompile a `Pattern` per dependency per rule.
struct CompiledRule {
    match_packages: Vec<Pattern>,
    match_ecosystems: Vec<String>,
    match_update_types: Vec<String>,
    match_vulnerability: Option<bool>,
    severity: Option<FindingSeverity>,
    enabled: Option<bool>,
    group: Option<String>,
    automerge: Option<bool>,
}

fn parse_severity(label: &str) -> Option<FindingSeverity> {
    match label.to_lowercase().as_str() {
        "info" => Some(FindingSeverity::Info),
        "warning" => Some(FindingSeverity::Warning),
        "critical" => Some(FindingSeverity::Critical),
        _ => None,
    }
}

fn ecosystem_name(ecosystem: Ecosystem) -> &'static str {
    match ecosystem {
        Ecosystem::DockerImage => "docker-image",
        Ecosystem::DockerTool => "docker-tool",
        Ecosystem::GoMod => "gomod",
        Ecosystem::Cargo => "cargo",
        Ecosystem::Npm => "npm",
        Ecosystem::AlpineApk => "alpine-apk",
        Ecosystem::DebianApt => "debian-apt",
        Ecosystem::Pip => "pip",
    }
}

fn update_type_name(update: stagefreight_core::version::UpdateType) -> &'static str {
    use stagefreight_core::version::UpdateType;
    match update {
        UpdateType::Major => "major",
        UpdateType::Minor => "minor",
        UpdateType::Patch => "patch",
    }
}

pub fn compile_rules(configs: &[PackageRuleConfig]) -> Vec<CompiledRuleHandle> {
    configs
        .iter()
        .map(|cfg| CompiledRuleHandle(CompiledRule {
            match_packages: cfg.match_packages.iter().filter_map(|p| Pattern::new(p).ok()).collect(),
            match_ecosystems: cfg.match_ecosystems.clone(),
            match_update_types: cfg.match_update_types.clone(),
            match_vulnerability: cfg.match_vulnerability,
            severity: cfg.severity.as_deref().and_then(parse_severity),
            enabled: cfg.enabled,
            group: cfg.group.clone(),
            automerge: cfg.automerge,
        }))
        .collect()
}

/// Opaque wrapper so callers hold compiled rules without reaching into
/// private fields; only [`evaluate_rules`] inspects them.
pub struct CompiledRuleHandle(CompiledRule);

/// Outcome of matching `dep` against the rule set: whether it's still
/// enabled, its severity override (if any), group label, and automerge flag.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub enabled: bool,
    pub severity_override: Option<FindingSeverity>,
    pub group: Option<String>,
    pub automerge: bool,
}

fn rule_matches(rule: &CompiledRule, dep: &Dependency, dominant: Option<stagefreight_core::version::UpdateType>) -> bool {
    if !rule.match_packages.is_empty() && !rule.match_packages.iter().any(|p| p.matches(&dep.name)) {
        return false;
    }
    if !rule.match_ecosystems.is_empty() && !rule.match_ecosystems.iter().any(|e| e == ecosystem_name(dep.ecosystem)) {
        return false;
    }
    if !rule.match_update_types.is_empty() {
        let Some(dominant) = dominant else { return false };
        if !rule.match_update_types.iter().any(|t| t == update_type_name(dominant)) {
            return false;
        }
    }
    if let Some(expect_vuln) = rule.match_vulnerability
        && expect_vuln != dep.has_vulnerabilities()
    {
        return false;
    }
    true
}

/// Evaluates the top-down, first-match-wins package rule set against one
/// dependency, given its dominant update type (if any).
pub fn evaluate_rules(
    rules: &[CompiledRuleHandle],
    dep: &Dependency,
    dominant: Option<stagefreight_core::version::UpdateType>,
) -> RuleOutcome {
    let mut outcome = RuleOutcome { enabled: true, ..Default::default() };

    for handle in rules {
        let rule = &handle.0;
        if rule_matches(rule, dep, dominant) {
            if let Some(enabled) = rule.enabled {
                outcome.enabled = enabled;
            }
            if rule.severity.is_some() {
                outcome.severity_override = rule.severity;
            }
            if rule.group.is_some() {
                outcome.group = rule.group.clone();
            }
            if let Some(automerge) = rule.automerge {
                outcome.automerge = automerge;
            }
            break;
        }
    }

    outcome
}

/// Whether `name` matches any of the raw ignore globs.
pub fn is_ignored(ignore: &[String], name: &str) -> bool {
    ignore.iter().filter_map(|p| Pattern::new(p).ok()).any(|p| p.matches(name))
}

fn delta_for(ecosystem: Ecosystem, current: &str, latest: &str) -> Option<UpdateDelta> {
    match ecosystem {
        Ecosystem::AlpineApk => apk_delta(current, latest),
        Ecosystem::DebianApt => apt_delta(current, latest),
        _ => semver_delta(current, latest),
    }
}

fn severity_bucket(excess: u32) -> FindingSeverity {
    match excess {
        0 => FindingSeverity::Info,
        1 => FindingSeverity::Warning,
        _ => FindingSeverity::Critical,
    }
}

/// Compares `delta` against `tolerance` axis-by-axis in Major > Minor >
/// Patch priority, returning the severity of the first axis whose delta
/// exceeds its tolerance. `None` means no axis exceeded tolerance.
fn version_gap_severity(delta: &UpdateDelta, tolerance: &ToleranceConfig) -> Option<FindingSeverity> {
    let axes: [(i64, i64); 3] = [
        (delta.major, tolerance.major as i64),
        (delta.minor, tolerance.minor as i64),
        (delta.patch, tolerance.patch as i64),
    ];
    for (value, tol) in axes {
        if value > tol {
            return Some(severity_bucket((value - tol) as u32));
        }
    }
    None
}

fn vuln_finding_severity(severity: VulnSeverity) -> FindingSeverity {
    match severity {
        VulnSeverity::Critical | VulnSeverity::High => FindingSeverity::Critical,
        VulnSeverity::Moderate => FindingSeverity::Warning,
        VulnSeverity::Low | VulnSeverity::Unknown => FindingSeverity::Info,
    }
}

/// Generates findings for one dependency, in the emission order mandated
/// by §4.5: advisory, then one finding per vulnerability, then zero or one
/// version-gap finding.
pub fn findings_for(dep: &Dependency, outcome: &RuleOutcome, tolerance: &ToleranceConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(advisory) = &dep.advisory {
        findings.push(Finding {
            file: dep.file_path.clone(),
            line: dep.line_number,
            column: 0,
            module: "freshness".to_string(),
            severity: FindingSeverity::Info,
            message: advisory.clone(),
        });
    }

    for vuln in &dep.vulnerabilities {
        findings.push(Finding {
            file: dep.file_path.clone(),
            line: dep.line_number,
            column: 0,
            module: "freshness".to_string(),
            severity: vuln_finding_severity(vuln.severity),
            message: format!("{} ({:?}): {}", vuln.id, vuln.severity, vuln.summary),
        });
    }

    if dep.current_version == dep.latest_version {
        return findings;
    }

    let delta = delta_for(dep.ecosystem, &dep.current_version, &dep.latest_version);
    let base_severity = match &delta {
        Some(d) => version_gap_severity(d, tolerance),
        None => Some(FindingSeverity::Info),
    };

    let severity = match (base_severity, outcome.severity_override) {
        (Some(_), Some(over)) => Some(over),
        (Some(base), None) => Some(base),
        (None, Some(over)) if dep.has_vulnerabilities() && over == FindingSeverity::Critical => Some(over),
        (None, _) => None,
    };

    if let Some(severity) = severity {
        let mut message = if delta.is_some() {
            format!("{} -> {}", dep.current_version, dep.latest_version)
        } else {
            format!("update available: {} -> {}", dep.current_version, dep.latest_version)
        };
        if !dep.vulnerabilities.is_empty() {
            message.push_str(&format!(" [{} CVE{}]", dep.vulnerabilities.len(), if dep.vulnerabilities.len() == 1 { "" } else { "s" }));
        }
        if let Some(group) = &outcome.group {
            message.push_str(&format!(" [group: {group}]"));
        }

        findings.push(Finding {
            file: dep.file_path.clone(),
            line: dep.line_number,
            column: 0,
            module: "freshness".to_string(),
            severity,
            message,
        });
    }

    findings
}
