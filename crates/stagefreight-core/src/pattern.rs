//! The pattern/policy primitive: uniform conditional matching of git tags,
//! branches, file paths, and tag-template resolvers.
//!
//! A pattern token is a literal identifier, a regex containing
//! metacharacters, or either prefixed with `!` for negation. `re:` forces
//! regex interpretation and bypasses policy-name lookup entirely.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maps a policy name (e.g. `"main"`) to the regex source it expands to.
pub type PolicyMap = HashMap<String, String>;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.\-]*$").unwrap())
}

/// A single compiled match rule: a regex when the source compiled, or a
/// literal-equality fallback when it didn't (per the spec's invalid-regex
/// contract).
#[derive(Debug, Clone)]
pub enum MatchRule {
    Regex(Regex),
    Literal(String),
}

impl MatchRule {
    fn compile(source: &str) -> Self {
        match Regex::new(source) {
            Ok(re) => MatchRule::Regex(re),
            Err(_) => MatchRule::Literal(source.to_string()),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            MatchRule::Regex(re) => re.is_match(value),
            MatchRule::Literal(s) => s == value,
        }
    }
}

/// Compiled `{include[], exclude[]}` pattern set produced by [`compile_patterns`].
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    pub include: Vec<MatchRule>,
    pub exclude: Vec<MatchRule>,
}

/// Resolves one pattern token against a policy map.
///
/// Returns the resolved regex source (negation prefix stripped) and whether
/// the token was negated, plus an optional warning when an identifier-shaped
/// token has no entry in `policy_map`.
fn resolve_token(token: &str, policy_map: &PolicyMap) -> (bool, String, Option<String>) {
    let (negated, rest) = match token.strip_prefix('!') {
        Some(r) => (true, r),
        None => (false, token),
    };

    if let Some(forced) = rest.strip_prefix("re:") {
        return (negated, forced.to_string(), None);
    }

    if identifier_re().is_match(rest) {
        return match policy_map.get(rest) {
            Some(resolved) => (negated, resolved.clone(), None),
            None => (
                negated,
                rest.to_string(),
                Some(format!("unknown policy name \"{rest}\"; treating as regex")),
            ),
        };
    }

    (negated, rest.to_string(), None)
}

/// Resolves and compiles a pattern list against a policy map.
///
/// Returns the compiled pattern set plus any "unknown policy name" warnings
/// generated along the way, in token order.
pub fn compile_patterns(patterns: &[String], policy_map: &PolicyMap) -> (CompiledPatterns, Vec<String>) {
    let mut compiled = CompiledPatterns::default();
    let mut warnings = Vec::new();

    for token in patterns {
        let (negated, source, warning) = resolve_token(token, policy_map);
        if let Some(w) = warning {
            warnings.push(w);
        }
        let rule = MatchRule::compile(&source);
        if negated {
            compiled.exclude.push(rule);
        } else {
            compiled.include.push(rule);
        }
    }

    (compiled, warnings)
}

/// Exclude-first, include-any match: reject on any exclude match, else
/// accept if there are no includes, else accept only if some include
/// matches. An empty pattern list always accepts.
pub fn matches(patterns: &CompiledPatterns, value: &str) -> bool {
    if patterns.exclude.iter().any(|r| r.matches(value)) {
        return false;
    }
    if patterns.include.is_empty() {
        return true;
    }
    patterns.include.iter().any(|r| r.matches(value))
}

/// Convenience one-shot: resolve, compile and match a raw pattern list
/// against a single value.
pub fn match_patterns(patterns: &[String], policy_map: &PolicyMap, value: &str) -> (bool, Vec<String>) {
    let (compiled, warnings) = compile_patterns(patterns, policy_map);
    (matches(&compiled, value), warnings)
}

/// A tag/branch AND-condition: both fields are optional; a set field with no
/// corresponding value present is a hard reject.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub tag: Option<Vec<String>>,
    pub branch: Option<Vec<String>>,
}

impl Condition {
    /// Evaluates the condition, returning whether it matched plus any
    /// policy-resolution warnings collected along the way.
    pub fn matches(
        &self,
        policy_map: &PolicyMap,
        tag: Option<&str>,
        branch: Option<&str>,
    ) -> (bool, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(patterns) = &self.tag {
            match tag {
                None => return (false, warnings),
                Some(t) => {
                    let (ok, w) = match_patterns(patterns, policy_map, t);
                    warnings.extend(w);
                    if !ok {
                        return (false, warnings);
                    }
                }
            }
        }

        if let Some(patterns) = &self.branch {
            match branch {
                None => return (false, warnings),
                Some(b) => {
                    let (ok, w) = match_patterns(patterns, policy_map, b);
                    warnings.extend(w);
                    if !ok {
                        return (false, warnings);
                    }
                }
            }
        }

        (true, warnings)
    }
}

fn template_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^}]*\}").unwrap())
}

/// Converts a tag template (e.g. `"dev-{sha:8}"`) into a regex pattern token
/// by replacing every `{...}` block with `.+`, escaping regex metacharacters
/// in the literal parts, and anchoring the result with `^...$`. A leading
/// `!` negation prefix is preserved.
pub fn template_to_pattern(template: &str) -> String {
    let (negated, rest) = match template.strip_prefix('!') {
        Some(r) => (true, r),
        None => (false, template),
    };

    let mut out = String::new();
    let mut last = 0;
    for m in template_block_re().find_iter(rest) {
        out.push_str(&regex::escape(&rest[last..m.start()]));
        out.push_str(".+");
        last = m.end();
    }
    out.push_str(&regex::escape(&rest[last..]));

    let anchored = format!("^{out}$");
    if negated {
        format!("!{anchored}")
    } else {
        anchored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_policies() -> PolicyMap {
        HashMap::new()
    }

    #[test]
    fn empty_pattern_list_always_accepts() {
        let (compiled, warnings) = compile_patterns(&[], &no_policies());
        assert!(matches(&compiled, "anything"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn exclude_only_pattern_list_rejects_matching_value() {
        let patterns = vec!["!^dev-wip$".to_string()];
        let (ok, _) = match_patterns(&patterns, &no_policies(), "dev-wip");
        assert!(!ok);
        let (ok, _) = match_patterns(&patterns, &no_policies(), "dev-feature");
        assert!(ok);
    }

    #[test]
    fn policy_resolution_substitutes_known_name() {
        let mut policies = no_policies();
        policies.insert("main".into(), "^main$".into());
        let (ok, warnings) = match_patterns(&["main".into()], &policies, "main");
        assert!(ok);
        assert!(warnings.is_empty());
    }

    #[test]
    fn policy_resolution_warns_on_unknown_name() {
        let mut policies = no_policies();
        policies.insert("main".into(), "^main$".into());
        let (ok, warnings) = match_patterns(&["maim".into()], &policies, "maim");
        assert!(ok, "unresolved identifier passes through as a literal regex");
        assert_eq!(
            warnings,
            vec!["unknown policy name \"maim\"; treating as regex".to_string()]
        );
    }

    #[test]
    fn negation_preserved_through_policy_resolution() {
        let mut policies = no_policies();
        policies.insert("release".into(), "^v\\d+".into());
        let (compiled, _) = compile_patterns(&["!release".into()], &policies);
        assert!(compiled.include.is_empty());
        assert_eq!(compiled.exclude.len(), 1);
        assert!(!matches(&compiled, "v1.0.0"));
        assert!(matches(&compiled, "dev"));
    }

    #[test]
    fn re_prefix_bypasses_policy_lookup() {
        let mut policies = no_policies();
        policies.insert("foo".into(), "^bar$".into());
        let (ok, warnings) = match_patterns(&["re:foo".into()], &policies, "foo");
        assert!(ok);
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_regex_in_include_falls_back_to_literal_equality() {
        let (compiled, _) = compile_patterns(&["re:(unclosed".into()], &no_policies());
        assert!(matches(&compiled, "(unclosed"));
        assert!(!matches(&compiled, "(unclosed more"));
    }

    #[test]
    fn invalid_regex_in_exclude_falls_back_to_literal_equality() {
        let (compiled, _) = compile_patterns(&["!re:(unclosed".into()], &no_policies());
        assert!(!matches(&compiled, "(unclosed"));
        assert!(matches(&compiled, "other"));
    }

    #[test]
    fn condition_rejects_when_tag_pattern_set_but_no_tag_present() {
        let condition = Condition {
            tag: Some(vec!["^v".into()]),
            branch: None,
        };
        let (ok, _) = condition.matches(&no_policies(), None, Some("main"));
        assert!(!ok);
    }

    #[test]
    fn condition_is_and_of_tag_and_branch() {
        let condition = Condition {
            tag: Some(vec!["^v".into()]),
            branch: Some(vec!["^release/".into()]),
        };
        let (ok, _) = condition.matches(&no_policies(), Some("v1.0.0"), Some("release/1.x"));
        assert!(ok);
        let (ok, _) = condition.matches(&no_policies(), Some("v1.0.0"), Some("main"));
        assert!(!ok);
    }

    #[test]
    fn template_to_pattern_replaces_blocks_and_escapes_literals() {
        assert_eq!(template_to_pattern("dev-{sha:8}"), "^dev\\-.+$");
        assert_eq!(template_to_pattern("!v{version}"), "!^v.+$");
        assert_eq!(template_to_pattern("latest"), "^latest$");
    }
}
