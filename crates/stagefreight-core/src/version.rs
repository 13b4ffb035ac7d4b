//! Version algebra: container-tag decomposition, family grouping, and
//! ecosystem-aware delta computation.
//!
//! Grounded on the newer-version `Ordering` idiom used for Go pseudo-version
//! comparison, generalized from a single ecosystem to the full
//! decompose/`tag_newer`/delta contract this toolkit needs.

use regex::Regex;
use std::sync::OnceLock;

/// A parsed container tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedTag {
    pub raw: String,
    pub version: Option<(u64, u64, u64)>,
    pub suffix: String,
    pub family: String,
    pub pre_rank: u8,
    pub pre_num: Option<u64>,
}

fn hex_hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{7,40}$").unwrap())
}

fn minio_release_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2})-(\d{2})-(\d{2})Z$").unwrap()
    })
}

/// Parses `YYYY-MM-DDTHH-MM-SSZ` into `(YYYYMMDD, HHMMSS)`.
fn parse_minio_release(rest: &str) -> Option<(u64, u64)> {
    let caps = minio_release_re().captures(rest)?;
    let ymd: u64 = format!("{}{}{}", &caps[1], &caps[2], &caps[3]).parse().ok()?;
    let hms: u64 = format!("{}{}{}", &caps[4], &caps[5], &caps[6]).parse().ok()?;
    Some((ymd, hms))
}

/// Tries to parse a dot-separated numeric version with at most 3 components,
/// defaulting missing trailing components to zero.
fn try_parse_triple(s: &str) -> Option<(u64, u64, u64)> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut nums = [0u64; 3];
    for (i, p) in parts.iter().enumerate() {
        nums[i] = p.parse().ok()?;
    }
    Some((nums[0], nums[1], nums[2]))
}

/// Parses `version_part`, progressively trimming rightmost dot-segments
/// until parsing succeeds. Trimmed segments are returned in original left-
/// to-right order so the caller can prepend them to the suffix.
fn parse_version_with_trim(version_part: &str) -> (Option<(u64, u64, u64)>, Vec<String>) {
    if version_part.is_empty() {
        return (None, Vec::new());
    }

    let mut segments: Vec<&str> = version_part.split('.').collect();
    let mut trimmed = Vec::new();

    loop {
        if segments.is_empty() {
            trimmed.reverse();
            return (None, trimmed);
        }
        let candidate = segments.join(".");
        if let Some(v) = try_parse_triple(&candidate) {
            trimmed.reverse();
            return (Some(v), trimmed);
        }
        trimmed.push(segments.pop().unwrap().to_string());
    }
}

/// Strips a pure numeric/embedded-version tail from a lowercased suffix
/// segment (`beta17` -> `beta`, `alpine3.22` -> `alpine`).
fn strip_trailing_version(seg: &str) -> String {
    if let Some(idx) = seg.find(|c: char| c.is_ascii_digit()) {
        let tail = &seg[idx..];
        if tail.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return seg[..idx].to_string();
        }
    }
    seg.to_string()
}

/// Normalizes a raw suffix into a stable family key: split on `-`, lowercase,
/// drop pure-hex hashes, pure-numeric segments, and trailing/embedded
/// version digits, then rejoin kept segments with `-`.
fn normalize_family(suffix: &str) -> String {
    if suffix.is_empty() {
        return String::new();
    }

    let mut kept = Vec::new();
    for seg in suffix.split('-') {
        let seg_lower = seg.to_lowercase();
        if seg_lower.is_empty() {
            continue;
        }
        if hex_hash_re().is_match(&seg_lower) {
            continue;
        }
        if seg_lower.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let stripped = strip_trailing_version(&seg_lower);
        if stripped.is_empty() {
            continue;
        }
        kept.push(stripped);
    }
    kept.join("-")
}

const PRE_RELEASE_TOKENS: [(&str, u8); 4] = [("rc", 1), ("beta", 2), ("alpha", 3), ("dev", 4)];

/// Scans suffix segments for a pre-release token prefix; returns the rank
/// (0 = stable) and the leading integer of the segment remainder, if any.
fn detect_prerelease(suffix: &str) -> (u8, Option<u64>) {
    for seg in suffix.split('-') {
        let seg_lower = seg.to_lowercase();
        for (prefix, rank) in PRE_RELEASE_TOKENS {
            if let Some(rest) = seg_lower.strip_prefix(prefix) {
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                let pre_num = if digits.is_empty() { None } else { digits.parse().ok() };
                return (rank, pre_num);
            }
        }
    }
    (0, None)
}

/// Decomposes a raw container tag into version, suffix, family, and
/// pre-release rank, per the version algebra's five-step contract.
pub fn decompose(raw: &str) -> DecomposedTag {
    if let Some(rest) = raw.strip_prefix("RELEASE.")
        && let Some((ymd, hms)) = parse_minio_release(rest)
    {
        return DecomposedTag {
            raw: raw.to_string(),
            version: Some((ymd, hms, 0)),
            suffix: String::new(),
            family: String::new(),
            pre_rank: 0,
            pre_num: None,
        };
    }

    if let Some(rest) = raw.strip_prefix("sha-") {
        return DecomposedTag {
            raw: raw.to_string(),
            version: None,
            suffix: rest.to_string(),
            family: "sha".to_string(),
            pre_rank: 0,
            pre_num: None,
        };
    }

    let without_v: &str = if raw.len() > 1 && raw.starts_with('v') && raw.as_bytes()[1].is_ascii_digit() {
        &raw[1..]
    } else {
        raw
    };

    let (version_part, suffix_raw) = match without_v.split_once('-') {
        Some((v, s)) => (v.to_string(), s.to_string()),
        None => (without_v.to_string(), String::new()),
    };

    let (version, trimmed_prefix) = parse_version_with_trim(&version_part);
    let suffix = if trimmed_prefix.is_empty() {
        suffix_raw
    } else {
        let prefix_joined = trimmed_prefix.join(".");
        if suffix_raw.is_empty() {
            prefix_joined
        } else {
            format!("{prefix_joined}-{suffix_raw}")
        }
    };

    let family = normalize_family(&suffix);
    let (pre_rank, pre_num) = detect_prerelease(&suffix);

    DecomposedTag {
        raw: raw.to_string(),
        version,
        suffix,
        family,
        pre_rank,
        pre_num,
    }
}

/// Whether a decomposed version is "date-like" (e.g. `20220328`) and so
/// excluded from "latest" comparisons.
pub fn is_date_like(version: (u64, u64, u64)) -> bool {
    version.1 == 0 && version.2 == 0 && version.0 >= 19_700_101
}

/// Whether `a` is strictly newer than `b`: greater version wins; else
/// stable beats pre-release; else higher `pre_num` wins.
pub fn tag_newer(a: &DecomposedTag, b: &DecomposedTag) -> bool {
    match (a.version, b.version) {
        (Some(va), Some(vb)) if va != vb => va > vb,
        (Some(_), Some(_)) => {
            if a.pre_rank != b.pre_rank {
                a.pre_rank < b.pre_rank
            } else {
                a.pre_num.unwrap_or(0) > b.pre_num.unwrap_or(0)
            }
        }
        _ => false,
    }
}

/// Picks the newest tag among `candidates` sharing `current`'s family and
/// version line (major.minor), excluding date-like versions, per §4.2.1's
/// base-image selection rule. Restricting to the current major.minor keeps
/// e.g. `1.25-alpine` from jumping to a `1.26-alpine` release line; only
/// patch-level candidates within the same line are considered.
pub fn newest_in_family<'a>(current: &str, candidates: &'a [String]) -> Option<&'a str> {
    let current_decomposed = decompose(current);
    let mut best: Option<(DecomposedTag, &str)> = None;

    for candidate in candidates {
        let decomposed = decompose(candidate);
        if decomposed.family != current_decomposed.family {
            continue;
        }
        if let (Some((cmaj, cmin, _)), Some((maj, min, _))) = (current_decomposed.version, decomposed.version) {
            if maj != cmaj || min != cmin {
                continue;
            }
        }
        if let Some(v) = decomposed.version
            && is_date_like(v)
        {
            continue;
        }
        match &best {
            None => best = Some((decomposed, candidate.as_str())),
            Some((best_tag, _)) => {
                if tag_newer(&decomposed, best_tag) {
                    best = Some((decomposed, candidate.as_str()));
                }
            }
        }
    }

    best.map(|(_, raw)| raw)
}

/// A `(ΔMajor, ΔMinor, ΔPatch)` triple, positive when `latest` is ahead of
/// `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateDelta {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

/// The dominant axis of an [`UpdateDelta`], in Major > Minor > Patch
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
}

impl UpdateDelta {
    pub fn dominant(&self) -> Option<UpdateType> {
        if self.major != 0 {
            Some(UpdateType::Major)
        } else if self.minor != 0 {
            Some(UpdateType::Minor)
        } else if self.patch != 0 {
            Some(UpdateType::Patch)
        } else {
            None
        }
    }
}

fn triple_delta(current: (u64, u64, u64), latest: (u64, u64, u64)) -> UpdateDelta {
    UpdateDelta {
        major: latest.0 as i64 - current.0 as i64,
        minor: latest.1 as i64 - current.1 as i64,
        patch: latest.2 as i64 - current.2 as i64,
    }
}

/// Default (semver-like) delta: parses both sides via [`decompose`] and
/// diffs the resulting triples.
pub fn semver_delta(current: &str, latest: &str) -> Option<UpdateDelta> {
    let cur = decompose(current).version?;
    let lat = decompose(latest).version?;
    Some(triple_delta(cur, lat))
}

fn apk_revision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)-r(\d+)$").unwrap())
}

fn split_apk_revision(v: &str) -> (String, Option<String>) {
    match apk_revision_re().captures(v) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (v.to_string(), None),
    }
}

fn apk_pre_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(alpha|beta|rc|pre|p)\d*").unwrap())
}

fn strip_apk_pre(v: &str) -> String {
    apk_pre_re().replace_all(v, "").to_string()
}

/// Alpine APK delta: splits the trailing `-r<N>` package revision, strips
/// pre-release markers from the upstream portion, and treats a pure
/// revision bump (identical upstream version) as a patch-level delta.
pub fn apk_delta(current: &str, latest: &str) -> Option<UpdateDelta> {
    let (cur_upstream, cur_rev) = split_apk_revision(current);
    let (lat_upstream, lat_rev) = split_apk_revision(latest);

    let cur_clean = strip_apk_pre(&cur_upstream);
    let lat_clean = strip_apk_pre(&lat_upstream);

    let cur_v = decompose(&cur_clean).version?;
    let lat_v = decompose(&lat_clean).version?;

    let mut delta = triple_delta(cur_v, lat_v);
    if delta.major == 0 && delta.minor == 0 && delta.patch == 0 && cur_rev != lat_rev {
        delta.patch = 1;
    }
    Some(delta)
}

fn apt_tail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\+dfsg\S*|\+deb\S*|\+really\S*|\+b\d*|~bpo\S*|~\S*)+$").unwrap())
}

fn split_apt_epoch(v: &str) -> (u64, String) {
    if let Some(idx) = v.find(':')
        && !v[..idx].is_empty()
        && v[..idx].chars().all(|c| c.is_ascii_digit())
    {
        let epoch: u64 = v[..idx].parse().unwrap_or(0);
        return (epoch, v[idx + 1..].to_string());
    }
    (0, v.to_string())
}

fn split_apt_revision(v: &str) -> (String, Option<String>) {
    match v.rfind('-') {
        Some(idx) => (v[..idx].to_string(), Some(v[idx + 1..].to_string())),
        None => (v.to_string(), None),
    }
}

fn strip_apt_tails(v: &str) -> String {
    apt_tail_re().replace(v, "").to_string()
}

/// Debian APT delta: splits the leading `<N>:` epoch and the trailing
/// `-<revision>`, strips distro-specific version tails, and treats an
/// epoch change as an override major bump and a revision-only bump as
/// patch-level.
pub fn apt_delta(current: &str, latest: &str) -> Option<UpdateDelta> {
    let (cur_epoch, cur_rest) = split_apt_epoch(current);
    let (lat_epoch, lat_rest) = split_apt_epoch(latest);

    if cur_epoch != lat_epoch {
        return Some(UpdateDelta {
            major: lat_epoch as i64 - cur_epoch as i64,
            minor: 0,
            patch: 0,
        });
    }

    let (cur_upstream, cur_rev) = split_apt_revision(&cur_rest);
    let (lat_upstream, lat_rev) = split_apt_revision(&lat_rest);

    let cur_clean = strip_apt_tails(&cur_upstream);
    let lat_clean = strip_apt_tails(&lat_upstream);

    let cur_v = decompose(&cur_clean).version?;
    let lat_v = decompose(&lat_clean).version?;

    let mut delta = triple_delta(cur_v, lat_v);
    if delta.major == 0 && delta.minor == 0 && delta.patch == 0 && cur_rev != lat_rev {
        delta.patch = 1;
    }
    Some(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_strips_leading_v_and_splits_suffix() {
        let tag = decompose("v1.2.3-alpine");
        assert_eq!(tag.version, Some((1, 2, 3)));
        assert_eq!(tag.family, "alpine");
    }

    #[test]
    fn decompose_two_component_version_defaults_patch_to_zero() {
        let tag = decompose("1.25-alpine");
        assert_eq!(tag.version, Some((1, 25, 0)));
        assert_eq!(tag.family, "alpine");
    }

    #[test]
    fn decompose_bare_semver_has_empty_family() {
        let tag = decompose("1.26");
        assert_eq!(tag.version, Some((1, 26, 0)));
        assert_eq!(tag.family, "");
    }

    #[test]
    fn decompose_date_like_tag_is_excluded_from_latest() {
        let tag = decompose("20220328");
        assert_eq!(tag.version, Some((20_220_328, 0, 0)));
        assert!(is_date_like(tag.version.unwrap()));
    }

    #[test]
    fn decompose_sha_prefixed_tag_is_non_versioned_family_sha() {
        let tag = decompose("sha-abc1234");
        assert_eq!(tag.version, None);
        assert_eq!(tag.family, "sha");
    }

    #[test]
    fn decompose_minio_release_tag() {
        let tag = decompose("RELEASE.2023-01-02T03-04-05Z");
        assert_eq!(tag.version, Some((20_230_102, 30_405, 0)));
        assert_eq!(tag.family, "");
    }

    #[test]
    fn decompose_family_drops_hash_numeric_and_embedded_version_segments() {
        assert_eq!(normalize_family("beta17"), "beta");
        assert_eq!(normalize_family("alpine3.22"), "alpine");
        assert_eq!(normalize_family("deadbee"), "");
        assert_eq!(normalize_family("42"), "");
        assert_eq!(normalize_family("bookworm-20240101"), "bookworm");
    }

    #[test]
    fn decompose_prerelease_rank_and_num() {
        let tag = decompose("v2.0.0-beta17");
        assert_eq!(tag.pre_rank, 2);
        assert_eq!(tag.pre_num, Some(17));
    }

    #[test]
    fn tag_newer_prefers_greater_version() {
        let older = decompose("1.2.3");
        let newer = decompose("1.3.0");
        assert!(tag_newer(&newer, &older));
        assert!(!tag_newer(&older, &newer));
    }

    #[test]
    fn tag_newer_stable_beats_prerelease_at_same_version() {
        let stable = decompose("2.0.0");
        let beta = decompose("2.0.0-beta1");
        assert!(tag_newer(&stable, &beta));
    }

    #[test]
    fn tag_newer_higher_pre_num_wins() {
        let beta1 = decompose("2.0.0-beta1");
        let beta2 = decompose("2.0.0-beta2");
        assert!(tag_newer(&beta2, &beta1));
    }

    #[test]
    fn tag_family_filtering_scenario() {
        let candidates: Vec<String> = [
            "1.25-alpine",
            "1.25.1-alpine",
            "1.26",
            "1.26-alpine",
            "20220328",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let newest = newest_in_family("1.25-alpine", &candidates);
        assert_eq!(newest, Some("1.25.1-alpine"));
    }

    #[test]
    fn apk_revision_bump_delta_scenario() {
        let delta = apk_delta("1.2.3-r0", "1.2.3-r1").unwrap();
        assert_eq!(delta, UpdateDelta { major: 0, minor: 0, patch: 1 });
        assert_eq!(delta.dominant(), Some(UpdateType::Patch));
    }

    #[test]
    fn apt_epoch_change_overrides_as_major() {
        let delta = apt_delta("1:2.0-1", "2:2.0-1").unwrap();
        assert_eq!(delta.major, 1);
    }

    #[test]
    fn apt_revision_only_bump_is_patch() {
        let delta = apt_delta("2.0-1", "2.0-2").unwrap();
        assert_eq!(delta, UpdateDelta { major: 0, minor: 0, patch: 1 });
    }

    #[test]
    fn semver_delta_basic() {
        let delta = semver_delta("1.2.3", "2.0.0").unwrap();
        assert_eq!(delta, UpdateDelta { major: 1, minor: -2, patch: -3 });
        assert_eq!(delta.dominant(), Some(UpdateType::Major));
    }
}
