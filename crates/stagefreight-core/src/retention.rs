//! The restic-style time-bucketed retention engine, generalized over any
//! named + timestamped resource via the [`RetentionItem`]/[`Store`] traits
//! so container tags and forge releases can be pruned through one
//! algorithm.

use crate::error::{CoreError, Result};
use crate::model::RetentionPolicy;
use crate::pattern::{self, CompiledPatterns};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashSet;

/// Any named, optionally-timestamped resource the retention engine can
/// evaluate.
pub trait RetentionItem {
    fn name(&self) -> &str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// A backing store the retention engine lists and prunes against. One
/// implementation per resource kind (container registry tags, forge
/// releases, ...).
#[async_trait]
pub trait Store: Send + Sync {
    type Item: RetentionItem + Clone + Send + Sync;

    async fn list(&self) -> Result<Vec<Self::Item>>;
    async fn delete(&self, item: &Self::Item) -> Result<()>;
}

/// The pure keep/delete decision over a candidate set, without performing
/// any deletion.
#[derive(Debug, Clone)]
pub struct RetentionPlan<T> {
    pub matched: usize,
    pub kept: Vec<T>,
    pub deleted: Vec<T>,
}

#[derive(Clone, Copy)]
enum Bucket {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

fn bucket_key(created_at: DateTime<Utc>, bucket: Bucket) -> String {
    match bucket {
        Bucket::Daily => created_at.date_naive().to_string(),
        Bucket::Weekly => {
            let iso = created_at.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Bucket::Monthly => format!("{}-{:02}", created_at.year(), created_at.month()),
        Bucket::Yearly => created_at.year().to_string(),
    }
}

/// Builds the keep/delete plan for `items` matching `patterns`, per the
/// retention algorithm:
///
/// 1. Filter candidates by pattern match on name.
/// 2. Sort candidates by `created_at` descending (items with no timestamp
///    sort last).
/// 3. Mark the first `keep_last` candidates, then for each of
///    `keep_daily`/`weekly`/`monthly`/`yearly`, walk candidates newest-first
///    marking the first candidate in each distinct time bucket until that
///    many buckets are filled. Items with no `created_at` are ignored for
///    bucketing but remain kept if already marked by `keep_last`.
/// 4. Everything unmarked is deleted.
///
/// Returns [`CoreError::InactivePolicy`] if `policy` has every count at
/// zero.
pub fn plan<T>(items: &[T], patterns: &CompiledPatterns, policy: &RetentionPolicy) -> Result<RetentionPlan<T>>
where
    T: RetentionItem + Clone,
{
    if !policy.is_active() {
        return Err(CoreError::InactivePolicy);
    }

    let mut candidates: Vec<T> = items
        .iter()
        .filter(|item| pattern::matches(patterns, item.name()))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    let matched = candidates.len();
    let mut keep_mask = vec![false; candidates.len()];

    for slot in keep_mask.iter_mut().take(policy.keep_last as usize) {
        *slot = true;
    }

    let buckets = [
        (policy.keep_daily, Bucket::Daily),
        (policy.keep_weekly, Bucket::Weekly),
        (policy.keep_monthly, Bucket::Monthly),
        (policy.keep_yearly, Bucket::Yearly),
    ];

    for (count, bucket) in buckets {
        if count == 0 {
            continue;
        }
        let mut seen = HashSet::new();
        for (idx, item) in candidates.iter().enumerate() {
            if seen.len() >= count as usize {
                break;
            }
            let Some(created_at) = item.created_at() else {
                continue;
            };
            if seen.insert(bucket_key(created_at, bucket)) {
                keep_mask[idx] = true;
            }
        }
    }

    let mut kept = Vec::new();
    let mut deleted = Vec::new();
    for (item, keep) in candidates.into_iter().zip(keep_mask) {
        if keep {
            kept.push(item);
        } else {
            deleted.push(item);
        }
    }

    Ok(RetentionPlan { matched, kept, deleted })
}

/// A [`plan`] that has been executed against a [`Store`]: every deletion
/// that failed is collected alongside its error instead of aborting the
/// whole run.
#[derive(Debug, Clone)]
pub struct RetentionReport<T> {
    pub matched: usize,
    pub kept: Vec<T>,
    pub deleted: Vec<T>,
    pub errors: Vec<(T, String)>,
}

/// Lists `store`, plans retention over the result, and deletes everything
/// the plan marks for deletion. Deletion order follows the plan's
/// descending-age order; per-item failures are collected rather than
/// aborting the run.
pub async fn execute<S>(
    store: &S,
    patterns: &CompiledPatterns,
    policy: &RetentionPolicy,
) -> Result<RetentionReport<S::Item>>
where
    S: Store,
    S::Item: Clone,
{
    let items = store.list().await?;
    let decided = plan(&items, patterns, policy)?;

    let mut deleted = Vec::new();
    let mut errors = Vec::new();
    for item in decided.deleted {
        match store.delete(&item).await {
            Ok(()) => deleted.push(item),
            Err(e) => errors.push((item, e.to_string())),
        }
    }

    Ok(RetentionReport {
        matched: decided.matched,
        kept: decided.kept,
        deleted,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::compile_patterns;
    use chrono::Duration;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Tag {
        name: String,
        created_at: Option<DateTime<Utc>>,
    }

    impl RetentionItem for Tag {
        fn name(&self) -> &str {
            &self.name
        }
        fn created_at(&self) -> Option<DateTime<Utc>> {
            self.created_at
        }
    }

    fn no_patterns() -> CompiledPatterns {
        compile_patterns(&[], &HashMap::new()).0
    }

    fn tags_spanning_days(count: i64, start: DateTime<Utc>) -> Vec<Tag> {
        (0..count)
            .map(|i| Tag {
                name: format!("v{i}"),
                created_at: Some(start - Duration::days(i * 2)),
            })
            .collect()
    }

    #[test]
    fn inactive_policy_is_a_hard_error() {
        let items: Vec<Tag> = vec![];
        let err = plan(&items, &no_patterns(), &RetentionPolicy::default()).unwrap_err();
        assert!(matches!(err, CoreError::InactivePolicy));
    }

    #[test]
    fn keep_last_marks_newest_n() {
        let now = Utc::now();
        let items = tags_spanning_days(10, now);
        let policy = RetentionPolicy { keep_last: 3, ..Default::default() };
        let result = plan(&items, &no_patterns(), &policy).unwrap();
        assert_eq!(result.kept.len(), 3);
        assert_eq!(result.deleted.len(), 7);
        assert_eq!(result.matched, 10);
    }

    #[test]
    fn additive_policy_unions_keep_last_and_keep_daily() {
        // 30 tags spanning 60 days (one every two days), policy keep_last:3,
        // keep_daily:7 — at least 3 newest kept plus up to one per distinct
        // day for the 7 most recent distinct days.
        let now = Utc::now();
        let items = tags_spanning_days(30, now);
        let policy = RetentionPolicy { keep_last: 3, keep_daily: 7, ..Default::default() };
        let result = plan(&items, &no_patterns(), &policy).unwrap();

        assert!(result.kept.len() >= 3);
        assert!(result.kept.len() <= 3 + 7);
        let deleted_names: HashSet<_> = result.deleted.iter().map(|t| t.name.clone()).collect();
        let kept_names: HashSet<_> = result.kept.iter().map(|t| t.name.clone()).collect();
        assert!(deleted_names.is_disjoint(&kept_names));
        assert_eq!(deleted_names.len() + kept_names.len(), 30);
    }

    #[test]
    fn items_without_created_at_are_not_bucketed_but_keep_last_still_applies() {
        let mut items = tags_spanning_days(5, Utc::now());
        items.push(Tag { name: "untagged".into(), created_at: None });
        let policy = RetentionPolicy { keep_last: 1, keep_daily: 10, ..Default::default() };
        let result = plan(&items, &no_patterns(), &policy).unwrap();
        // the undated item sorts last and is outside keep_last's window, so
        // it is deleted; it never registers as a distinct daily bucket.
        assert!(!result.kept.iter().any(|t| t.name == "untagged"));
    }

    #[test]
    fn pattern_filters_candidates_before_planning() {
        let now = Utc::now();
        let items = vec![
            Tag { name: "release-1".into(), created_at: Some(now) },
            Tag { name: "dev-1".into(), created_at: Some(now) },
        ];
        let (patterns, _) = compile_patterns(&["^release-".to_string()], &HashMap::new());
        let policy = RetentionPolicy { keep_last: 10, ..Default::default() };
        let result = plan(&items, &patterns, &policy).unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.kept[0].name, "release-1");
    }

    struct FakeStore {
        items: Vec<Tag>,
    }

    #[async_trait]
    impl Store for FakeStore {
        type Item = Tag;

        async fn list(&self) -> Result<Vec<Tag>> {
            Ok(self.items.clone())
        }

        async fn delete(&self, item: &Tag) -> Result<()> {
            if item.name == "undeletable" {
                Err(CoreError::CacheError("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn execute_collects_per_item_delete_errors() {
        let now = Utc::now();
        let store = FakeStore {
            items: vec![
                Tag { name: "keep-me".into(), created_at: Some(now) },
                Tag { name: "undeletable".into(), created_at: Some(now - Duration::days(5)) },
            ],
        };
        let policy = RetentionPolicy { keep_last: 1, ..Default::default() };
        let report = execute(&store, &no_patterns(), &policy).await.unwrap();
        assert_eq!(report.kept.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0.name, "undeletable");
    }
}
