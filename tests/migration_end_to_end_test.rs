//! End-to-end import scenarios against the in-memory source and target
//!
//! These tests verify that:
//! - A full run imports every stage and resolves forward references
//! - Re-running is idempotent
//! - An interrupted run resumes without duplicating entities
//! - Rows with missing parents are skipped without failing the run
//! - Users sharing an email are merged
//! - The final state does not depend on where a run was stopped

use async_trait::async_trait;
use ferry::adapters::source::MemorySource;
use ferry::adapters::target::{CursorStorage, MemoryTarget, TargetRepository};
use ferry::config::HooksConfig;
use ferry::core::import::{
    CommittedEntity, CoordinatorOptions, HookContext, HookRegistry, ImportSummary,
    MigrationCoordinator, PostCommitHook,
};
use ferry::core::state::StageStatus;
use ferry::core::transform::{build_pipeline, Dialect};
use ferry::domain::{EntityType, LegacyId, Result, RowIssueKind, SourceRow, Stage};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Small phpBB-like forum
///
/// Post 20 quotes post 22, which is imported after it. Post 21 mentions the
/// legacy name of a merged account. Post 23 belongs to a topic that does not
/// exist.
fn forum() -> MemorySource {
    MemorySource::new()
        .with_row(Stage::Groups, 1, json!({ "name": "moderators" }))
        .unwrap()
        .with_row(
            Stage::Users,
            1,
            json!({ "username": "alice", "email": "alice@example.com", "group_ids": [1] }),
        )
        .unwrap()
        .with_row(Stage::Users, 2, json!({ "username": "bob", "email": "bob@example.com" }))
        .unwrap()
        .with_row(
            Stage::Users,
            3,
            json!({ "username": "alice_old", "email": "Alice@Example.com" }),
        )
        .unwrap()
        .with_row(Stage::Categories, 1, json!({ "name": "General" }))
        .unwrap()
        .with_row(
            Stage::Topics,
            10,
            json!({
                "title": "Welcome",
                "body": "[b]Hello[/b] everyone",
                "category_id": 1,
                "user_id": 1,
                "first_post_id": 19
            }),
        )
        .unwrap()
        .with_row(
            Stage::Posts,
            20,
            json!({
                "topic_id": 10,
                "user_id": 2,
                "body": "[quote=alice;22]later words[/quote] hi @alice"
            }),
        )
        .unwrap()
        .with_row(
            Stage::Posts,
            21,
            json!({
                "topic_id": 10,
                "user_id": 3,
                "body": "Back to [post=19]the start[/post] cc @alice_old"
            }),
        )
        .unwrap()
        .with_row(
            Stage::Posts,
            22,
            json!({ "topic_id": 10, "user_id": 1, "body": "Written last" }),
        )
        .unwrap()
        .with_row(
            Stage::Posts,
            23,
            json!({ "topic_id": 99, "user_id": 1, "body": "Orphan" }),
        )
        .unwrap()
        .with_row(Stage::Likes, 1, json!({ "post_id": 20, "user_id": 1 }))
        .unwrap()
        .with_row(Stage::Subscriptions, 1, json!({ "topic_id": 10, "user_id": 2 }))
        .unwrap()
        .with_row(
            Stage::PrivateMessages,
            30,
            json!({
                "title": "Hi",
                "body": "About [thread=10]welcome[/thread]",
                "user_id": 1,
                "recipient_ids": [2]
            }),
        )
        .unwrap()
}

fn options(stages: Vec<Stage>) -> CoordinatorOptions {
    CoordinatorOptions {
        stages,
        batch_size: 2,
        ..CoordinatorOptions::default()
    }
}

fn coordinator_with(
    target: &Arc<MemoryTarget>,
    hooks: HookRegistry,
    shutdown: watch::Receiver<bool>,
    options: CoordinatorOptions,
) -> MigrationCoordinator {
    MigrationCoordinator::new(
        Arc::new(forum()),
        target.clone(),
        target.clone(),
        options,
        build_pipeline(Dialect::Bbcode, None).unwrap(),
        hooks,
        shutdown,
    )
}

fn coordinator(
    target: &Arc<MemoryTarget>,
    hooks: HookRegistry,
    shutdown: watch::Receiver<bool>,
) -> MigrationCoordinator {
    coordinator_with(target, hooks, shutdown, options(Vec::new()))
}

fn default_hooks() -> HookRegistry {
    HookRegistry::from_config(&HooksConfig::default(), None)
}

async fn run(target: &Arc<MemoryTarget>) -> ImportSummary {
    let (_tx, rx) = watch::channel(false);
    coordinator(target, default_hooks(), rx)
        .execute()
        .await
        .unwrap()
}

/// Everything an import leaves behind that must not depend on interruptions
async fn assert_same_state(actual: &MemoryTarget, expected: &MemoryTarget) {
    assert_eq!(actual.post_raws(), expected.post_raws());
    assert_eq!(actual.references(), expected.references());
    assert_eq!(actual.group_members(), expected.group_members());
    assert_eq!(
        actual.entity_counts().await.unwrap(),
        expected.entity_counts().await.unwrap()
    );
}

fn raw(target: &MemoryTarget, legacy_id: i64) -> String {
    target
        .post_raws()
        .get(&(EntityType::Post, LegacyId::from(legacy_id)))
        .cloned()
        .unwrap_or_default()
}

/// Sends the shutdown signal once `limit` posts were committed
struct StopAfterPosts {
    limit: usize,
    committed: AtomicUsize,
    shutdown: watch::Sender<bool>,
}

#[async_trait]
impl PostCommitHook for StopAfterPosts {
    fn name(&self) -> &str {
        "stop_after_posts"
    }

    fn applies_to(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::Post
    }

    async fn after_commit(
        &self,
        _ctx: &HookContext<'_>,
        _entity: &CommittedEntity,
        _row: &SourceRow,
    ) -> Result<()> {
        if self.committed.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            let _ = self.shutdown.send(true);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_full_import_resolves_forward_and_backward_references() {
    let target = Arc::new(MemoryTarget::new().with_base_url("https://forum.example.com"));
    let summary = run(&target).await;

    assert!(!summary.interrupted);
    assert_eq!(summary.stage(Stage::Users).unwrap().imported, 2);
    assert_eq!(summary.stage(Stage::Users).unwrap().merged, 1);
    assert_eq!(summary.stage(Stage::Posts).unwrap().imported, 3);
    assert_eq!(summary.stage(Stage::Posts).unwrap().skipped, 1);
    assert_eq!(summary.stage(Stage::PrivateMessages).unwrap().imported, 1);

    // Post 22 is the fourth post of topic 10: first post, 20, 21, 22
    let forward = raw(&target, 20);
    assert!(forward.contains("[quote=\"alice, post:4"), "{forward}");
    assert!(forward.contains("@alice"), "{forward}");

    let backward = raw(&target, 21);
    assert!(
        backward.contains("[the start](https://forum.example.com/t/"),
        "{backward}"
    );
    // Mention of the merged account points at the surviving user
    assert!(backward.ends_with("cc @alice"), "{backward}");

    let first = target
        .post_by_legacy_id(EntityType::Post, &LegacyId::from(19))
        .unwrap();
    assert_eq!(first.post_number, 1);
    assert_eq!(first.raw, "**Hello** everyone");

    let pm = target
        .post_raws()
        .get(&(EntityType::PrivateMessage, LegacyId::from(30)))
        .cloned()
        .unwrap();
    assert!(pm.contains("[welcome](https://forum.example.com/t/"), "{pm}");

    assert!(summary.unresolved_references.is_empty());
    assert_eq!(target.group_members().len(), 1);
}

#[tokio::test]
async fn test_missing_parent_is_skipped_not_fatal() {
    let target = Arc::new(MemoryTarget::new());
    let summary = run(&target).await;

    assert_eq!(summary.issue_count(RowIssueKind::MissingParent), 1);
    let issue = &summary.issues[0];
    assert_eq!(issue.entity_type, EntityType::Post);
    assert_eq!(issue.legacy_id, Some(LegacyId::from(23)));
    assert!(!summary.is_clean());

    let lookup = target
        .find_by_legacy_id(EntityType::Post, &LegacyId::from(23))
        .await
        .unwrap();
    assert!(lookup.is_none());
}

#[tokio::test]
async fn test_users_with_same_email_share_one_account() {
    let target = Arc::new(MemoryTarget::new());
    run(&target).await;

    let alice = target
        .find_by_legacy_id(EntityType::User, &LegacyId::from(1))
        .await
        .unwrap()
        .unwrap();
    let alice_old = target
        .find_by_legacy_id(EntityType::User, &LegacyId::from(3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice, alice_old);

    let post = target
        .post_by_legacy_id(EntityType::Post, &LegacyId::from(21))
        .unwrap();
    assert_eq!(post.user_id, alice);
}

#[tokio::test]
async fn test_rerun_creates_nothing() {
    let target = Arc::new(MemoryTarget::new());
    run(&target).await;
    let calls = target.create_calls();
    let references = target.references();
    let raws = target.post_raws();

    let again = run(&target).await;

    assert_eq!(again.total_imported(), 0);
    assert_eq!(target.create_calls(), calls);
    assert_eq!(target.references(), references);
    assert_eq!(target.post_raws(), raws);
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_duplicates() {
    let target = Arc::new(MemoryTarget::new());
    let (tx, rx) = watch::channel(false);
    let mut hooks = default_hooks();
    hooks.register(StopAfterPosts {
        limit: 1,
        committed: AtomicUsize::new(0),
        shutdown: tx,
    });

    let first = coordinator(&target, hooks, rx).execute().await.unwrap();
    assert!(first.interrupted);
    assert_eq!(first.stage(Stage::Posts).unwrap().imported, 1);
    assert!(first.stage(Stage::Likes).is_none());
    let cursor = target.load_cursor(Stage::Posts).await.unwrap().unwrap();
    assert_eq!(cursor.status, StageStatus::Interrupted);
    assert_eq!(cursor.last_key, Some(20));
    // Only the inline pass ran, the forward quote is still the legacy token
    assert!(raw(&target, 20).contains("[quote=alice;22]"), "{}", raw(&target, 20));

    let second = run(&target).await;
    assert!(!second.interrupted);
    assert_eq!(second.stage(Stage::Users).unwrap().imported, 0);
    assert_eq!(second.stage(Stage::Posts).unwrap().imported, 2);

    // Forward quote from the first run is fixed by the second global pass
    assert!(raw(&target, 20).contains("[quote=\"alice, post:4"));

    let references = target.references();
    let unique: HashSet<_> = references
        .iter()
        .map(|m| (m.entity_type, m.legacy_id.clone()))
        .collect();
    assert_eq!(unique.len(), references.len());
    assert_eq!(
        references
            .iter()
            .filter(|m| m.entity_type == EntityType::Post)
            .count(),
        4
    );

    let uninterrupted = Arc::new(MemoryTarget::new());
    run(&uninterrupted).await;
    assert_same_state(&target, &uninterrupted).await;
}

#[tokio::test]
async fn test_restart_between_stages_matches_single_run() {
    let target = Arc::new(MemoryTarget::new());
    let (_tx, rx) = watch::channel(false);
    coordinator_with(&target, default_hooks(), rx, options(vec![Stage::Groups, Stage::Users]))
        .execute()
        .await
        .unwrap();

    let resumed = run(&target).await;
    assert!(resumed.unresolved_references.is_empty());
    assert_eq!(raw(&target, 21), "Back to [the start](/t/1/1) cc @alice");

    let uninterrupted = Arc::new(MemoryTarget::new());
    run(&uninterrupted).await;
    assert_same_state(&target, &uninterrupted).await;
}

#[tokio::test]
async fn test_every_post_points_at_existing_rows() {
    let target = Arc::new(MemoryTarget::new());
    run(&target).await;

    for mapping in target.references() {
        if !matches!(
            mapping.entity_type,
            EntityType::Post | EntityType::PrivateMessage
        ) {
            continue;
        }
        let post = target.post(mapping.target_id).unwrap();
        assert!(target.topic(post.topic_id).is_some());
        assert!(target.user(post.user_id).is_some());
    }
}

#[tokio::test]
async fn test_transient_failure_is_retried_by_next_run() {
    let target = Arc::new(MemoryTarget::new());
    target.fail_next_create(EntityType::Post, LegacyId::from(22));

    let first = run(&target).await;
    assert_eq!(first.issue_count(RowIssueKind::TransientIo), 1);
    assert!(raw(&target, 22).is_empty());

    let second = run(&target).await;
    assert_eq!(second.stage(Stage::Posts).unwrap().imported, 1);
    assert_eq!(raw(&target, 22), "Written last");
    assert!(raw(&target, 20).contains("[quote=\"alice, post:"));
}

#[tokio::test]
async fn test_quote_of_missing_post_is_kept_verbatim() {
    let source = MemorySource::new()
        .with_row(Stage::Users, 1, json!({ "username": "a", "email": "a@x.com" }))
        .unwrap()
        .with_row(Stage::Categories, 1, json!({ "name": "General" }))
        .unwrap()
        .with_row(
            Stage::Topics,
            10,
            json!({ "title": "Hi", "body": "first", "category_id": 1, "user_id": 1 }),
        )
        .unwrap()
        .with_row(
            Stage::Posts,
            20,
            json!({ "topic_id": 10, "user_id": 1, "body": "see [quote=1;99]Hello[/quote]" }),
        )
        .unwrap();

    let target = Arc::new(MemoryTarget::new());
    let (_tx, rx) = watch::channel(false);
    let summary = MigrationCoordinator::new(
        Arc::new(source),
        target.clone(),
        target.clone(),
        CoordinatorOptions::default(),
        build_pipeline(Dialect::Bbcode, None).unwrap(),
        HookRegistry::new(),
        rx,
    )
    .execute()
    .await
    .unwrap();

    let counts = target.entity_counts().await.unwrap();
    assert_eq!(counts[&EntityType::User], 1);
    assert_eq!(counts[&EntityType::Topic], 1);
    assert_eq!(raw(&target, 20), "see [quote=1;99]Hello[/quote]");

    assert_eq!(summary.unresolved_references.len(), 1);
    assert_eq!(summary.unresolved_references[0].reference, "99");
}
