//! Migration runner behaviour: ordering, reversibility, failure handling and
//! the store/index consistency window.

use cairn::schema::{FieldDefinition, FieldType, NumberOptions, RelationOptions, TextOptions};
use cairn::search::AttributeKind;
use cairn::{
    CollectionDefinition, CollectionKind, Error, MemoryIndex, MigrationContext, MigrationRegistry,
    MigrationRunner, MigrationVersion, Result, RuleAction, RuleSet, RunnerState,
    SqliteSchemaStore, Target,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn v(version: u64) -> MigrationVersion {
    MigrationVersion::new(version)
}

fn text() -> FieldType {
    FieldType::Text(TextOptions::default())
}

fn number() -> FieldType {
    FieldType::Number(NumberOptions::default())
}

fn relation(target: &str, cascade: bool) -> FieldType {
    FieldType::Relation(RelationOptions {
        collection_id: target.to_string(),
        cascade_delete: cascade,
        max_select: Some(1),
        ..Default::default()
    })
}

/// Store with a pre-existing `users` collection
fn seeded_store() -> SqliteSchemaStore {
    let mut store = SqliteSchemaStore::in_memory().unwrap();
    let mut users = CollectionDefinition::new("users", CollectionKind::Auth)
        .with_id("_pb_users_auth_")
        .with_field(FieldDefinition::new("name", text()).with_id("usrnm7qa"))
        .with_rules(RuleSet::uniform(Some("id = @request.auth.id")));
    store.save(&mut users).unwrap();
    store
}

fn snapshot(store: &SqliteSchemaStore) -> Vec<CollectionDefinition> {
    store.list_collections().unwrap()
}

/// Collections with generated ids blanked, for "equal modulo ids" checks
fn without_ids(mut collections: Vec<CollectionDefinition>) -> Vec<CollectionDefinition> {
    let generated: Vec<String> = collections
        .iter()
        .filter(|c| c.id.len() == 15 && c.id != "_pb_users_auth_")
        .map(|c| c.id.clone())
        .collect();
    for c in &mut collections {
        if generated.contains(&c.id) {
            c.id.clear();
        }
        for f in &mut c.fields {
            f.id.clear();
            if let FieldType::Relation(opts) = &mut f.field_type {
                if generated.contains(&opts.collection_id) {
                    opts.collection_id.clear();
                }
            }
        }
    }
    collections
}

/// Three migrations over trails:
/// 1. create trails (generated ids)
/// 2. add trails.distance and open users.list
/// 3. create trail_share pointing at trails
fn trail_registry(log: Arc<Mutex<Vec<String>>>) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();

    let (l1, l1d) = (log.clone(), log.clone());
    registry
        .register(
            1u64,
            "create_trails",
            move |ctx: &mut MigrationContext<'_>| {
                l1.lock().push("up 1".to_string());
                let mut trails = CollectionDefinition::new("trails", CollectionKind::Base)
                    .with_field(FieldDefinition::new("name", text()).required())
                    .with_field(FieldDefinition::new("author", relation("_pb_users_auth_", true)))
                    .with_rules(RuleSet::uniform(Some("author = @request.auth.id")));
                ctx.save_collection(&mut trails)
            },
            move |ctx: &mut MigrationContext<'_>| {
                l1d.lock().push("down 1".to_string());
                let trails = ctx.find_collection("trails")?;
                ctx.delete_collection(&trails)
            },
        )
        .unwrap();

    let (l2, l2d) = (log.clone(), log.clone());
    registry
        .register(
            2u64,
            "add_distance",
            move |ctx: &mut MigrationContext<'_>| {
                l2.lock().push("up 2".to_string());
                let mut trails = ctx.find_collection("trails")?;
                trails.add_field(FieldDefinition::new("distance", number()));
                ctx.save_collection(&mut trails)?;

                let mut users = ctx.find_collection("users")?;
                users.rules.set(RuleAction::List, Some(String::new()));
                ctx.save_collection(&mut users)
            },
            move |ctx: &mut MigrationContext<'_>| {
                l2d.lock().push("down 2".to_string());
                let mut trails = ctx.find_collection("trails")?;
                trails.remove_field("distance");
                ctx.save_collection(&mut trails)?;

                let mut users = ctx.find_collection("users")?;
                users
                    .rules
                    .set(RuleAction::List, Some("id = @request.auth.id".to_string()));
                ctx.save_collection(&mut users)
            },
        )
        .unwrap();

    let (l3, l3d) = (log.clone(), log);
    registry
        .register(
            3u64,
            "create_trail_share",
            move |ctx: &mut MigrationContext<'_>| {
                l3.lock().push("up 3".to_string());
                let trails = ctx.find_collection("trails")?;
                let mut share = CollectionDefinition::new("trail_share", CollectionKind::Base)
                    .with_field(FieldDefinition::new("trail", relation(&trails.id, true)))
                    .with_field(FieldDefinition::new("user", relation("_pb_users_auth_", true)));
                ctx.save_collection(&mut share)
            },
            move |ctx: &mut MigrationContext<'_>| {
                l3d.lock().push("down 3".to_string());
                let share = ctx.find_collection("trail_share")?;
                ctx.delete_collection(&share)
            },
        )
        .unwrap();

    registry
}

fn runner_with(
    registry: MigrationRegistry,
    store: SqliteSchemaStore,
) -> (MigrationRunner, Arc<MemoryIndex>) {
    let index = Arc::new(MemoryIndex::new());
    let runner = MigrationRunner::new(Arc::new(registry), store, index.clone());
    (runner, index)
}

// ---------------------------------------------------------------------------
// Ordering and reversibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_apply_then_revert_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (mut runner, _) = runner_with(trail_registry(log.clone()), seeded_store());

    let report = runner.apply(Target::Latest).await.unwrap();
    assert_eq!(report.completed, vec![v(1), v(2), v(3)]);
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1), v(2), v(3)]);

    let trails = runner.store().find_by_identifier("trails").unwrap();
    assert!(trails.field("distance").is_some());
    assert!(runner.store().find_by_identifier("trail_share").is_ok());

    let report = runner.revert(v(1)).await.unwrap();
    assert_eq!(report.completed, vec![v(3), v(2)]);
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1)]);
    assert_eq!(runner.state(), RunnerState::Reverted);

    let trails = runner.store().find_by_identifier("trails").unwrap();
    assert!(trails.field("distance").is_none());
    assert!(runner
        .store()
        .find_by_identifier("trail_share")
        .unwrap_err()
        .is_not_found());

    assert_eq!(
        *log.lock(),
        vec!["up 1", "up 2", "up 3", "down 3", "down 2"]
    );
}

#[tokio::test]
async fn test_full_revert_restores_initial_state() {
    let store = seeded_store();
    let before = snapshot(&store);
    let (mut runner, _) = runner_with(trail_registry(Arc::default()), store);

    runner.apply(Target::Latest).await.unwrap();
    runner.revert(MigrationVersion::ZERO).await.unwrap();

    assert_eq!(snapshot(runner.store()), before);
    assert!(runner.store().applied_versions().unwrap().is_empty());
}

#[tokio::test]
async fn test_each_down_undoes_its_up() {
    let (mut runner, _) = runner_with(trail_registry(Arc::default()), seeded_store());

    for version in [1u64, 2, 3] {
        let before = without_ids(snapshot(runner.store()));
        runner.apply(Target::Version(v(version))).await.unwrap();
        runner.revert(v(version - 1)).await.unwrap();
        assert_eq!(
            without_ids(snapshot(runner.store())),
            before,
            "down({}) did not undo up({})",
            version,
            version
        );
        runner.apply(Target::Version(v(version))).await.unwrap();
    }
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1), v(2), v(3)]);
}

#[tokio::test]
async fn test_generated_ids_are_not_reused_after_revert() {
    let (mut runner, _) = runner_with(trail_registry(Arc::default()), seeded_store());

    runner.apply(Target::Version(v(1))).await.unwrap();
    let first = runner.store().find_by_identifier("trails").unwrap();
    runner.revert(MigrationVersion::ZERO).await.unwrap();
    runner.apply(Target::Version(v(1))).await.unwrap();
    let second = runner.store().find_by_identifier("trails").unwrap();

    assert_ne!(first.id, second.id);
    assert!(runner.store().is_retired(&first.id).unwrap());
    for (old, new) in first.fields.iter().zip(&second.fields) {
        assert_ne!(old.id, new.id);
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_already_applied_is_rejected_without_mutation() {
    let (mut runner, _) = runner_with(trail_registry(Arc::default()), seeded_store());
    runner.apply(Target::Version(v(2))).await.unwrap();
    let before = snapshot(runner.store());
    let ledger_before = runner.store().ledger().unwrap();

    let err = runner.apply(Target::Version(v(1))).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyApplied(ver) if ver == v(1)));
    assert_eq!(runner.state(), RunnerState::Failed);
    assert_eq!(snapshot(runner.store()), before);
    assert_eq!(runner.store().ledger().unwrap(), ledger_before);
}

#[tokio::test]
async fn test_rejected_apply_leaves_outbox_queued() {
    let (mut runner, index) =
        runner_with(sortable_registry(), SqliteSchemaStore::in_memory().unwrap());
    index.fail_updates(true);
    assert!(runner.apply(Target::Version(v(1))).await.is_err());
    assert_eq!(runner.store().pending_index_updates().unwrap().len(), 1);

    // the index is still down: the pre-check error wins over ExternalSync
    let err = runner.apply(Target::Version(v(1))).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyApplied(ver) if ver == v(1)), "{err}");

    // with the index back, a rejected run still issues nothing
    index.fail_updates(false);
    let err = runner.apply(Target::Version(v(1))).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyApplied(_)));
    let err = runner.apply(Target::Version(v(7))).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(index.calls().is_empty());
    assert_eq!(runner.store().pending_index_updates().unwrap().len(), 1);

    assert_eq!(runner.sync_index().await.unwrap(), 1);
    assert_eq!(index.get("trails", AttributeKind::Sortable), vec!["created", "name"]);
}

#[tokio::test]
async fn test_create_with_taken_id_fails_and_keeps_existing_collection() {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            1u64,
            "created_trail_share",
            |ctx: &mut MigrationContext<'_>| {
                let mut share = CollectionDefinition::new("trail_share", CollectionKind::Base)
                    .with_id("e864strfxo14pm4");
                ctx.create_collection(&mut share)
            },
            |ctx: &mut MigrationContext<'_>| {
                let share = ctx.find_collection("e864strfxo14pm4")?;
                ctx.delete_collection(&share)
            },
        )
        .unwrap();

    let mut store = seeded_store();
    let mut trails = CollectionDefinition::new("trails", CollectionKind::Base)
        .with_id("e864strfxo14pm4")
        .with_field(FieldDefinition::new("name", text()).with_id("aaaa1111"));
    store.save(&mut trails).unwrap();
    let before = snapshot(&store);

    let (mut runner, _) = runner_with(registry, store);
    let err = runner.apply(Target::Latest).await.unwrap_err();
    assert_eq!(err.failed_version(), Some(v(1)));
    assert!(matches!(err.root(), Error::Validation(_)), "{err}");
    assert!(runner.store().applied_versions().unwrap().is_empty());

    // nothing applied, so nothing to revert
    assert!(runner.revert(MigrationVersion::ZERO).await.unwrap().completed.is_empty());
    assert_eq!(snapshot(runner.store()), before);
    assert!(!runner.store().is_retired("aaaa1111").unwrap());
}

#[tokio::test]
async fn test_unknown_target_version() {
    let (mut runner, _) = runner_with(trail_registry(Arc::default()), seeded_store());
    let err = runner.apply(Target::Version(v(99))).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(runner.store().applied_versions().unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_gap_is_reported() {
    let mut store = seeded_store();
    let tx = store.transaction().unwrap();
    tx.record_applied(v(3), "create_trail_share").unwrap();
    tx.commit().unwrap();

    let (mut runner, _) = runner_with(trail_registry(Arc::default()), store);
    let err = runner.apply(Target::Latest).await.unwrap_err();

    match err {
        Error::LedgerGap {
            missing,
            max_applied,
        } => {
            assert_eq!(missing, v(1));
            assert_eq!(max_applied, v(3));
        }
        other => panic!("expected LedgerGap, got {other:?}"),
    }
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(3)]);
}

#[tokio::test]
async fn test_validation_error_names_failing_version() {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            1717414119u64,
            "duplicate_field",
            |ctx: &mut MigrationContext<'_>| {
                let mut users = ctx.find_collection("users")?;
                // same id twice: second add replaces, so push directly
                users
                    .fields
                    .push(FieldDefinition::new("nickname", text()).with_id("usrnm7qa"));
                ctx.save_collection(&mut users)
            },
            |_: &mut MigrationContext<'_>| Ok(()),
        )
        .unwrap();
    let (mut runner, _) = runner_with(registry, seeded_store());

    let err = runner.apply(Target::Latest).await.unwrap_err();
    assert_eq!(err.failed_version(), Some(v(1717414119)));
    assert!(matches!(err.root(), Error::Validation(_)));
    assert!(err.to_string().starts_with("Migration 1717414119 failed during up"));
}

// ---------------------------------------------------------------------------
// Failure and resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failure_stops_batch_and_retry_resumes() {
    let fail = Arc::new(AtomicBool::new(true));
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MigrationRegistry::new();

    let l1 = log.clone();
    registry
        .register(
            1u64,
            "one",
            move |ctx: &mut MigrationContext<'_>| {
                l1.lock().push(1u64);
                let mut c = CollectionDefinition::new("one", CollectionKind::Base);
                ctx.save_collection(&mut c)
            },
            |_: &mut MigrationContext<'_>| Ok(()),
        )
        .unwrap();

    let (l2, fail2) = (log.clone(), fail.clone());
    registry
        .register(
            2u64,
            "two",
            move |ctx: &mut MigrationContext<'_>| {
                l2.lock().push(2);
                let mut c = CollectionDefinition::new("two", CollectionKind::Base);
                ctx.save_collection(&mut c)?;
                if fail2.load(Ordering::SeqCst) {
                    return Err(Error::Validation("simulated failure".to_string()));
                }
                Ok(())
            },
            |_: &mut MigrationContext<'_>| Ok(()),
        )
        .unwrap();

    let l3 = log.clone();
    registry
        .register(
            3u64,
            "three",
            move |ctx: &mut MigrationContext<'_>| {
                l3.lock().push(3);
                let mut c = CollectionDefinition::new("three", CollectionKind::Base);
                ctx.save_collection(&mut c)
            },
            |_: &mut MigrationContext<'_>| Ok(()),
        )
        .unwrap();

    let (mut runner, _) = runner_with(registry, SqliteSchemaStore::in_memory().unwrap());

    let err = runner.apply(Target::Latest).await.unwrap_err();
    assert_eq!(err.failed_version(), Some(v(2)));
    assert_eq!(runner.state(), RunnerState::Failed);
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1)]);
    // nothing from the failed step survived
    assert!(runner.store().find_by_identifier("two").is_err());
    assert_eq!(*log.lock(), vec![1, 2]);

    fail.store(false, Ordering::SeqCst);
    let report = runner.apply(Target::Latest).await.unwrap();
    assert_eq!(report.completed, vec![v(2), v(3)]);
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1), v(2), v(3)]);
    assert_eq!(*log.lock(), vec![1, 2, 2, 3]);
}

#[tokio::test]
async fn test_failed_revert_keeps_lower_versions_applied() {
    let mut registry = MigrationRegistry::new();
    for version in 1u64..=3 {
        let name = format!("c{}", version);
        let down_name = name.clone();
        registry
            .register(
                version,
                name.clone(),
                move |ctx: &mut MigrationContext<'_>| {
                    let mut c = CollectionDefinition::new(name.clone(), CollectionKind::Base);
                    ctx.save_collection(&mut c)
                },
                move |ctx: &mut MigrationContext<'_>| {
                    if down_name == "c2" {
                        return Err(Error::Conflict("c2 cannot be reverted".to_string()));
                    }
                    let c = ctx.find_collection(&down_name)?;
                    ctx.delete_collection(&c)
                },
            )
            .unwrap();
    }
    let (mut runner, _) = runner_with(registry, SqliteSchemaStore::in_memory().unwrap());
    runner.apply(Target::Latest).await.unwrap();

    let err = runner.revert(MigrationVersion::ZERO).await.unwrap_err();
    assert_eq!(err.failed_version(), Some(v(2)));
    assert!(matches!(err.root(), Error::Conflict(_)));
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1), v(2)]);
    assert!(runner.store().find_by_identifier("c3").is_err());
    assert!(runner.store().find_by_identifier("c2").is_ok());
}

// ---------------------------------------------------------------------------
// Identity across renames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rename_keeps_relations() {
    let mut registry = trail_registry(Arc::default());
    registry
        .register(
            4u64,
            "rename_trails",
            |ctx: &mut MigrationContext<'_>| {
                let mut trails = ctx.find_collection("trails")?;
                trails.name = "routes".to_string();
                ctx.save_collection(&mut trails)
            },
            |ctx: &mut MigrationContext<'_>| {
                let mut routes = ctx.find_collection("routes")?;
                routes.name = "trails".to_string();
                ctx.save_collection(&mut routes)
            },
        )
        .unwrap();
    let (mut runner, _) = runner_with(registry, seeded_store());
    runner.apply(Target::Latest).await.unwrap();

    let routes = runner.store().find_by_identifier("routes").unwrap();
    assert!(runner.store().find_by_identifier("trails").is_err());

    let share = runner.store().find_by_identifier("trail_share").unwrap();
    let target = share.field("trail").unwrap().relation().unwrap();
    assert_eq!(target.collection_id, routes.id);
    assert_eq!(
        runner.store().find_by_identifier(&target.collection_id).unwrap().name,
        "routes"
    );
}

#[tokio::test]
async fn test_field_rename_keeps_id() {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            1u64,
            "rename_name",
            |ctx: &mut MigrationContext<'_>| {
                let mut users = ctx.find_collection("users")?;
                let field = users.field_mut("name").ok_or_else(|| Error::NotFound("name".into()))?;
                field.name = "display_name".to_string();
                ctx.save_collection(&mut users)
            },
            |ctx: &mut MigrationContext<'_>| {
                let mut users = ctx.find_collection("users")?;
                let field = users
                    .field_mut("display_name")
                    .ok_or_else(|| Error::NotFound("display_name".into()))?;
                field.name = "name".to_string();
                ctx.save_collection(&mut users)
            },
        )
        .unwrap();
    let (mut runner, _) = runner_with(registry, seeded_store());
    runner.apply(Target::Latest).await.unwrap();

    let users = runner.store().find_by_identifier("users").unwrap();
    assert_eq!(users.field("usrnm7qa").unwrap().name, "display_name");
    assert!(!runner.store().is_retired("usrnm7qa").unwrap());
}

// ---------------------------------------------------------------------------
// Search index sync
// ---------------------------------------------------------------------------

fn sortable_registry() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            1u64,
            "initial_sortable",
            |ctx: &mut MigrationContext<'_>| {
                ctx.sync_sortable_attributes("trails", ["created", "name"]);
                Ok(())
            },
            |ctx: &mut MigrationContext<'_>| {
                ctx.sync_sortable_attributes("trails", Vec::<String>::new());
                Ok(())
            },
        )
        .unwrap();
    registry
        .register(
            2u64,
            "sortable_duration",
            |ctx: &mut MigrationContext<'_>| {
                ctx.sync_sortable_attributes("trails", ["created", "name", "duration"]);
                ctx.sync_filterable_attributes("trails", ["author"]);
                Ok(())
            },
            |ctx: &mut MigrationContext<'_>| {
                ctx.sync_sortable_attributes("trails", ["created", "name"]);
                ctx.sync_filterable_attributes("trails", Vec::<String>::new());
                Ok(())
            },
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn test_index_updates_follow_apply_and_revert() {
    let (mut runner, index) = runner_with(sortable_registry(), SqliteSchemaStore::in_memory().unwrap());

    let report = runner.apply(Target::Latest).await.unwrap();
    assert_eq!(report.index_updates, 3);
    assert_eq!(
        index.get("trails", AttributeKind::Sortable),
        vec!["created", "name", "duration"]
    );
    assert_eq!(index.get("trails", AttributeKind::Filterable), vec!["author"]);

    runner.revert(v(1)).await.unwrap();
    assert_eq!(index.get("trails", AttributeKind::Sortable), vec!["created", "name"]);
    assert!(index.get("trails", AttributeKind::Filterable).is_empty());
    assert_eq!(runner.status().unwrap().pending_index_updates, 0);
}

#[tokio::test]
async fn test_index_failure_after_commit_is_observable() {
    let (mut runner, index) = runner_with(sortable_registry(), SqliteSchemaStore::in_memory().unwrap());
    runner.apply(Target::Version(v(1))).await.unwrap();

    index.fail_next(1);
    let err = runner.apply(Target::Latest).await.unwrap_err();

    assert_eq!(err.failed_version(), Some(v(2)));
    assert!(matches!(err.root(), Error::ExternalSync(_)));
    assert_eq!(runner.state(), RunnerState::Failed);
    // the store committed step 2, the index still has the pre-2 list
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1), v(2)]);
    assert_eq!(index.get("trails", AttributeKind::Sortable), vec!["created", "name"]);
    assert_eq!(runner.status().unwrap().pending_index_updates, 2);

    // the next run converges before doing anything else, in the original order
    let report = runner.apply(Target::Latest).await.unwrap();
    assert!(report.completed.is_empty());
    assert_eq!(report.index_updates, 2);
    assert_eq!(
        index.get("trails", AttributeKind::Sortable),
        vec!["created", "name", "duration"]
    );
    assert_eq!(index.get("trails", AttributeKind::Filterable), vec!["author"]);
    assert_eq!(runner.status().unwrap().pending_index_updates, 0);
}

#[tokio::test]
async fn test_sync_index_drains_outbox() {
    let (mut runner, index) = runner_with(sortable_registry(), SqliteSchemaStore::in_memory().unwrap());
    index.fail_updates(true);
    assert!(runner.apply(Target::Latest).await.is_err());
    assert_eq!(runner.store().applied_versions().unwrap(), vec![v(1)]);

    index.fail_updates(false);
    assert_eq!(runner.sync_index().await.unwrap(), 1);
    assert_eq!(index.get("trails", AttributeKind::Sortable), vec!["created", "name"]);

    let report = runner.apply(Target::Latest).await.unwrap();
    assert_eq!(report.completed, vec![v(2)]);
}

#[tokio::test]
async fn test_step_failure_queues_no_index_updates() {
    let mut registry = MigrationRegistry::new();
    registry
        .register(
            1u64,
            "fails_after_queueing",
            |ctx: &mut MigrationContext<'_>| {
                ctx.sync_sortable_attributes("trails", ["name"]);
                Err(Error::Validation("nope".to_string()))
            },
            |_: &mut MigrationContext<'_>| -> Result<()> { Ok(()) },
        )
        .unwrap();
    let (mut runner, index) = runner_with(registry, SqliteSchemaStore::in_memory().unwrap());

    assert!(runner.apply(Target::Latest).await.is_err());
    assert!(index.calls().is_empty());
    assert_eq!(runner.status().unwrap().pending_index_updates, 0);
}
