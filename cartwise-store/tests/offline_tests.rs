//! Queued writes, fallback reads and replay.

use cartwise_core::{
    ItemPatch, ListPatch, NewItem, NewList, OfflineOperation, OperationKind, ProfileSettings,
    SettingsPatch,
};
use cartwise_store::queue::QUEUE_KEY;
use cartwise_store::{
    ChangeAction, ChangeTopic, Collection, KvStore, MemoryEngine, ReplayReport, RetryPolicy,
    StorageEngine, Store,
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Harness {
    store: Store,
    engine: Arc<MemoryEngine>,
    fallback: Arc<KvStore>,
}

async fn harness(retry: RetryPolicy) -> Harness {
    let engine = Arc::new(MemoryEngine::new());
    let fallback = Arc::new(KvStore::in_memory());
    let store = Store::with_engine(engine.clone(), Arc::clone(&fallback), retry).await;
    Harness {
        store,
        engine,
        fallback,
    }
}

fn slow_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1_000,
        max_delay_ms: 10_000,
    }
}

#[tokio::test]
async fn test_offline_write_is_queued_and_readable() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    h.store.notifier().on(ChangeTopic::Lists, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    h.engine.set_offline(true);

    let outcome = h.store.create_list(NewList::named("Offline")).await;
    assert!(outcome.is_queued());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let lists = h.store.lists().await;
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].name, "Offline");

    let queue = h.store.offline_queue().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].kind, OperationKind::CreateList);
    assert_eq!(queue[0].payload["name"], "Offline");
}

#[tokio::test]
async fn test_replay_applies_in_order_then_is_noop() {
    let h = harness(RetryPolicy::immediate(3)).await;
    h.engine.set_offline(true);

    let list = h
        .store
        .create_list(NewList::named("Camping"))
        .await
        .into_record()
        .unwrap();
    let item = h
        .store
        .create_item(NewItem::new(&list.id, "Tent").with_price(80.0))
        .await;
    assert!(item.is_queued());

    let kinds: Vec<OperationKind> = h
        .store
        .offline_queue()
        .await
        .iter()
        .map(|op| op.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::CreateList,
            OperationKind::CreateItem,
            OperationKind::UpsertProductStat
        ]
    );

    h.engine.set_offline(false);
    let report = h.store.process_offline_queue().await;
    assert_eq!(report.replayed, 3);
    assert_eq!(report.total(), 3);

    assert!(h.engine.peek(Collection::Lists, &list.id).is_some());
    assert_eq!(h.engine.record_count(Collection::Items), 1);
    assert_eq!(h.store.product_stat("Tent").await.unwrap().used_count, 1);
    assert!(h.store.offline_queue().await.is_empty());

    let again = h.store.process_offline_queue().await;
    assert_eq!(again, ReplayReport::default());
}

#[tokio::test]
async fn test_replay_emits_change_events() {
    let h = harness(RetryPolicy::immediate(3)).await;
    h.engine.set_offline(true);
    let _ = h.store.create_list(NewList::named("Later")).await;
    h.engine.set_offline(false);

    let actions = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&actions);
    h.store.notifier().on(ChangeTopic::Lists, move |event| {
        sink.lock().unwrap().push(event.action);
    });

    h.store.process_offline_queue().await;
    assert_eq!(*actions.lock().unwrap(), vec![ChangeAction::Create]);
}

#[tokio::test]
async fn test_failed_replay_backs_off_then_dead_letters() {
    let h = harness(slow_retry()).await;
    h.engine.set_offline(true);
    let _ = h.store.create_list(NewList::named("Doomed")).await;
    let now = Utc::now();

    let first = h.store.process_offline_queue_at(now).await;
    assert_eq!(first.requeued, 1);
    let queue = h.store.offline_queue().await;
    let op = &queue[0];
    assert_eq!(op.attempts, 1);
    assert!(op.last_error.is_some());
    assert_eq!(op.not_before, Some(now + Duration::seconds(1)));

    let early = h.store.process_offline_queue_at(now).await;
    assert_eq!(early.deferred, 1);
    assert_eq!(h.store.offline_queue().await[0].attempts, 1);

    let later = now + Duration::seconds(2);
    let second = h.store.process_offline_queue_at(later).await;
    assert_eq!(second.requeued, 1);
    assert_eq!(
        h.store.offline_queue().await[0].not_before,
        Some(later + Duration::seconds(2))
    );

    let last = h
        .store
        .process_offline_queue_at(now + Duration::seconds(60))
        .await;
    assert_eq!(last.dead_lettered, 1);
    assert!(h.store.offline_queue().await.is_empty());

    let dead = h.store.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 3);
    assert_eq!(h.store.clear_dead_letters().await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_payload_dead_letters_immediately() {
    let engine = Arc::new(MemoryEngine::new());
    let fallback = Arc::new(KvStore::in_memory());
    let bad = OfflineOperation::new(OperationKind::UpdateItem, json!({ "nope": 1 }), Utc::now());
    fallback.set_json(QUEUE_KEY, &vec![bad]).await.unwrap();

    let store = Store::with_engine(engine, fallback, RetryPolicy::immediate(5)).await;
    assert_eq!(store.offline_queue().await.len(), 1);

    let report = store.process_offline_queue().await;
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(store.dead_letters().await[0].attempts, 1);
}

#[tokio::test]
async fn test_replay_drops_operation_whose_target_is_gone() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list = h
        .store
        .create_list(NewList::named("Picnic"))
        .await
        .into_record()
        .unwrap();
    let item = h
        .store
        .create_item(NewItem::new(&list.id, "Plates"))
        .await
        .into_record()
        .unwrap();

    h.engine.set_fail_writes(true);
    assert!(
        h.store
            .update_item(&item.id, ItemPatch::purchased(true))
            .await
            .is_queued()
    );

    // Another writer removes the item before the update replays.
    h.engine.set_fail_writes(false);
    assert!(h.engine.delete(Collection::Items, &item.id).await.unwrap());

    let report = h.store.process_offline_queue().await;
    assert_eq!(report.dropped, 1);
    assert!(h.store.item(&item.id).await.is_none());
    assert!(h.store.items_for_list(&list.id).await.is_empty());
}

#[tokio::test]
async fn test_queue_mirror_failure_fails_write() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    h.store.notifier().on(ChangeTopic::Lists, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    h.engine.set_offline(true);
    h.fallback.set_fail_writes(true);

    let outcome = h.store.create_list(NewList::named("Nowhere")).await;
    assert!(outcome.is_failed());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(h.store.offline_queue().await.is_empty());
}

#[tokio::test]
async fn test_fallback_only_store_defers_replay() {
    let store = Store::fallback_only(Arc::new(KvStore::in_memory()), RetryPolicy::immediate(3)).await;
    assert!(store.is_degraded());

    let list = store
        .create_list(NewList::named("Local"))
        .await
        .into_record()
        .unwrap();
    assert!(store.list(&list.id).await.is_some());

    let report = store.process_offline_queue().await;
    assert_eq!(report.deferred, 1);
    assert_eq!(store.offline_queue().await.len(), 1);
}

// ============================================================================
// Writes Behind Queued Writes
// ============================================================================

async fn list_named(h: &Harness, name: &str) -> String {
    h.store
        .create_list(NewList::named(name))
        .await
        .into_record()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_update_after_queued_create_survives_replay() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list_id = list_named(&h, "Camping").await;

    h.engine.set_fail_writes(true);
    let item = h
        .store
        .create_item(NewItem::new(&list_id, "Tent"))
        .await;
    assert!(item.is_queued());
    let item = item.into_record().unwrap();

    h.engine.set_fail_writes(false);
    let renamed = h
        .store
        .update_item(
            &item.id,
            ItemPatch {
                name: Some("Tarp".to_string()),
                ..ItemPatch::default()
            },
        )
        .await;
    assert!(renamed.is_queued());
    assert_eq!(h.store.item(&item.id).await.unwrap().name, "Tarp");
    assert!(h.engine.peek(Collection::Items, &item.id).is_none());

    let report = h.store.process_offline_queue().await;
    assert_eq!(report.dead_lettered + report.requeued + report.dropped, 0);

    assert_eq!(h.engine.peek(Collection::Items, &item.id).unwrap()["name"], "Tarp");
    assert_eq!(h.store.item(&item.id).await.unwrap().name, "Tarp");
    assert!(h.store.offline_queue().await.is_empty());
}

#[tokio::test]
async fn test_delete_after_queued_create_survives_replay() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list_id = list_named(&h, "Camping").await;

    h.engine.set_fail_writes(true);
    let item = h
        .store
        .create_item(NewItem::new(&list_id, "Tent"))
        .await
        .into_record()
        .unwrap();

    h.engine.set_fail_writes(false);
    assert!(h.store.delete_item(&item.id).await.is_queued());
    assert!(h.store.item(&item.id).await.is_none());

    h.store.process_offline_queue().await;

    assert_eq!(h.engine.record_count(Collection::Items), 0);
    assert!(h.store.item(&item.id).await.is_none());
    assert!(h.store.items_for_list(&list_id).await.is_empty());
}

#[tokio::test]
async fn test_product_use_counted_once_across_queue() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list_id = list_named(&h, "Dairy").await;

    h.engine.set_fail_writes(true);
    assert!(
        h.store
            .create_item(NewItem::new(&list_id, "Milk").with_price(2.0))
            .await
            .is_queued()
    );

    h.engine.set_fail_writes(false);
    assert!(
        h.store
            .create_item(NewItem::new(&list_id, "Milk").with_price(2.0))
            .await
            .is_persisted()
    );
    assert_eq!(h.store.product_stat("Milk").await.unwrap().used_count, 2);

    h.store.process_offline_queue().await;

    let stat = h.store.product_stat("Milk").await.unwrap();
    assert_eq!(stat.used_count, 2);
    assert!((stat.total_spend - 4.0).abs() < 1e-9);
    let stored = h.engine.peek(Collection::ProductStats, "Milk").unwrap();
    assert_eq!(stored["usedCount"], 2);
}

#[tokio::test]
async fn test_later_operation_waits_for_backed_off_one() {
    let h = harness(slow_retry()).await;
    h.engine.set_offline(true);
    let list_id = list_named(&h, "Trip").await;
    assert!(
        h.store
            .update_list(
                &list_id,
                ListPatch {
                    name: Some("Road trip".to_string()),
                    ..ListPatch::default()
                },
            )
            .await
            .is_queued()
    );

    let now = Utc::now();
    let first = h.store.process_offline_queue_at(now).await;
    assert_eq!(first.requeued, 1);
    assert_eq!(first.deferred, 1);

    h.engine.set_offline(false);
    let early = h.store.process_offline_queue_at(now).await;
    assert_eq!(early.deferred, 2);
    assert_eq!(early.dropped, 0);

    let later = h
        .store
        .process_offline_queue_at(now + Duration::seconds(5))
        .await;
    assert_eq!(later.replayed, 2);
    assert_eq!(h.engine.peek(Collection::Lists, &list_id).unwrap()["name"], "Road trip");
}

// ============================================================================
// Unreadable Primary
// ============================================================================

#[tokio::test]
async fn test_item_for_existing_list_queues_while_offline() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list_id = list_named(&h, "Weekly").await;

    h.engine.set_offline(true);
    let outcome = h.store.create_item(NewItem::new(&list_id, "Bread")).await;
    assert!(outcome.is_queued());
    assert!(
        h.store
            .update_list(
                &list_id,
                ListPatch {
                    name: Some("Weekend".to_string()),
                    ..ListPatch::default()
                },
            )
            .await
            .is_queued()
    );

    h.engine.set_offline(false);
    let report = h.store.process_offline_queue().await;
    assert_eq!(report.dropped + report.dead_lettered, 0);
    assert_eq!(h.store.items_for_list(&list_id).await.len(), 1);
    assert_eq!(h.store.list(&list_id).await.unwrap().name, "Weekend");
}

#[tokio::test]
async fn test_item_for_unseen_list_is_queued_then_checked_on_replay() {
    let engine = Arc::new(MemoryEngine::new());
    let fallback = Arc::new(KvStore::in_memory());
    let list = cartwise_core::ShoppingList::create(&NewList::named("Elsewhere"), "USD", Utc::now())
        .unwrap();
    engine
        .put(Collection::Lists, &list.id, &serde_json::to_value(&list).unwrap())
        .await
        .unwrap();
    engine.set_offline(true);
    let store = Store::with_engine(engine.clone(), fallback, RetryPolicy::immediate(3)).await;

    assert!(store.create_item(NewItem::new(&list.id, "Rope")).await.is_queued());
    assert!(store.create_item(NewItem::new("never-existed", "Rope")).await.is_queued());

    engine.set_offline(false);
    let report = store.process_offline_queue().await;
    assert_eq!(report.dropped, 1);
    assert_eq!(store.items_for_list(&list.id).await.len(), 1);
    assert!(store.items_for_list("never-existed").await.is_empty());
    assert_eq!(store.product_stat("Rope").await.unwrap().used_count, 2);
}

#[tokio::test]
async fn test_offline_reads_include_persisted_records() {
    let h = harness(RetryPolicy::immediate(3)).await;
    let list_id = list_named(&h, "Pantry").await;
    h.store
        .create_item(NewItem::new(&list_id, "Rice").with_price(3.0))
        .await
        .into_record()
        .unwrap();

    h.engine.set_offline(true);
    assert_eq!(h.store.lists().await.len(), 1);
    assert_eq!(h.store.items_for_list(&list_id).await.len(), 1);
    assert_eq!(h.store.product_stat("Rice").await.unwrap().used_count, 1);
    assert!(h.store.offline_queue().await.is_empty());
}

#[tokio::test]
async fn test_offline_reads_include_records_from_before_open() {
    let engine = Arc::new(MemoryEngine::new());
    let list = cartwise_core::ShoppingList::create(&NewList::named("Old"), "USD", Utc::now())
        .unwrap();
    engine
        .put(Collection::Lists, &list.id, &serde_json::to_value(&list).unwrap())
        .await
        .unwrap();

    let store = Store::with_engine(
        engine.clone(),
        Arc::new(KvStore::in_memory()),
        RetryPolicy::immediate(3),
    )
    .await;
    engine.set_offline(true);

    let lists = store.lists().await;
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].name, "Old");
}

#[tokio::test]
async fn test_unreadable_settings_are_not_overwritten() {
    let engine = Arc::new(MemoryEngine::new());
    let saved = ProfileSettings {
        default_currency: "EUR".to_string(),
        ..ProfileSettings::default()
    };
    engine
        .put(
            Collection::Settings,
            ProfileSettings::KEY,
            &serde_json::to_value(&saved).unwrap(),
        )
        .await
        .unwrap();
    engine.set_fail_reads(true);
    let store = Store::with_engine(
        engine.clone(),
        Arc::new(KvStore::in_memory()),
        RetryPolicy::immediate(3),
    )
    .await;

    assert_eq!(store.settings().await.default_currency, "USD");
    assert!(
        store
            .update_settings(SettingsPatch {
                tax_rate: Some(0.1),
                ..SettingsPatch::default()
            })
            .await
            .is_failed()
    );
    let stored = engine.peek(Collection::Settings, ProfileSettings::KEY).unwrap();
    assert_eq!(stored["defaultCurrency"], "EUR");

    engine.set_fail_reads(false);
    assert_eq!(store.settings().await.default_currency, "EUR");
}

#[tokio::test]
async fn test_settings_read_from_fallback_copy_while_offline() {
    let h = harness(RetryPolicy::immediate(3)).await;
    h.store
        .update_settings(SettingsPatch {
            default_currency: Some("GBP".to_string()),
            ..SettingsPatch::default()
        })
        .await
        .into_result()
        .unwrap();

    h.engine.set_offline(true);
    assert_eq!(h.store.settings().await.default_currency, "GBP");
    let list = h
        .store
        .create_list(NewList::named("Offline"))
        .await
        .into_record()
        .unwrap();
    assert_eq!(list.currency, "GBP");
}
