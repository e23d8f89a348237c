//! Scenario tests for persistent actors: versioning, snapshots, journal
//! replay and bulk restore.

use async_trait::async_trait;
use chrono::Utc;
use statecraft::machine::{
    provide, IntoMachine, Machine, MachineDefinition, ReplayError, SlotHandlers,
};
use statecraft::persistence::{
    Codec, InMemoryAdapter, JournalEntry, Persistence, PersistenceAdapter, PersistenceConfig,
    PersistenceError, Snapshot, SnapshotSchedule, StoredEvent, StoredSnapshot,
};
use statecraft::runtime::EffectContext;
use statecraft::system::ActorSystem;
use std::time::Duration;
use statecraft::{event_enum, state_enum};

state_enum! {
    enum Order {
        Cart { items: u32 },
        Submitted { items: u32 },
        Paid { items: u32 },
    }
}

event_enum! {
    enum OrderEvent {
        AddItem,
        Submit,
        Pay,
    }
}

fn items(state: &Order) -> u32 {
    match state {
        Order::Cart { items } | Order::Submitted { items } | Order::Paid { items } => *items,
    }
}

fn order_definition() -> MachineDefinition<Order, OrderEvent> {
    MachineDefinition::new(Order::Cart { items: 0 })
        .on("Cart", "AddItem", |s, _| Order::Cart { items: items(s) + 1 })
        .on("Cart", "Submit", |s, _| Order::Submitted { items: items(s) })
        .on("Submitted", "Pay", |s, _| Order::Paid { items: items(s) })
}

fn order_machine() -> Machine<Order, OrderEvent> {
    order_definition().into_machine().unwrap()
}

fn persistence(adapter: &InMemoryAdapter) -> Persistence {
    Persistence::new(adapter.clone())
}

fn journal(event: OrderEvent, version: u64) -> StoredEvent {
    JournalEntry {
        event,
        version,
        timestamp: Utc::now(),
    }
    .encode(Codec::Json)
    .unwrap()
}

#[tokio::test]
async fn restored_actor_resumes_state_and_version() {
    let adapter = InMemoryAdapter::new();
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence(&adapter))
        .await
        .unwrap();
    order.send(OrderEvent::Submit);
    order.send(OrderEvent::Pay);
    assert_eq!(order.state().await, Order::Paid { items: 0 });
    assert_eq!(order.version(), 2);
    order.stop().await;

    assert_eq!(adapter.snapshot_version("order-1"), Some(2));
    assert_eq!(adapter.journal_len("order-1"), 2);

    let restored = system
        .restore("order-1", order_machine(), &persistence(&adapter))
        .await
        .unwrap();
    assert_eq!(restored.snapshot(), Order::Paid { items: 0 });
    assert_eq!(restored.version(), 2);
    system.shutdown().await;
}

#[tokio::test]
async fn stop_during_entry_effect_still_persists_the_commit() {
    let adapter = InMemoryAdapter::new();
    let system = ActorSystem::new();
    let machine = provide(
        order_definition().on_enter("Paid", "print_receipt"),
        SlotHandlers::new().effect("print_receipt", |_ctx: EffectContext<Order, OrderEvent>| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }),
    )
    .unwrap();

    let order = system
        .spawn_persistent("order-1", machine, &persistence(&adapter))
        .await
        .unwrap();
    order.send(OrderEvent::Submit);
    order.send(OrderEvent::Pay);
    order
        .wait_for(|s| matches!(s, Order::Paid { .. }))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), order.stop())
        .await
        .unwrap();

    assert_eq!(adapter.snapshot_version("order-1"), Some(2));
    assert_eq!(adapter.journal_len("order-1"), 2);

    let restored = system
        .restore("order-1", order_machine(), &persistence(&adapter))
        .await
        .unwrap();
    assert_eq!(restored.snapshot(), Order::Paid { items: 0 });
    assert_eq!(restored.version(), 2);
    system.shutdown().await;
}

#[tokio::test]
async fn journal_alone_rebuilds_state() {
    let adapter = InMemoryAdapter::new();
    let persistence = persistence(&adapter)
        .with_config(PersistenceConfig::default().with_snapshot(SnapshotSchedule::Never));
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    order.send(OrderEvent::AddItem);
    order.send(OrderEvent::AddItem);
    order.send(OrderEvent::Submit);
    order.state().await;
    order.stop().await;
    assert_eq!(adapter.snapshot_version("order-1"), None);

    let restored = system
        .restore("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    assert_eq!(restored.snapshot(), Order::Submitted { items: 2 });
    assert_eq!(restored.version(), 3);
    system.shutdown().await;
}

#[tokio::test]
async fn snapshot_schedule_batches_writes() {
    let adapter = InMemoryAdapter::new();
    let persistence = persistence(&adapter)
        .with_config(PersistenceConfig::default().with_snapshot(SnapshotSchedule::Every(2)));
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    for _ in 0..3 {
        order.send(OrderEvent::AddItem);
    }
    order.state().await;
    assert_eq!(adapter.snapshot_version("order-1"), Some(2));
    assert_eq!(adapter.journal_len("order-1"), 3);

    order.stop().await;
    assert_eq!(adapter.snapshot_version("order-1"), Some(3));
}

#[tokio::test]
async fn restore_replays_journal_after_snapshot() {
    let adapter = InMemoryAdapter::new();
    let snapshot = Snapshot {
        state: Order::Cart { items: 5 },
        version: 1,
        timestamp: Utc::now(),
    };
    adapter
        .save_snapshot("order-1", snapshot.encode(Codec::Json).unwrap())
        .await
        .unwrap();
    adapter
        .append_event("order-1", journal(OrderEvent::AddItem, 1))
        .await
        .unwrap();
    adapter
        .append_event("order-1", journal(OrderEvent::Submit, 2))
        .await
        .unwrap();
    adapter
        .append_event("order-1", journal(OrderEvent::Pay, 3))
        .await
        .unwrap();

    let system = ActorSystem::new();
    let restored = system
        .restore("order-1", order_machine(), &persistence(&adapter))
        .await
        .unwrap();

    assert_eq!(restored.snapshot(), Order::Paid { items: 5 });
    assert_eq!(restored.version(), 3);
    system.shutdown().await;
}

#[tokio::test]
async fn spawn_persistent_refuses_existing_data() {
    let adapter = InMemoryAdapter::new();
    adapter
        .append_event("order-1", journal(OrderEvent::Submit, 1))
        .await
        .unwrap();

    let system = ActorSystem::new();
    let error = system
        .spawn_persistent("order-1", order_machine(), &persistence(&adapter))
        .await
        .unwrap_err();
    assert!(matches!(error, PersistenceError::AlreadyPersisted(id) if id == "order-1"));
    assert!(!system.contains("order-1"));
}

#[tokio::test]
async fn replay_rejects_suspending_handlers() {
    let adapter = InMemoryAdapter::new();
    adapter
        .append_event("order-1", journal(OrderEvent::Submit, 1))
        .await
        .unwrap();
    let machine = MachineDefinition::new(Order::Cart { items: 0 })
        .on_async("Cart", "Submit", |s, _: OrderEvent| async move {
            Ok(Order::Submitted { items: items(&s) })
        })
        .into_machine()
        .unwrap();

    let system = ActorSystem::new();
    let error = system
        .restore("order-1", machine, &persistence(&adapter))
        .await
        .unwrap_err();

    match error {
        PersistenceError::Replay { id, source } => {
            assert_eq!(id, "order-1");
            assert!(matches!(source, ReplayError::AsyncHandler { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!system.contains("order-1"));
}

#[tokio::test]
async fn restore_many_isolates_failures() {
    let adapter = InMemoryAdapter::new();
    adapter
        .append_event("good", journal(OrderEvent::Submit, 1))
        .await
        .unwrap();
    adapter
        .save_snapshot(
            "bad",
            StoredSnapshot {
                data: b"not json".to_vec(),
                version: 1,
                timestamp: Utc::now(),
            },
        )
        .await
        .unwrap();

    let system = ActorSystem::new();
    let report = system
        .restore_many(["good", "bad"], &order_machine(), &persistence(&adapter))
        .await;

    assert!(!report.is_complete());
    assert_eq!(report.restored_ids(), vec!["good"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "bad");
    assert!(matches!(report.failed[0].1, PersistenceError::Codec(_)));
    assert_eq!(report.restored[0].snapshot(), Order::Submitted { items: 0 });
    system.shutdown().await;
}

#[tokio::test]
async fn restore_all_needs_machine_type() {
    let adapter = InMemoryAdapter::new();
    let system = ActorSystem::new();

    let error = system
        .restore_all(&order_machine(), &persistence(&adapter))
        .await
        .unwrap_err();
    assert!(matches!(error, PersistenceError::MissingMachineType));
}

#[tokio::test]
async fn restore_all_skips_running_actors() {
    let adapter = InMemoryAdapter::new();
    let persistence = persistence(&adapter)
        .with_config(PersistenceConfig::default().with_machine_type("order"));
    let system = ActorSystem::new();

    let a = system
        .spawn_persistent("a", order_machine(), &persistence)
        .await
        .unwrap();
    let b = system
        .spawn_persistent("b", order_machine(), &persistence)
        .await
        .unwrap();
    a.send(OrderEvent::Submit);
    a.state().await;
    b.send(OrderEvent::AddItem);
    b.state().await;
    a.stop().await;

    let report = system
        .restore_all(&order_machine(), &persistence)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.restored_ids(), vec!["a"]);
    assert_eq!(report.restored[0].snapshot(), Order::Submitted { items: 0 });
    system.shutdown().await;
}

#[tokio::test]
async fn delete_removes_everything() {
    let adapter = InMemoryAdapter::new();
    let persistence = persistence(&adapter)
        .with_config(PersistenceConfig::default().with_machine_type("order"));
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    order.send(OrderEvent::Submit);
    order.state().await;

    system.delete("order-1", &persistence).await.unwrap();
    assert!(order.is_stopped());
    assert!(!adapter.has_actor("order-1"));
    assert!(adapter.list_actors(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn binary_codec_round_trips() {
    let adapter = InMemoryAdapter::new();
    let persistence = persistence(&adapter)
        .with_config(PersistenceConfig::default().with_codec(Codec::Bincode));
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    order.send(OrderEvent::AddItem);
    order.send(OrderEvent::Submit);
    order.state().await;
    order.stop().await;

    let restored = system
        .restore("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    assert_eq!(restored.snapshot(), Order::Submitted { items: 1 });
    system.shutdown().await;
}

/// Adapter with no registry and a journal that always fails.
struct LossyAdapter {
    inner: InMemoryAdapter,
}

#[async_trait]
impl PersistenceAdapter for LossyAdapter {
    async fn save_snapshot(
        &self,
        id: &str,
        snapshot: StoredSnapshot,
    ) -> Result<(), PersistenceError> {
        self.inner.save_snapshot(id, snapshot).await
    }

    async fn load_snapshot(&self, id: &str) -> Result<Option<StoredSnapshot>, PersistenceError> {
        self.inner.load_snapshot(id).await
    }

    async fn append_event(&self, _id: &str, _event: StoredEvent) -> Result<(), PersistenceError> {
        Err(PersistenceError::storage("journal offline"))
    }

    async fn load_events(
        &self,
        id: &str,
        after_version: Option<u64>,
    ) -> Result<Vec<StoredEvent>, PersistenceError> {
        self.inner.load_events(id, after_version).await
    }

    async fn delete_actor(&self, id: &str) -> Result<(), PersistenceError> {
        self.inner.delete_actor(id).await
    }
}

#[tokio::test]
async fn adapters_without_registry_degrade_gracefully() {
    let inner = InMemoryAdapter::new();
    let persistence = Persistence::new(LossyAdapter {
        inner: inner.clone(),
    })
    .with_config(PersistenceConfig::default().with_machine_type("order"));
    let system = ActorSystem::new();

    let order = system
        .spawn_persistent("order-1", order_machine(), &persistence)
        .await
        .unwrap();
    order.send(OrderEvent::Submit);
    order.send(OrderEvent::Pay);
    assert_eq!(order.state().await, Order::Paid { items: 0 });
    assert_eq!(order.version(), 2);
    assert_eq!(inner.journal_len("order-1"), 0);
    assert_eq!(inner.snapshot_version("order-1"), Some(2));

    let report = system
        .restore_all(&order_machine(), &persistence)
        .await
        .unwrap();
    assert!(report.restored.is_empty());
    assert!(report.is_complete());

    system.delete("order-1", &persistence).await.unwrap();
    assert!(!inner.has_actor("order-1"));
}
