//! Query observation wired through the store

use std::sync::{Arc, Mutex};
use std::time::Duration;

use longcare_audit_sqlite::{SqliteGovernedStore, SqliteTenantRouter};
use longcare_core::context::{RequestContext, with_context};
use longcare_core::{Actor, GovernedStore, TenantId};
use longcare_observability::query_log::QueryRecord;
use longcare_observability::{AuditMetrics, ObserverConfig, QueryObserver};
use longcare_records::{Medication, MedicationChange, MedicationPatch};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("longcare=debug")
        .try_init();
}

fn medication() -> Medication {
    Medication {
        name: "Losartana".to_string(),
        dosage: "50mg".to_string(),
        route: "oral".to_string(),
        schedule_times: vec!["08:00".to_string()],
        start_date: "2026-01-05".parse().unwrap(),
        end_date: None,
    }
}

async fn store_with_observer(observer: QueryObserver) -> (SqliteGovernedStore, TenantId) {
    let router = SqliteTenantRouter::in_memory();
    let tenant_id = TenantId::new();
    router.provision(tenant_id).await.unwrap();
    (
        SqliteGovernedStore::new(router).with_observer(observer),
        tenant_id,
    )
}

#[tokio::test]
async fn every_operation_is_logged_with_correlation() {
    init_tracing();
    let seen: Arc<Mutex<Vec<QueryRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let observer = QueryObserver::default().with_sink(move |record| {
        sink_seen.lock().unwrap().push(record.clone());
    });

    let (store, tenant_id) = store_with_observer(observer).await;
    let actor = Actor::new(Uuid::new_v4(), "Enf. Paula Mendes");
    let seed = RequestContext::new().with_tenant(tenant_id).with_user("paula");
    let request_id = seed.request_id.clone();

    with_context(seed, async {
        let created = store
            .create(tenant_id, medication(), &actor)
            .await
            .unwrap();
        let patch = MedicationPatch::new(vec![MedicationChange::Dosage("25mg".to_string())]);
        store
            .update(tenant_id, created.id, patch, &actor, "Dose reduzida pelo médico")
            .await
            .unwrap();
        let _: Vec<_> = store.list::<Medication>(tenant_id, false).await.unwrap();
    })
    .await;

    let records = seen.lock().unwrap();
    let operations: Vec<&str> = records.iter().map(|r| r.operation).collect();
    assert_eq!(operations, vec!["create", "update", "list"]);
    for record in records.iter() {
        assert_eq!(record.entity, "medications");
        assert_eq!(record.request_id, request_id);
        assert_eq!(record.tenant_id, Some(tenant_id.to_string()));
        assert_eq!(record.user_id.as_deref(), Some("paula"));
    }
}

#[tokio::test]
async fn slow_operations_are_counted() {
    init_tracing();
    let metrics = AuditMetrics::new().unwrap();
    // A zero threshold marks everything slow
    let observer = QueryObserver::new(
        ObserverConfig::default()
            .with_slow_threshold(Duration::ZERO)
            .with_very_slow_threshold(Duration::from_secs(3600)),
    )
    .with_metrics(metrics.clone());

    let (store, tenant_id) = store_with_observer(observer).await;
    let actor = Actor::new(Uuid::new_v4(), "Enf. Paula Mendes");
    store
        .create(tenant_id, medication(), &actor)
        .await
        .unwrap();

    assert_eq!(
        metrics
            .operations_total
            .with_label_values(&["medications", "create"])
            .get(),
        1.0
    );
    assert_eq!(
        metrics
            .slow_operations_total
            .with_label_values(&["medications", "create", "warning"])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn faulty_log_sink_never_breaks_the_store() {
    init_tracing();
    let observer = QueryObserver::default().with_sink(|_record| {
        panic!("log pipeline outage");
    });

    let (store, tenant_id) = store_with_observer(observer).await;
    let actor = Actor::new(Uuid::new_v4(), "Enf. Paula Mendes");

    // Mutations succeed and their audit trail is intact despite the sink
    let created = store
        .create(tenant_id, medication(), &actor)
        .await
        .unwrap();
    let patch = MedicationPatch::new(vec![MedicationChange::Dosage("25mg".to_string())]);
    let updated = store
        .update(tenant_id, created.id, patch, &actor, "Dose reduzida pelo médico")
        .await
        .unwrap();
    assert_eq!(updated.entity.dosage, "25mg");

    let history = store
        .history(
            tenant_id,
            longcare_core::EntityKind::Medication,
            created.id,
        )
        .await
        .unwrap();
    assert_eq!(history.total, 1);
}
