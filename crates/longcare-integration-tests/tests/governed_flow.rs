//! Full governed-record lifecycle through router, context and store

use std::sync::Arc;

use longcare_audit_sqlite::{SqliteGovernedStore, SqliteTenantRouter};
use longcare_core::context::{RequestContext, with_context};
use longcare_core::{
    Actor, ChangeType, EntityKind, Error, GovernedStore, StoredRecord, TenantId,
};
use longcare_records::{
    DailyRecord, DailyRecordChange, DailyRecordPatch, Medication, MedicationChange,
    MedicationPatch,
};
use uuid::Uuid;

fn caregiver() -> Actor {
    Actor::new(Uuid::new_v4(), "Enf. Paula Mendes")
}

fn daily_record() -> DailyRecord {
    DailyRecord {
        resident_id: Uuid::new_v4(),
        date: "2026-02-14".parse().unwrap(),
        time: "14:00".to_string(),
        category: "alimentacao".to_string(),
        description: "Almoço completo".to_string(),
    }
}

fn medication() -> Medication {
    Medication {
        name: "Losartana".to_string(),
        dosage: "50mg".to_string(),
        route: "oral".to_string(),
        schedule_times: vec!["08:00".to_string(), "20:00".to_string()],
        start_date: "2026-01-05".parse().unwrap(),
        end_date: None,
    }
}

async fn provisioned_store() -> (SqliteGovernedStore, TenantId) {
    let router = SqliteTenantRouter::in_memory();
    let tenant_id = TenantId::new();
    router.provision(tenant_id).await.unwrap();
    (SqliteGovernedStore::new(router), tenant_id)
}

#[tokio::test]
async fn full_lifecycle_with_audit_trail() {
    let (store, tenant_id) = provisioned_store().await;
    let actor = caregiver();

    let seed = RequestContext::new().with_tenant(tenant_id).with_user("paula");
    with_context(seed, async {
        // Create, then correct the recorded time
        let created = store
            .create(tenant_id, daily_record(), &actor)
            .await
            .unwrap();

        let patch = DailyRecordPatch::new(vec![DailyRecordChange::Time("14:30".to_string())]);
        let updated = store
            .update(
                tenant_id,
                created.id,
                patch,
                &actor,
                "Horário corrigido após conferência",
            )
            .await
            .unwrap();
        assert_eq!(updated.entity.time, "14:30");

        let history = store
            .history(tenant_id, EntityKind::DailyRecord, created.id)
            .await
            .unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.entries[0].version_number, 1);
        assert_eq!(history.entries[0].changed_fields, vec!["time".to_string()]);

        // Remove; the record stays queryable for audit
        store
            .remove::<DailyRecord>(
                tenant_id,
                created.id,
                "Registro duplicado, removido por engano",
                &actor,
            )
            .await
            .unwrap();

        let live: Vec<StoredRecord<DailyRecord>> = store.list(tenant_id, false).await.unwrap();
        assert!(live.is_empty());

        let history = store
            .history(tenant_id, EntityKind::DailyRecord, created.id)
            .await
            .unwrap();
        assert_eq!(history.total, 2);
        assert_eq!(history.entries[0].change_type, ChangeType::Delete);
        assert!(
            store
                .list::<DailyRecord>(tenant_id, true)
                .await
                .unwrap()[0]
                .deleted_at
                .is_some()
        );
    })
    .await;
}

#[tokio::test]
async fn concurrent_updates_yield_gapless_versions() {
    let (store, tenant_id) = provisioned_store().await;
    let store = Arc::new(store);
    let actor = caregiver();

    let created = store
        .create(tenant_id, medication(), &actor)
        .await
        .unwrap();
    let id = created.id;

    let updates = (0..5).map(|i| {
        let store = store.clone();
        let actor = actor.clone();
        tokio::spawn(async move {
            let patch =
                MedicationPatch::new(vec![MedicationChange::Dosage(format!("{}mg", 10 * (i + 1)))]);
            store
                .update(
                    tenant_id,
                    id,
                    patch,
                    &actor,
                    &format!("Ajuste concorrente {}", i),
                )
                .await
        })
    });
    for result in futures::future::join_all(updates).await {
        result.unwrap().unwrap();
    }

    let history = store
        .history(tenant_id, EntityKind::Medication, id)
        .await
        .unwrap();
    assert_eq!(history.total, 5);
    let mut versions: Vec<i64> = history.entries.iter().map(|e| e.version_number).collect();
    versions.sort();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);

    // Current state matches the last committed update
    let current: StoredRecord<Medication> = store.get(tenant_id, id).await.unwrap();
    let newest = &history.entries[0];
    assert_eq!(
        serde_json::to_value(&current.entity).unwrap()["dosage"],
        newest.new_data[0]["value"]
    );
}

#[tokio::test]
async fn snapshots_reconstruct_each_committed_state() {
    let (store, tenant_id) = provisioned_store().await;
    let actor = caregiver();

    let created = store
        .create(tenant_id, medication(), &actor)
        .await
        .unwrap();

    let dosages = ["25mg", "100mg", "75mg", "12mg"];
    for dosage in &dosages {
        let patch = MedicationPatch::new(vec![MedicationChange::Dosage(dosage.to_string())]);
        store
            .update(tenant_id, created.id, patch, &actor, "Ajuste de dose prescrito")
            .await
            .unwrap();
    }

    for (i, dosage) in dosages.iter().enumerate() {
        let snapshot = store
            .version_snapshot(tenant_id, EntityKind::Medication, created.id, (i + 1) as i64)
            .await
            .unwrap();
        assert_eq!(snapshot["dosage"], *dosage);
        // Untouched fields survive every reconstruction
        assert_eq!(snapshot["name"], "Losartana");
    }
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let router = SqliteTenantRouter::in_memory();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    router.provision(tenant_a).await.unwrap();
    router.provision(tenant_b).await.unwrap();
    let store = SqliteGovernedStore::new(router);
    let actor = caregiver();

    let record_a = store
        .create(tenant_a, daily_record(), &actor)
        .await
        .unwrap();
    store
        .create(tenant_b, daily_record(), &actor)
        .await
        .unwrap();

    // The correct record id under the wrong tenant does not exist
    let result: Result<StoredRecord<DailyRecord>, Error> = store.get(tenant_b, record_a.id).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    let result = store
        .history(tenant_b, EntityKind::DailyRecord, record_a.id)
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    // Listings stay partitioned
    let list_b: Vec<StoredRecord<DailyRecord>> = store.list(tenant_b, true).await.unwrap();
    assert_eq!(list_b.len(), 1);
    assert_ne!(list_b[0].id, record_a.id);

    // An unprovisioned tenant cannot be routed at all
    let result: Result<Vec<StoredRecord<DailyRecord>>, Error> =
        store.list(TenantId::new(), false).await;
    assert!(matches!(result, Err(Error::TenantNotFound(_))));
}

#[tokio::test]
async fn rejected_mutations_leave_no_trace() {
    let (store, tenant_id) = provisioned_store().await;
    let actor = caregiver();

    let created = store
        .create(tenant_id, daily_record(), &actor)
        .await
        .unwrap();

    // Reason below the minimum
    let patch = DailyRecordPatch::new(vec![DailyRecordChange::Time("15:00".to_string())]);
    let result = store
        .update(tenant_id, created.id, patch, &actor, "curto")
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    // Malformed field value
    let patch = DailyRecordPatch::new(vec![DailyRecordChange::Time("meia-noite".to_string())]);
    let result = store
        .update(tenant_id, created.id, patch, &actor, "Horário registrado errado")
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    // Record and history are exactly as before the calls
    let current: StoredRecord<DailyRecord> = store.get(tenant_id, created.id).await.unwrap();
    assert_eq!(current.entity.time, "14:00");
    let history = store
        .history(tenant_id, EntityKind::DailyRecord, created.id)
        .await
        .unwrap();
    assert_eq!(history.total, 0);
}

#[tokio::test]
async fn file_backed_tenants_survive_router_restart() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let tenant_id = TenantId::new();
    let actor = caregiver();
    let record_id;

    {
        let router = SqliteTenantRouter::new(temp_dir.path());
        router.provision(tenant_id).await.unwrap();
        let store = SqliteGovernedStore::new(router);
        let created = store
            .create(tenant_id, medication(), &actor)
            .await
            .unwrap();
        let patch = MedicationPatch::new(vec![MedicationChange::Dosage("25mg".to_string())]);
        store
            .update(tenant_id, created.id, patch, &actor, "Dose reduzida pelo médico")
            .await
            .unwrap();
        record_id = created.id;
        store.router().close_all().await;
    }

    // A new process finds the tenant and its audit trail intact
    let store = SqliteGovernedStore::new(SqliteTenantRouter::new(temp_dir.path()));
    let fetched: StoredRecord<Medication> = store.get(tenant_id, record_id).await.unwrap();
    assert_eq!(fetched.entity.dosage, "25mg");
    let history = store
        .history(tenant_id, EntityKind::Medication, record_id)
        .await
        .unwrap();
    assert_eq!(history.total, 1);
}
