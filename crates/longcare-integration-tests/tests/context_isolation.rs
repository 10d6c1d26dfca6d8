//! Request context propagation under interleaved requests
//!
//! Many logical requests share one worker pool; each must see only its own
//! {request_id, tenant_id, user_id} and client metadata, all the way down
//! into the history rows the store writes.

use std::sync::Arc;

use longcare_audit_sqlite::{SqliteGovernedStore, SqliteTenantRouter};
use longcare_core::context::{self, RequestContext, with_context};
use longcare_core::{Actor, EntityKind, GovernedStore, TenantId};
use longcare_records::{DailyRecord, DailyRecordChange, DailyRecordPatch};
use uuid::Uuid;

fn daily_record() -> DailyRecord {
    DailyRecord {
        resident_id: Uuid::new_v4(),
        date: "2026-02-14".parse().unwrap(),
        time: "08:00".to_string(),
        category: "higiene".to_string(),
        description: "Banho auxiliado".to_string(),
    }
}

#[tokio::test]
async fn client_metadata_stays_with_its_own_request() {
    let router = SqliteTenantRouter::in_memory();
    let tenant_id = TenantId::new();
    router.provision(tenant_id).await.unwrap();
    let store = Arc::new(SqliteGovernedStore::new(router));

    // Eight interleaved "requests", each with its own client address,
    // each mutating its own record through the shared store
    let requests = (0..8).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            let actor = Actor::new(Uuid::new_v4(), format!("Cuidador {}", i));
            let seed = RequestContext::new()
                .with_tenant(tenant_id)
                .with_user(format!("user-{}", i))
                .with_client(format!("10.0.0.{}", i), "longcare-web/2.1");

            with_context(seed, async move {
                let created = store
                    .create(tenant_id, daily_record(), &actor)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;

                let patch =
                    DailyRecordPatch::new(vec![DailyRecordChange::Time("09:00".to_string())]);
                store
                    .update(
                        tenant_id,
                        created.id,
                        patch,
                        &actor,
                        "Horário ajustado pela equipe",
                    )
                    .await
                    .unwrap();
                (created.id, format!("10.0.0.{}", i))
            })
            .await
        })
    });

    for handle in futures::future::join_all(requests).await {
        let (record_id, expected_ip) = handle.unwrap();
        let history = store
            .history(tenant_id, EntityKind::DailyRecord, record_id)
            .await
            .unwrap();
        assert_eq!(history.total, 1);
        // Each trail carries the metadata of the request that wrote it
        assert_eq!(history.entries[0].client_ip.as_deref(), Some(expected_ip.as_str()));
        assert_eq!(
            history.entries[0].user_agent.as_deref(),
            Some("longcare-web/2.1")
        );
    }
}

#[tokio::test]
async fn late_bound_user_reaches_the_store() {
    let router = SqliteTenantRouter::in_memory();
    let tenant_id = TenantId::new();
    router.provision(tenant_id).await.unwrap();
    let store = SqliteGovernedStore::new(router);
    let actor = Actor::new(Uuid::new_v4(), "Enf. Paula Mendes");

    // The boundary binds an anonymous context first; authentication fills
    // in the user and client details before the mutation runs
    with_context(RequestContext::new().with_tenant(tenant_id), async {
        context::set_user_id("paula");
        context::set_client_meta("198.51.100.7", "longcare-mobile/1.4");

        let created = store
            .create(tenant_id, daily_record(), &actor)
            .await
            .unwrap();
        let patch = DailyRecordPatch::new(vec![DailyRecordChange::Time("09:30".to_string())]);
        store
            .update(tenant_id, created.id, patch, &actor, "Correção após plantão")
            .await
            .unwrap();

        let history = store
            .history(tenant_id, EntityKind::DailyRecord, created.id)
            .await
            .unwrap();
        assert_eq!(history.entries[0].client_ip.as_deref(), Some("198.51.100.7"));
    })
    .await;
}

#[tokio::test]
async fn background_work_runs_with_empty_context() {
    // No scope bound: reads yield the safe default and never panic
    let ctx = context::current();
    assert!(ctx.request_id.is_none());
    assert!(ctx.tenant_id.is_none());

    // And a store driven outside any request still works; its history rows
    // simply carry no client metadata
    let router = SqliteTenantRouter::in_memory();
    let tenant_id = TenantId::new();
    router.provision(tenant_id).await.unwrap();
    let store = SqliteGovernedStore::new(router);
    let actor = Actor::new(Uuid::new_v4(), "Rotina Noturna");

    let created = store
        .create(tenant_id, daily_record(), &actor)
        .await
        .unwrap();
    let patch = DailyRecordPatch::new(vec![DailyRecordChange::Category("saude".to_string())]);
    store
        .update(tenant_id, created.id, patch, &actor, "Reclassificação automática")
        .await
        .unwrap();

    let history = store
        .history(tenant_id, EntityKind::DailyRecord, created.id)
        .await
        .unwrap();
    assert!(history.entries[0].client_ip.is_none());
    assert!(history.entries[0].user_agent.is_none());
}
