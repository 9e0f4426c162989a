use field_sync::db;
use field_sync::model::RecordKind;
use serde_json::json;

/// Enqueued records must survive a process restart, in order. Simulated by
/// closing the pool and reopening the same database file.
#[tokio::test]
async fn queue_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/queue.db", dir.path().display());

    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let first = db::enqueue_item(
        &pool,
        RecordKind::CreatePatient,
        &json!({"name": "Ramu", "age": 35}),
    )
    .await
    .unwrap();
    let second = db::enqueue_item(
        &pool,
        RecordKind::CreateVisitReport,
        &json!({"patient": "Ramu", "notes": "fever"}),
    )
    .await
    .unwrap();
    pool.close().await;

    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let items = db::read_all(&pool).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, first);
    assert_eq!(items[1].id, second);
    assert_eq!(items[0].payload, json!({"name": "Ramu", "age": 35}));
    assert_eq!(items[1].kind, RecordKind::CreateVisitReport);
}

/// Items claimed but pushed back before shutdown are still there after
/// reopen, behind anything enqueued in the meantime.
#[tokio::test]
async fn requeued_items_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/queue.db", dir.path().display());

    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let old = db::enqueue_item(&pool, RecordKind::CreatePatient, &json!({"name": "Sita"}))
        .await
        .unwrap();

    let mut taken = db::take_all(&pool).await.unwrap();
    taken[0].attempts += 1;
    let newer = db::enqueue_item(&pool, RecordKind::CreatePrescription, &json!({"drug": "ORS"}))
        .await
        .unwrap();
    db::push_back(&pool, &taken).await.unwrap();
    pool.close().await;

    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let items = db::read_all(&pool).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, newer);
    assert_eq!(items[1].id, old);
    assert_eq!(items[1].attempts, 1);
}
