//! Postgres backend tests.
//!
//! Ignored by default. Run against a scratch database with:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/docflow_test cargo test -p docflow-store -- --ignored
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docflow_core::{
    Missing, NumberFormat, Payload, SequenceCode, SequenceId, SignerId, TemplateId, Timestamp,
};
use docflow_state::{
    build_roster, Document, DocumentStatus, NewDocument, SignerProfile, SignerStatus,
};
use docflow_store::{
    DocumentStore, PgDocumentStore, PgStoreOptions, SequenceAllocator, SequenceRecord, StoreError,
    StoreTx,
};

async fn connect() -> PgDocumentStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PgDocumentStore::connect(&PgStoreOptions::new(url))
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");
    store
}

async fn fresh_sequence(store: &PgDocumentStore) -> SequenceRecord {
    let record = SequenceRecord {
        id: SequenceId::new(),
        code: SequenceCode::new(format!("PG-{}", uuid::Uuid::new_v4())).unwrap(),
        format: NumberFormat::new("PG-", 4).unwrap(),
        current_value: 0,
    };
    store.register_sequence(&record).await.unwrap();
    record
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn sequence_lease_serializes_allocations() {
    let store = connect().await;
    let seq = fresh_sequence(&store).await;

    let mut first = store.begin().await.unwrap();
    let a = SequenceAllocator::allocate(&mut first, &seq.code).await.unwrap();

    let contender = store.clone();
    let code = seq.code.clone();
    let handle = tokio::spawn(async move {
        let mut tx = contender.begin().await.unwrap();
        let b = SequenceAllocator::allocate(&mut tx, &code).await.unwrap();
        tx.commit().await.unwrap();
        b
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    first.commit().await.unwrap();
    let b = handle.await.unwrap();
    assert_eq!(a.number, "PG-0001");
    assert_eq!(b.number, "PG-0002");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn aggregate_round_trip_and_rollback() {
    let store = connect().await;
    let seq = fresh_sequence(&store).await;
    let template = TemplateId::new();
    store.register_template(template, "Delivery note").await.unwrap();
    let profile = SignerProfile {
        signer_id: SignerId::new(),
        full_name: "Alice".into(),
        email: "alice@example.com".into(),
    };
    store.register_signer(&profile).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let alloc = SequenceAllocator::allocate(&mut tx, &seq.code).await.unwrap();
    let doc = Document::create(
        NewDocument {
            template_id: template,
            sequence_id: alloc.sequence_id,
            number: alloc.number.clone(),
            title: "Delivery note".into(),
            payload: Payload::parse(r#"{"lines": 3}"#).unwrap(),
            status: DocumentStatus::Issued,
        },
        Timestamp::now(),
    );
    tx.insert_document(&doc).await.unwrap();
    tx.insert_signers(&build_roster(doc.id, vec![profile.clone()]).unwrap())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let agg = store.fetch_aggregate(doc.id).await.unwrap().unwrap();
    assert_eq!(agg.document, doc);
    assert_eq!(agg.signers.len(), 1);

    // A rolled back allocation leaves the counter where it was.
    let mut tx = store.begin().await.unwrap();
    SequenceAllocator::allocate(&mut tx, &seq.code).await.unwrap();
    drop(tx);
    let stored = store.fetch_sequence(&seq.code).await.unwrap().unwrap();
    assert_eq!(stored.current_value, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn foreign_keys_surface_as_missing_references() {
    let store = connect().await;
    let seq = fresh_sequence(&store).await;
    let mut tx = store.begin().await.unwrap();
    let doc = Document::create(
        NewDocument {
            template_id: TemplateId::new(),
            sequence_id: seq.id,
            number: "PG-9999".into(),
            title: "Orphan".into(),
            payload: Payload::empty(),
            status: DocumentStatus::Draft,
        },
        Timestamp::now(),
    );
    match tx.insert_document(&doc).await {
        Err(StoreError::Missing(Missing::Template(id))) => assert_eq!(id, doc.template_id),
        other => panic!("expected missing template, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_sequence_code_is_rejected() {
    let store = connect().await;
    let seq = fresh_sequence(&store).await;
    let mut again = seq.clone();
    again.id = SequenceId::new();
    assert!(matches!(
        store.register_sequence(&again).await,
        Err(StoreError::Duplicate(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires DATABASE_URL"]
async fn committed_reads_never_mix_document_and_roster_versions() {
    let store = connect().await;
    let seq = fresh_sequence(&store).await;
    let template = TemplateId::new();
    store.register_template(template, "Delivery note").await.unwrap();
    let profile = SignerProfile {
        signer_id: SignerId::new(),
        full_name: "Alice".into(),
        email: "alice@example.com".into(),
    };
    store.register_signer(&profile).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let alloc = SequenceAllocator::allocate(&mut tx, &seq.code).await.unwrap();
    let doc = Document::create(
        NewDocument {
            template_id: template,
            sequence_id: alloc.sequence_id,
            number: alloc.number,
            title: "Delivery note".into(),
            payload: Payload::empty(),
            status: DocumentStatus::Issued,
        },
        Timestamp::now(),
    );
    tx.insert_document(&doc).await.unwrap();
    tx.insert_signers(&build_roster(doc.id, vec![profile.clone()]).unwrap())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    // Flip document and signer together: issued/pending <-> signed/signed.
    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = store.clone();
        let stop = Arc::clone(&stop);
        let (doc_id, signer_id) = (doc.id, profile.signer_id);
        tokio::spawn(async move {
            let mut signed = false;
            while !stop.load(Ordering::Relaxed) {
                signed = !signed;
                let (doc_status, signer_status) = if signed {
                    (DocumentStatus::Signed, SignerStatus::Signed)
                } else {
                    (DocumentStatus::Issued, SignerStatus::Pending)
                };
                let now = Timestamp::now();
                let mut tx = store.begin().await.unwrap();
                let mut document = tx.lock_document(doc_id).await.unwrap().unwrap();
                document.apply_status(doc_status, now);
                tx.update_document(&document).await.unwrap();
                let mut signer = tx
                    .lock_signer_link(doc_id, signer_id)
                    .await
                    .unwrap()
                    .unwrap();
                signer.apply_status(signer_status, now);
                tx.update_signer(&signer).await.unwrap();
                tx.commit().await.unwrap();
            }
        })
    };

    let mut reads = 0u32;
    let mut torn = 0u32;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        let agg = store.fetch_aggregate(doc.id).await.unwrap().unwrap();
        let doc_signed = agg.document.status == DocumentStatus::Signed;
        let signer_signed = agg.signers[0].status == SignerStatus::Signed;
        if doc_signed != signer_signed {
            torn += 1;
        }
        reads += 1;
    }
    stop.store(true, Ordering::Relaxed);
    writer.await.unwrap();

    assert!(reads > 0);
    assert_eq!(torn, 0, "{torn} of {reads} reads mixed two commits");
}
