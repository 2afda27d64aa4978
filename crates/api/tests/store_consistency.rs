//! Store-level consistency tests against a live database; run with
//! `DATABASE_URL=... cargo test -- --ignored`.
//!
//! These cover the guarantees that live in SQL rather than in Rust: the
//! unique event key, the guarded status update, and the atomic outbox
//! claim/ack cycle.

use chrono::Utc;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use storefront_bookkeeping::VoucherKind;
use storefront_core::{OrderId, PaymentEventId, SyncPayloadId};
use storefront_infra::{
    ensure_schema, EnqueueResult, LedgerInsert, NewOutboxEntry, NewPaymentEvent, OrderStore,
    OutboxStore, PaymentEventLedger, SyncStatus, TransitionResult,
};
use storefront_orders::{
    hash_access_token, LineInput, Order, OrderStatus, PaymentProvider, PlaceOrder,
};
use storefront_tax::{TaxDecision, TaxMode};

async fn pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new().connect(&database_url).await.unwrap();
    ensure_schema(&pool).await.unwrap();
    pool
}

fn placed_order() -> Order {
    Order::place(PlaceOrder {
        order_id: OrderId::new(),
        order_number: format!("IT-{}", uuid::Uuid::now_v7()),
        currency: "SEK".parse().unwrap(),
        customer_country: "SE".parse().unwrap(),
        lines: vec![LineInput {
            product_ref: "SKU-1".into(),
            quantity: 1,
            unit_price_ex_vat: 10_000,
        }],
        shipping_ex_vat: 0,
        tax: TaxDecision {
            vat_rate: "0.25".parse().unwrap(),
            mode: TaxMode::Domestic,
            vat_number: None,
            validation: None,
        },
        access_token_hash: hash_access_token("t"),
        placed_at: Utc::now(),
    })
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn replayed_event_changes_state_at_most_once() {
    let pool = pool().await;
    let orders = OrderStore::new(pool.clone());
    let ledger = PaymentEventLedger::new(pool);

    let order = placed_order();
    orders.insert(&order).await.unwrap();

    let external_event_id = format!("evt_{}", uuid::Uuid::now_v7());
    let event = NewPaymentEvent {
        id: PaymentEventId::new(),
        provider: PaymentProvider::Stripe,
        external_event_id: external_event_id.clone(),
        event_type: "payment_intent.succeeded".into(),
        order_id: Some(order.id),
        payload: json!({"id": external_event_id}),
    };

    assert_eq!(ledger.record(&event).await.unwrap(), LedgerInsert::Recorded);
    assert_eq!(
        orders
            .transition(order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap(),
        TransitionResult::Applied
    );

    // The retransmitted event keys on the same (provider, external id) and
    // is recognized without touching the order again.
    let replay = NewPaymentEvent {
        id: PaymentEventId::new(),
        ..event
    };
    assert_eq!(ledger.record(&replay).await.unwrap(), LedgerInsert::Replay);

    let stored = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert!(stored.paid_at.is_some());
}

#[tokio::test]
#[ignore]
async fn stale_transition_matches_zero_rows() {
    let pool = pool().await;
    let orders = OrderStore::new(pool);

    let order = placed_order();
    orders.insert(&order).await.unwrap();

    assert_eq!(
        orders
            .transition(order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap(),
        TransitionResult::Applied
    );

    // A late failure callback for an already-paid order is a no-op.
    assert_eq!(
        orders
            .transition(order.id, OrderStatus::Failed, Utc::now())
            .await
            .unwrap(),
        TransitionResult::NotApplied
    );
    let stored = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert!(stored.failed_at.is_none());

    // Refund is still reachable from paid, and re-refunding is idempotent.
    assert_eq!(
        orders
            .transition(order.id, OrderStatus::Refunded, Utc::now())
            .await
            .unwrap(),
        TransitionResult::Applied
    );
    assert_eq!(
        orders
            .transition(order.id, OrderStatus::Paid, Utc::now())
            .await
            .unwrap(),
        TransitionResult::NotApplied
    );
}

#[tokio::test]
#[ignore]
async fn outbox_pull_ack_fail_requeue_cycle() {
    let pool = pool().await;
    let outbox = OutboxStore::new(pool);

    let entity_id = format!("order-{}", uuid::Uuid::now_v7());
    let entry = NewOutboxEntry {
        id: SyncPayloadId::new(),
        entity_type: "order".into(),
        entity_id: entity_id.clone(),
        kind: VoucherKind::Sale,
        payload: json!({"kind": "sale"}),
    };

    assert_eq!(outbox.enqueue(&entry).await.unwrap(), EnqueueResult::Queued);
    // Same (entity, kind) is a conflict, not a second row.
    let duplicate = NewOutboxEntry {
        id: SyncPayloadId::new(),
        ..entry.clone()
    };
    assert_eq!(
        outbox.enqueue(&duplicate).await.unwrap(),
        EnqueueResult::AlreadyQueued
    );

    // Claim flips queued -> sent; a second claim finds nothing for this
    // entity because the row is no longer queued.
    let claimed = outbox.claim_batch(100, Utc::now()).await.unwrap();
    let ours = claimed
        .iter()
        .find(|e| e.entity_id == entity_id)
        .expect("claim must return the queued entry");
    assert_eq!(ours.status, SyncStatus::Sent);
    assert_eq!(ours.attempts, 1);
    let reclaimed = outbox.claim_batch(100, Utc::now()).await.unwrap();
    assert!(reclaimed.iter().all(|e| e.entity_id != entity_id));

    // Failure parks it in error; requeue clears voucher id and error and
    // makes it claimable again.
    let failed = outbox
        .fail(entry.id, "consumer rejected payload")
        .await
        .unwrap()
        .expect("sent entry must accept a failure ack");
    assert_eq!(failed.status, SyncStatus::Error);
    assert_eq!(failed.last_error.as_deref(), Some("consumer rejected payload"));

    // An entry parked in error cannot be acked.
    assert!(outbox
        .ack(entry.id, "V-1", Utc::now())
        .await
        .unwrap()
        .is_none());

    assert!(outbox.requeue(entry.id).await.unwrap());
    let reclaimed = outbox.claim_batch(100, Utc::now()).await.unwrap();
    let ours = reclaimed
        .iter()
        .find(|e| e.entity_id == entity_id)
        .expect("requeued entry must be claimable");
    assert_eq!(ours.attempts, 2);
    assert_eq!(ours.voucher_id, None);
    assert_eq!(ours.last_error, None);

    // Ack records the external voucher id; acked entries stay settled, so a
    // duplicate ack and a requeue both bounce off.
    let acked = outbox
        .ack(entry.id, "V-2024-17", Utc::now())
        .await
        .unwrap()
        .expect("sent entry must accept an ack");
    assert_eq!(acked.status, SyncStatus::Acked);
    assert_eq!(acked.voucher_id.as_deref(), Some("V-2024-17"));
    assert!(outbox
        .ack(entry.id, "V-2024-17", Utc::now())
        .await
        .unwrap()
        .is_none());
    assert!(!outbox.requeue(entry.id).await.unwrap());
}
