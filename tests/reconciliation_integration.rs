//! Integration tests for the webhook reconciliation pipeline.
//!
//! These tests drive wire-format envelopes through the full inbound path:
//! 1. EventVerifier authenticates the delivery (HMAC-SHA256 over "t.body")
//! 2. ProcessWebhookHandler deduplicates on the provider event id
//! 3. EventRouter dispatches to the reconciliation handlers
//! 4. Handlers write the ledger transactionally and the outcome is audited
//!
//! Uses the in-memory adapters, so delivery ordering, redelivery, and
//! mid-transaction failures can be exercised without external dependencies.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::{json, Value};
use sha2::Sha256;

use streambill::adapters::memory::{
    InMemoryLedgerStore, InMemoryPlanCatalog, InMemoryProcessedEventLog,
};
use streambill::adapters::stripe::MockBillingProvider;
use streambill::application::{
    reconciliation_handlers, EventRouter, ProcessWebhookCommand, ProcessWebhookHandler,
};
use streambill::domain::billing::{
    BillingProfile, EventVerifier, PaymentStatus, Plan, PlanTier, ProviderEvent, Subscription,
    SubscriptionStatus, WebhookError,
};
use streambill::domain::foundation::{Money, PlanId, SubscriptionId, Timestamp, UserId};
use streambill::ports::{
    LedgerError, LedgerStore, ProcessedEventLog, ProcessedOutcome, WebhookResult,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const TEST_SECRET: &str = "whsec_integration_secret";

/// The full inbound pipeline over in-memory adapters, with handles onto the
/// stores for seeding and assertions.
struct Pipeline {
    ledger: InMemoryLedgerStore,
    provider: MockBillingProvider,
    event_log: Arc<InMemoryProcessedEventLog>,
    handler: ProcessWebhookHandler,
}

fn pipeline_with_plans(plans: Vec<Plan>) -> Pipeline {
    let ledger = InMemoryLedgerStore::new();
    let provider = MockBillingProvider::new();
    let event_log = Arc::new(InMemoryProcessedEventLog::new());
    let handlers = reconciliation_handlers(
        Arc::new(ledger.clone()),
        Arc::new(InMemoryPlanCatalog::with_plans(plans)),
        Arc::new(provider.clone()),
    );
    let handler = ProcessWebhookHandler::new(
        EventVerifier::new(Some(SecretString::new(TEST_SECRET.to_string()))),
        EventRouter::new(handlers),
        Arc::clone(&event_log) as Arc<dyn ProcessedEventLog>,
    );
    Pipeline {
        ledger,
        provider,
        event_log,
        handler,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with_plans(Vec::new())
}

/// Signs a payload the way the provider does: HMAC-SHA256 over
/// `"{timestamp}.{payload}"`, presented as `t=...,v1=...`.
fn sign_header(payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_SECRET.as_bytes())
        .expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn signed_command(envelope: &Value) -> ProcessWebhookCommand {
    let payload = serde_json::to_string(envelope).unwrap();
    let signature = sign_header(&payload);
    ProcessWebhookCommand {
        payload: payload.into_bytes(),
        signature,
    }
}

fn envelope(event_id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": event_id,
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "data": {"object": object},
        "livemode": false,
    })
}

/// Parses an envelope through the same boundary validation production
/// traffic takes, skipping only the signature step.
fn wire_event(envelope: &Value) -> ProviderEvent {
    ProviderEvent::from_wire_json(&serde_json::to_vec(envelope).unwrap())
        .expect("test envelope is well-formed")
}

fn subscription_object(
    provider_id: &str,
    status: &str,
    user_id: UserId,
    plan_id: PlanId,
) -> Value {
    json!({
        "id": provider_id,
        "customer": "cus_flow",
        "status": status,
        "start_date": 1_700_000_000,
        "current_period_end": 1_702_592_000,
        "items": {"data": []},
        "metadata": {"user_id": user_id.to_string(), "plan_id": plan_id.to_string()},
    })
}

fn seeded_subscription(
    user_id: UserId,
    provider_id: &str,
    status: SubscriptionStatus,
) -> Subscription {
    Subscription::create(
        SubscriptionId::new(),
        user_id,
        PlanId::new(),
        status,
        Timestamp::from_unix_secs(1_700_000_000),
        Timestamp::from_unix_secs(1_702_592_000),
        "cus_flow".to_string(),
        provider_id.to_string(),
    )
}

// =============================================================================
// Signed Delivery
// =============================================================================

#[tokio::test]
async fn signed_subscription_created_lands_in_ledger() {
    let px = pipeline();
    let user_id = UserId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;

    let envelope = envelope(
        "evt_signed_1",
        "customer.subscription.created",
        subscription_object("sub_signed", "active", user_id, PlanId::new()),
    );
    let result = px.handler.handle(signed_command(&envelope)).await.unwrap();

    assert_eq!(result, WebhookResult::Processed);
    let subscription = px
        .ledger
        .find_subscription_by_provider_id("sub_signed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.user_id, user_id);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    let profile = px.ledger.get_profile(user_id).await.unwrap();
    assert_eq!(profile.active_subscription_id, Some(subscription.id));
    let record = px.event_log.find("evt_signed_1").await.unwrap();
    assert_eq!(record.outcome, ProcessedOutcome::Success);
    assert_eq!(record.payload["id"], "evt_signed_1");
}

#[tokio::test]
async fn tampered_payload_never_reaches_the_ledger() {
    let px = pipeline();
    let user_id = UserId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;

    let genuine = serde_json::to_string(&envelope(
        "evt_tampered",
        "customer.subscription.created",
        subscription_object("sub_forged", "active", user_id, PlanId::new()),
    ))
    .unwrap();
    let signature = sign_header(&genuine);
    let tampered = genuine.replace("sub_forged", "sub_inflated");

    let result = px
        .handler
        .handle(ProcessWebhookCommand {
            payload: tampered.into_bytes(),
            signature,
        })
        .await;

    assert!(matches!(result, Err(WebhookError::SignatureInvalid)));
    assert_eq!(px.ledger.subscription_count().await, 0);
    assert_eq!(px.event_log.record_count().await, 0);
}

// =============================================================================
// Out-of-Order Delivery
// =============================================================================

#[tokio::test]
async fn checkout_completion_after_creation_converges_to_one_row() {
    let px = pipeline();
    let user_id = UserId::new();
    let plan_id = PlanId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;

    let created = wire_event(&envelope(
        "evt_order_1",
        "customer.subscription.created",
        subscription_object("sub_both", "active", user_id, plan_id),
    ));
    let checkout = wire_event(&envelope(
        "evt_order_2",
        "checkout.session.completed",
        json!({
            "id": "cs_both",
            "customer": "cus_flow",
            "subscription": "sub_both",
            "metadata": {"user_id": user_id.to_string(), "plan_id": plan_id.to_string()},
        }),
    ));

    let first = px.handler.process_event(&created).await.unwrap();
    let second = px.handler.process_event(&checkout).await.unwrap();

    assert_eq!(first, WebhookResult::Processed);
    // The session event settles too; its handler just had nothing left to do.
    assert_eq!(second, WebhookResult::Processed);
    assert_eq!(px.ledger.subscription_count().await, 1);
    assert!(!px.provider.was_called("get_subscription"));
    assert_eq!(
        px.event_log.find("evt_order_1").await.unwrap().outcome,
        ProcessedOutcome::Success
    );
    assert_eq!(
        px.event_log.find("evt_order_2").await.unwrap().outcome,
        ProcessedOutcome::Ignored
    );
}

#[tokio::test]
async fn early_invoice_settles_once_the_subscription_arrives() {
    let px = pipeline();
    let user_id = UserId::new();
    let plan_id = PlanId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;

    let invoice = wire_event(&envelope(
        "evt_early_invoice",
        "invoice.paid",
        json!({
            "id": "in_early",
            "customer": "cus_flow",
            "subscription": "sub_races",
            "payment_intent": "pi_early",
            "amount_paid": 1599,
            "currency": "usd",
            "period_end": 1_705_184_000,
        }),
    ));

    // The renewal lands before the subscription it belongs to.
    let premature = px.handler.process_event(&invoice).await;
    assert!(matches!(premature, Err(WebhookError::SubscriptionNotFound)));
    assert_eq!(
        px.event_log.find("evt_early_invoice").await.unwrap().outcome,
        ProcessedOutcome::Failed
    );
    assert_eq!(px.ledger.payment_count().await, 0);

    let created = wire_event(&envelope(
        "evt_late_created",
        "customer.subscription.created",
        subscription_object("sub_races", "active", user_id, plan_id),
    ));
    px.handler.process_event(&created).await.unwrap();

    // The provider redelivers the failed invoice; this time it settles.
    let retried = px.handler.process_event(&invoice).await.unwrap();

    assert_eq!(retried, WebhookResult::Processed);
    assert_eq!(
        px.event_log.find("evt_early_invoice").await.unwrap().outcome,
        ProcessedOutcome::Success
    );
    let payment = px
        .ledger
        .find_payment_by_provider_txn_id("pi_early")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    let subscription = px
        .ledger
        .find_subscription_by_provider_id("sub_races")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.next_billing_date.as_unix_secs(), 1_705_184_000);
    assert_eq!(px.ledger.payments_for_user(user_id).await.len(), 1);
}

// =============================================================================
// Redelivery Convergence
// =============================================================================

#[tokio::test]
async fn redelivered_event_id_is_acknowledged_without_rework() {
    let px = pipeline();
    let user_id = UserId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;
    px.ledger
        .insert_subscription(seeded_subscription(
            user_id,
            "sub_redeliver",
            SubscriptionStatus::Active,
        ))
        .await;

    let invoice = wire_event(&envelope(
        "evt_redeliver",
        "invoice.paid",
        json!({
            "id": "in_re",
            "customer": "cus_flow",
            "subscription": "sub_redeliver",
            "payment_intent": "pi_re",
            "amount_paid": 999,
            "currency": "usd",
        }),
    ));

    let first = px.handler.process_event(&invoice).await.unwrap();
    let second = px.handler.process_event(&invoice).await.unwrap();

    assert_eq!(first, WebhookResult::Processed);
    assert_eq!(second, WebhookResult::AlreadyProcessed);
    assert_eq!(px.ledger.payment_count().await, 1);
    assert_eq!(px.event_log.record_count().await, 1);
}

#[tokio::test]
async fn fresh_event_ids_for_the_same_charge_still_converge() {
    let px = pipeline();
    let user_id = UserId::new();
    px.ledger.insert_user(BillingProfile::new(user_id)).await;
    px.ledger
        .insert_subscription(seeded_subscription(
            user_id,
            "sub_fresh",
            SubscriptionStatus::Active,
        ))
        .await;

    let charge = json!({
        "id": "in_fresh",
        "customer": "cus_flow",
        "subscription": "sub_fresh",
        "payment_intent": "pi_fresh",
        "amount_paid": 2499,
        "currency": "usd",
    });
    let first = wire_event(&envelope("evt_fresh_a", "invoice.paid", charge.clone()));
    let second = wire_event(&envelope("evt_fresh_b", "invoice.paid", charge));

    assert_eq!(
        px.handler.process_event(&first).await.unwrap(),
        WebhookResult::Processed
    );
    assert_eq!(
        px.handler.process_event(&second).await.unwrap(),
        WebhookResult::Processed
    );

    // Two audit entries, one ledger payment: the upsert keys on the provider
    // transaction id, not the event id.
    assert_eq!(px.event_log.record_count().await, 2);
    assert_eq!(px.ledger.payment_count().await, 1);
    assert_eq!(px.ledger.payments_for_user(user_id).await.len(), 1);
}

// =============================================================================
// Dunning and Cancellation
// =============================================================================

#[tokio::test]
async fn dunning_then_deletion_settles_the_terminal_state() {
    let px = pipeline();
    let user_id = UserId::new();
    let subscription = seeded_subscription(user_id, "sub_term", SubscriptionStatus::Active);
    let sub_id = subscription.id;
    let mut profile = BillingProfile::new(user_id);
    profile.link_active_subscription(sub_id);
    px.ledger.insert_user(profile).await;
    px.ledger.insert_subscription(subscription).await;

    let failed = wire_event(&envelope(
        "evt_term_fail",
        "invoice.payment_failed",
        json!({
            "id": "in_term",
            "customer": "cus_flow",
            "subscription": "sub_term",
            "amount_due": 1599,
            "currency": "usd",
            "attempt_count": 3,
        }),
    ));
    let deleted = wire_event(&envelope(
        "evt_term_del",
        "customer.subscription.deleted",
        json!({
            "id": "sub_term",
            "customer": "cus_flow",
            "status": "canceled",
            "start_date": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "items": {"data": []},
        }),
    ));

    px.handler.process_event(&failed).await.unwrap();
    let after_dunning = px.ledger.get_subscription(sub_id).await.unwrap();
    assert_eq!(after_dunning.status, SubscriptionStatus::PastDue);

    px.handler.process_event(&deleted).await.unwrap();
    let replay = px.handler.process_event(&deleted).await.unwrap();

    assert_eq!(replay, WebhookResult::AlreadyProcessed);
    let terminal = px.ledger.get_subscription(sub_id).await.unwrap();
    assert_eq!(terminal.status, SubscriptionStatus::Canceled);
    assert!(terminal.canceled_at.is_some());
    let profile = px.ledger.get_profile(user_id).await.unwrap();
    assert_eq!(profile.active_subscription_id, None);
    // The failed charge stays on the record.
    let payments = px.ledger.payments_for_user(user_id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
}

#[tokio::test]
async fn scheduled_cancellation_overrides_the_reported_status() {
    let plan_id = PlanId::new();
    let px = pipeline_with_plans(vec![Plan::new(
        plan_id,
        PlanTier::Premium,
        "price_flow".to_string(),
        Money::from_minor_units(1999, "usd"),
    )]);
    let user_id = UserId::new();
    let mut subscription = seeded_subscription(user_id, "sub_sched", SubscriptionStatus::Active);
    subscription.plan_id = plan_id;
    let sub_id = subscription.id;
    px.ledger.insert_user(BillingProfile::new(user_id)).await;
    px.ledger.insert_subscription(subscription).await;

    // The provider still reports the subscription active; the scheduled
    // cancellation is what the ledger must reflect.
    let updated = wire_event(&envelope(
        "evt_sched",
        "customer.subscription.updated",
        json!({
            "id": "sub_sched",
            "customer": "cus_flow",
            "status": "active",
            "cancel_at_period_end": true,
            "start_date": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "items": {"data": [{"price": {"id": "price_flow"}}]},
        }),
    ));
    let result = px.handler.process_event(&updated).await.unwrap();

    assert_eq!(result, WebhookResult::Processed);
    let canceled = px.ledger.get_subscription(sub_id).await.unwrap();
    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    assert!(canceled.cancel_at_period_end);
    assert!(canceled.canceled_at.is_some());
}

#[tokio::test]
async fn plan_change_applies_once_then_reports_nothing_new() {
    let basic = PlanId::new();
    let premium = PlanId::new();
    let px = pipeline_with_plans(vec![
        Plan::new(
            basic,
            PlanTier::Basic,
            "price_basic".to_string(),
            Money::from_minor_units(999, "usd"),
        ),
        Plan::new(
            premium,
            PlanTier::Premium,
            "price_premium".to_string(),
            Money::from_minor_units(1999, "usd"),
        ),
    ]);
    let user_id = UserId::new();
    let mut subscription = seeded_subscription(user_id, "sub_plan", SubscriptionStatus::Active);
    subscription.plan_id = basic;
    let sub_id = subscription.id;
    px.ledger.insert_user(BillingProfile::new(user_id)).await;
    px.ledger.insert_subscription(subscription).await;

    let upgrade = json!({
        "id": "sub_plan",
        "customer": "cus_flow",
        "status": "active",
        "start_date": 1_700_000_000,
        "current_period_end": 1_702_592_000,
        "items": {"data": [{"price": {"id": "price_premium"}}]},
    });
    let first = wire_event(&envelope(
        "evt_plan_a",
        "customer.subscription.updated",
        upgrade.clone(),
    ));
    let second = wire_event(&envelope(
        "evt_plan_b",
        "customer.subscription.updated",
        upgrade,
    ));

    px.handler.process_event(&first).await.unwrap();
    px.handler.process_event(&second).await.unwrap();

    assert_eq!(
        px.ledger.get_subscription(sub_id).await.unwrap().plan_id,
        premium
    );
    assert_eq!(
        px.event_log.find("evt_plan_a").await.unwrap().outcome,
        ProcessedOutcome::Success
    );
    // The identical follow-up report diffs to nothing.
    assert_eq!(
        px.event_log.find("evt_plan_b").await.unwrap().outcome,
        ProcessedOutcome::Ignored
    );
}

// =============================================================================
// Transactional Writes
// =============================================================================

#[tokio::test]
async fn mid_transaction_failure_is_retried_cleanly() {
    let px = pipeline();
    let user_id = UserId::new();
    let subscription = seeded_subscription(user_id, "sub_atomic", SubscriptionStatus::Active);
    let sub_id = subscription.id;
    let mut profile = BillingProfile::new(user_id);
    profile.link_active_subscription(sub_id);
    px.ledger.insert_user(profile).await;
    px.ledger.insert_subscription(subscription).await;

    let deleted = wire_event(&envelope(
        "evt_atomic",
        "customer.subscription.deleted",
        json!({
            "id": "sub_atomic",
            "customer": "cus_flow",
            "status": "canceled",
            "start_date": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "items": {"data": []},
        }),
    ));

    px.ledger.set_error_for(
        "clear_active_subscription_if",
        LedgerError::Database("connection reset".to_string()),
    );
    let failed = px.handler.process_event(&deleted).await;
    assert!(failed.is_err());

    // Nothing from the broken transaction may be visible.
    let unchanged = px.ledger.get_subscription(sub_id).await.unwrap();
    assert_eq!(unchanged.status, SubscriptionStatus::Active);
    assert_eq!(
        px.ledger
            .get_profile(user_id)
            .await
            .unwrap()
            .active_subscription_id,
        Some(sub_id)
    );
    assert_eq!(
        px.event_log.find("evt_atomic").await.unwrap().outcome,
        ProcessedOutcome::Failed
    );

    // The store recovers and the provider redelivers the same event id.
    px.ledger.clear_errors();
    let retried = px.handler.process_event(&deleted).await.unwrap();

    assert_eq!(retried, WebhookResult::Processed);
    let canceled = px.ledger.get_subscription(sub_id).await.unwrap();
    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    assert_eq!(
        px.ledger
            .get_profile(user_id)
            .await
            .unwrap()
            .active_subscription_id,
        None
    );
    assert_eq!(
        px.event_log.find("evt_atomic").await.unwrap().outcome,
        ProcessedOutcome::Success
    );
}

// =============================================================================
// Unknown Events
// =============================================================================

#[tokio::test]
async fn unrecognized_event_is_acknowledged_and_audited() {
    let px = pipeline();

    let event = wire_event(&envelope(
        "evt_future",
        "charge.succeeded",
        json!({"id": "ch_1", "amount": 1599}),
    ));
    let result = px.handler.process_event(&event).await.unwrap();

    assert_eq!(result, WebhookResult::Processed);
    let record = px.event_log.find("evt_future").await.unwrap();
    assert_eq!(record.outcome, ProcessedOutcome::Ignored);
    assert_eq!(record.event_type, "charge.succeeded");
    assert_eq!(px.ledger.subscription_count().await, 0);
    assert_eq!(px.ledger.payment_count().await, 0);
}
