//! Provider webhook event envelope and typed payloads.
//!
//! Events are validated into tagged payload variants at the boundary, so the
//! reconciliation handlers downstream never perform untyped field lookups.
//! Only fields relevant to our processing are captured; additional fields
//! from the provider's full schemas are ignored.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::errors::WebhookError;
use super::subscription::SubscriptionStatus;
use crate::domain::foundation::{PlanId, UserId};

/// Provider event types this engine recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Checkout session expired without completing.
    CheckoutSessionExpired,
    /// Subscription created at the provider.
    CustomerSubscriptionCreated,
    /// Subscription attributes changed at the provider.
    CustomerSubscriptionUpdated,
    /// Subscription deleted (canceled) at the provider.
    CustomerSubscriptionDeleted,
    /// Trial period ending soon.
    CustomerSubscriptionTrialWillEnd,
    /// Renewal invoice collected.
    InvoicePaid,
    /// Renewal invoice collection failed.
    InvoicePaymentFailed,
    /// Renewal invoice will be attempted soon.
    InvoiceUpcoming,
    /// Invoice voided before collection.
    InvoiceVoided,
    /// Invoice written off as uncollectible.
    InvoiceMarkedUncollectible,
    /// Any event type without a registered meaning here.
    Unrecognized(String),
}

impl ProviderEventType {
    /// Parses a wire event type tag. Total: unknown tags become
    /// [`ProviderEventType::Unrecognized`].
    pub fn from_wire(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "customer.subscription.trial_will_end" => Self::CustomerSubscriptionTrialWillEnd,
            "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "invoice.upcoming" => Self::InvoiceUpcoming,
            "invoice.voided" => Self::InvoiceVoided,
            "invoice.marked_uncollectible" => Self::InvoiceMarkedUncollectible,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Returns the wire tag for this event type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::CustomerSubscriptionTrialWillEnd => "customer.subscription.trial_will_end",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::InvoiceUpcoming => "invoice.upcoming",
            Self::InvoiceVoided => "invoice.voided",
            Self::InvoiceMarkedUncollectible => "invoice.marked_uncollectible",
            Self::Unrecognized(tag) => tag,
        }
    }
}

impl fmt::Display for ProviderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Correlation metadata embedded in outbound sessions and echoed back by the
/// provider on the events they produce.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CorrelationMetadata {
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
}

impl CorrelationMetadata {
    /// Extracts and parses the required `{user_id, plan_id}` pair.
    ///
    /// # Errors
    ///
    /// `MetadataMissing` when a key is absent; `PayloadMalformed` when a
    /// present value is not a UUID.
    pub fn require_ids(&self) -> Result<(UserId, PlanId), WebhookError> {
        let user_raw = self
            .user_id
            .as_deref()
            .ok_or(WebhookError::MetadataMissing("user_id"))?;
        let plan_raw = self
            .plan_id
            .as_deref()
            .ok_or(WebhookError::MetadataMissing("plan_id"))?;
        let user_id = user_raw
            .parse()
            .map_err(|_| WebhookError::PayloadMalformed("metadata.user_id is not a UUID".to_string()))?;
        let plan_id = plan_raw
            .parse()
            .map_err(|_| WebhookError::PayloadMalformed("metadata.plan_id is not a UUID".to_string()))?;
        Ok((user_id, plan_id))
    }
}

/// Checkout session object, from `checkout.session.*` events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSessionObject {
    /// Session id (cs_xxx).
    pub id: String,

    /// Provider customer id, once assigned.
    pub customer: Option<String>,

    /// Provider subscription id created by this checkout, if any.
    pub subscription: Option<String>,

    /// Correlation metadata set when the session was created.
    #[serde(default)]
    pub metadata: CorrelationMetadata,
}

/// Subscription object, from `customer.subscription.*` events and the
/// provider point query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionObject {
    /// Provider subscription id (sub_xxx).
    pub id: String,

    /// Provider customer id.
    pub customer: String,

    /// Reported lifecycle status; mirrored verbatim into the ledger.
    pub status: SubscriptionStatus,

    /// Cancellation scheduled for the end of the current period.
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// When the subscription started (Unix seconds).
    pub start_date: i64,

    /// When the current billing period ends (Unix seconds).
    pub current_period_end: i64,

    /// Subscription line items; the first item's price identifies the plan.
    pub items: SubscriptionItems,

    /// Correlation metadata, when the subscription carries it directly.
    #[serde(default)]
    pub metadata: CorrelationMetadata,
}

impl SubscriptionObject {
    /// Returns the provider price id of the first line item.
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

/// Container for subscription line items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// A single subscription line item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionItem {
    pub price: PriceObject,
}

/// Price reference on a line item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceObject {
    /// Provider price id (price_xxx).
    pub id: String,

    /// Unit amount in minor units.
    pub unit_amount: Option<i64>,

    /// Lower-case currency code.
    pub currency: Option<String>,
}

/// Invoice object, from `invoice.*` events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvoiceObject {
    /// Invoice id (in_xxx); transaction-id fallback when no payment intent.
    /// Empty on `invoice.upcoming`, whose invoice does not exist yet.
    #[serde(default)]
    pub id: String,

    /// Provider customer id.
    pub customer: Option<String>,

    /// Provider subscription id; None for one-off invoices.
    pub subscription: Option<String>,

    /// Payment intent id; preferred transaction id when present.
    pub payment_intent: Option<String>,

    /// Amount collected, in minor units.
    pub amount_paid: Option<i64>,

    /// Amount the provider attempted to collect, in minor units.
    pub amount_due: Option<i64>,

    /// Lower-case currency code.
    pub currency: Option<String>,

    /// When the invoice was created (Unix seconds).
    pub created: Option<i64>,

    /// End of the billing period this invoice covers (Unix seconds).
    pub period_end: Option<i64>,

    /// When the next collection attempt is scheduled (Unix seconds).
    pub next_payment_attempt: Option<i64>,

    /// How many collection attempts have been made.
    pub attempt_count: Option<u32>,
}

impl InvoiceObject {
    /// Returns the transaction id used to key the Payment ledger record:
    /// the payment intent id when present, otherwise the invoice id.
    pub fn transaction_id(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

/// Event payload, tagged by event type at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    CheckoutSession(CheckoutSessionObject),
    Subscription(SubscriptionObject),
    Invoice(InvoiceObject),
    /// Raw body of an event type this engine does not recognize.
    Unrecognized(Value),
}

/// A verified, boundary-validated provider event.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// Provider event id (evt_xxx); the dedup key for the audit log.
    pub id: String,

    /// Parsed event type tag.
    pub event_type: ProviderEventType,

    /// When the provider created the event (Unix seconds).
    pub created: i64,

    /// Whether this event was produced in live mode.
    pub livemode: bool,

    /// Typed payload for the event type.
    pub payload: EventPayload,

    /// Full envelope as received, retained for the processed-event audit log.
    pub raw: Value,
}

/// Wire shape of the provider's event envelope.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: WireData,
    #[serde(default)]
    livemode: bool,
}

#[derive(Debug, Deserialize)]
struct WireData {
    object: Value,
}

impl ProviderEvent {
    /// Parses a raw (already signature-verified) webhook body into a typed
    /// event.
    ///
    /// Known event types have their payload validated here; a body that does
    /// not fit its type's schema is rejected. Unknown event types keep their
    /// raw object so they can be logged and acknowledged.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` when the envelope or a known type's body fails to
    /// deserialize.
    pub fn from_wire_json(payload: &[u8]) -> Result<Self, WebhookError> {
        let raw: Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?;
        let envelope: WireEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?;

        let event_type = ProviderEventType::from_wire(&envelope.event_type);
        let payload = Self::parse_payload(&event_type, envelope.data.object)?;

        Ok(Self {
            id: envelope.id,
            event_type,
            created: envelope.created,
            livemode: envelope.livemode,
            payload,
            raw,
        })
    }

    fn parse_payload(
        event_type: &ProviderEventType,
        object: Value,
    ) -> Result<EventPayload, WebhookError> {
        use ProviderEventType::*;

        let payload = match event_type {
            CheckoutSessionCompleted | CheckoutSessionExpired => EventPayload::CheckoutSession(
                serde_json::from_value(object)
                    .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?,
            ),
            CustomerSubscriptionCreated
            | CustomerSubscriptionUpdated
            | CustomerSubscriptionDeleted
            | CustomerSubscriptionTrialWillEnd => EventPayload::Subscription(
                serde_json::from_value(object)
                    .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?,
            ),
            InvoicePaid | InvoicePaymentFailed | InvoiceUpcoming | InvoiceVoided
            | InvoiceMarkedUncollectible => EventPayload::Invoice(
                serde_json::from_value(object)
                    .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?,
            ),
            Unrecognized(_) => EventPayload::Unrecognized(object),
        };
        Ok(payload)
    }

    /// Returns the checkout session payload.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if this event carries a different payload kind.
    pub fn checkout_session(&self) -> Result<&CheckoutSessionObject, WebhookError> {
        match &self.payload {
            EventPayload::CheckoutSession(session) => Ok(session),
            _ => Err(WebhookError::PayloadMalformed(format!(
                "{} event does not carry a checkout session",
                self.event_type
            ))),
        }
    }

    /// Returns the subscription payload.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if this event carries a different payload kind.
    pub fn subscription(&self) -> Result<&SubscriptionObject, WebhookError> {
        match &self.payload {
            EventPayload::Subscription(subscription) => Ok(subscription),
            _ => Err(WebhookError::PayloadMalformed(format!(
                "{} event does not carry a subscription",
                self.event_type
            ))),
        }
    }

    /// Returns the invoice payload.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if this event carries a different payload kind.
    pub fn invoice(&self) -> Result<&InvoiceObject, WebhookError> {
        match &self.payload {
            EventPayload::Invoice(invoice) => Ok(invoice),
            _ => Err(WebhookError::PayloadMalformed(format!(
                "{} event does not carry an invoice",
                self.event_type
            ))),
        }
    }

    /// Returns true if this is a live mode event.
    pub fn is_live(&self) -> bool {
        self.livemode
    }
}

/// Builder for creating test ProviderEvent instances.
///
/// Assembles a wire envelope and runs it through [`ProviderEvent::from_wire_json`]
/// so test events take the same validation path as production traffic.
#[cfg(test)]
pub struct ProviderEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for ProviderEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({"id": "cs_test_123"}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl ProviderEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: Value) -> Self {
        self.object = object;
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> ProviderEvent {
        let envelope = serde_json::json!({
            "id": self.id,
            "type": self.event_type,
            "created": self.created,
            "data": {"object": self.object},
            "livemode": self.livemode,
        });
        let bytes = serde_json::to_vec(&envelope).expect("envelope serializes");
        ProviderEvent::from_wire_json(&bytes).expect("builder produced an invalid event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Envelope Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parses_checkout_session_completed() {
        let body = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": {"object": {
                "id": "cs_abc",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": {"user_id": "550e8400-e29b-41d4-a716-446655440000", "plan_id": "650e8400-e29b-41d4-a716-446655440000"}
            }},
            "livemode": false
        });

        let event = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap()).unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, ProviderEventType::CheckoutSessionCompleted);
        let session = event.checkout_session().unwrap();
        assert_eq!(session.id, "cs_abc");
        assert_eq!(session.subscription.as_deref(), Some("sub_1"));
        assert!(session.metadata.require_ids().is_ok());
    }

    #[test]
    fn parses_subscription_updated() {
        let body = json!({
            "id": "evt_2",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {"object": {
                "id": "sub_9",
                "customer": "cus_9",
                "status": "past_due",
                "cancel_at_period_end": true,
                "start_date": 1700000000,
                "current_period_end": 1702592000,
                "items": {"data": [{"price": {"id": "price_basic", "unit_amount": 999, "currency": "usd"}}]}
            }},
            "livemode": true
        });

        let event = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap()).unwrap();

        assert!(event.is_live());
        let sub = event.subscription().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert!(sub.cancel_at_period_end);
        assert_eq!(sub.price_id(), Some("price_basic"));
    }

    #[test]
    fn parses_invoice_paid() {
        let body = json!({
            "id": "evt_3",
            "type": "invoice.paid",
            "created": 1704067200,
            "data": {"object": {
                "id": "in_77",
                "customer": "cus_1",
                "subscription": "sub_1",
                "payment_intent": "pi_42",
                "amount_paid": 1599,
                "currency": "usd",
                "created": 1704067100,
                "period_end": 1706745600
            }},
            "livemode": false
        });

        let event = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap()).unwrap();

        let invoice = event.invoice().unwrap();
        assert_eq!(invoice.transaction_id(), "pi_42");
        assert_eq!(invoice.amount_paid, Some(1599));
        assert_eq!(invoice.period_end, Some(1706745600));
    }

    #[test]
    fn unknown_event_type_keeps_raw_object() {
        let body = json!({
            "id": "evt_4",
            "type": "some.future.event",
            "created": 1704067200,
            "data": {"object": {"anything": true}},
            "livemode": false
        });

        let event = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap()).unwrap();

        assert_eq!(
            event.event_type,
            ProviderEventType::Unrecognized("some.future.event".to_string())
        );
        match &event.payload {
            EventPayload::Unrecognized(value) => assert_eq!(value["anything"], true),
            other => panic!("expected Unrecognized payload, got {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_json() {
        let result = ProviderEvent::from_wire_json(b"not json at all");
        assert!(matches!(result, Err(WebhookError::PayloadMalformed(_))));
    }

    #[test]
    fn rejects_envelope_missing_id() {
        let body = json!({
            "type": "invoice.paid",
            "created": 1704067200,
            "data": {"object": {"id": "in_1"}}
        });

        let result = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap());
        assert!(matches!(result, Err(WebhookError::PayloadMalformed(_))));
    }

    #[test]
    fn rejects_known_type_with_malformed_body() {
        // Subscription events require id/customer/status; an empty object
        // must not pass boundary validation.
        let body = json!({
            "id": "evt_5",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {"object": {}},
            "livemode": false
        });

        let result = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap());
        assert!(matches!(result, Err(WebhookError::PayloadMalformed(_))));
    }

    #[test]
    fn rejects_unknown_subscription_status() {
        let body = json!({
            "id": "evt_6",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "hibernating",
                "start_date": 1700000000,
                "current_period_end": 1702592000,
                "items": {"data": []}
            }},
            "livemode": false
        });

        let result = ProviderEvent::from_wire_json(&serde_json::to_vec(&body).unwrap());
        assert!(matches!(result, Err(WebhookError::PayloadMalformed(_))));
    }

    #[test]
    fn raw_envelope_is_retained() {
        let event = ProviderEventBuilder::new().id("evt_raw").build();
        assert_eq!(event.raw["id"], "evt_raw");
        assert_eq!(event.raw["type"], "checkout.session.completed");
    }

    // ══════════════════════════════════════════════════════════════
    // Payload Accessor Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn wrong_accessor_returns_payload_malformed() {
        let event = ProviderEventBuilder::new()
            .event_type("invoice.paid")
            .object(json!({"id": "in_1"}))
            .build();

        assert!(event.invoice().is_ok());
        assert!(matches!(
            event.subscription(),
            Err(WebhookError::PayloadMalformed(_))
        ));
        assert!(matches!(
            event.checkout_session(),
            Err(WebhookError::PayloadMalformed(_))
        ));
    }

    #[test]
    fn transaction_id_falls_back_to_invoice_id() {
        let event = ProviderEventBuilder::new()
            .event_type("invoice.paid")
            .object(json!({"id": "in_55"}))
            .build();

        assert_eq!(event.invoice().unwrap().transaction_id(), "in_55");
    }

    #[test]
    fn price_id_is_none_for_empty_items() {
        let event = ProviderEventBuilder::new()
            .event_type("customer.subscription.updated")
            .object(json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "start_date": 1700000000,
                "current_period_end": 1702592000,
                "items": {"data": []}
            }))
            .build();

        assert_eq!(event.subscription().unwrap().price_id(), None);
    }

    // ══════════════════════════════════════════════════════════════
    // Metadata Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn require_ids_reports_missing_user_id() {
        let metadata = CorrelationMetadata {
            user_id: None,
            plan_id: Some("650e8400-e29b-41d4-a716-446655440000".to_string()),
        };

        assert!(matches!(
            metadata.require_ids(),
            Err(WebhookError::MetadataMissing("user_id"))
        ));
    }

    #[test]
    fn require_ids_reports_missing_plan_id() {
        let metadata = CorrelationMetadata {
            user_id: Some("550e8400-e29b-41d4-a716-446655440000".to_string()),
            plan_id: None,
        };

        assert!(matches!(
            metadata.require_ids(),
            Err(WebhookError::MetadataMissing("plan_id"))
        ));
    }

    #[test]
    fn require_ids_rejects_non_uuid_values() {
        let metadata = CorrelationMetadata {
            user_id: Some("user-42".to_string()),
            plan_id: Some("650e8400-e29b-41d4-a716-446655440000".to_string()),
        };

        assert!(matches!(
            metadata.require_ids(),
            Err(WebhookError::PayloadMalformed(_))
        ));
    }

    #[test]
    fn metadata_defaults_to_empty_when_absent() {
        let event = ProviderEventBuilder::new()
            .object(json!({"id": "cs_1"}))
            .build();

        let session = event.checkout_session().unwrap();
        assert!(session.metadata.user_id.is_none());
        assert!(matches!(
            session.metadata.require_ids(),
            Err(WebhookError::MetadataMissing("user_id"))
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Event Type Tag Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn event_type_tags_roundtrip() {
        let tags = [
            "checkout.session.completed",
            "checkout.session.expired",
            "customer.subscription.created",
            "customer.subscription.updated",
            "customer.subscription.deleted",
            "customer.subscription.trial_will_end",
            "invoice.paid",
            "invoice.payment_failed",
            "invoice.upcoming",
            "invoice.voided",
            "invoice.marked_uncollectible",
        ];

        for tag in tags {
            let parsed = ProviderEventType::from_wire(tag);
            assert!(!matches!(parsed, ProviderEventType::Unrecognized(_)), "{}", tag);
            assert_eq!(parsed.as_str(), tag);
        }
    }

    #[test]
    fn unrecognized_preserves_original_tag() {
        let parsed = ProviderEventType::from_wire("payment_intent.succeeded");
        assert_eq!(
            parsed,
            ProviderEventType::Unrecognized("payment_intent.succeeded".to_string())
        );
        assert_eq!(parsed.as_str(), "payment_intent.succeeded");
    }
}
