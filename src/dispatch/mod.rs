//! Delivery dispatcher: resolves interested subscriptions for an event,
//! creates delivery records, performs the signed HTTP POST, and drives the
//! retry state machine (pending -> success | pending | failed).

mod emitter;

pub use emitter::{event_channel, EventEmitter, QueuedEvent};

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::crypto;
use crate::error::HookdError;
use crate::ledger::DeliveryLedger;
use crate::models::{Delivery, Subscription};
use crate::registry::SubscriptionRegistry;
use crate::{DELIVERY_TIMEOUT_SECS, RETRY_BASE_DELAY_SECS, RETRY_MAX_DELAY_SECS, TEST_EVENT};

/// Header carrying the hex HMAC-SHA256 signature of the body
pub const SIGNATURE_HEADER: &str = "X-Hookd-Signature";

/// Header carrying the event name
pub const EVENT_HEADER: &str = "X-Hookd-Event";

/// Longest response body snippet recorded on a delivery
const RESPONSE_SNIPPET_MAX: usize = 4096;

/// Executes webhook deliveries against subscriber endpoints
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriptionRegistry,
    ledger: DeliveryLedger,
    http_client: Client,
}

impl Dispatcher {
    pub fn new(registry: SubscriptionRegistry, ledger: DeliveryLedger) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .user_agent(concat!("hookd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            registry,
            ledger,
            http_client,
        })
    }

    /// Deliver one event occurrence to every interested active subscription.
    ///
    /// No matching subscriptions is a silent no-op. Failures are recorded on
    /// the ledger and never propagate to the event producer.
    pub async fn dispatch(&self, event: &str, payload: &serde_json::Value) {
        let subscriptions = match self.registry.find_active_by_event(event) {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(event, error = %e, "Failed to resolve subscriptions for event");
                return;
            }
        };

        if subscriptions.is_empty() {
            tracing::debug!(event, "No active subscriptions for event");
            return;
        }

        tracing::info!(
            event,
            subscription_count = subscriptions.len(),
            "Dispatching event"
        );

        let mut deliveries = Vec::with_capacity(subscriptions.len());
        for sub in &subscriptions {
            match self.ledger.create(sub, event, payload.clone(), None) {
                Ok(d) => deliveries.push(d),
                Err(e) => {
                    tracing::error!(
                        event,
                        subscription_id = %sub.id,
                        error = %e,
                        "Failed to create delivery record"
                    );
                }
            }
        }

        // Fan-out across subscriptions runs concurrently; no cross-delivery
        // ordering is guaranteed
        join_all(deliveries.iter().map(|d| self.attempt(d))).await;
    }

    /// Create and immediately attempt a synthetic test delivery for one
    /// subscription, bypassing event matching
    pub async fn dispatch_test(&self, subscription: &Subscription) -> Result<Delivery, HookdError> {
        let payload = serde_json::json!({
            "event": TEST_EVENT,
            "subscription_id": subscription.id,
            "timestamp": Utc::now().timestamp(),
        });

        let delivery = self.ledger.create(subscription, TEST_EVENT, payload, None)?;
        self.attempt(&delivery).await;
        self.ledger.get(&delivery.id)
    }

    /// Perform one HTTP attempt for a delivery and record the outcome.
    ///
    /// The payload is serialized once and the signature computed over those
    /// exact bytes, using the URL and secret snapshotted at delivery creation.
    pub async fn attempt(&self, delivery: &Delivery) {
        let body = match serde_json::to_vec(&delivery.payload) {
            Ok(b) => b,
            Err(e) => {
                self.record_failure(delivery, &format!("payload serialization failed: {e}"), None, None)
                    .await;
                return;
            }
        };

        let signature = crypto::sign(&body, &delivery.secret);

        let result = self
            .http_client
            .post(&delivery.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, &delivery.event)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16() as i64;
                let snippet: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(RESPONSE_SNIPPET_MAX)
                    .collect();

                if (200..300).contains(&status_code) {
                    tracing::info!(
                        delivery_id = %delivery.id,
                        subscription_id = %delivery.subscription_id,
                        event = %delivery.event,
                        status_code,
                        attempt = delivery.attempt,
                        "Webhook delivered"
                    );
                    if let Err(e) =
                        self.ledger
                            .mark_success(&delivery.id, status_code, Some(snippet))
                    {
                        tracing::error!(delivery_id = %delivery.id, error = %e, "Failed to record delivery success");
                    }
                } else {
                    self.record_failure(
                        delivery,
                        &format!("HTTP {status_code}"),
                        Some(status_code),
                        Some(snippet),
                    )
                    .await;
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    format!("request timeout ({DELIVERY_TIMEOUT_SECS}s)")
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request error: {e}")
                };
                self.record_failure(delivery, &error_msg, None, None).await;
            }
        }
    }

    /// Schedule a retry with exponential backoff, or mark the delivery
    /// terminally failed once the attempt budget is spent
    async fn record_failure(
        &self,
        delivery: &Delivery,
        error_message: &str,
        status_code: Option<i64>,
        response_body: Option<String>,
    ) {
        let retries_left = delivery.attempt < delivery.max_attempts;

        tracing::warn!(
            delivery_id = %delivery.id,
            subscription_id = %delivery.subscription_id,
            event = %delivery.event,
            attempt = delivery.attempt,
            max_attempts = delivery.max_attempts,
            error = %error_message,
            will_retry = retries_left,
            "Webhook delivery attempt failed"
        );

        let result = if retries_left {
            let next_retry_at = Utc::now().timestamp() + backoff_delay_secs(delivery.attempt);
            self.ledger.schedule_retry(
                &delivery.id,
                error_message,
                status_code,
                response_body,
                next_retry_at,
            )
        } else {
            self.ledger
                .mark_failed(&delivery.id, error_message, status_code, response_body)
        };

        if let Err(e) = result {
            tracing::error!(delivery_id = %delivery.id, error = %e, "Failed to record delivery failure");
        }
    }

    /// One pass over deliveries whose retry time has arrived
    pub async fn run_retry_sweep(&self) {
        let now = Utc::now().timestamp();
        let due = match self.ledger.find_due_for_retry(now) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "Retry sweep query failed");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        tracing::info!(count = due.len(), "Retrying due deliveries");
        join_all(due.iter().map(|d| self.attempt(d))).await;
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped
pub fn backoff_delay_secs(attempt: i64) -> i64 {
    let exp = (attempt - 1).clamp(0, 30) as u32;
    RETRY_BASE_DELAY_SECS
        .saturating_mul(1_i64 << exp)
        .min(RETRY_MAX_DELAY_SECS)
}

/// Drain the event queue, dispatching each event in arrival order
pub fn spawn_dispatcher(
    dispatcher: Dispatcher,
    mut rx: mpsc::UnboundedReceiver<QueuedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(queued) = rx.recv().await {
            dispatcher.dispatch(&queued.event, &queued.payload).await;
        }
        tracing::debug!("Event queue closed, dispatcher stopping");
    })
}

/// Periodic retry sweep, decoupled from the original emission path so a
/// crash only delays retries rather than losing them
pub fn spawn_retry_sweep(dispatcher: Dispatcher, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            dispatcher.run_retry_sweep().await;
        }
    })
}
