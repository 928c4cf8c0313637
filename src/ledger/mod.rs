//! Delivery ledger: one record per (subscription, event occurrence) attempt
//! lineage, with filtered queries, aggregate statistics, and retention.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::HookdError;
use crate::models::{Delivery, DeliveryStats, DeliveryStatus, Page, PageParams, Subscription};
use crate::DEFAULT_MAX_ATTEMPTS;

/// Default number of rows returned by recent()
pub const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Fields applied on a delivery status transition
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub status: DeliveryStatus,
    pub status_code: Option<i64>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub delivered_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}

/// Filters for delivery listing
#[derive(Debug, Default, Clone)]
pub struct DeliveryFilter {
    pub subscription_id: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub event: Option<String>,
}

/// Ledger over webhook deliveries
#[derive(Clone)]
pub struct DeliveryLedger {
    db: Database,
}

impl DeliveryLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a delivery lineage for one event occurrence against one
    /// subscription. URL and secret are snapshotted here so every retry in
    /// the lineage signs and targets consistently.
    pub fn create(
        &self,
        subscription: &Subscription,
        event: &str,
        payload: serde_json::Value,
        max_attempts: Option<i64>,
    ) -> Result<Delivery, HookdError> {
        let delivery = Delivery {
            id: Uuid::new_v4().to_string(),
            subscription_id: subscription.id.clone(),
            event: event.to_string(),
            payload,
            url: subscription.url.clone(),
            secret: subscription.secret.clone(),
            status: DeliveryStatus::Pending,
            attempt: 1,
            max_attempts: max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            status_code: None,
            response_body: None,
            error_message: None,
            created_at: Utc::now().timestamp(),
            delivered_at: None,
            next_retry_at: None,
        };

        self.db.create_delivery(&delivery)?;
        Ok(delivery)
    }

    pub fn get(&self, id: &str) -> Result<Delivery, HookdError> {
        self.db
            .get_delivery(id)?
            .ok_or_else(|| HookdError::DeliveryNotFound(id.to_string()))
    }

    /// Apply a status transition as a single atomic update
    pub fn update_status(&self, id: &str, update: StatusUpdate) -> Result<Delivery, HookdError> {
        if !self.db.update_delivery_status(
            id,
            update.status,
            update.status_code,
            update.response_body.as_deref(),
            update.error_message.as_deref(),
            update.delivered_at,
            update.next_retry_at,
        )? {
            return Err(HookdError::DeliveryNotFound(id.to_string()));
        }
        self.get(id)
    }

    /// Bump the attempt counter without touching status
    pub fn increment_attempt(&self, id: &str) -> Result<Delivery, HookdError> {
        if !self.db.increment_delivery_attempt(id)? {
            return Err(HookdError::DeliveryNotFound(id.to_string()));
        }
        self.get(id)
    }

    /// Record a 2xx acknowledgement (terminal)
    pub fn mark_success(
        &self,
        id: &str,
        status_code: i64,
        response_body: Option<String>,
    ) -> Result<Delivery, HookdError> {
        self.update_status(
            id,
            StatusUpdate {
                status: DeliveryStatus::Success,
                status_code: Some(status_code),
                response_body,
                delivered_at: Some(Utc::now().timestamp()),
                ..Default::default()
            },
        )
    }

    /// Record a failed attempt and schedule the next one; attempt increments
    /// and status remains pending
    pub fn schedule_retry(
        &self,
        id: &str,
        error_message: &str,
        status_code: Option<i64>,
        response_body: Option<String>,
        next_retry_at: i64,
    ) -> Result<Delivery, HookdError> {
        if !self.db.schedule_delivery_retry(
            id,
            error_message,
            status_code,
            response_body.as_deref(),
            next_retry_at,
        )? {
            return Err(HookdError::DeliveryNotFound(id.to_string()));
        }
        self.get(id)
    }

    /// Record terminal failure after the attempt budget is exhausted
    pub fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        status_code: Option<i64>,
        response_body: Option<String>,
    ) -> Result<Delivery, HookdError> {
        self.update_status(
            id,
            StatusUpdate {
                status: DeliveryStatus::Failed,
                status_code,
                response_body,
                error_message: Some(error_message.to_string()),
                ..Default::default()
            },
        )
    }

    /// Filtered, paginated listing, newest first
    pub fn list(
        &self,
        filter: &DeliveryFilter,
        params: PageParams,
    ) -> Result<Page<Delivery>, HookdError> {
        let (page, limit) = params.normalize();
        let items = self.db.list_deliveries(
            filter.subscription_id.as_deref(),
            filter.status,
            filter.event.as_deref(),
            limit,
            params.offset(),
        )?;
        let total = self.db.count_deliveries(
            filter.subscription_id.as_deref(),
            filter.status,
            filter.event.as_deref(),
        )?;
        Ok(Page::new(items, total, page, limit))
    }

    /// Aggregate counters, per subscription or platform-wide when
    /// subscription_id is None
    pub fn stats(&self, subscription_id: Option<&str>) -> Result<DeliveryStats, HookdError> {
        let (total, pending, success, failed) = self.db.delivery_counts(subscription_id)?;
        Ok(DeliveryStats::new(total, pending, success, failed))
    }

    /// Most recent deliveries for one subscription
    pub fn recent(
        &self,
        subscription_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Delivery>, HookdError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, 100);
        Ok(self.db.recent_deliveries(subscription_id, limit)?)
    }

    /// Pending deliveries whose scheduled retry time has arrived
    pub fn find_due_for_retry(&self, now: i64) -> Result<Vec<Delivery>, HookdError> {
        Ok(self.db.deliveries_due_for_retry(now)?)
    }

    /// Hard-delete deliveries older than the given number of days
    pub fn purge_older_than(&self, days: i64) -> Result<usize, HookdError> {
        let cutoff = Utc::now().timestamp() - days * 86400;
        let deleted = self.db.purge_deliveries_before(cutoff)?;
        if deleted > 0 {
            tracing::info!(deleted, days, "Purged old deliveries");
        }
        Ok(deleted)
    }
}
