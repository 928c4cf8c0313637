//! Subscription registry: validated CRUD over webhook subscriptions and the
//! dispatch-time lookup of subscriptions interested in an event.

use chrono::Utc;
use uuid::Uuid;

use crate::crypto;
use crate::db::Database;
use crate::error::HookdError;
use crate::models::{Page, PageParams, Subscription};

/// Fields accepted on subscription update; all optional, but at least one
/// must be present
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl SubscriptionUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.events.is_none() && self.active.is_none()
    }
}

/// Registry over webhook subscriptions
#[derive(Clone)]
pub struct SubscriptionRegistry {
    db: Database,
}

impl SubscriptionRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new subscription. The secret is always generated
    /// server-side; callers cannot supply one.
    pub fn create(
        &self,
        name: &str,
        url: &str,
        events: Vec<String>,
        active: bool,
    ) -> Result<Subscription, HookdError> {
        validate_url(url)?;
        validate_events(&events)?;

        let now = Utc::now().timestamp();
        let sub = Subscription {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            events,
            secret: crypto::generate_secret(),
            active,
            created_at: now,
            updated_at: now,
        };

        self.db.create_subscription(&sub)?;
        tracing::info!(subscription_id = %sub.id, url = %sub.url, "Subscription created");
        Ok(sub)
    }

    pub fn get(&self, id: &str) -> Result<Subscription, HookdError> {
        self.db
            .get_subscription(id)?
            .ok_or_else(|| HookdError::SubscriptionNotFound(id.to_string()))
    }

    pub fn list(
        &self,
        active: Option<bool>,
        params: PageParams,
    ) -> Result<Page<Subscription>, HookdError> {
        let (page, limit) = params.normalize();
        let items = self.db.list_subscriptions(active, limit, params.offset())?;
        let total = self.db.count_subscriptions(active)?;
        Ok(Page::new(items, total, page, limit))
    }

    /// Apply a partial update; URL and events are re-validated when supplied
    pub fn update(
        &self,
        id: &str,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, HookdError> {
        if update.is_empty() {
            return Err(HookdError::Validation(
                "update must supply at least one field".to_string(),
            ));
        }

        if let Some(ref url) = update.url {
            validate_url(url)?;
        }
        if let Some(ref events) = update.events {
            validate_events(events)?;
        }

        let mut sub = self.get(id)?;
        if let Some(name) = update.name {
            sub.name = name;
        }
        if let Some(url) = update.url {
            sub.url = url;
        }
        if let Some(events) = update.events {
            sub.events = events;
        }
        if let Some(active) = update.active {
            sub.active = active;
        }
        sub.updated_at = Utc::now().timestamp();

        if !self.db.update_subscription(&sub)? {
            return Err(HookdError::SubscriptionNotFound(id.to_string()));
        }
        Ok(sub)
    }

    /// Remove a subscription. Historical deliveries are intentionally
    /// retained for audit.
    pub fn delete(&self, id: &str) -> Result<(), HookdError> {
        if !self.db.delete_subscription(id)? {
            return Err(HookdError::SubscriptionNotFound(id.to_string()));
        }
        tracing::info!(subscription_id = %id, "Subscription deleted");
        Ok(())
    }

    /// Replace the signing secret with a fresh random value. Deliveries
    /// already created keep their snapshot of the old secret.
    pub fn regenerate_secret(&self, id: &str) -> Result<Subscription, HookdError> {
        let mut sub = self.get(id)?;
        sub.secret = crypto::generate_secret();
        sub.updated_at = Utc::now().timestamp();

        if !self.db.update_subscription(&sub)? {
            return Err(HookdError::SubscriptionNotFound(id.to_string()));
        }
        tracing::info!(subscription_id = %id, "Subscription secret regenerated");
        Ok(sub)
    }

    /// Active subscriptions interested in the given event
    pub fn find_active_by_event(&self, event: &str) -> Result<Vec<Subscription>, HookdError> {
        Ok(self.db.find_active_subscriptions_by_event(event)?)
    }
}

fn validate_url(url: &str) -> Result<(), HookdError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| HookdError::Validation(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(HookdError::Validation(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }
    if parsed.host_str().is_none() {
        return Err(HookdError::Validation("URL must have a host".to_string()));
    }
    Ok(())
}

fn validate_events(events: &[String]) -> Result<(), HookdError> {
    if events.is_empty() {
        return Err(HookdError::Validation(
            "events must not be empty".to_string(),
        ));
    }
    if events.iter().any(|e| e.trim().is_empty()) {
        return Err(HookdError::Validation(
            "event names must not be blank".to_string(),
        ));
    }
    Ok(())
}
