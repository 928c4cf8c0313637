use serde::{Deserialize, Serialize};

/// A registered external party's interest in a set of named events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Subscribed event names; never empty
    pub events: Vec<String>,
    /// Signing secret; only serialized when explicitly requested
    #[serde(skip_serializing)]
    pub secret: String,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Subscription as returned by the API, secret omitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Subscription> for SubscriptionInfo {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            name: sub.name,
            url: sub.url,
            events: sub.events,
            active: sub.active,
            created_at: sub.created_at,
            updated_at: sub.updated_at,
        }
    }
}

/// Subscription plus its secret; returned only on create and secret rotation
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionWithSecret {
    #[serde(flatten)]
    pub info: SubscriptionInfo,
    pub secret: String,
}

impl From<Subscription> for SubscriptionWithSecret {
    fn from(sub: Subscription) -> Self {
        let secret = sub.secret.clone();
        Self {
            info: sub.into(),
            secret,
        }
    }
}
