use serde::{Deserialize, Serialize};

/// Status of one delivery lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Awaiting first attempt or a scheduled retry
    #[default]
    Pending,
    /// Acknowledged with a 2xx (terminal)
    Success,
    /// Attempts exhausted (terminal)
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt lineage delivering one event occurrence to one subscription.
///
/// `url` and `secret` are snapshotted from the subscription when the delivery
/// is created, so every retry in the lineage signs and targets identically
/// even if the subscription is edited mid-window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub subscription_id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub status: DeliveryStatus,
    pub attempt: i64,
    pub max_attempts: i64,
    pub status_code: Option<i64>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub delivered_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}

/// Aggregate delivery counters, per subscription or platform-wide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: i64,
    pub pending: i64,
    pub success: i64,
    pub failed: i64,
    /// Percentage, rounded to 2 decimal places; 0 when total is 0
    pub success_rate: f64,
}

impl DeliveryStats {
    pub fn new(total: i64, pending: i64, success: i64, failed: i64) -> Self {
        let success_rate = if total == 0 {
            0.0
        } else {
            ((success as f64 / total as f64) * 10000.0).round() / 100.0
        };
        Self {
            total,
            pending,
            success,
            failed,
            success_rate,
        }
    }
}
