pub mod crypto;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod server;

pub use error::HookdError;
pub use models::*;

/// API version prefix
pub const API_VERSION: &str = "v1";

/// Default maximum delivery attempts per delivery lineage
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Base delay before the first retry, in seconds
pub const RETRY_BASE_DELAY_SECS: i64 = 60;

/// Upper bound on the backoff delay, in seconds
pub const RETRY_MAX_DELAY_SECS: i64 = 3600;

/// Outbound request timeout, in seconds
pub const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Event name used for manual test deliveries
pub const TEST_EVENT: &str = "webhook.test";
