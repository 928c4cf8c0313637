use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::models::{Delivery, DeliveryStatus, Subscription};

const MIGRATION_001: &str = include_str!("migrations/001_initial.sql");

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(MIGRATION_001)
            .context("Failed to run migration 001")?;
        Ok(())
    }

    // ==================== Subscription Operations ====================

    /// Insert a new subscription
    pub fn create_subscription(&self, sub: &Subscription) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO webhook_subscriptions (id, name, url, events, secret, active,
                                               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                sub.id,
                sub.name,
                sub.url,
                serde_json::to_string(&sub.events)?,
                sub.secret,
                sub.active,
                sub.created_at,
                sub.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a subscription by ID
    pub fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, events, secret, active, created_at, updated_at
             FROM webhook_subscriptions WHERE id = ?1",
        )?;

        stmt.query_row(params![id], map_subscription_row)
            .optional()
            .context("Failed to get subscription")
    }

    /// List subscriptions, optionally filtered by active flag, newest first
    pub fn list_subscriptions(
        &self,
        active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().unwrap();

        let (sql, params_vec): (&str, Vec<Box<dyn rusqlite::ToSql>>) = match active {
            Some(a) => (
                "SELECT id, name, url, events, secret, active, created_at, updated_at
                 FROM webhook_subscriptions WHERE active = ?1
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                vec![Box::new(a), Box::new(limit), Box::new(offset)],
            ),
            None => (
                "SELECT id, name, url, events, secret, active, created_at, updated_at
                 FROM webhook_subscriptions
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                vec![Box::new(limit), Box::new(offset)],
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let subs = stmt.query_map(params_refs.as_slice(), map_subscription_row)?;
        subs.collect::<Result<Vec<_>, _>>()
            .context("Failed to list subscriptions")
    }

    /// Count subscriptions, optionally filtered by active flag
    pub fn count_subscriptions(&self, active: Option<bool>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = match active {
            Some(a) => conn.query_row(
                "SELECT COUNT(*) FROM webhook_subscriptions WHERE active = ?1",
                params![a],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM webhook_subscriptions", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count)
    }

    /// Overwrite a subscription's mutable fields
    pub fn update_subscription(&self, sub: &Subscription) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE webhook_subscriptions
             SET name = ?1, url = ?2, events = ?3, secret = ?4, active = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                sub.name,
                sub.url,
                serde_json::to_string(&sub.events)?,
                sub.secret,
                sub.active,
                sub.updated_at,
                sub.id,
            ],
        )?;
        Ok(count > 0)
    }

    /// Delete a subscription; historical deliveries are left intact
    pub fn delete_subscription(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM webhook_subscriptions WHERE id = ?1",
            params![id],
        )?;
        Ok(count > 0)
    }

    /// Find active subscriptions whose event set contains the given event.
    /// Runs on every event emission; filtered on the active index, event
    /// membership checked via json_each over the stored array.
    pub fn find_active_subscriptions_by_event(&self, event: &str) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.url, s.events, s.secret, s.active, s.created_at, s.updated_at
             FROM webhook_subscriptions s
             WHERE s.active = 1
               AND EXISTS (SELECT 1 FROM json_each(s.events) WHERE json_each.value = ?1)",
        )?;

        let subs = stmt.query_map(params![event], map_subscription_row)?;
        subs.collect::<Result<Vec<_>, _>>()
            .context("Failed to find subscriptions by event")
    }

    // ==================== Delivery Operations ====================

    /// Insert a new delivery record
    pub fn create_delivery(&self, delivery: &Delivery) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO webhook_deliveries (id, subscription_id, event, payload, url, secret,
                                            status, attempt, max_attempts, status_code,
                                            response_body, error_message, created_at,
                                            delivered_at, next_retry_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                delivery.id,
                delivery.subscription_id,
                delivery.event,
                serde_json::to_string(&delivery.payload)?,
                delivery.url,
                delivery.secret,
                delivery.status.as_str(),
                delivery.attempt,
                delivery.max_attempts,
                delivery.status_code,
                delivery.response_body,
                delivery.error_message,
                delivery.created_at,
                delivery.delivered_at,
                delivery.next_retry_at,
            ],
        )?;
        Ok(())
    }

    /// Get a delivery by ID
    pub fn get_delivery(&self, id: &str) -> Result<Option<Delivery>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = ?1"
        ))?;

        stmt.query_row(params![id], map_delivery_row)
            .optional()
            .context("Failed to get delivery")
    }

    /// Apply a status transition in a single atomic update
    #[allow(clippy::too_many_arguments)]
    pub fn update_delivery_status(
        &self,
        id: &str,
        status: DeliveryStatus,
        status_code: Option<i64>,
        response_body: Option<&str>,
        error_message: Option<&str>,
        delivered_at: Option<i64>,
        next_retry_at: Option<i64>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE webhook_deliveries
             SET status = ?1, status_code = ?2, response_body = ?3, error_message = ?4,
                 delivered_at = ?5, next_retry_at = ?6
             WHERE id = ?7",
            params![
                status.as_str(),
                status_code,
                response_body,
                error_message,
                delivered_at,
                next_retry_at,
                id,
            ],
        )?;
        Ok(count > 0)
    }

    /// Increment the attempt counter
    pub fn increment_delivery_attempt(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE webhook_deliveries SET attempt = attempt + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(count > 0)
    }

    /// Record a failed attempt and schedule the next one: bumps the attempt
    /// counter and leaves status pending, in one update
    pub fn schedule_delivery_retry(
        &self,
        id: &str,
        error_message: &str,
        status_code: Option<i64>,
        response_body: Option<&str>,
        next_retry_at: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE webhook_deliveries
             SET attempt = attempt + 1, status = 'pending', error_message = ?1,
                 status_code = ?2, response_body = ?3, next_retry_at = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![error_message, status_code, response_body, next_retry_at, id],
        )?;
        Ok(count > 0)
    }

    /// List deliveries with optional filters, newest first
    pub fn list_deliveries(
        &self,
        subscription_id: Option<&str>,
        status: Option<DeliveryStatus>,
        event: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Delivery>> {
        let conn = self.conn.lock().unwrap();

        let (clause, mut params_vec) = delivery_filter_clause(subscription_id, status, event);
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let sql = format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries{clause}
             ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            params_vec.len() - 1,
            params_vec.len(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let deliveries = stmt.query_map(params_refs.as_slice(), map_delivery_row)?;
        deliveries
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list deliveries")
    }

    /// Count deliveries matching the same filters as list_deliveries
    pub fn count_deliveries(
        &self,
        subscription_id: Option<&str>,
        status: Option<DeliveryStatus>,
        event: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();

        let (clause, params_vec) = delivery_filter_clause(subscription_id, status, event);
        let sql = format!("SELECT COUNT(*) FROM webhook_deliveries{clause}");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let count = stmt.query_row(params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent deliveries for a subscription
    pub fn recent_deliveries(&self, subscription_id: &str, limit: i64) -> Result<Vec<Delivery>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries
             WHERE subscription_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;

        let deliveries = stmt.query_map(params![subscription_id, limit], map_delivery_row)?;
        deliveries
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to get recent deliveries")
    }

    /// Pending deliveries whose scheduled retry time has arrived.
    /// Terminal deliveries never match; the attempt guard keeps a record from
    /// being retried past its budget even if a transition was lost.
    pub fn deliveries_due_for_retry(&self, now: i64) -> Result<Vec<Delivery>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries
             WHERE status = 'pending'
               AND next_retry_at IS NOT NULL
               AND next_retry_at <= ?1
               AND attempt <= max_attempts
             ORDER BY next_retry_at ASC"
        ))?;

        let deliveries = stmt.query_map(params![now], map_delivery_row)?;
        deliveries
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to find deliveries due for retry")
    }

    /// Aggregate delivery counters: (total, pending, success, failed)
    pub fn delivery_counts(&self, subscription_id: Option<&str>) -> Result<(i64, i64, i64, i64)> {
        let conn = self.conn.lock().unwrap();

        let sql_counts = "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
             FROM webhook_deliveries";

        let row_mapper = |row: &Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        };

        let counts = match subscription_id {
            Some(sid) => conn.query_row(
                &format!("{sql_counts} WHERE subscription_id = ?1"),
                params![sid],
                row_mapper,
            )?,
            None => conn.query_row(sql_counts, [], row_mapper)?,
        };
        Ok(counts)
    }

    /// Hard-delete deliveries created before the cutoff timestamp
    pub fn purge_deliveries_before(&self, cutoff: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM webhook_deliveries WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(count)
    }
}

const DELIVERY_COLUMNS: &str = "id, subscription_id, event, payload, url, secret, status, \
     attempt, max_attempts, status_code, response_body, error_message, created_at, \
     delivered_at, next_retry_at";

fn map_subscription_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        events: serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        secret: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_delivery_row(row: &Row<'_>) -> rusqlite::Result<Delivery> {
    Ok(Delivery {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        event: row.get(2)?,
        payload: serde_json::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(serde_json::Value::Null),
        url: row.get(4)?,
        secret: row.get(5)?,
        status: DeliveryStatus::parse(&row.get::<_, String>(6)?).unwrap_or_default(),
        attempt: row.get(7)?,
        max_attempts: row.get(8)?,
        status_code: row.get(9)?,
        response_body: row.get(10)?,
        error_message: row.get(11)?,
        created_at: row.get(12)?,
        delivered_at: row.get(13)?,
        next_retry_at: row.get(14)?,
    })
}

/// Build a WHERE clause and parameter list for delivery filters
fn delivery_filter_clause(
    subscription_id: Option<&str>,
    status: Option<DeliveryStatus>,
    event: Option<&str>,
) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(sid) = subscription_id {
        params_vec.push(Box::new(sid.to_string()));
        conditions.push(format!("subscription_id = ?{}", params_vec.len()));
    }
    if let Some(s) = status {
        params_vec.push(Box::new(s.as_str().to_string()));
        conditions.push(format!("status = ?{}", params_vec.len()));
    }
    if let Some(e) = event {
        params_vec.push(Box::new(e.to_string()));
        conditions.push(format!("event = ?{}", params_vec.len()));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, params_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_subscription(events: &[&str]) -> Subscription {
        let now = Utc::now().timestamp();
        Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            name: "test-hook".to_string(),
            url: "https://example.com/hook".to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            secret: crate::crypto::generate_secret(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_delivery(sub: &Subscription, event: &str) -> Delivery {
        Delivery {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id: sub.id.clone(),
            event: event.to_string(),
            payload: serde_json::json!({"id": "p1"}),
            url: sub.url.clone(),
            secret: sub.secret.clone(),
            status: DeliveryStatus::Pending,
            attempt: 1,
            max_attempts: 3,
            status_code: None,
            response_body: None,
            error_message: None,
            created_at: Utc::now().timestamp(),
            delivered_at: None,
            next_retry_at: None,
        }
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hookd.db");

        let sub = test_subscription(&["patient.created"]);
        {
            let db = Database::open(&path).unwrap();
            db.create_subscription(&sub).unwrap();
        }

        // Migrations are idempotent on reopen
        let db = Database::open(&path).unwrap();
        let retrieved = db.get_subscription(&sub.id).unwrap().unwrap();
        assert_eq!(retrieved.secret, sub.secret);
    }

    #[test]
    fn test_create_and_get_subscription() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);

        db.create_subscription(&sub).unwrap();

        let retrieved = db.get_subscription(&sub.id).unwrap().unwrap();
        assert_eq!(retrieved.url, sub.url);
        assert_eq!(retrieved.events, sub.events);
        assert_eq!(retrieved.secret, sub.secret);
    }

    #[test]
    fn test_delete_subscription_leaves_deliveries() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);
        db.create_subscription(&sub).unwrap();
        let delivery = test_delivery(&sub, "patient.created");
        db.create_delivery(&delivery).unwrap();

        assert!(db.delete_subscription(&sub.id).unwrap());
        assert!(db.get_subscription(&sub.id).unwrap().is_none());
        // Orphaned but retained for audit
        assert!(db.get_delivery(&delivery.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_subscription_returns_false() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.delete_subscription("nope").unwrap());
    }

    #[test]
    fn test_find_active_by_event() {
        let db = Database::open_in_memory().unwrap();

        let matching = test_subscription(&["patient.created", "patient.updated"]);
        let wrong_event = test_subscription(&["invoice.paid"]);
        let mut inactive = test_subscription(&["patient.created"]);
        inactive.active = false;

        db.create_subscription(&matching).unwrap();
        db.create_subscription(&wrong_event).unwrap();
        db.create_subscription(&inactive).unwrap();

        let found = db
            .find_active_subscriptions_by_event("patient.created")
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, matching.id);
    }

    #[test]
    fn test_list_subscriptions_filtered() {
        let db = Database::open_in_memory().unwrap();
        let active = test_subscription(&["a"]);
        let mut inactive = test_subscription(&["b"]);
        inactive.active = false;
        db.create_subscription(&active).unwrap();
        db.create_subscription(&inactive).unwrap();

        assert_eq!(db.list_subscriptions(None, 10, 0).unwrap().len(), 2);
        let only_active = db.list_subscriptions(Some(true), 10, 0).unwrap();
        assert_eq!(only_active.len(), 1);
        assert_eq!(only_active[0].id, active.id);
        assert_eq!(db.count_subscriptions(Some(false)).unwrap(), 1);
    }

    #[test]
    fn test_delivery_status_transitions() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);
        db.create_subscription(&sub).unwrap();
        let delivery = test_delivery(&sub, "patient.created");
        db.create_delivery(&delivery).unwrap();

        let now = Utc::now().timestamp();
        assert!(db
            .update_delivery_status(
                &delivery.id,
                DeliveryStatus::Success,
                Some(200),
                Some("ok"),
                None,
                Some(now),
                None,
            )
            .unwrap());

        let updated = db.get_delivery(&delivery.id).unwrap().unwrap();
        assert_eq!(updated.status, DeliveryStatus::Success);
        assert_eq!(updated.status_code, Some(200));
        assert_eq!(updated.delivered_at, Some(now));
    }

    #[test]
    fn test_schedule_retry_increments_attempt() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);
        db.create_subscription(&sub).unwrap();
        let delivery = test_delivery(&sub, "patient.created");
        db.create_delivery(&delivery).unwrap();

        let retry_at = Utc::now().timestamp() + 60;
        assert!(db
            .schedule_delivery_retry(&delivery.id, "HTTP 500", Some(500), None, retry_at)
            .unwrap());

        let updated = db.get_delivery(&delivery.id).unwrap().unwrap();
        assert_eq!(updated.attempt, 2);
        assert_eq!(updated.status, DeliveryStatus::Pending);
        assert_eq!(updated.next_retry_at, Some(retry_at));
    }

    #[test]
    fn test_schedule_retry_skips_terminal_delivery() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);
        db.create_subscription(&sub).unwrap();
        let delivery = test_delivery(&sub, "patient.created");
        db.create_delivery(&delivery).unwrap();

        db.update_delivery_status(
            &delivery.id,
            DeliveryStatus::Failed,
            None,
            None,
            Some("exhausted"),
            None,
            None,
        )
        .unwrap();

        // Terminal records are immutable via the retry path
        assert!(!db
            .schedule_delivery_retry(&delivery.id, "late", None, None, 0)
            .unwrap());
    }

    #[test]
    fn test_deliveries_due_for_retry() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["patient.created"]);
        db.create_subscription(&sub).unwrap();

        let now = Utc::now().timestamp();

        let mut due = test_delivery(&sub, "patient.created");
        due.next_retry_at = Some(now - 10);
        db.create_delivery(&due).unwrap();

        let mut future = test_delivery(&sub, "patient.created");
        future.next_retry_at = Some(now + 600);
        db.create_delivery(&future).unwrap();

        let mut terminal = test_delivery(&sub, "patient.created");
        terminal.next_retry_at = Some(now - 10);
        db.create_delivery(&terminal).unwrap();
        db.update_delivery_status(
            &terminal.id,
            DeliveryStatus::Failed,
            None,
            None,
            Some("exhausted"),
            None,
            Some(now - 10),
        )
        .unwrap();

        let found = db.deliveries_due_for_retry(now).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[test]
    fn test_delivery_counts() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["e"]);
        db.create_subscription(&sub).unwrap();

        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Success,
            DeliveryStatus::Success,
            DeliveryStatus::Failed,
        ] {
            let d = test_delivery(&sub, "e");
            db.create_delivery(&d).unwrap();
            if status != DeliveryStatus::Pending {
                db.update_delivery_status(&d.id, status, None, None, None, None, None)
                    .unwrap();
            }
        }

        let (total, pending, success, failed) = db.delivery_counts(Some(&sub.id)).unwrap();
        assert_eq!((total, pending, success, failed), (4, 1, 2, 1));

        let (total, ..) = db.delivery_counts(None).unwrap();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_purge_deliveries_before() {
        let db = Database::open_in_memory().unwrap();
        let sub = test_subscription(&["e"]);
        db.create_subscription(&sub).unwrap();

        let now = Utc::now().timestamp();
        let mut old = test_delivery(&sub, "e");
        old.created_at = now - 40 * 86400;
        db.create_delivery(&old).unwrap();

        let fresh = test_delivery(&sub, "e");
        db.create_delivery(&fresh).unwrap();

        let deleted = db.purge_deliveries_before(now - 30 * 86400).unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_delivery(&old.id).unwrap().is_none());
        assert!(db.get_delivery(&fresh.id).unwrap().is_some());
    }

    #[test]
    fn test_list_deliveries_filters_and_order() {
        let db = Database::open_in_memory().unwrap();
        let sub_a = test_subscription(&["e1"]);
        let sub_b = test_subscription(&["e2"]);
        db.create_subscription(&sub_a).unwrap();
        db.create_subscription(&sub_b).unwrap();

        let now = Utc::now().timestamp();
        let mut older = test_delivery(&sub_a, "e1");
        older.created_at = now - 100;
        db.create_delivery(&older).unwrap();
        let newer = test_delivery(&sub_a, "e1");
        db.create_delivery(&newer).unwrap();
        db.create_delivery(&test_delivery(&sub_b, "e2")).unwrap();

        let all = db.list_deliveries(None, None, None, 10, 0).unwrap();
        assert_eq!(all.len(), 3);

        let for_a = db
            .list_deliveries(Some(&sub_a.id), None, None, 10, 0)
            .unwrap();
        assert_eq!(for_a.len(), 2);
        // Newest first
        assert_eq!(for_a[0].id, newer.id);

        let by_event = db.list_deliveries(None, None, Some("e2"), 10, 0).unwrap();
        assert_eq!(by_event.len(), 1);

        let pending = db
            .list_deliveries(None, Some(DeliveryStatus::Pending), None, 10, 0)
            .unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(
            db.count_deliveries(Some(&sub_a.id), None, None).unwrap(),
            2
        );
    }
}
