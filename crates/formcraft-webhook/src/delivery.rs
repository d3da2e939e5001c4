//! Delivery log
//!
//! One immutable record per physical HTTP attempt, keyed by the owning
//! registration. A retry appends a new record with an incremented attempt
//! ordinal; nothing ever updates a written record. The log doubles as the
//! replay source for manual resends.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use formcraft_core::{DeliveryId, WebhookId};
use serde::{Deserialize, Serialize};

/// Delivery outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Reserved for attempts tracked before completion; no current code
    /// path writes it.
    Pending,
    /// 2xx response received
    Success,
    /// Non-2xx response or transport failure
    Failed,
}

/// Immutable record of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Record ID
    pub id: DeliveryId,
    /// Owning registration
    pub webhook_id: WebhookId,
    /// Event tag, or the literal `resend`/`test` markers
    pub event: String,
    /// Outcome status
    pub status: DeliveryStatus,
    /// Exact wire body that was sent
    pub request_payload: String,
    /// HTTP status, when a response was received
    pub response_status: Option<u16>,
    /// Response body, truncated at the configured limit
    pub response_body: Option<String>,
    /// Transport or formatting error description
    pub error: Option<String>,
    /// When the attempt completed
    pub timestamp: DateTime<Utc>,
    /// Zero-based ordinal within the retry chain
    pub attempt: u32,
}

impl DeliveryRecord {
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Truncate a response body for logging, respecting char boundaries
pub fn truncate_body(body: String, limit: usize) -> String {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

/// Append-only access to the delivery log
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Append one attempt record
    async fn append(&self, record: DeliveryRecord) -> Result<()>;

    /// Get a record by ID
    async fn get(&self, id: &DeliveryId) -> Result<Option<DeliveryRecord>>;

    /// List records for a registration, newest first
    async fn list_by_webhook(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>>;
}

/// In-memory delivery log
pub struct InMemoryDeliveryLog {
    records: DashMap<DeliveryId, DeliveryRecord>,
    by_webhook: DashMap<WebhookId, Vec<DeliveryId>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_webhook: DashMap::new(),
        }
    }

    /// Total number of records across all registrations
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryDeliveryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn append(&self, record: DeliveryRecord) -> Result<()> {
        let id = record.id.clone();
        let webhook_id = record.webhook_id.clone();

        self.records.insert(id.clone(), record);
        self.by_webhook.entry(webhook_id).or_default().push(id);

        Ok(())
    }

    async fn get(&self, id: &DeliveryId) -> Result<Option<DeliveryRecord>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn list_by_webhook(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>> {
        let ids = self
            .by_webhook
            .get(webhook_id)
            .map(|ids| ids.iter().rev().take(limit).cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let records = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .collect();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(webhook_id: &WebhookId, attempt: u32, status: DeliveryStatus) -> DeliveryRecord {
        DeliveryRecord {
            id: DeliveryId::new(),
            webhook_id: webhook_id.clone(),
            event: "form_submitted".to_string(),
            status,
            request_payload: r#"{"event":"form_submitted"}"#.to_string(),
            response_status: Some(200),
            response_body: None,
            error: None,
            timestamp: Utc::now(),
            attempt,
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let log = InMemoryDeliveryLog::new();
        let webhook_id = WebhookId::new();
        let rec = record(&webhook_id, 0, DeliveryStatus::Success);
        let id = rec.id.clone();

        log.append(rec).await.unwrap();

        let fetched = log.get(&id).await.unwrap().unwrap();
        assert!(fetched.is_success());
        assert_eq!(fetched.attempt, 0);
    }

    #[tokio::test]
    async fn test_list_newest_first_per_webhook() {
        let log = InMemoryDeliveryLog::new();
        let webhook_id = WebhookId::new();
        let other = WebhookId::new();

        for attempt in 0..3 {
            log.append(record(&webhook_id, attempt, DeliveryStatus::Failed))
                .await
                .unwrap();
        }
        log.append(record(&other, 0, DeliveryStatus::Success))
            .await
            .unwrap();

        let records = log.list_by_webhook(&webhook_id, 10).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].attempt, 2);
        assert_eq!(records[2].attempt, 0);

        let limited = log.list_by_webhook(&webhook_id, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short".to_string(), 10), "short");
        assert_eq!(truncate_body("0123456789abc".to_string(), 10), "0123456789");

        // Never splits a multi-byte character
        let s = "héllo".to_string();
        let truncated = truncate_body(s, 2);
        assert_eq!(truncated, "h");
    }
}
