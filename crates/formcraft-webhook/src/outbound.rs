//! Outbound webhook delivery
//!
//! The notifier fans a domain event out to every matching registration,
//! runs each destination's delivery chain as an independent task, and
//! appends one log record per physical attempt. Dispatch is fire-and-forget;
//! only the manual resend/test paths return their outcome to the caller.

use crate::{
    delivery::{truncate_body, DeliveryLog, DeliveryRecord, DeliveryStatus},
    events::{humanize_with, DeliveryTrigger, EventPayload, EventType, FormSchemas},
    format::{format_payload, headers_for, FormattedPayload, PayloadKind},
    registry::{HttpMethod, WebhookRegistration, WebhookRegistry},
    retry::RetryPolicy,
    signature::{sign_payload, SIGNATURE_HEADER},
    Result, WebhookError,
};
use chrono::Utc;
use formcraft_core::{DeliveryId, WebhookConfig, WebhookId};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Normalized outcome of one HTTP attempt
///
/// A non-2xx response is still a response; only connection-level failures
/// become `TransportError`. Nothing crosses this boundary as a panic or a
/// reqwest error.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Response { status: u16, body: Option<String> },
    TransportError(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Response { status, .. } if (200..300).contains(status))
    }

    pub fn response_status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::TransportError(_) => None,
        }
    }

    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Response { body, .. } => body.as_deref(),
            Self::TransportError(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Response { .. } => None,
            Self::TransportError(error) => Some(error),
        }
    }
}

/// Outbound webhook notifier
///
/// Owned by the process and passed by handle to call sites; holds the HTTP
/// client and the seams to the external registration and log stores.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    registry: Arc<dyn WebhookRegistry>,
    log: Arc<dyn DeliveryLog>,
    schemas: Arc<dyn FormSchemas>,
    retry: RetryPolicy,
    config: WebhookConfig,
}

impl WebhookNotifier {
    /// Create a new notifier
    pub fn new(
        registry: Arc<dyn WebhookRegistry>,
        log: Arc<dyn DeliveryLog>,
        schemas: Arc<dyn FormSchemas>,
        config: WebhookConfig,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            registry,
            log,
            schemas,
            retry: RetryPolicy::from_config(&config),
            config,
        }
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Dispatch an event to all matching registrations
    ///
    /// Fire-and-forget: delivery chains run as detached tasks and nothing
    /// surfaces back to the event producer. Zero matching registrations is
    /// a no-op.
    pub async fn dispatch(&self, event: EventType, payload: EventPayload) {
        let registrations = match self.registry.list().await {
            Ok(registrations) => registrations,
            Err(err) => {
                error!(event = %event, error = %err, "Failed to list webhook registrations");
                return;
            }
        };

        let matching: Vec<_> = registrations
            .into_iter()
            .filter(|r| r.matches(event, &payload))
            .collect();
        if matching.is_empty() {
            debug!(event = %event, "No matching webhook registrations");
            return;
        }

        let payload = humanize_with(self.schemas.as_ref(), event, payload).await;

        info!(
            event = %event,
            registrations = matching.len(),
            "Dispatching webhook event"
        );

        for registration in matching {
            let notifier = self.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                notifier
                    .deliver_with_retries(registration, DeliveryTrigger::Event(event), payload)
                    .await;
            });
        }
    }

    /// Replay a previously logged delivery body, once
    ///
    /// The logged `request_payload` is sent byte-for-byte; only headers and
    /// the signature are re-derived from the live registration. No retry
    /// chain; the outcome is returned synchronously.
    pub async fn resend(
        &self,
        webhook_id: &WebhookId,
        log_id: &DeliveryId,
    ) -> Result<DeliveryRecord> {
        let registration = self
            .registry
            .get(webhook_id)
            .await?
            .ok_or_else(|| WebhookError::NotFound(webhook_id.to_string()))?;
        let original = self
            .log
            .get(log_id)
            .await?
            .filter(|record| record.webhook_id == registration.id)
            .ok_or_else(|| WebhookError::LogNotFound(log_id.to_string()))?;

        let kind = PayloadKind::for_registration(&registration);
        let mut headers = headers_for(&registration, kind);
        if kind.is_signable() {
            if let Some(secret) = &registration.secret {
                let signature = sign_payload(original.request_payload.as_bytes(), secret);
                headers.push((SIGNATURE_HEADER.to_string(), signature));
            }
        }
        let prepared = FormattedPayload {
            kind,
            body: original.request_payload.clone(),
            headers,
        };

        info!(webhook_id = %registration.id, log_id = %log_id, "Resending logged delivery");
        let outcome = self.execute(&registration, &prepared).await;
        let record = self
            .record(
                &registration,
                DeliveryTrigger::Resend,
                prepared.body,
                original.attempt + 1,
                &outcome,
            )
            .await;
        Ok(record)
    }

    /// Deliver a synthetic payload to one registration, once
    ///
    /// The sample defaults to a payload naming the registration and the
    /// current time. The normal formatting rules apply, platform detection
    /// included; the outcome is returned synchronously.
    pub async fn test(
        &self,
        webhook_id: &WebhookId,
        sample: Option<EventPayload>,
    ) -> Result<DeliveryRecord> {
        let registration = self
            .registry
            .get(webhook_id)
            .await?
            .ok_or_else(|| WebhookError::NotFound(webhook_id.to_string()))?;

        let payload = sample.unwrap_or_else(|| {
            EventPayload::new()
                .with_data(
                    "message",
                    json!(format!("Test delivery for webhook {}", registration.id)),
                )
                .with_data("webhookId", json!(registration.id))
                .with_data("timestamp", json!(Utc::now().to_rfc3339()))
        });

        info!(webhook_id = %registration.id, "Sending test delivery");
        let prepared = self.prepare(&registration, DeliveryTrigger::Test, &payload);
        let outcome = self.execute(&registration, &prepared).await;
        let record = self
            .record(&registration, DeliveryTrigger::Test, prepared.body, 0, &outcome)
            .await;
        Ok(record)
    }

    /// Run one registration's delivery chain to success or exhaustion
    async fn deliver_with_retries(
        &self,
        registration: WebhookRegistration,
        trigger: DeliveryTrigger,
        payload: EventPayload,
    ) {
        for attempt in 0..self.retry.max_attempts.max(1) {
            if attempt > 0 {
                let delay = self.retry.delay_after(attempt - 1);
                debug!(
                    webhook_id = %registration.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before retry"
                );
                tokio::time::sleep(delay).await;
            }

            // The body is re-derived from the canonical payload on every
            // attempt, not replayed from the previous one.
            let prepared = self.prepare(&registration, trigger, &payload);
            let outcome = self.execute(&registration, &prepared).await;
            let success = outcome.is_success();
            self.record(&registration, trigger, prepared.body, attempt, &outcome)
                .await;

            if success {
                info!(webhook_id = %registration.id, attempt, "Webhook delivered");
                return;
            }

            warn!(
                webhook_id = %registration.id,
                url = %registration.url,
                attempt,
                status = ?outcome.response_status(),
                "Webhook delivery attempt failed"
            );
        }

        error!(
            webhook_id = %registration.id,
            attempts = self.retry.max_attempts,
            "Webhook delivery failed after all retries"
        );
    }

    /// Format the wire body and attach the signature when applicable
    fn prepare(
        &self,
        registration: &WebhookRegistration,
        trigger: DeliveryTrigger,
        payload: &EventPayload,
    ) -> FormattedPayload {
        let mut formatted = format_payload(registration, trigger.as_str(), payload);
        if formatted.kind.is_signable() {
            if let Some(secret) = &registration.secret {
                let signature = sign_payload(formatted.body.as_bytes(), secret);
                formatted
                    .headers
                    .push((SIGNATURE_HEADER.to_string(), signature));
            }
        }
        formatted
    }

    /// Perform one HTTP attempt and normalize the outcome
    async fn execute(
        &self,
        registration: &WebhookRegistration,
        prepared: &FormattedPayload,
    ) -> AttemptOutcome {
        let mut request = self
            .client
            .request(request_method(registration.method), &registration.url);
        for (name, value) in &prepared.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.body(prepared.body.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.ok();
                AttemptOutcome::Response { status, body }
            }
            Err(err) => AttemptOutcome::TransportError(err.to_string()),
        }
    }

    /// Append one immutable log record for a completed attempt
    async fn record(
        &self,
        registration: &WebhookRegistration,
        trigger: DeliveryTrigger,
        request_payload: String,
        attempt: u32,
        outcome: &AttemptOutcome,
    ) -> DeliveryRecord {
        let record = DeliveryRecord {
            id: DeliveryId::new(),
            webhook_id: registration.id.clone(),
            event: trigger.as_str().to_string(),
            status: if outcome.is_success() {
                DeliveryStatus::Success
            } else {
                DeliveryStatus::Failed
            },
            request_payload,
            response_status: outcome.response_status(),
            response_body: outcome
                .response_body()
                .map(|body| truncate_body(body.to_string(), self.config.response_body_limit)),
            error: outcome.error().map(str::to_string),
            timestamp: Utc::now(),
            attempt,
        };

        if let Err(err) = self.log.append(record.clone()).await {
            warn!(webhook_id = %registration.id, error = %err, "Failed to append delivery record");
        }

        record
    }
}

fn request_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
