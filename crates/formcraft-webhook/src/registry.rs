//! Webhook registrations
//!
//! Registrations are owned by the external configuration store; this
//! subsystem only reads them during dispatch. The in-memory registry stands
//! in for that store in tests and single-process deployments.

use crate::{
    events::{EventPayload, EventType},
    Result, WebhookError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use formcraft_core::{AccountId, FormId, WebhookId};
use serde::{Deserialize, Serialize};

/// HTTP verb used for a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        Self::Post
    }
}

/// Dispatch visibility scope of a registration
///
/// Exactly one of a form or an account; a registration only sees events
/// whose payload carries the matching identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Form(FormId),
    Account(AccountId),
}

impl Scope {
    pub fn matches(&self, payload: &EventPayload) -> bool {
        match self {
            Self::Form(form_id) => payload.form_id.as_ref() == Some(form_id),
            Self::Account(account_id) => payload.account_id.as_ref() == Some(account_id),
        }
    }
}

/// Webhook registration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRegistration {
    /// Registration ID
    pub id: WebhookId,
    /// Target URL
    pub url: String,
    /// HTTP verb to use
    pub method: HttpMethod,
    /// Events to react to (never empty on a valid registration)
    pub events: Vec<EventType>,
    /// Additional headers sent verbatim
    pub headers: Vec<(String, String)>,
    /// Secret for signing generic deliveries
    pub secret: Option<String>,
    /// Template overriding the default JSON envelope
    pub payload_template: Option<String>,
    /// Form or account visibility scope
    pub scope: Scope,
    /// Whether the registration is dispatched to
    pub enabled: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated
    pub updated_at: DateTime<Utc>,
}

impl WebhookRegistration {
    /// Create a new registration
    pub fn new(url: &str, scope: Scope) -> Self {
        let now = Utc::now();
        Self {
            id: WebhookId::new(),
            url: url.to_string(),
            method: HttpMethod::default(),
            events: Vec::new(),
            headers: Vec::new(),
            secret: None,
            payload_template: None,
            scope,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_events(mut self, events: Vec<EventType>) -> Self {
        self.events = events;
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = Some(secret.to_string());
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.payload_template = Some(template.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check if the registration subscribes to an event type
    pub fn subscribes_to(&self, event: &EventType) -> bool {
        self.events.contains(event)
    }

    /// Dispatch predicate: enabled, subscribed, and scope-matching
    pub fn matches(&self, event: EventType, payload: &EventPayload) -> bool {
        self.enabled && self.subscribes_to(&event) && self.scope.matches(payload)
    }

    /// Validate the registration invariants
    pub fn validate(&self) -> Result<()> {
        if self.events.is_empty() {
            return Err(WebhookError::InvalidRegistration(
                "events must not be empty".to_string(),
            ));
        }

        let parsed = url::Url::parse(&self.url).map_err(|e| {
            WebhookError::InvalidRegistration(format!("invalid url {}: {}", self.url, e))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(WebhookError::InvalidRegistration(format!(
                "unsupported url scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(())
    }
}

/// Read access to webhook registrations during dispatch
#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    /// Get a registration by ID
    async fn get(&self, id: &WebhookId) -> Result<Option<WebhookRegistration>>;

    /// List all registrations
    async fn list(&self) -> Result<Vec<WebhookRegistration>>;
}

/// In-memory webhook registry
///
/// Mutation lives outside the dispatch seam, so `insert`/`remove` are
/// inherent methods rather than part of the read trait.
pub struct InMemoryWebhookRegistry {
    registrations: DashMap<WebhookId, WebhookRegistration>,
}

impl InMemoryWebhookRegistry {
    pub fn new() -> Self {
        Self {
            registrations: DashMap::new(),
        }
    }

    pub fn insert(&self, registration: WebhookRegistration) {
        self.registrations
            .insert(registration.id.clone(), registration);
    }

    pub fn remove(&self, id: &WebhookId) {
        self.registrations.remove(id);
    }
}

impl Default for InMemoryWebhookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookRegistry for InMemoryWebhookRegistry {
    async fn get(&self, id: &WebhookId) -> Result<Option<WebhookRegistration>> {
        Ok(self.registrations.get(id).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<WebhookRegistration>> {
        Ok(self.registrations.iter().map(|r| r.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_creation() {
        let form_id = FormId::from("f1");
        let registration =
            WebhookRegistration::new("https://example.com/hook", Scope::Form(form_id.clone()))
                .with_events(vec![EventType::FormSubmitted])
                .with_secret("secret123");

        assert!(registration.enabled);
        assert_eq!(registration.method, HttpMethod::Post);
        assert_eq!(registration.scope, Scope::Form(form_id));
        assert!(registration.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_events() {
        let registration =
            WebhookRegistration::new("https://example.com/hook", Scope::Form(FormId::new()));
        assert!(matches!(
            registration.validate(),
            Err(WebhookError::InvalidRegistration(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let relative = WebhookRegistration::new("/hooks/local", Scope::Form(FormId::new()))
            .with_events(vec![EventType::FormSubmitted]);
        assert!(relative.validate().is_err());

        let ftp = WebhookRegistration::new("ftp://example.com/hook", Scope::Form(FormId::new()))
            .with_events(vec![EventType::FormSubmitted]);
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn test_matching_requires_scope_and_subscription() {
        let form_id = FormId::from("f1");
        let registration =
            WebhookRegistration::new("https://example.com/hook", Scope::Form(form_id.clone()))
                .with_events(vec![EventType::FormSubmitted]);

        let matching = EventPayload::new().with_form(form_id.clone());
        let other_form = EventPayload::new().with_form(FormId::from("f2"));
        let unscoped = EventPayload::new();

        assert!(registration.matches(EventType::FormSubmitted, &matching));
        assert!(!registration.matches(EventType::FormDeleted, &matching));
        assert!(!registration.matches(EventType::FormSubmitted, &other_form));
        assert!(!registration.matches(EventType::FormSubmitted, &unscoped));
    }

    #[test]
    fn test_account_scope_matching() {
        let account_id = AccountId::from("acct-1");
        let registration = WebhookRegistration::new(
            "https://example.com/hook",
            Scope::Account(account_id.clone()),
        )
        .with_events(vec![EventType::FormCreated]);

        let by_account = EventPayload::new().with_account(account_id);
        let by_form_only = EventPayload::new().with_form(FormId::from("f1"));

        assert!(registration.matches(EventType::FormCreated, &by_account));
        assert!(!registration.matches(EventType::FormCreated, &by_form_only));
    }

    #[test]
    fn test_disabled_never_matches() {
        let form_id = FormId::from("f1");
        let registration =
            WebhookRegistration::new("https://example.com/hook", Scope::Form(form_id.clone()))
                .with_events(vec![EventType::FormSubmitted])
                .disabled();

        let payload = EventPayload::new().with_form(form_id);
        assert!(!registration.matches(EventType::FormSubmitted, &payload));
    }

    #[tokio::test]
    async fn test_in_memory_registry() {
        let registry = InMemoryWebhookRegistry::new();
        let registration =
            WebhookRegistration::new("https://example.com/hook", Scope::Form(FormId::new()))
                .with_events(vec![EventType::FormSubmitted]);
        let id = registration.id.clone();

        registry.insert(registration);
        assert!(registry.get(&id).await.unwrap().is_some());
        assert_eq!(registry.list().await.unwrap().len(), 1);

        registry.remove(&id);
        assert!(registry.get(&id).await.unwrap().is_none());
    }
}
