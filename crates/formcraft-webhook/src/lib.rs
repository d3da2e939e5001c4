//! Outbound webhook delivery for FormCraft
//!
//! This crate notifies externally registered HTTP endpoints when a domain
//! event occurs (e.g. a form submission):
//! - Event fan-out to every enabled, scope-matching registration
//! - Generic JSON, user-templated, and platform-native (Discord, Slack) payloads
//! - HMAC-SHA256 signing of generic deliveries
//! - Bounded exponential retry per destination
//! - An append-only delivery log that doubles as the resend mechanism
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use formcraft_core::{FormId, WebhookConfig};
//! use formcraft_webhook::{
//!     EventPayload, EventType, InMemoryDeliveryLog, InMemoryFormSchemas,
//!     InMemoryWebhookRegistry, Scope, WebhookNotifier, WebhookRegistration,
//! };
//!
//! // Wire up the notifier against the external stores
//! let registry = Arc::new(InMemoryWebhookRegistry::new());
//! let log = Arc::new(InMemoryDeliveryLog::new());
//! let schemas = Arc::new(InMemoryFormSchemas::new());
//! let notifier = WebhookNotifier::new(
//!     registry.clone(),
//!     log,
//!     schemas,
//!     WebhookConfig::default(),
//! );
//!
//! // Register an endpoint
//! let form_id = FormId::new();
//! let registration = WebhookRegistration::new(
//!     "https://example.com/hooks/forms",
//!     Scope::Form(form_id.clone()),
//! )
//! .with_events(vec![EventType::FormSubmitted])
//! .with_secret("s3cr3t");
//! registry.insert(registration);
//!
//! // Fire an event; delivery and retries run in the background
//! let payload = EventPayload::new().with_form(form_id);
//! notifier.dispatch(EventType::FormSubmitted, payload).await;
//! ```

pub mod delivery;
pub mod events;
pub mod format;
pub mod outbound;
pub mod registry;
pub mod retry;
pub mod signature;

pub use delivery::*;
pub use events::*;
pub use format::*;
pub use outbound::*;
pub use registry::*;
pub use retry::*;
pub use signature::*;

use thiserror::Error;

/// Webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook not found: {0}")]
    NotFound(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Delivery log not found: {0}")]
    LogNotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;
