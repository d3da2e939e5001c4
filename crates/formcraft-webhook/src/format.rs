//! Payload formatting
//!
//! Converts a canonical event payload into the wire body for one
//! destination. The destination URL decides the dialect: generic JSON
//! envelope, user-supplied template, or a platform-native message for the
//! recognized chat-ops platforms. Platform detection always wins over a
//! configured template.

use crate::{
    events::EventPayload,
    registry::WebhookRegistration,
};
use chrono::Utc;
use serde_json::{json, Value};

/// Well-known inbound-webhook URL prefixes
pub const DISCORD_WEBHOOK_PREFIXES: [&str; 2] = [
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
];
pub const SLACK_WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";

/// Embed accent color used for Discord messages
const DISCORD_EMBED_COLOR: u32 = 5_814_783;

// Discord rejects embeds with more than 25 fields.
const DISCORD_MAX_FIELDS: usize = 25;

/// The closed set of payload dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Default JSON envelope `{event, ...payload}`
    Generic,
    /// User template rendered against the envelope
    Templated,
    /// Discord embed message
    Discord,
    /// Slack attachment message
    Slack,
}

impl PayloadKind {
    /// Classify a destination from its URL and template presence
    pub fn classify(url: &str, has_template: bool) -> Self {
        if DISCORD_WEBHOOK_PREFIXES.iter().any(|p| url.starts_with(p)) {
            return Self::Discord;
        }
        if url.starts_with(SLACK_WEBHOOK_PREFIX) {
            return Self::Slack;
        }
        if has_template {
            Self::Templated
        } else {
            Self::Generic
        }
    }

    pub fn for_registration(registration: &WebhookRegistration) -> Self {
        Self::classify(&registration.url, registration.payload_template.is_some())
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, Self::Discord | Self::Slack)
    }

    /// Platform payloads are shaped by the platform and never signed
    pub fn is_signable(&self) -> bool {
        !self.is_platform()
    }
}

/// A formatted wire body plus the headers it must be sent with
#[derive(Debug, Clone)]
pub struct FormattedPayload {
    pub kind: PayloadKind,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

/// Build the wire body and headers for one registration
pub fn format_payload(
    registration: &WebhookRegistration,
    event: &str,
    payload: &EventPayload,
) -> FormattedPayload {
    let kind = PayloadKind::for_registration(registration);
    let body = match kind {
        PayloadKind::Generic => payload.envelope(event).to_string(),
        PayloadKind::Templated => {
            let template = registration.payload_template.as_deref().unwrap_or_default();
            render_template(template, &payload.envelope(event))
        }
        PayloadKind::Discord => discord_message(event, payload).to_string(),
        PayloadKind::Slack => slack_message(event, payload).to_string(),
    };

    FormattedPayload {
        kind,
        body,
        headers: headers_for(registration, kind),
    }
}

/// Headers for a delivery of the given kind
///
/// Platform destinations get only the content type they require; everything
/// else gets the registration's custom headers merged in verbatim.
pub fn headers_for(registration: &WebhookRegistration, kind: PayloadKind) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if !kind.is_platform() {
        for (name, value) in &registration.headers {
            headers.push((name.clone(), value.clone()));
        }
    }
    headers
}

/// Render a `{{path.to.field}}` template against an envelope
///
/// `{{json path}}` serializes the resolved value as JSON instead of its
/// string form. Unresolved paths substitute the empty string; malformed
/// templates degrade to partial text rather than failing the dispatch.
pub fn render_template(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&resolve_token(after[..end].trim(), context));
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: emit the tail verbatim
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

fn resolve_token(token: &str, context: &Value) -> String {
    if let Some(path) = token.strip_prefix("json ") {
        return lookup_path(context, path.trim())
            .map(|v| v.to_string())
            .unwrap_or_default();
    }
    match lookup_path(context, token) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Dotted lookup into a JSON value; array segments may be numeric indexes
fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Stringify a JSON value for display in a platform message field
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| "[Complex Object]".to_string()),
    }
}

fn display_form_name(payload: &EventPayload) -> String {
    if let Some(name) = payload.data.get("formName").and_then(Value::as_str) {
        return name.to_string();
    }
    payload
        .form_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "form".to_string())
}

fn display_submission_id(payload: &EventPayload) -> String {
    payload
        .data
        .get("submissionId")
        .map(stringify_value)
        .unwrap_or_else(|| "-".to_string())
}

/// Field entries for a platform message: the humanized `fields` list when
/// present, otherwise one entry per top-level payload key.
fn field_entries(payload: &EventPayload) -> Vec<(String, String)> {
    if let Some(fields) = payload.data.get("fields").and_then(Value::as_array) {
        return fields
            .iter()
            .map(|field| {
                let label = field
                    .get("label")
                    .and_then(Value::as_str)
                    .unwrap_or("field")
                    .to_string();
                let value = stringify_value(field.get("value").unwrap_or(&Value::Null));
                (label, value)
            })
            .collect();
    }

    payload
        .data
        .iter()
        .map(|(key, value)| (key.clone(), stringify_value(value)))
        .collect()
}

/// Discord embed message
fn discord_message(event: &str, payload: &EventPayload) -> Value {
    let name = display_form_name(payload);
    let form_id = payload
        .form_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let fields: Vec<Value> = field_entries(payload)
        .into_iter()
        .take(DISCORD_MAX_FIELDS)
        .map(|(label, value)| {
            json!({
                "name": label,
                "value": value,
                "inline": true,
            })
        })
        .collect();

    json!({
        "content": format!("New `{}` event for **{}**", event, name),
        "embeds": [
            {
                "title": name,
                "description": format!("Form ID: {}", form_id),
                "color": DISCORD_EMBED_COLOR,
                "timestamp": Utc::now().to_rfc3339(),
                "footer": {
                    "text": format!("Submission ID: {}", display_submission_id(payload)),
                },
                "fields": fields,
            }
        ],
    })
}

/// Slack attachment message
fn slack_message(event: &str, payload: &EventPayload) -> Value {
    let name = display_form_name(payload);

    let fields: Vec<Value> = field_entries(payload)
        .into_iter()
        .map(|(title, value)| {
            json!({
                "title": title,
                "value": value,
                "short": true,
            })
        })
        .collect();

    json!({
        "text": format!("New `{}` event for *{}*", event, name),
        "attachments": [
            {
                "color": "good",
                "fields": fields,
                "footer": format!("Submission ID: {}", display_submission_id(payload)),
                "ts": Utc::now().timestamp(),
            }
        ],
    })
}
