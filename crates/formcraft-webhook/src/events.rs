//! Webhook event types and canonical payloads
//!
//! Defines the closed set of domain events, the ephemeral payload handed to
//! the dispatcher, and the submission-humanization step that pairs raw
//! answers with their schema-declared field metadata.

use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use formcraft_core::{AccountId, FormId, SubmissionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Webhook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FormSubmitted,
    FormCreated,
    FormUpdated,
    FormDeleted,
    SubmissionDeleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormSubmitted => "form_submitted",
            Self::FormCreated => "form_created",
            Self::FormUpdated => "form_updated",
            Self::FormDeleted => "form_deleted",
            Self::SubmissionDeleted => "submission_deleted",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a delivery: a domain event, or one of the manual invokers.
///
/// The delivery log stores the wire tag, so manual paths get the literal
/// `resend`/`test` markers instead of an event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTrigger {
    Event(EventType),
    Resend,
    Test,
}

impl DeliveryTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event(event) => event.as_str(),
            Self::Resend => "resend",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for DeliveryTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical event payload handed to `dispatch`
///
/// Carries the event scope (form and/or account) plus event-specific data.
/// Ephemeral: it is never persisted as its own entity, only the formatted
/// wire bodies derived from it are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<FormId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl EventPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical submission payload as produced by the form-submission pathway
    pub fn submission(
        form_id: FormId,
        form_name: &str,
        submission_id: SubmissionId,
        form_data: Map<String, Value>,
    ) -> Self {
        let mut data = Map::new();
        data.insert("formName".to_string(), json!(form_name));
        data.insert("submissionId".to_string(), json!(submission_id));
        data.insert("formData".to_string(), Value::Object(form_data));

        Self {
            form_id: Some(form_id),
            account_id: None,
            data,
        }
    }

    pub fn with_form(mut self, form_id: FormId) -> Self {
        self.form_id = Some(form_id);
        self
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// The generic wire envelope: `{event: <tag>, ...payload}`
    pub fn envelope(&self, event: &str) -> Value {
        let mut map = Map::new();
        map.insert("event".to_string(), json!(event));
        if let Some(form_id) = &self.form_id {
            map.insert("formId".to_string(), json!(form_id));
        }
        if let Some(account_id) = &self.account_id {
            map.insert("accountId".to_string(), json!(account_id));
        }
        for (key, value) in &self.data {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Raw submitted answers, when this is a submission payload
    pub fn form_data(&self) -> Option<&Map<String, Value>> {
        self.data.get("formData").and_then(Value::as_object)
    }
}

/// Schema metadata for one form field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Schema of a form, as stored by the external form store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: FormId,
    pub name: String,
    pub fields: Vec<FieldMeta>,
}

impl FormSchema {
    pub fn field(&self, field_id: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

/// Read access to form schemas, owned by the external form store
#[async_trait]
pub trait FormSchemas: Send + Sync {
    async fn get(&self, form_id: &FormId) -> Result<Option<FormSchema>>;
}

/// In-memory schema lookup
pub struct InMemoryFormSchemas {
    schemas: DashMap<FormId, FormSchema>,
}

impl InMemoryFormSchemas {
    pub fn new() -> Self {
        Self {
            schemas: DashMap::new(),
        }
    }

    pub fn insert(&self, schema: FormSchema) {
        self.schemas.insert(schema.id.clone(), schema);
    }
}

impl Default for InMemoryFormSchemas {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormSchemas for InMemoryFormSchemas {
    async fn get(&self, form_id: &FormId) -> Result<Option<FormSchema>> {
        Ok(self.schemas.get(form_id).map(|s| s.clone()))
    }
}

/// Pair each raw submitted answer with its schema-declared label and type.
///
/// Produces the humanized shape formatters and templates see: a `fields`
/// list of `{id, label, type, value}` entries plus the untouched answers
/// under `rawData`. Fields the schema does not know keep their id as label.
pub fn humanize_submission(mut payload: EventPayload, schema: &FormSchema) -> EventPayload {
    let Some(raw) = payload.form_data().cloned() else {
        return payload;
    };

    let fields: Vec<Value> = raw
        .iter()
        .map(|(field_id, value)| {
            let meta = schema.field(field_id);
            json!({
                "id": field_id,
                "label": meta.map(|m| m.label.as_str()).unwrap_or(field_id),
                "type": meta.map(|m| m.field_type.as_str()).unwrap_or("text"),
                "value": value,
            })
        })
        .collect();

    payload
        .data
        .insert("fields".to_string(), Value::Array(fields));
    payload
        .data
        .insert("rawData".to_string(), Value::Object(raw));
    payload
        .data
        .entry("formName".to_string())
        .or_insert_with(|| json!(schema.name));

    payload
}

/// Humanize a submission payload, degrading to raw data when the schema
/// lookup fails.
pub async fn humanize_with(
    schemas: &dyn FormSchemas,
    event: EventType,
    payload: EventPayload,
) -> EventPayload {
    if event != EventType::FormSubmitted {
        return payload;
    }
    let Some(form_id) = payload.form_id.clone() else {
        return payload;
    };
    if payload.form_data().is_none() {
        return payload;
    }

    match schemas.get(&form_id).await {
        Ok(Some(schema)) => humanize_submission(payload, &schema),
        Ok(None) => payload,
        Err(error) => {
            warn!(form_id = %form_id, error = %error, "Schema lookup failed, delivering raw data");
            payload
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema(form_id: &FormId) -> FormSchema {
        FormSchema {
            id: form_id.clone(),
            name: "Customer Survey".to_string(),
            fields: vec![
                FieldMeta {
                    id: "q1".to_string(),
                    label: "Are you satisfied?".to_string(),
                    field_type: "radio".to_string(),
                },
                FieldMeta {
                    id: "q2".to_string(),
                    label: "Comments".to_string(),
                    field_type: "textarea".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(EventType::FormSubmitted.as_str(), "form_submitted");
        assert_eq!(DeliveryTrigger::Resend.as_str(), "resend");
        assert_eq!(DeliveryTrigger::Test.as_str(), "test");
        assert_eq!(
            DeliveryTrigger::Event(EventType::FormCreated).as_str(),
            "form_created"
        );
    }

    #[test]
    fn test_envelope_shape() {
        let payload = EventPayload::new()
            .with_form(FormId::from("f1"))
            .with_data("formData", json!({"q1": "yes"}));

        let envelope = payload.envelope("form_submitted");
        assert_eq!(envelope["event"], "form_submitted");
        assert_eq!(envelope["formId"], "f1");
        assert_eq!(envelope["formData"]["q1"], "yes");
        assert!(envelope.get("accountId").is_none());
    }

    #[test]
    fn test_humanize_pairs_labels_and_keeps_raw() {
        let form_id = FormId::from("f1");
        let mut answers = Map::new();
        answers.insert("q1".to_string(), json!("yes"));
        answers.insert("unknown".to_string(), json!(42));

        let payload = EventPayload::submission(
            form_id.clone(),
            "Customer Survey",
            SubmissionId::from("s1"),
            answers,
        );
        let humanized = humanize_submission(payload, &sample_schema(&form_id));

        let fields = humanized.data.get("fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 2);
        let q1 = fields.iter().find(|f| f["id"] == "q1").unwrap();
        assert_eq!(q1["label"], "Are you satisfied?");
        assert_eq!(q1["type"], "radio");
        assert_eq!(q1["value"], "yes");

        // Unknown fields degrade to id/text
        let unknown = fields.iter().find(|f| f["id"] == "unknown").unwrap();
        assert_eq!(unknown["label"], "unknown");
        assert_eq!(unknown["type"], "text");

        let raw = humanized.data.get("rawData").unwrap();
        assert_eq!(raw["q1"], "yes");
        assert_eq!(raw["unknown"], 42);
    }

    #[tokio::test]
    async fn test_humanize_degrades_without_schema() {
        let schemas = InMemoryFormSchemas::new();
        let mut answers = Map::new();
        answers.insert("q1".to_string(), json!("yes"));

        let payload = EventPayload::submission(
            FormId::from("missing"),
            "Orphan Form",
            SubmissionId::from("s1"),
            answers,
        );
        let result = humanize_with(&schemas, EventType::FormSubmitted, payload).await;

        assert!(result.data.get("fields").is_none());
        assert_eq!(result.form_data().unwrap()["q1"], "yes");
    }

    #[tokio::test]
    async fn test_humanize_skips_non_submission_events() {
        let schemas = InMemoryFormSchemas::new();
        let payload = EventPayload::new().with_form(FormId::from("f1"));
        let result = humanize_with(&schemas, EventType::FormDeleted, payload).await;
        assert!(result.data.get("fields").is_none());
    }
}
