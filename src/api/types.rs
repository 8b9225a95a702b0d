use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A work item as returned by the service. Field values are server-defined
/// and dynamically typed, so they stay as raw JSON values keyed by field
/// reference name (e.g. `System.Title`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<WorkItemRelation>,
    #[serde(default)]
    pub url: String,
}

/// A typed link hanging off a work item; only present when relations were
/// requested via `$expand`. The `url` points at the linked item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItemRelation {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItemReference {
    pub id: i64,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItemLink {
    #[serde(default)]
    pub rel: String,
    pub source: Option<WorkItemReference>,
    pub target: Option<WorkItemReference>,
}

#[derive(Debug, Serialize)]
pub struct WiqlRequest {
    pub query: String,
}

/// Flat queries populate `work_items`; link queries populate
/// `work_item_links`. Both may be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiqlResponse {
    #[serde(default)]
    pub work_items: Vec<WorkItemReference>,
    #[serde(default, rename = "workItemRelations")]
    pub work_item_links: Vec<WorkItemLink>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemBatchRequest {
    pub ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

/// `{count, value}` envelope used by several list endpoints.
#[derive(Debug, Deserialize)]
pub struct ValueEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reference_name: String,
    #[serde(default)]
    pub is_disabled: bool,
}

/// Directory identity. Property values may arrive wrapped in a
/// `{"$value": "..."}` envelope; [`Identity::property`] unwraps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub subject_descriptor: String,
    #[serde(default)]
    pub provider_display_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Identity {
    pub fn property(&self, key: &str) -> Option<&str> {
        match self.properties.get(key)? {
            Value::Object(wrapped) => wrapped.get("$value").and_then(Value::as_str),
            Value::String(plain) => Some(plain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub id: String,
}

/// Identity recovered from the `X-Vss-Userdata` response header
/// (`id:uniqueName`).
#[derive(Debug, Clone, Default)]
pub struct HeaderIdentity {
    pub id: String,
    pub unique_name: String,
}
