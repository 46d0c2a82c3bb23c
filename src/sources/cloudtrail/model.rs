//! CloudTrail record shapes as read from log files.
//!
//! Leaves are kept as raw JSON so that absent, null and oddly typed values can
//! be defaulted instead of failing the whole file. Only the nesting is typed: a
//! `userIdentity` that is not an object makes the record malformed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level layout of a CloudTrail log file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFile {
    #[serde(rename = "Records", default)]
    pub records: Vec<AuditRecord>,
}

/// One API call event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditRecord {
    pub user_identity: Option<UserIdentity>,
    #[serde(rename = "eventID")]
    pub event_id: Option<Value>,
    pub event_time: Option<Value>,
    pub event_source: Option<Value>,
    pub event_name: Option<Value>,
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: Option<Value>,
    pub user_agent: Option<Value>,
    pub request_parameters: Option<Value>,
    pub response_elements: Option<Value>,
}

impl AuditRecord {
    /// `requestParameters` as an object, if it is one and non-empty.
    pub fn request_map(&self) -> Option<&Map<String, Value>> {
        self.request_parameters
            .as_ref()
            .and_then(Value::as_object)
            .filter(|map| !map.is_empty())
    }

    /// Items of `responseElements.instancesSet.items`.
    pub fn instance_items(&self) -> &[Value] {
        self.response_elements
            .as_ref()
            .and_then(|value| value.get("instancesSet"))
            .and_then(|value| value.get("items"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserIdentity {
    #[serde(rename = "type")]
    pub identity_type: Option<Value>,
    pub principal_id: Option<Value>,
    pub arn: Option<Value>,
    pub account_id: Option<Value>,
    pub user_name: Option<Value>,
    pub session_context: Option<SessionContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionContext {
    pub session_issuer: Option<Value>,
    pub web_id_federation_data: Option<Value>,
    pub attributes: Option<SessionAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionAttributes {
    pub creation_date: Option<Value>,
    pub mfa_authenticated: Option<Value>,
}

/// Renders a leaf as text. Empty-ish values (`null`, `false`, `0`, `""`, `[]`,
/// `{}`) become the empty string.
pub fn text(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(value) if is_blank(value) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Field lookup on a JSON object with the same defaulting as [`text`].
pub fn text_field(value: Option<&Value>, key: &str) -> String {
    text(value.and_then(|value| value.get(key)))
}

pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Parses an MFA flag: the string `"true"` in any case, or boolean `true`.
pub fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
