use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::JOB_ENDED_BODY;
use crate::error::{RunError, RunResult};

/// Payload that triggers a run, e.g. from a scheduler or `POST /trigger`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl TriggerEvent {
    pub fn from_json(text: &str) -> RunResult<Self> {
        serde_json::from_str(text).map_err(|e| RunError::Validation(format!("invalid trigger event: {}", e)))
    }

    pub fn from_file(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("cannot read event {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Attribute as text. Numbers are accepted so `"amount": 5` works too.
    pub fn attribute(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Presence of `job` marks an automated run, unless it is explicitly false.
    pub fn requests_job(&self) -> bool {
        match self.attributes.get("job") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.eq_ignore_ascii_case("false"),
            Some(_) => true,
        }
    }
}

/// An alert to publish. Built only to be dispatched.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationEvent {
    pub subject: String,
    pub body: Value,
}

impl NotificationEvent {
    pub fn new(subject: impl Into<String>, body: Value) -> Self {
        Self {
            subject: subject.into(),
            body,
        }
    }

    /// JSON with sorted keys and four-space indentation.
    pub fn render_body(&self) -> String {
        let sorted = sort_keys(&self.body);
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        match sorted.serialize(&mut ser) {
            Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| sorted.to_string()),
            Err(_) => sorted.to_string(),
        }
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Structured result of a run, shaped like a function-handler response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl RunResponse {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: Value::String(JOB_ENDED_BODY.to_string()).to_string(),
        }
    }

    pub fn failure(err: &RunError) -> Self {
        Self {
            status_code: err.status_code(),
            body: Value::String(err.to_string()).to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"statusCode\":{}}}", self.status_code))
    }
}
