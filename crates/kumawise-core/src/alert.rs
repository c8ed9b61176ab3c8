//! Alert record - normalized form of an Uptime Kuma webhook payload

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const UNKNOWN_MONITOR: &str = "Unknown Monitor";
pub const NO_MESSAGE: &str = "No message";

// Heartbeat status as reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Down,  // heartbeat.status == 0
    Up,    // heartbeat.status == 1
    Other, // pending, maintenance, missing, garbage
}

impl AlertStatus {
    /// Map the raw heartbeat status value. Only the integers 0 and 1 are actionable.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_i64) {
            Some(0) => Self::Down,
            Some(1) => Self::Up,
            _ => Self::Other,
        }
    }
}

/// Canonical alert, built once per inbound event and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub monitor_name: String,

    pub status: AlertStatus,

    pub message: String,

    // heartbeat.time, passed through for display only
    #[serde(default)]
    pub occurred_at: Option<String>,

    #[serde(default)]
    pub monitor_url: Option<String>,

    // token from a "#CW<token>" tag in the monitor name
    #[serde(default)]
    pub company_id: Option<String>,
}

impl AlertRecord {
    /// Build a record from an arbitrary JSON value.
    ///
    /// Total: missing or mistyped sub-objects behave like empty objects and
    /// missing scalars fall back to placeholders, so this never fails.
    pub fn from_payload(payload: &Value) -> Self {
        let empty = Map::new();
        let heartbeat = section(payload, "heartbeat", &empty);
        let monitor = section(payload, "monitor", &empty);

        let monitor_name = monitor
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_MONITOR)
            .to_string();

        let message = payload
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or(NO_MESSAGE)
            .to_string();

        let company_id = extract_company_id(&monitor_name);

        Self {
            status: AlertStatus::from_value(heartbeat.get("status")),
            occurred_at: heartbeat.get("time").and_then(scalar_text),
            monitor_url: monitor.get("url").and_then(scalar_text),
            message,
            company_id,
            monitor_name,
        }
    }
}

/// Pull the company identifier out of a monitor name tagged like `"API #CW4821 prod"`.
///
/// First match wins; `None` when the name carries no tag.
pub fn extract_company_id(monitor_name: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"#CW(\w+)").expect("company tag pattern"));

    pattern
        .captures(monitor_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn section<'a>(payload: &'a Value, key: &str, empty: &'a Map<String, Value>) -> &'a Map<String, Value> {
    payload.get(key).and_then(Value::as_object).unwrap_or(empty)
}

// strings pass through, numbers and bools are rendered, null and containers are dropped
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
