//! Boundary conversions from the queue server's loosely typed JSON.

use crate::models::StatsSnapshot;
use serde_json::Value;
use std::collections::BTreeMap;

const WRAPPER_VALUE_KEYS: [&str; 8] = [
    "Int64", "Int32", "Int16", "Float64", "String", "Bool", "Time", "Value",
];

pub fn snapshot(payload: &Value) -> StatsSnapshot {
    StatsSnapshot {
        total_tickets_today: count(field(payload, "total_tickets_today")),
        currently_serving: count(field(payload, "currently_serving")),
        waiting_tickets: count(field(payload, "waiting_tickets")),
        active_counters: count(field(payload, "active_counters")),
        paused_counters: count(field(payload, "paused_counters")),
        avg_wait_time: count(field(payload, "avg_wait_time")),
        avg_service_time: count(field(payload, "avg_service_time")),
        tickets_by_status: labelled_counts(field(payload, "tickets_by_status"), &[]),
        queue_length_by_category: labelled_counts(
            field(payload, "queue_length_by_category"),
            &["category_name", "prefix", "category_id"],
        ),
        hourly_distribution: hourly(field(payload, "hourly_distribution")),
    }
}

/// Looks a field up by its `snake_case` name, falling back to the
/// `PascalCase` spelling.
pub fn field<'a>(payload: &'a Value, snake: &str) -> Option<&'a Value> {
    let object = payload.as_object()?;
    object
        .get(snake)
        .or_else(|| object.get(&pascal_case(snake)))
}

/// Strips a nullable wrapper. `None` for null, missing, or `Valid: false`.
pub fn unwrap_nullable(value: Option<&Value>) -> Option<&Value> {
    let value = value?;
    match value {
        Value::Null => None,
        Value::Object(object) => match object.get("Valid") {
            Some(Value::Bool(true)) => WRAPPER_VALUE_KEYS
                .iter()
                .find_map(|key| object.get(*key))
                .filter(|inner| !inner.is_null()),
            Some(Value::Bool(false)) => None,
            _ => Some(value),
        },
        other => Some(other),
    }
}

pub fn optional_int(value: Option<&Value>) -> Option<i64> {
    match unwrap_nullable(value)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.floor() as i64)
            })
        }
        _ => None,
    }
}

/// Non-negative count; anything missing, negative or malformed is zero.
pub fn count(value: Option<&Value>) -> u64 {
    optional_int(value)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

pub fn text(value: Option<&Value>) -> String {
    match unwrap_nullable(value) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

fn labelled_counts(value: Option<&Value>, label_keys: &[&str]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    match unwrap_nullable(value) {
        Some(Value::Object(map)) => {
            for (label, count_value) in map {
                counts.insert(label.clone(), count(Some(count_value)));
            }
        }
        Some(Value::Array(rows)) => {
            for row in rows {
                let label = label_keys
                    .iter()
                    .map(|key| text(field(row, key)))
                    .find(|label| !label.is_empty());
                if let Some(label) = label {
                    *counts.entry(label).or_insert(0) += row_count(row);
                }
            }
        }
        _ => {}
    }
    counts
}

fn hourly(value: Option<&Value>) -> BTreeMap<u8, u64> {
    let mut hours = BTreeMap::new();
    let mut insert = |hour: Option<i64>, n: u64| {
        if let Some(hour) = hour.and_then(|h| u8::try_from(h).ok()).filter(|h| *h < 24) {
            *hours.entry(hour).or_insert(0) += n;
        }
    };
    match unwrap_nullable(value) {
        Some(Value::Object(map)) => {
            for (hour, count_value) in map {
                insert(hour.trim().parse().ok(), count(Some(count_value)));
            }
        }
        Some(Value::Array(rows)) => {
            for row in rows {
                insert(optional_int(field(row, "hour")), row_count(row));
            }
        }
        _ => {}
    }
    hours
}

fn row_count(row: &Value) -> u64 {
    ["waiting_count", "count"]
        .iter()
        .find_map(|key| field(row, key))
        .map(|value| count(Some(value)))
        .unwrap_or(0)
}

fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
