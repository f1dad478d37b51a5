//! Field-level comparison between a submitted record and the backend's answer.

use crate::client::Operation;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Entries of `received` whose key also appears in `sent`.
///
/// Keys the backend dropped are simply absent, so a later equality check
/// against `sent` fails on them.
pub fn project(received: &Map<String, Value>, sent: &Map<String, Value>) -> Map<String, Value> {
    received
        .iter()
        .filter(|(key, _)| sent.contains_key(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Fail with [`Error::FieldMismatch`] unless `received` restricted to the keys
/// of `sent` equals `sent`.
pub fn ensure_echoed(
    operation: Operation,
    sent: &Map<String, Value>,
    received: &Map<String, Value>,
) -> Result<()> {
    let actual = project(received, sent);
    if &actual == sent {
        return Ok(());
    }

    tracing::warn!(operation = %operation, "Response fields differ from submitted record");
    Err(Error::FieldMismatch {
        operation,
        expected: Value::Object(sent.clone()),
        actual: Value::Object(actual),
    })
}
