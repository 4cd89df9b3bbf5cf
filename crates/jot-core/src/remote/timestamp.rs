//! Translation between domain timestamps and the remote store's native form.
//!
//! The remote store keeps `created_at` / `updated_at` as
//! `{ "seconds": i64, "nanos": u32 }`; the domain uses Unix milliseconds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RemoteFailure, RemoteFailureKind};

const TIMESTAMP_FIELDS: [&str; 2] = ["created_at", "updated_at"];
const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Remote-native timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl RemoteTimestamp {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // rem_euclid keeps it in 0..1000
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) as u32) * 1_000_000,
        }
    }

    /// Sub-millisecond precision is truncated.
    ///
    /// `None` when `nanos` is not below one second or the result does not
    /// fit in `i64` milliseconds.
    #[allow(clippy::cast_lossless)]
    pub const fn to_millis(self) -> Option<i64> {
        if self.nanos >= NANOS_PER_SECOND {
            return None;
        }
        match self.seconds.checked_mul(1000) {
            Some(millis) => millis.checked_add((self.nanos / 1_000_000) as i64),
            None => None,
        }
    }
}

/// Domain document → remote document.
///
/// Converts timestamp fields and drops the local-only `synced` flag.
pub fn to_remote_document(document: Value) -> Value {
    let Value::Object(mut fields) = document else {
        return document;
    };
    fields.remove("synced");
    for field in TIMESTAMP_FIELDS {
        if let Some(millis) = fields.get(field).and_then(Value::as_i64) {
            let timestamp = RemoteTimestamp::from_millis(millis);
            fields.insert(
                field.to_string(),
                serde_json::json!({ "seconds": timestamp.seconds, "nanos": timestamp.nanos }),
            );
        }
    }
    Value::Object(fields)
}

/// Remote document → domain document.
///
/// A document read back from the remote store is by definition confirmed,
/// so `synced` is set.
pub fn from_remote_document(document: Value) -> Result<Value, RemoteFailure> {
    let Value::Object(mut fields) = document else {
        return Err(RemoteFailure::new(
            RemoteFailureKind::Invalid,
            "remote document is not an object",
        ));
    };
    for field in TIMESTAMP_FIELDS {
        if let Some(value) = fields.get(field) {
            let millis = parse_timestamp(field, value)?;
            fields.insert(field.to_string(), Value::from(millis));
        }
    }
    fields.insert("synced".to_string(), Value::Bool(true));
    Ok(Value::Object(fields))
}

fn parse_timestamp(field: &str, value: &Value) -> Result<i64, RemoteFailure> {
    if let Some(millis) = value.as_i64() {
        return Ok(millis);
    }
    let timestamp = serde_json::from_value::<RemoteTimestamp>(value.clone()).map_err(|error| {
        RemoteFailure::new(
            RemoteFailureKind::Invalid,
            format!("invalid remote timestamp in {field}: {error}"),
        )
    })?;
    timestamp.to_millis().ok_or_else(|| {
        RemoteFailure::new(
            RemoteFailureKind::Invalid,
            format!(
                "remote timestamp in {field} out of range: {}s {}ns",
                timestamp.seconds, timestamp.nanos
            ),
        )
    })
}

/// Merge the fields of `patch` into `target`
pub(crate) fn merge_fields(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn millis_convert_to_seconds_and_nanos() {
        let timestamp = RemoteTimestamp::from_millis(1_700_000_000_123);
        assert_eq!(timestamp.seconds, 1_700_000_000);
        assert_eq!(timestamp.nanos, 123_000_000);
        assert_eq!(timestamp.to_millis(), Some(1_700_000_000_123));
    }

    #[test]
    fn negative_millis_keep_nanos_positive() {
        let timestamp = RemoteTimestamp::from_millis(-1);
        assert_eq!(timestamp.seconds, -1);
        assert_eq!(timestamp.nanos, 999_000_000);
        assert_eq!(timestamp.to_millis(), Some(-1));
    }

    #[test]
    fn documents_translate_both_ways() {
        let domain = json!({
            "id": "abc",
            "created_at": 1_500,
            "updated_at": 2_250,
            "synced": false,
            "title": "A"
        });

        let remote = to_remote_document(domain);
        assert_eq!(remote["created_at"], json!({ "seconds": 1, "nanos": 500_000_000 }));
        assert!(remote.get("synced").is_none());

        let back = from_remote_document(remote).unwrap();
        assert_eq!(back["created_at"], 1_500);
        assert_eq!(back["updated_at"], 2_250);
        assert_eq!(back["synced"], true);
        assert_eq!(back["title"], "A");
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        let error = from_remote_document(json!({ "created_at": "yesterday" })).unwrap_err();
        assert_eq!(error.kind, RemoteFailureKind::Invalid);
    }

    #[test]
    fn out_of_range_timestamps_are_invalid_not_a_panic() {
        let huge = from_remote_document(json!({
            "created_at": { "seconds": i64::MAX, "nanos": 0 }
        }))
        .unwrap_err();
        assert_eq!(huge.kind, RemoteFailureKind::Invalid);

        let tiny = from_remote_document(json!({
            "updated_at": { "seconds": i64::MIN, "nanos": 0 }
        }))
        .unwrap_err();
        assert_eq!(tiny.kind, RemoteFailureKind::Invalid);

        let nanos = from_remote_document(json!({
            "created_at": { "seconds": 1, "nanos": 1_000_000_000 }
        }))
        .unwrap_err();
        assert_eq!(nanos.kind, RemoteFailureKind::Invalid);
    }
}
