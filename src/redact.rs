//! Redaction of sensitive fields before persistence. A redacted value
//! keeps a short hash of the original so audit entries remain
//! correlatable without exposing the data itself.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::settings::Settings;

const REDACTED_PREFIX: &str = "[REDACTED:";

/// Marker for a value: `[REDACTED:<first 8 hex chars of SHA-256>]`.
pub fn redaction_marker(original: &str) -> String {
    let digest = Sha256::digest(original.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{REDACTED_PREFIX}{}]", &hex[..8])
}

/// Replace the named fields of a JSON object with redaction markers.
///
/// Only non-empty string values are replaced; other types and absent
/// fields are untouched. Nested objects are not recursed. Already
/// redacted markers are detected by prefix and left unchanged, making
/// the operation idempotent.
pub fn redact_fields(value: &Value, fields: &[String]) -> Value {
    let Some(map) = value.as_object() else {
        return value.clone();
    };

    let mut redacted = map.clone();
    for field in fields {
        if let Some(Value::String(s)) = redacted.get(field) {
            if !s.is_empty() && !s.starts_with(REDACTED_PREFIX) {
                let marker = redaction_marker(s);
                redacted.insert(field.clone(), Value::String(marker));
            }
        }
    }
    Value::Object(redacted)
}

/// Serialize a payload for audit storage under the configured policy.
///
/// With full storage disabled the payload is dropped entirely in favor of
/// a marker object; with PHI redaction enabled the configured fields are
/// masked first.
pub fn prepare_audit_payload(settings: &Settings, value: &Value) -> String {
    if settings.redact_phi_fields {
        return redact_fields(value, &settings.phi_fields_to_redact).to_string();
    }
    if settings.store_full_audit_data {
        return value.to_string();
    }
    serde_json::json!({"redacted": true}).to_string()
}
