//! Metadata sanitization
//!
//! Audit metadata lives forever and is read by people who have no
//! business seeing patient-identifying details. Sanitization is
//! key-based and recursive: any value under a sensitive key is replaced
//! with a placeholder before the entry is built, at whatever depth the
//! key appears.

use serde_json::Value;

/// Placeholder written in place of redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are patient-identifying and never persisted
const SENSITIVE_KEYS: &[&str] = &[
    "name",
    "full_name",
    "first_name",
    "last_name",
    "middle_name",
    "surname",
    "other_names",
    "patient_name",
    "phone",
    "phone_number",
    "mobile",
    "telephone",
    "email",
    "email_address",
    "address",
    "home_address",
    "street_address",
    "date_of_birth",
    "dob",
    "birth_date",
    "next_of_kin",
    "next_of_kin_phone",
    "national_id",
    "nin",
    "passport_number",
    "card_number",
];

/// Recursively redacts sensitive values from a metadata document
///
/// Keys are matched case-insensitively. The key itself is kept so the
/// trail still shows what was present, only the value is replaced.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| {
                    if is_sensitive(&key) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, sanitize(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

fn is_sensitive(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEYS.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_sensitive_keys_redacted() {
        let sanitized = sanitize(json!({
            "phone": "+2348012345678",
            "amount": "1500.00",
        }));

        assert_eq!(sanitized["phone"], REDACTED);
        assert_eq!(sanitized["amount"], "1500.00");
    }

    #[test]
    fn test_nested_objects_are_walked() {
        let sanitized = sanitize(json!({
            "visit": {
                "patient": {
                    "full_name": "Ada Obi",
                    "hospital_number": "HN-0042",
                },
            },
        }));

        assert_eq!(sanitized["visit"]["patient"]["full_name"], REDACTED);
        assert_eq!(sanitized["visit"]["patient"]["hospital_number"], "HN-0042");
    }

    #[test]
    fn test_arrays_of_objects_are_walked() {
        let sanitized = sanitize(json!({
            "contacts": [
                {"phone": "0801", "relation": "spouse"},
                {"phone": "0802", "relation": "parent"},
            ],
        }));

        assert_eq!(sanitized["contacts"][0]["phone"], REDACTED);
        assert_eq!(sanitized["contacts"][1]["phone"], REDACTED);
        assert_eq!(sanitized["contacts"][0]["relation"], "spouse");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let sanitized = sanitize(json!({
            "Phone": "0801",
            "EMAIL": "ada@example.com",
        }));

        assert_eq!(sanitized["Phone"], REDACTED);
        assert_eq!(sanitized["EMAIL"], REDACTED);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(sanitize(json!("hello")), json!("hello"));
        assert_eq!(sanitize(json!(42)), json!(42));
        assert_eq!(sanitize(json!(null)), json!(null));
    }

    #[test]
    fn test_non_identifying_name_like_keys_survive() {
        let sanitized = sanitize(json!({
            "provider_name": "NHIS",
            "department": "pharmacy",
        }));

        assert_eq!(sanitized["provider_name"], "NHIS");
        assert_eq!(sanitized["department"], "pharmacy");
    }
}
