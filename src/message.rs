use serde_json::Value;

use crate::types::FormSubmission;

/// Message type posted by the embedded CRM form after a successful submit.
pub const FORM_SUBMITTED: &str = "ghl-form-submitted";

/// Extract a [`FormSubmission`] from an inbound cross-context message.
///
/// Returns `None` for messages of any other type, and for form messages
/// lacking a usable `contactId` or `fileId`. Numeric ids are accepted and
/// rendered as strings.
pub fn parse_form_submission(message: &Value) -> Option<FormSubmission> {
    if message.get("type").and_then(|v| v.as_str()) != Some(FORM_SUBMITTED) {
        return None;
    }
    let contact_id = id_field(message, "contactId")?;
    let file_id = id_field(message, "fileId")?;
    Some(FormSubmission {
        contact_id,
        file_id,
    })
}

fn id_field(message: &Value, key: &str) -> Option<String> {
    match message.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_form_submission() {
        let msg = json!({"type": "ghl-form-submitted", "contactId": "c-1", "fileId": "f-9"});
        assert_eq!(
            parse_form_submission(&msg),
            Some(FormSubmission {
                contact_id: "c-1".into(),
                file_id: "f-9".into(),
            })
        );
    }

    #[test]
    fn test_numeric_ids() {
        let msg = json!({"type": "ghl-form-submitted", "contactId": 42, "fileId": 7});
        let sub = parse_form_submission(&msg).unwrap();
        assert_eq!(sub.contact_id, "42");
        assert_eq!(sub.file_id, "7");
    }

    #[test]
    fn test_ignores_other_messages() {
        assert!(parse_form_submission(&json!({"type": "resize", "height": 400})).is_none());
        assert!(parse_form_submission(&json!("ghl-form-submitted")).is_none());
        assert!(parse_form_submission(&Value::Null).is_none());
    }

    #[test]
    fn test_rejects_missing_ids() {
        assert!(parse_form_submission(&json!({"type": "ghl-form-submitted", "contactId": "c"})).is_none());
        assert!(
            parse_form_submission(&json!({"type": "ghl-form-submitted", "contactId": " ", "fileId": "f"}))
                .is_none()
        );
    }
}
