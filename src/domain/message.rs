use serde_json::Value;

/// Upstream folder to query. The API names its spam folder "junkemail".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Junk,
}

impl Folder {
    /// Folders in fetch-fallback order: inbox first, then junk.
    pub const FALLBACK_ORDER: [Folder; 2] = [Folder::Inbox, Folder::Junk];

    pub fn as_query(self) -> &'static str {
        match self {
            Folder::Inbox => "inbox",
            Folder::Junk => "junkemail",
        }
    }
}

/// A mail message reduced to the fields change detection cares about.
/// Transient: only its fingerprint is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub from: String,
    pub subject: String,
    pub text: String,
}

impl NormalizedMessage {
    /// Folds the response shapes the API has been seen returning (bare array,
    /// `{"data": …}` wrapper, bare object) into one schema. Missing fields
    /// become empty strings; anything that is not message-shaped is "no
    /// message", never an error.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let candidate = match payload {
            Value::Array(items) => items.first()?,
            Value::Object(map) => map.get("data").filter(|v| !v.is_null()).unwrap_or(payload),
            _ => return None,
        };
        let map = candidate.as_object()?;
        Some(Self {
            from: first_string(map, &["from", "sender"]),
            subject: first_string(map, &["subject"]),
            text: first_string(map, &["text", "body", "content"]),
        })
    }
}

fn first_string(map: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bare_object() {
        let payload = json!({"from": "a@x.com", "subject": "Code", "text": "Your code is 482913"});
        let message = NormalizedMessage::from_payload(&payload).unwrap();
        assert_eq!(message.from, "a@x.com");
        assert_eq!(message.subject, "Code");
        assert_eq!(message.text, "Your code is 482913");
    }

    #[test]
    fn normalizes_array_shape_with_field_aliases() {
        let payload = json!([{"sender": "a@x.com", "subject": "Hi", "body": "hello"}]);
        let message = NormalizedMessage::from_payload(&payload).unwrap();
        assert_eq!(message.from, "a@x.com");
        assert_eq!(message.text, "hello");
    }

    #[test]
    fn normalizes_data_wrapper_shape() {
        let payload = json!({"data": {"from": "a@x.com", "subject": "Hi", "content": "hello"}});
        let message = NormalizedMessage::from_payload(&payload).unwrap();
        assert_eq!(message.from, "a@x.com");
        assert_eq!(message.text, "hello");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let payload = json!({"subject": "only subject"});
        let message = NormalizedMessage::from_payload(&payload).unwrap();
        assert_eq!(message.from, "");
        assert_eq!(message.subject, "only subject");
        assert_eq!(message.text, "");
    }

    #[test]
    fn null_data_falls_back_to_outer_object() {
        let payload = json!({"data": null, "from": "a@x.com", "subject": "s", "text": "t"});
        let message = NormalizedMessage::from_payload(&payload).unwrap();
        assert_eq!(message.from, "a@x.com");
    }

    #[test]
    fn non_message_payloads_are_absent() {
        assert!(NormalizedMessage::from_payload(&json!("oops")).is_none());
        assert!(NormalizedMessage::from_payload(&json!(42)).is_none());
        assert!(NormalizedMessage::from_payload(&json!([])).is_none());
        assert!(NormalizedMessage::from_payload(&json!(null)).is_none());
    }

    #[test]
    fn fallback_order_is_inbox_then_junk() {
        assert_eq!(Folder::FALLBACK_ORDER[0].as_query(), "inbox");
        assert_eq!(Folder::FALLBACK_ORDER[1].as_query(), "junkemail");
    }
}
