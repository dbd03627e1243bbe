use sha2::{Digest, Sha256};

use super::message::NormalizedMessage;

/// How much of the body participates in the digest. Keeps hashing cheap and
/// accepts that two long messages sharing sender, subject and this prefix
/// collapse into one observation.
const TEXT_PREFIX_CHARS: usize = 400;

/// Content-derived identity of an observed message, as a 64-char hex digest.
///
/// Upstream message ids were seen mutating across polls for unchanged
/// content, so they are distrusted; identity comes from what the message
/// says instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(message: &NormalizedMessage) -> Self {
        let prefix: String = message.text.chars().take(TEXT_PREFIX_CHARS).collect();
        let mut hasher = Sha256::new();
        hasher.update(message.from.as_bytes());
        hasher.update(b"|");
        hasher.update(message.subject.as_bytes());
        hasher.update(b"|");
        hasher.update(prefix.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, subject: &str, text: &str) -> NormalizedMessage {
        NormalizedMessage {
            from: from.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn deterministic_and_fixed_length() {
        let a = Fingerprint::of(&message("b@y.com", "Code", "Your code is 482913"));
        let b = Fingerprint::of(&message("b@y.com", "Code", "Your code is 482913"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn any_field_change_changes_the_digest() {
        let base = Fingerprint::of(&message("b@y.com", "Code", "Your code is 482913"));
        assert_ne!(
            base,
            Fingerprint::of(&message("c@y.com", "Code", "Your code is 482913"))
        );
        assert_ne!(
            base,
            Fingerprint::of(&message("b@y.com", "Other", "Your code is 482913"))
        );
        assert_ne!(
            base,
            Fingerprint::of(&message("b@y.com", "Code", "Your code is 118822"))
        );
    }

    #[test]
    fn bodies_sharing_the_bounded_prefix_collapse() {
        let prefix = "x".repeat(400);
        let a = Fingerprint::of(&message("b@y.com", "s", &format!("{prefix}tail-one")));
        let b = Fingerprint::of(&message("b@y.com", "s", &format!("{prefix}tail-two")));
        assert_eq!(a, b);

        let c = Fingerprint::of(&message("b@y.com", "s", &format!("Y{prefix}")));
        assert_ne!(a, c);
    }
}
