use once_cell::sync::Lazy;
use regex::Regex;

static OTP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4,8}\b").expect("valid otp regex"));

/// Best-effort one-time-passcode extraction: the first standalone run of 4 to
/// 8 digits. Dates, amounts and phone fragments can false-positive; that is
/// accepted rather than guessed around.
pub fn extract_otp(text: &str) -> Option<String> {
    OTP_REGEX.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_code() {
        assert_eq!(extract_otp("Your code is 482913").as_deref(), Some("482913"));
        assert_eq!(extract_otp("1234 then 5678").as_deref(), Some("1234"));
    }

    #[test]
    fn respects_length_bounds() {
        assert_eq!(extract_otp("pin 123").as_deref(), None);
        assert_eq!(extract_otp("ref 123456789").as_deref(), None);
        assert_eq!(extract_otp("code 12345678 ok").as_deref(), Some("12345678"));
    }

    #[test]
    fn none_without_digits() {
        assert!(extract_otp("no code here").is_none());
    }
}
