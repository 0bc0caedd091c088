use std::fmt;

use http::HeaderValue;
use http::header::HeaderName;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ApiError;

/// Name of the header carrying the store access token.
pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

/// Access token wrapper that zeroes its memory on drop.
///
/// Debug output is redacted and `Display` only shows the first and last
/// four characters, so the token can safely appear in logs.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Wraps a sensitive value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// The inner value; do not keep the reference around.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn mask(value: &str) -> String {
        let chars = value.chars().collect::<Vec<_>>();
        if chars.len() <= 8 {
            return "***".to_string();
        }
        let head = chars.iter().take(4).collect::<String>();
        let tail = chars.iter().skip(chars.len() - 4).collect::<String>();
        format!("{head}...{tail}")
    }

    /// Renders the `X-Auth-Token` header, marked sensitive.
    ///
    /// # Errors
    ///
    /// Fails if the token contains characters not allowed in a header value.
    pub fn to_header(&self) -> Result<(HeaderName, HeaderValue), ApiError> {
        let mut value = HeaderValue::from_str(self.as_str())?;
        value.set_sensitive(true);
        Ok((AUTH_TOKEN_HEADER, value))
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::mask(&self.0))
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("short", "***")]
    #[case("12345678", "***")]
    #[case("abcd1234efgh5678", "abcd...5678")]
    fn should_mask_token(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(SecureString::from(token).to_string(), expected);
    }

    #[test]
    fn should_redact_debug_output() {
        let token = SecureString::from("super-secret-token");

        insta::assert_snapshot!(format!("{token:?}"), @r#"SecureString { value: "[REDACTED]" }"#);
    }

    #[test]
    fn should_build_sensitive_header() {
        let token = SecureString::from("token-123");

        let (name, value) = token.to_header().expect("valid header");

        assert_eq!(name.as_str(), "x-auth-token");
        assert_eq!(value.to_str().expect("ascii"), "token-123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn should_reject_invalid_header_characters() {
        let token = SecureString::from("bad\ntoken");

        let result = token.to_header();

        assert!(matches!(result, Err(ApiError::InvalidHeaderValue(_))));
    }
}
