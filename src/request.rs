//! Identify request payload and builder.
//!
//! The builder provides a fluent, type-safe API for constructing identify
//! requests. It normalizes inputs (trim, empty-to-absent) and validates
//! identifier syntax before anything touches the store.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum accepted email length, in bytes.
pub const MAX_EMAIL_BYTES: usize = 320;

/// Maximum accepted phone length, in bytes.
pub const MAX_PHONE_BYTES: usize = 32;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Exact-match identifier, not an RFC 5321 validator: one local part, one
    // domain with at least one dot, no whitespace.
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|e| panic!("invalid builtin email pattern: {e}"))
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Digits with optional leading + and common separators.
    RE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 ().\-]*$")
            .unwrap_or_else(|e| panic!("invalid builtin phone pattern: {e}"))
    })
}

/// A validated identify request.
///
/// Carries at least one identifier; construct via [`IdentifyBuilder`].
///
/// # Example
/// ```rust
/// use idchain::IdentifyBuilder;
///
/// let request = IdentifyBuilder::new()
///     .email("doc@hillvalley.edu")
///     .build()
///     .unwrap();
/// assert_eq!(request.email(), Some("doc@hillvalley.edu"));
/// assert_eq!(request.phone(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    email: Option<String>,
    phone: Option<String>,
}

impl IdentifyRequest {
    /// The supplied email, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The supplied phone, if any.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// Returns true if at least one identifier is present.
    #[must_use]
    pub fn has_identifier(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// Builder for identify requests.
///
/// # Example
/// ```rust
/// use idchain::IdentifyBuilder;
///
/// let request = IdentifyBuilder::new()
///     .email("  lorraine@hillvalley.edu  ")
///     .phone("123456")
///     .build()
///     .unwrap();
///
/// // Inputs are trimmed before validation.
/// assert_eq!(request.email(), Some("lorraine@hillvalley.edu"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdentifyBuilder {
    email: Option<String>,
    phone: Option<String>,
}

impl IdentifyBuilder {
    /// Creates a new builder with no identifiers set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the email identifier (optional).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the phone identifier (optional).
    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Build the validated request.
    ///
    /// Inputs are trimmed first; an empty or whitespace-only identifier is
    /// treated as absent, mirroring how the match step treats absent
    /// criteria.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if:
    /// - both identifiers are absent after normalization,
    /// - an identifier exceeds its maximum length,
    /// - an identifier fails its syntax check.
    pub fn build(self) -> Result<IdentifyRequest, ValidationError> {
        let email = normalize(self.email);
        let phone = normalize(self.phone);

        if email.is_none() && phone.is_none() {
            return Err(ValidationError::MissingIdentifiers);
        }

        if let Some(email) = email.as_deref() {
            if email.len() > MAX_EMAIL_BYTES {
                return Err(ValidationError::FieldTooLong {
                    field: "email",
                    max_length: MAX_EMAIL_BYTES,
                });
            }
            if !email_regex().is_match(email) {
                return Err(ValidationError::InvalidEmail {
                    value: email.to_string(),
                });
            }
        }

        if let Some(phone) = phone.as_deref() {
            if phone.len() > MAX_PHONE_BYTES {
                return Err(ValidationError::FieldTooLong {
                    field: "phone",
                    max_length: MAX_PHONE_BYTES,
                });
            }
            if !phone_regex().is_match(phone) {
                return Err(ValidationError::InvalidPhone {
                    value: phone.to_string(),
                });
            }
        }

        Ok(IdentifyRequest { email, phone })
    }
}

#[cfg(test)]
impl IdentifyRequest {
    /// Builds an identifier-less request, bypassing the builder's guard, so
    /// engine preconditions can be exercised directly.
    pub(crate) fn empty() -> Self {
        Self {
            email: None,
            phone: None,
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_only() {
        let request = IdentifyBuilder::new().email("a@x.com").build().unwrap();
        assert_eq!(request.email(), Some("a@x.com"));
        assert_eq!(request.phone(), None);
        assert!(request.has_identifier());
    }

    #[test]
    fn test_phone_only() {
        let request = IdentifyBuilder::new().phone("123456").build().unwrap();
        assert_eq!(request.phone(), Some("123456"));
        assert_eq!(request.email(), None);
    }

    #[test]
    fn test_both_identifiers() {
        let request = IdentifyBuilder::new()
            .email("a@x.com")
            .phone("123456")
            .build()
            .unwrap();
        assert!(request.email().is_some());
        assert!(request.phone().is_some());
    }

    #[test]
    fn test_no_identifiers_fails() {
        let result = IdentifyBuilder::new().build();
        assert!(matches!(result, Err(ValidationError::MissingIdentifiers)));
    }

    #[test]
    fn test_whitespace_only_is_absent() {
        let result = IdentifyBuilder::new().email("   ").phone("\t").build();
        assert!(matches!(result, Err(ValidationError::MissingIdentifiers)));
    }

    #[test]
    fn test_inputs_are_trimmed() {
        let request = IdentifyBuilder::new()
            .email(" a@x.com ")
            .phone(" 123456 ")
            .build()
            .unwrap();
        assert_eq!(request.email(), Some("a@x.com"));
        assert_eq!(request.phone(), Some("123456"));
    }

    #[test]
    fn test_malformed_email_rejected() {
        for bad in ["plainaddress", "a@b", "a @x.com", "a@x com", "@x.com"] {
            let result = IdentifyBuilder::new().email(bad).build();
            assert!(
                matches!(result, Err(ValidationError::InvalidEmail { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_accepted_phone_shapes() {
        for ok in ["123456", "+1 (555) 123-4567", "555-0100", "1.800.555.0199"] {
            assert!(
                IdentifyBuilder::new().phone(ok).build().is_ok(),
                "expected {ok:?} to be accepted"
            );
        }
    }

    #[test]
    fn test_malformed_phone_rejected() {
        for bad in ["abc", "+", "++123", "12a34"] {
            let result = IdentifyBuilder::new().phone(bad).build();
            assert!(
                matches!(result, Err(ValidationError::InvalidPhone { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_email_too_long() {
        let local = "x".repeat(MAX_EMAIL_BYTES);
        let result = IdentifyBuilder::new()
            .email(format!("{local}@example.com"))
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::FieldTooLong { field: "email", .. })
        ));
    }

    #[test]
    fn test_phone_too_long() {
        let result = IdentifyBuilder::new()
            .phone("1".repeat(MAX_PHONE_BYTES + 1))
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::FieldTooLong { field: "phone", .. })
        ));
    }

    #[test]
    fn test_request_serde_roundtrip() {
        let request = IdentifyBuilder::new()
            .email("a@x.com")
            .phone("123")
            .build()
            .unwrap();
        let json = serde_json::to_string(&request).unwrap();
        let decoded: IdentifyRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
