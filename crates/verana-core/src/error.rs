//! # Error Types: Input Validation
//!
//! Every constructor in this crate that parses untrusted input returns a
//! [`ValidationError`]. Messages quote the offending value so a rejected
//! transaction can be diagnosed from its log line alone.

use thiserror::Error;

/// Malformed input detected before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not a well-formed bech32 account address.
    #[error("invalid account address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Not of the form `did:<method>:<id>`.
    #[error("invalid DID {0:?}")]
    InvalidDid(String),

    /// Not an ISO-3166 alpha-2 code.
    #[error("invalid country code {0:?}: expected two uppercase letters")]
    InvalidCountry(String),

    /// Not a subresource-integrity digest string.
    #[error("invalid digest SRI {0:?}")]
    InvalidDigestSri(String),

    /// Not a decimal rate.
    #[error("invalid rate {value:?}: {reason}")]
    InvalidRate {
        /// The rejected input.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Not a UTC RFC 3339 timestamp, or out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A mandatory field was empty or zero.
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),
}
