//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through permission
//! messages. Each one is validated at construction so the handlers deal only
//! in well-formed values, and the type system keeps an account address from
//! being passed where a DID is expected.
//!
//! All string newtypes serialize transparently and re-validate on
//! deserialization.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

// ─── Address ─────────────────────────────────────────────────────────

/// A bech32 account address (`<hrp>1<data>`), e.g. `verana1q9...`.
///
/// The human-readable part and the data charset are checked; the checksum is
/// left to the host ledger, which owns the account keeper.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and wrap an account address.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let fail = |reason: &str| ValidationError::InvalidAddress {
            value: s.clone(),
            reason: reason.to_string(),
        };

        if s.len() < 8 || s.len() > 90 {
            return Err(fail("length must be between 8 and 90"));
        }
        let Some(sep) = s.rfind('1') else {
            return Err(fail("missing '1' separator"));
        };
        let (hrp, data) = (&s[..sep], &s[sep + 1..]);
        if hrp.is_empty() || !hrp.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(fail("human-readable part must be lowercase letters"));
        }
        if data.len() < 6 {
            return Err(fail("data part too short"));
        }
        if !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(fail("data part contains non-bech32 characters"));
        }
        Ok(Self(s))
    }

    /// The human-readable prefix (`verana` in `verana1...`).
    pub fn hrp(&self) -> &str {
        match self.0.rfind('1') {
            Some(sep) => &self.0[..sep],
            None => "",
        }
    }

    /// Access the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── DID ─────────────────────────────────────────────────────────────

/// A decentralized identifier of the form `did:<method>:<method-specific-id>`.
///
/// The method is ASCII alphanumeric; the method-specific id is ASCII
/// alphanumeric plus `.`, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Validate and wrap a DID.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let Some(rest) = s.strip_prefix("did:") else {
            return Err(ValidationError::InvalidDid(s));
        };
        let Some((method, id)) = rest.split_once(':') else {
            return Err(ValidationError::InvalidDid(s));
        };
        let method_ok = !method.is_empty() && method.bytes().all(|b| b.is_ascii_alphanumeric());
        let id_ok = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !method_ok || !id_ok {
            return Err(ValidationError::InvalidDid(s));
        }
        Ok(Self(s))
    }

    /// The DID method (`web` in `did:web:example.com`).
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Access the DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Did {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Did> for String {
    fn from(d: Did) -> Self {
        d.0
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Country Code ────────────────────────────────────────────────────

/// ISO-3166 alpha-2 country code. Only the shape is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Validate and wrap a country code.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        match s.as_bytes() {
            [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Ok(Self([*a, *b])),
            _ => Err(ValidationError::InvalidCountry(s.to_string())),
        }
    }

    /// Access the two-letter code.
    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII uppercase by construction.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl TryFrom<String> for CountryCode {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<CountryCode> for String {
    fn from(c: CountryCode) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Digest SRI ──────────────────────────────────────────────────────

/// A subresource-integrity digest (`sha384-<base64>`) pointing at off-chain
/// evidence such as a validation summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DigestSri(String);

impl DigestSri {
    /// Validate and wrap an SRI digest string.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let Some((alg, b64)) = s.split_once('-') else {
            return Err(ValidationError::InvalidDigestSri(s));
        };
        if !matches!(alg, "sha256" | "sha384" | "sha512") {
            return Err(ValidationError::InvalidDigestSri(s));
        }
        let body = b64.trim_end_matches('=');
        let padding = b64.len() - body.len();
        let body_ok = !body.is_empty()
            && body
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/');
        if !body_ok || padding > 2 {
            return Err(ValidationError::InvalidDigestSri(s));
        }
        Ok(Self(s))
    }

    /// The hash algorithm prefix.
    pub fn algorithm(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Access the digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DigestSri {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DigestSri> for String {
    fn from(d: DigestSri) -> Self {
        d.0
    }
}

// ─── Permission ID ───────────────────────────────────────────────────

/// Ledger-assigned permission identifier. Allocation starts at 1; "no parent"
/// is expressed as `Option<PermissionId>::None`, never as a zero id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub u64);

impl PermissionId {
    /// Interpret a wire id where `0` means "none".
    pub fn from_wire(id: u64) -> Option<Self> {
        (id != 0).then_some(Self(id))
    }

    /// Access the raw id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
