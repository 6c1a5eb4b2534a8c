//! Identifier types for the squish platform.
//!
//! Usage is tracked against one of three identity kinds: an authenticated
//! user, an anonymous browser session, or a client-supplied page identifier
//! for per-landing-page anonymous tracking. `Identity` bundles the three and
//! provides the stable byte encoding used as a storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Define a UUID-backed identifier newtype with the standard trait set:
/// string serde, `FromStr`, `Display`, `Debug`, `TryFrom<String>`,
/// `Into<String>`, and `AsRef<[u8]>` over the raw UUID bytes.
macro_rules! uuid_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the raw UUID bytes (16 bytes).
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_newtype!(
    UserId,
    "An authenticated user identifier (UUID).\n\nUser IDs come from the upstream auth provider and are extracted from JWT `sub` claims or from an API key record."
);
uuid_newtype!(
    SessionId,
    "An anonymous browser session identifier (UUID).\n\nSessions are minted client-side and passed in the `X-Session-Id` header; they scope the file cache and anonymous usage tracking."
);

/// Maximum accepted length of a page identifier.
const PAGE_ID_MAX_LEN: usize = 64;

/// A client-supplied landing-page tag used to scope anonymous usage tracking
/// per page (e.g. `"compress-jpeg"`).
///
/// Page identifiers are lowercased on parse and limited to 64 printable,
/// whitespace-free characters so they can be embedded directly in storage
/// keys.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageId(String);

impl PageId {
    /// View the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PageId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > PAGE_ID_MAX_LEN {
            return Err(IdError::InvalidPageId);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdError::InvalidPageId);
        }
        Ok(Self(s.to_lowercase()))
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PageId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PageId> for String {
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// A job identifier using ULID for time-ordering.
///
/// Job IDs are time-ordered so a prefix scan over the per-identity index
/// yields jobs in chronological order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(Ulid);

impl JobId {
    /// Generate a new `JobId` stamped with the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Return the ULID bytes (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Rebuild a `JobId` from its byte representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid ULID.
    pub fn from_bytes(bytes: [u8; 16]) -> Result<Self, IdError> {
        Ok(Self(Ulid::from_bytes(bytes)))
    }
}

impl FromStr for JobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0.to_string()
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Key tag byte for user identities.
const TAG_USER: u8 = 0x01;
/// Key tag byte for session identities.
const TAG_SESSION: u8 = 0x02;
/// Key tag byte for page identities.
const TAG_PAGE: u8 = 0x03;

/// The identity a usage record is accounted against.
///
/// Resolution order at the HTTP layer is user, then session, then page:
/// authenticated traffic always counts against the user, anonymous traffic
/// against the browser session, and unauthenticated landing-page traffic
/// against the page identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// An authenticated user.
    User(UserId),
    /// An anonymous browser session.
    Session(SessionId),
    /// A landing-page tag for anonymous per-page tracking.
    Page(PageId),
}

impl Identity {
    /// Stable byte encoding used as the storage key: a kind tag followed by
    /// the raw UUID bytes or the page string bytes.
    ///
    /// Page identifiers never contain control characters, so a `0x00`
    /// separator after the encoding is unambiguous in compound index keys.
    #[must_use]
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Self::User(id) => {
                let mut key = Vec::with_capacity(17);
                key.push(TAG_USER);
                key.extend_from_slice(id.as_bytes());
                key
            }
            Self::Session(id) => {
                let mut key = Vec::with_capacity(17);
                key.push(TAG_SESSION);
                key.extend_from_slice(id.as_bytes());
                key
            }
            Self::Page(id) => {
                let mut key = Vec::with_capacity(1 + id.as_str().len());
                key.push(TAG_PAGE);
                key.extend_from_slice(id.as_str().as_bytes());
                key
            }
        }
    }

    /// The identity kind as a lowercase label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Session(_) => "session",
            Self::Page(_) => "page",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Page(id) => write!(f, "page:{id}"),
        }
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,

    /// The input is not a valid page identifier.
    #[error("invalid page identifier")]
    InvalidPageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip() {
        let id = UserId::generate();
        let parsed = UserId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_serde_json() {
        let id = SessionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_id_bytes_roundtrip() {
        let id = JobId::generate();
        let parsed = JobId::from_bytes(id.to_bytes()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn page_id_normalizes_case() {
        let id: PageId = "Compress-JPEG".parse().unwrap();
        assert_eq!(id.as_str(), "compress-jpeg");
    }

    #[test]
    fn page_id_rejects_whitespace_and_empty() {
        assert!("".parse::<PageId>().is_err());
        assert!("   ".parse::<PageId>().is_err());
        assert!("two words".parse::<PageId>().is_err());
        assert!("x".repeat(65).parse::<PageId>().is_err());
    }

    #[test]
    fn identity_key_bytes_are_distinct_per_kind() {
        let uuid = uuid::Uuid::new_v4();
        let user = Identity::User(UserId::from_uuid(uuid));
        let session = Identity::Session(SessionId::from_uuid(uuid));
        assert_ne!(user.key_bytes(), session.key_bytes());
    }

    #[test]
    fn identity_display() {
        let page = Identity::Page("compress-png".parse().unwrap());
        assert_eq!(page.to_string(), "page:compress-png");
        assert_eq!(page.kind(), "page");
    }
}
