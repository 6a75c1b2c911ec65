//! Type-safe identifiers for sessions, connections and exchanges.
//!
//! All three are opaque strings on the wire. Generated values are UUID v4,
//! client-supplied session ids are accepted verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the underlying string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a shortened display form (first 8 characters).
            #[must_use]
            pub fn short(&self) -> &str {
                self.0.get(..8).unwrap_or(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifies a logical conversation.
    ///
    /// Supplied by the client (request field or socket path segment) or
    /// generated when absent. No meaning is attached to its format.
    SessionId
);

impl SessionId {
    /// Resolves a client-supplied session id, generating one when the
    /// value is missing or blank. Any other value is kept byte for byte.
    pub fn resolve(supplied: Option<&str>) -> Self {
        match supplied {
            Some(id) if !id.trim().is_empty() => Self::new(id),
            _ => Self::generate(),
        }
    }
}

opaque_id!(
    /// Identifies one live transport channel. Unique for the process lifetime.
    ConnectionId
);

opaque_id!(
    /// Identifies one exchange (one relay run).
    MessageId
);
