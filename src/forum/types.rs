//! Identifier types shared across the forum model.
//!
//! Every entity is addressed by a random UUID wrapped in its own newtype so
//! a post id can never be passed where a comment id is expected. Ids are
//! stored as their 16 raw bytes, which keeps composite keys fixed-width.

use crate::error::{AgoraError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Common behaviour of entity identifiers.
pub trait EntityId: Copy + fmt::Display + fmt::Debug + Eq {
    /// Human-readable entity name used in errors and logs.
    const ENTITY: &'static str;

    /// Raw key bytes.
    fn as_bytes(&self) -> &[u8; 16];

    /// Rebuilds the id from raw key bytes.
    fn from_slice(bytes: &[u8]) -> Result<Self>;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl EntityId for $name {
            const ENTITY: &'static str = $entity;

            fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            fn from_slice(bytes: &[u8]) -> Result<Self> {
                Uuid::from_slice(bytes).map(Self).map_err(|e| {
                    AgoraError::serialization(format!("Invalid {} id bytes: {}", $entity, e))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = AgoraError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| {
                    AgoraError::validation(format!("'{}' is not a valid {} id", s, $entity))
                })
            }
        }
    };
}

entity_id!(
    /// Identity of an authenticated user, issued by the authentication layer.
    UserId,
    "user"
);

entity_id!(
    /// Identity of a forum (community).
    ForumId,
    "forum"
);

entity_id!(
    /// Identity of a post.
    PostId,
    "post"
);

entity_id!(
    /// Identity of a comment.
    CommentId,
    "comment"
);

/// Returns the current time in milliseconds since the Unix epoch.
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
