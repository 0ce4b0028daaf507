//! Member profiles.
//!
//! A member is the forum-side profile of an authenticated user: one per
//! user, holding a short bio. Users without a member profile can read but
//! cannot publish, comment or join forums.

use crate::error::Result;
use crate::forum::constants::{DEFAULT_BIO, MAX_BIO_LEN};
use crate::forum::types::{current_timestamp_millis, UserId};
use crate::forum::validation::require_text;
use serde::{Deserialize, Serialize};

/// A user's member profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    user: UserId,
    bio: String,
    joined_at: u64,
}

impl Member {
    /// Creates a member profile, falling back to the default bio.
    ///
    /// # Errors
    /// Returns `EmptyInput` if a bio is given but blank, `Validation` if it
    /// is too long.
    pub fn new(user: UserId, bio: Option<&str>) -> Result<Self> {
        let bio = match bio {
            Some(bio) => require_text("bio", bio, MAX_BIO_LEN)?,
            None => DEFAULT_BIO.to_string(),
        };
        Ok(Self {
            user,
            bio,
            joined_at: current_timestamp_millis(),
        })
    }

    /// Replaces the bio.
    pub fn set_bio(&mut self, bio: &str) -> Result<()> {
        self.bio = require_text("bio", bio, MAX_BIO_LEN)?;
        Ok(())
    }

    /// The user this profile belongs to.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// The bio text.
    pub fn bio(&self) -> &str {
        &self.bio
    }

    /// Registration timestamp in milliseconds.
    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }
}
