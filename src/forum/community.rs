//! Forums (communities).

use crate::error::Result;
use crate::forum::constants::{MAX_FORUM_DESCRIPTION_LEN, MAX_FORUM_NAME_LEN};
use crate::forum::naming::require_signature;
use crate::forum::types::{current_timestamp_millis, ForumId, UserId};
use crate::forum::validation::require_text;
use serde::{Deserialize, Serialize};

/// A community that members join and post in.
///
/// `real_name` is the collision signature of `name` (see
/// [`crate::forum::naming`]); no two forums share one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    id: ForumId,
    owner: UserId,
    name: String,
    real_name: String,
    description: String,
    created_at: u64,
}

impl Forum {
    /// Creates a new forum owned by `owner`.
    ///
    /// # Errors
    /// - `EmptyInput` if the name or description is blank
    /// - `Validation` if either is too long or the name has no letters or digits
    pub fn new(owner: UserId, name: &str, description: &str) -> Result<Self> {
        let name = require_text("forum name", name, MAX_FORUM_NAME_LEN)?;
        let description = require_text(
            "forum description",
            description,
            MAX_FORUM_DESCRIPTION_LEN,
        )?;
        let real_name = require_signature(&name)?;

        Ok(Self {
            id: ForumId::new(),
            owner,
            name,
            real_name,
            description,
            created_at: current_timestamp_millis(),
        })
    }

    /// The forum's id.
    pub fn id(&self) -> ForumId {
        self.id
    }

    /// The user who created the forum.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized signature of the name.
    pub fn real_name(&self) -> &str {
        &self.real_name
    }

    /// Description text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Creation timestamp in milliseconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}
