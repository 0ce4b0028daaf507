//! Posts published in a forum.
//!
//! A post belongs to exactly one forum and is written by a member. Its
//! `points` score is changed only by the voting engine; editing replaces the
//! content and marks the post as edited.

use crate::error::Result;
use crate::forum::constants::{MAX_CONTENT_LEN, MAX_POST_TITLE_LEN};
use crate::forum::types::{current_timestamp_millis, ForumId, PostId, UserId};
use crate::forum::validation::require_text;
use crate::forum::vote::{sealed, Votable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A post in a forum.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    id: PostId,
    forum: ForumId,
    poster: UserId,
    title: String,
    content: String,
    points: i64,
    edited: bool,
    pub_date: u64,
}

impl fmt::Debug for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Post")
            .field("id", &self.id)
            .field("forum", &self.forum)
            .field("title", &self.title)
            .field("content_len", &self.content.len())
            .field("points", &self.points)
            .field("edited", &self.edited)
            .finish()
    }
}

impl Post {
    /// Creates an unvoted post.
    ///
    /// # Errors
    /// Returns `EmptyInput` if the title or content is blank, `Validation`
    /// if either is too long.
    pub fn new(forum: ForumId, poster: UserId, title: &str, content: &str) -> Result<Self> {
        let title = require_text("post title", title, MAX_POST_TITLE_LEN)?;
        let content = require_text("post content", content, MAX_CONTENT_LEN)?;

        Ok(Self {
            id: PostId::new(),
            forum,
            poster,
            title,
            content,
            points: 0,
            edited: false,
            pub_date: current_timestamp_millis(),
        })
    }

    /// Replaces the content and sets the edited flag.
    pub fn edit(&mut self, new_content: &str) -> Result<()> {
        self.content = require_text("new content for the post", new_content, MAX_CONTENT_LEN)?;
        self.edited = true;
        Ok(())
    }

    /// The forum this post belongs to.
    pub fn forum(&self) -> ForumId {
        self.forum
    }

    /// The author.
    pub fn poster(&self) -> UserId {
        self.poster
    }

    /// Title text.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the content was edited after publishing.
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Publication timestamp in milliseconds.
    pub fn pub_date(&self) -> u64 {
        self.pub_date
    }
}

impl sealed::Sealed for Post {
    fn points_mut(&mut self) -> &mut i64 {
        &mut self.points
    }
}

impl Votable for Post {
    type Id = PostId;

    fn id(&self) -> PostId {
        self.id
    }

    fn points(&self) -> i64 {
        self.points
    }
}
