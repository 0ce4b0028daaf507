//! Comments and their linkage.
//!
//! A comment replies to exactly one thing: a post, or another comment.
//! The two parent references are kept as separate optional fields so they
//! round-trip through storage unchanged, and every path that builds or
//! changes them goes through [`CommentLink::from_parts`], which rejects
//! "both" and "neither" with `InvalidState`. The store re-checks the
//! linkage before every write.

use crate::error::{AgoraError, Result};
use crate::forum::constants::MAX_CONTENT_LEN;
use crate::forum::types::{current_timestamp_millis, CommentId, PostId, UserId};
use crate::forum::validation::require_text;
use crate::forum::vote::{sealed, Votable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a comment replies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentLink {
    /// A top-level comment on a post.
    Post(PostId),
    /// A reply to another comment.
    Reply(CommentId),
}

impl CommentLink {
    /// Builds a link from the two optional parent references.
    ///
    /// # Errors
    /// Returns `InvalidState` unless exactly one of them is set.
    pub fn from_parts(post: Option<PostId>, in_reply_to: Option<CommentId>) -> Result<Self> {
        match (post, in_reply_to) {
            (Some(post), None) => Ok(CommentLink::Post(post)),
            (None, Some(parent)) => Ok(CommentLink::Reply(parent)),
            (Some(_), Some(_)) => Err(AgoraError::invalid_state(
                "A comment cannot reply to a post and a comment at the same time",
            )),
            (None, None) => Err(AgoraError::invalid_state(
                "A comment must reply to either a post or another comment",
            )),
        }
    }

    fn into_parts(self) -> (Option<PostId>, Option<CommentId>) {
        match self {
            CommentLink::Post(post) => (Some(post), None),
            CommentLink::Reply(parent) => (None, Some(parent)),
        }
    }
}

/// A comment on a post or a reply to another comment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    id: CommentId,
    commenter: UserId,
    post: Option<PostId>,
    in_reply_to: Option<CommentId>,
    content: String,
    points: i64,
    edited: bool,
    pub_date: u64,
}

impl fmt::Debug for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comment")
            .field("id", &self.id)
            .field("post", &self.post)
            .field("in_reply_to", &self.in_reply_to)
            .field("content_len", &self.content.len())
            .field("points", &self.points)
            .finish()
    }
}

impl Comment {
    /// Creates an unvoted comment.
    ///
    /// The self-upvote that every new comment receives is applied by the
    /// store when the comment is inserted, so a freshly built value still
    /// has zero points.
    pub fn new(commenter: UserId, link: CommentLink, content: &str) -> Result<Self> {
        let content = require_text("comment content", content, MAX_CONTENT_LEN)?;
        let (post, in_reply_to) = link.into_parts();

        Ok(Self {
            id: CommentId::new(),
            commenter,
            post,
            in_reply_to,
            content,
            points: 0,
            edited: false,
            pub_date: current_timestamp_millis(),
        })
    }

    /// Creates a comment from raw parent references.
    ///
    /// # Errors
    /// Returns `InvalidState` if both or neither parent is given.
    pub fn from_parts(
        commenter: UserId,
        post: Option<PostId>,
        in_reply_to: Option<CommentId>,
        content: &str,
    ) -> Result<Self> {
        let link = CommentLink::from_parts(post, in_reply_to)?;
        Self::new(commenter, link, content)
    }

    /// What this comment replies to.
    ///
    /// # Errors
    /// Returns `InvalidState` if the stored references are inconsistent.
    pub fn link(&self) -> Result<CommentLink> {
        CommentLink::from_parts(self.post, self.in_reply_to)
    }

    /// Re-points the comment at new parent references.
    ///
    /// The comment is left untouched if the new references are invalid.
    pub fn relink(&mut self, post: Option<PostId>, in_reply_to: Option<CommentId>) -> Result<()> {
        let link = CommentLink::from_parts(post, in_reply_to)?;
        (self.post, self.in_reply_to) = link.into_parts();
        Ok(())
    }

    /// Replaces the content and sets the edited flag.
    pub fn edit(&mut self, new_content: &str) -> Result<()> {
        self.content = require_text("new content for the comment", new_content, MAX_CONTENT_LEN)?;
        self.edited = true;
        Ok(())
    }

    /// The author.
    pub fn commenter(&self) -> UserId {
        self.commenter
    }

    /// Parent post, for top-level comments.
    pub fn post(&self) -> Option<PostId> {
        self.post
    }

    /// Parent comment, for replies.
    pub fn in_reply_to(&self) -> Option<CommentId> {
        self.in_reply_to
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

impl sealed::Sealed for Comment {
    fn points_mut(&mut self) -> &mut i64 {
        &mut self.points
    }
}

impl Votable for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }

    fn points(&self) -> i64 {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_to_post() {
        let post = PostId::new();
        let comment = Comment::from_parts(UserId::new(), Some(post), None, "dfdf").unwrap();
        assert_eq!(comment.link().unwrap(), CommentLink::Post(post));
        assert_eq!(comment.points(), 0);
    }

    #[test]
    fn test_linked_to_comment() {
        let parent = CommentId::new();
        let comment = Comment::from_parts(UserId::new(), None, Some(parent), "dfdf").unwrap();
        assert_eq!(comment.link().unwrap(), CommentLink::Reply(parent));
        assert_eq!(comment.post(), None);
    }

    #[test]
    fn test_neither_link_is_invalid() {
        let err = Comment::from_parts(UserId::new(), None, None, "dfdf").unwrap_err();
        assert!(matches!(err, AgoraError::InvalidState(_)));
    }

    #[test]
    fn test_both_links_is_invalid() {
        let err = Comment::from_parts(
            UserId::new(),
            Some(PostId::new()),
            Some(CommentId::new()),
            "dfdf",
        )
        .unwrap_err();
        assert!(matches!(err, AgoraError::InvalidState(_)));
    }

    #[test]
    fn test_relink_rejects_invalid_and_keeps_state() {
        let post = PostId::new();
        let mut comment = Comment::from_parts(UserId::new(), Some(post), None, "dfdf").unwrap();

        assert!(comment.relink(None, None).is_err());
        assert!(comment.relink(Some(post), Some(CommentId::new())).is_err());
        assert_eq!(comment.link().unwrap(), CommentLink::Post(post));

        let parent = CommentId::new();
        comment.relink(None, Some(parent)).unwrap();
        assert_eq!(comment.link().unwrap(), CommentLink::Reply(parent));
    }

    #[test]
    fn test_edit() {
        let mut comment =
            Comment::from_parts(UserId::new(), Some(PostId::new()), None, "first").unwrap();
        comment.edit("second").unwrap();
        assert_eq!(comment.content(), "second");
        assert!(comment.is_edited());
    }
}
