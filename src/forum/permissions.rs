//! Permission checks for forum operations.
//!
//! The permission model is:
//! - **Anonymous**: can read forums, posts, comments and scores
//! - **Authenticated user**: can create a member profile
//! - **Member** (user with a profile): can create forums, join/leave them,
//!   comment and vote on any post or comment, read their feed and delete
//!   their account
//! - **Forum member**: can publish posts in that forum
//! - **Author**: can edit and delete their own posts and comments
//! - **Forum owner**: is a member of their forum and cannot leave it
//!
//! Authentication itself happens outside this crate; operations receive the
//! acting user as `Option<UserId>`, where `None` means no session.

use crate::error::{AgoraError, Result};
use crate::forum::comment::Comment;
use crate::forum::community::Forum;
use crate::forum::post::Post;
use crate::forum::types::UserId;

/// Something with a single owning user.
pub trait Authored {
    /// The owning user.
    fn author(&self) -> UserId;

    /// Noun used in permission messages.
    fn noun(&self) -> &'static str;
}

impl Authored for Post {
    fn author(&self) -> UserId {
        self.poster()
    }

    fn noun(&self) -> &'static str {
        "post"
    }
}

impl Authored for Comment {
    fn author(&self) -> UserId {
        self.commenter()
    }

    fn noun(&self) -> &'static str {
        "comment"
    }
}

impl Authored for Forum {
    fn author(&self) -> UserId {
        self.owner()
    }

    fn noun(&self) -> &'static str {
        "forum"
    }
}

/// Resolves the acting user, failing with `Unauthorized` when there is no session.
pub fn require_user(actor: Option<UserId>) -> Result<UserId> {
    actor.ok_or_else(|| AgoraError::unauthorized("no authenticated user"))
}

/// Returns true if `user` owns `item`.
pub fn is_owner<T: Authored>(user: UserId, item: &T) -> bool {
    item.author() == user
}

/// Fails with `Forbidden` unless `user` owns `item`.
pub fn ensure_owner<T: Authored>(user: UserId, item: &T, action: &str) -> Result<()> {
    if is_owner(user, item) {
        Ok(())
    } else {
        Err(AgoraError::forbidden(format!(
            "You can only {} your own {}.",
            action,
            item.noun()
        )))
    }
}

/// Fails with `Forbidden` unless the user belongs to the forum.
pub fn ensure_member_of(is_member: bool, forum: &Forum) -> Result<()> {
    if is_member {
        Ok(())
    } else {
        Err(AgoraError::forbidden(format!(
            "You have to be part of the '{}' community to publish a post.",
            forum.name()
        )))
    }
}

/// Fails with `Forbidden` if the user owns the forum they are trying to leave.
pub fn ensure_can_leave(user: UserId, forum: &Forum) -> Result<()> {
    if is_owner(user, forum) {
        Err(AgoraError::forbidden(
            "The owner of a forum cannot leave it.",
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::types::ForumId;

    #[test]
    fn test_require_user() {
        assert!(matches!(
            require_user(None).unwrap_err(),
            AgoraError::Unauthorized(_)
        ));
        let user = UserId::new();
        assert_eq!(require_user(Some(user)).unwrap(), user);
    }

    #[test]
    fn test_ensure_owner() {
        let author = UserId::new();
        let post = Post::new(ForumId::new(), author, "title", "body").unwrap();

        assert!(ensure_owner(author, &post, "edit").is_ok());
        let err = ensure_owner(UserId::new(), &post, "edit").unwrap_err();
        assert!(matches!(err, AgoraError::Forbidden(_)));
        assert_eq!(err.user_message(), "You can only edit your own post.");
    }

    #[test]
    fn test_membership_gate() {
        let forum = Forum::new(UserId::new(), "rust", "about rust").unwrap();
        assert!(ensure_member_of(true, &forum).is_ok());
        assert!(matches!(
            ensure_member_of(false, &forum).unwrap_err(),
            AgoraError::Forbidden(_)
        ));
    }

    #[test]
    fn test_owner_cannot_leave() {
        let owner = UserId::new();
        let forum = Forum::new(owner, "rust", "about rust").unwrap();
        assert!(ensure_can_leave(owner, &forum).is_err());
        assert!(ensure_can_leave(UserId::new(), &forum).is_ok());
    }
}
