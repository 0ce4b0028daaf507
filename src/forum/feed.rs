//! Member feed.
//!
//! A feed shows the newest post of every forum the member belongs to, and
//! the newest replies other users left on the member's posts and comments.

use crate::forum::comment::Comment;
use crate::forum::constants::FEED_REPLY_LIMIT;
use crate::forum::post::Post;
use crate::forum::types::UserId;
use serde::Serialize;

/// Recent activity around one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    /// Latest post per joined forum, newest first.
    pub posts: Vec<Post>,
    /// Latest replies by other users, newest first.
    pub replies: Vec<Comment>,
}

impl Feed {
    /// Builds a feed for `reader`.
    ///
    /// `forum_posts` holds the posts of each joined forum, one list per
    /// forum. `candidates` holds the comments on the reader's posts and the
    /// replies to the reader's comments; the reader's own are dropped.
    pub fn assemble<I>(reader: UserId, forum_posts: I, candidates: Vec<Comment>) -> Self
    where
        I: IntoIterator<Item = Vec<Post>>,
    {
        let mut posts: Vec<Post> = forum_posts
            .into_iter()
            .filter_map(|posts| posts.into_iter().max_by_key(Post::pub_date))
            .collect();
        posts.sort_by(|a, b| b.pub_date().cmp(&a.pub_date()));

        let mut replies: Vec<Comment> = candidates
            .into_iter()
            .filter(|c| c.commenter() != reader)
            .collect();
        replies.sort_by(|a, b| b.pub_date().cmp(&a.pub_date()));
        replies.truncate(FEED_REPLY_LIMIT);

        Self { posts, replies }
    }

    /// Returns true if there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.replies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::comment::CommentLink;
    use crate::forum::types::{ForumId, PostId};
    use std::thread::sleep;
    use std::time::Duration;

    fn tick() {
        sleep(Duration::from_millis(3));
    }

    #[test]
    fn test_latest_post_per_forum() {
        let reader = UserId::new();
        let (rust, go) = (ForumId::new(), ForumId::new());

        let old_rust = Post::new(rust, reader, "old", "a").unwrap();
        tick();
        let go_post = Post::new(go, UserId::new(), "go", "b").unwrap();
        tick();
        let new_rust = Post::new(rust, UserId::new(), "new", "c").unwrap();

        let feed = Feed::assemble(
            reader,
            vec![vec![old_rust, new_rust.clone()], vec![go_post.clone()], vec![]],
            vec![],
        );
        assert_eq!(feed.posts, vec![new_rust, go_post]);
        assert!(feed.replies.is_empty());
    }

    #[test]
    fn test_replies_skip_own_and_keep_newest() {
        let reader = UserId::new();
        let other = UserId::new();
        let post = PostId::new();

        let own = Comment::new(reader, CommentLink::Post(post), "mine").unwrap();
        let mut others = Vec::new();
        for i in 0..5 {
            tick();
            others.push(Comment::new(other, CommentLink::Post(post), &format!("r{}", i)).unwrap());
        }

        let mut candidates = others.clone();
        candidates.push(own);
        let feed = Feed::assemble(reader, Vec::<Vec<Post>>::new(), candidates);

        let contents: Vec<&str> = feed.replies.iter().map(|c| c.content()).collect();
        assert_eq!(contents, vec!["r4", "r3", "r2"]);
    }

    #[test]
    fn test_empty_feed() {
        let feed = Feed::assemble(UserId::new(), Vec::<Vec<Post>>::new(), vec![]);
        assert!(feed.is_empty());
    }
}
