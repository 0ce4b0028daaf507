//! Forum data persistence using RocksDB.
//!
//! ## Storage Layout
//!
//! Entity records are keyed by the 16 raw bytes of their id. Index and
//! ledger keys are composite (`{parent}:{child}`) so children of one parent
//! are found by prefix iteration.
//!
//! - `members`: `{user}` -> Member
//! - `forums`: `{forum}` -> Forum
//! - `forum_names`: `{signature}` -> forum id bytes
//! - `forum_members`: `{forum}:{user}` -> ()
//! - `posts`: `{post}` -> Post
//! - `forum_posts`: `{forum}:{post}` -> ()
//! - `post_votes`: `{post}:{user}` -> VoteRecord
//! - `comments`: `{comment}` -> Comment
//! - `post_comments`: `{post}:{comment}` -> ()
//! - `comment_replies`: `{comment}:{reply}` -> ()
//! - `comment_votes`: `{comment}:{user}` -> VoteRecord
//!
//! Each user also has reverse indexes, so their content can be found
//! without a full scan:
//!
//! - `member_forums`: `{user}:{forum}` -> ()
//! - `member_posts`: `{user}:{post}` -> ()
//! - `member_comments`: `{user}:{comment}` -> ()
//! - `member_post_votes`: `{user}:{post}` -> ()
//! - `member_comment_votes`: `{user}:{comment}` -> ()
//!
//! ## Locking
//!
//! Every mutation runs in one pessimistic transaction. Votes lock the target
//! record first and the ledger key second; inserts lock the parent record
//! (forum, post or comment); cascading deletes lock a comment before its
//! replies. Locks are always taken parent before child, so these
//! transactions cannot wait on each other in a cycle.
//!
//! Deleting a member locks the member, then each owned forum, then posts and
//! comments. It crosses many subtrees, so a conflicting concurrent delete
//! can still end in a lock timeout; the loser is rolled back whole.

use crate::config::AgoraConfig;
use crate::error::{AgoraError, Result};
use crate::forum::comment::{Comment, CommentLink};
use crate::forum::community::Forum;
use crate::forum::member::Member;
use crate::forum::naming::signature;
use crate::forum::post::Post;
use crate::forum::types::{CommentId, EntityId, ForumId, PostId, UserId};
use crate::forum::vote::{
    LedgerMutation, Votable, VoteAudit, VoteKind, VoteOutcome, VoteRecord, VoteState,
    VoteTally, VoteTransition,
};
use crate::storage::{composite_key, composite_prefix, DbTransaction, RocksDbConfig, RocksDbHandle};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Database subdirectory.
const DB_DIR: &str = "forum_db";

/// Column family names.
const CF_MEMBERS: &str = "members";
const CF_FORUMS: &str = "forums";
const CF_FORUM_NAMES: &str = "forum_names";
const CF_FORUM_MEMBERS: &str = "forum_members";
const CF_POSTS: &str = "posts";
const CF_FORUM_POSTS: &str = "forum_posts";
const CF_POST_VOTES: &str = "post_votes";
const CF_COMMENTS: &str = "comments";
const CF_POST_COMMENTS: &str = "post_comments";
const CF_COMMENT_REPLIES: &str = "comment_replies";
const CF_COMMENT_VOTES: &str = "comment_votes";
const CF_MEMBER_FORUMS: &str = "member_forums";
const CF_MEMBER_POSTS: &str = "member_posts";
const CF_MEMBER_COMMENTS: &str = "member_comments";
const CF_MEMBER_POST_VOTES: &str = "member_post_votes";
const CF_MEMBER_COMMENT_VOTES: &str = "member_comment_votes";

const COLUMN_FAMILIES: &[&str] = &[
    CF_MEMBERS,
    CF_FORUMS,
    CF_FORUM_NAMES,
    CF_FORUM_MEMBERS,
    CF_POSTS,
    CF_FORUM_POSTS,
    CF_POST_VOTES,
    CF_COMMENTS,
    CF_POST_COMMENTS,
    CF_COMMENT_REPLIES,
    CF_COMMENT_VOTES,
    CF_MEMBER_FORUMS,
    CF_MEMBER_POSTS,
    CF_MEMBER_COMMENTS,
    CF_MEMBER_POST_VOTES,
    CF_MEMBER_COMMENT_VOTES,
];

/// Index entries carry no value.
const MARKER: &[u8] = &[];

/// A votable entity together with where it and its ledger live.
pub trait StoredVotable: Votable {
    /// Column family holding the entity records.
    const RECORD_CF: &'static str;
    /// Column family holding the vote ledger.
    const LEDGER_CF: &'static str;
    /// Column family indexing each user's votes by voter.
    const VOTER_INDEX_CF: &'static str;

    /// Checks the record before it is written back.
    fn check_before_write(&self) -> Result<()> {
        Ok(())
    }
}

impl StoredVotable for Post {
    const RECORD_CF: &'static str = CF_POSTS;
    const LEDGER_CF: &'static str = CF_POST_VOTES;
    const VOTER_INDEX_CF: &'static str = CF_MEMBER_POST_VOTES;
}

impl StoredVotable for Comment {
    const RECORD_CF: &'static str = CF_COMMENTS;
    const LEDGER_CF: &'static str = CF_COMMENT_VOTES;
    const VOTER_INDEX_CF: &'static str = CF_MEMBER_COMMENT_VOTES;

    fn check_before_write(&self) -> Result<()> {
        self.link().map(|_| ())
    }
}

fn missing<I: EntityId>(id: I) -> AgoraError {
    AgoraError::not_found(format!("{} {}", I::ENTITY, id))
}

fn ids_from_suffixes<I: EntityId>(suffixes: Vec<Vec<u8>>) -> Result<Vec<I>> {
    suffixes.iter().map(|s| I::from_slice(s)).collect()
}

/// Ids indexed under `prefix`, as seen by the transaction.
fn txn_ids<I: EntityId>(txn: &DbTransaction<'_>, cf: &str, prefix: &[u8]) -> Result<Vec<I>> {
    txn.prefix_keys(cf, prefix)?
        .iter()
        .map(|key| I::from_slice(&key[prefix.len()..]))
        .collect()
}

/// What an account deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberRemoval {
    /// Forums the member owned, deleted with everything in them.
    pub forums: usize,
    /// Posts deleted, in owned forums or written by the member.
    pub posts: usize,
    /// Comments deleted, including replies beneath them.
    pub comments: usize,
    /// The member's votes withdrawn from content that remains.
    pub votes: usize,
}

/// RocksDB-backed forum storage.
#[derive(Debug)]
pub struct ForumStorage {
    db: RocksDbHandle,
}

impl ForumStorage {
    /// Opens storage in a data directory with default tuning.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(data_dir, &RocksDbConfig::default())
    }

    /// Opens storage as described by a configuration.
    pub fn open(config: &AgoraConfig) -> Result<Self> {
        Self::open_with(&config.data_dir, &config.rocksdb)
    }

    fn open_with(data_dir: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let db = RocksDbHandle::open(&db_path, config, COLUMN_FAMILIES)?;
        info!(
            lock_timeout_ms = config.lock_timeout_ms,
            "Opened forum RocksDB at {:?}", db_path
        );
        Ok(Self { db })
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Stores a new member profile.
    ///
    /// # Errors
    /// Returns `Validation` if the user already has a profile.
    pub fn insert_member(&self, member: &Member) -> Result<()> {
        let user = member.user();
        let txn = self.db.begin();

        if txn.get_raw_for_update(CF_MEMBERS, user.as_bytes())?.is_some() {
            return Err(AgoraError::validation(format!(
                "user {} already has a profile",
                user
            )));
        }
        txn.put(CF_MEMBERS, user.as_bytes(), member)?;
        txn.commit()?;

        debug!(user = %user, "Stored member");
        Ok(())
    }

    /// Loads a member profile.
    pub fn load_member(&self, user: UserId) -> Result<Option<Member>> {
        self.db.get(CF_MEMBERS, user.as_bytes())
    }

    /// Applies a change to a member profile under lock.
    pub fn update_member<F>(&self, user: UserId, change: F) -> Result<Member>
    where
        F: FnOnce(&mut Member) -> Result<()>,
    {
        let key = user.as_bytes();
        let txn = self.db.begin();

        let mut member: Member = txn
            .get_for_update(CF_MEMBERS, key)?
            .ok_or_else(|| missing(user))?;
        change(&mut member)?;
        txn.put(CF_MEMBERS, key, &member)?;
        txn.commit()?;

        Ok(member)
    }

    /// Deletes a member with everything they own.
    ///
    /// Forums the member owns go with all their posts and memberships. The
    /// member's own posts and comments are deleted with their subtrees, and
    /// every vote they cast on remaining content is withdrawn so scores keep
    /// matching their ledgers. All of it commits in one transaction.
    ///
    /// # Errors
    /// Returns `NotFound` if the user has no profile.
    #[instrument(skip(self))]
    pub fn delete_member(&self, user: UserId) -> Result<MemberRemoval> {
        let txn = self.db.begin();
        txn.get_raw_for_update(CF_MEMBERS, user.as_bytes())?
            .ok_or_else(|| missing(user))?;

        let prefix = composite_prefix(user.as_bytes());
        let mut removal = MemberRemoval::default();

        for forum_id in txn_ids::<ForumId>(&txn, CF_MEMBER_FORUMS, &prefix)? {
            let Some(forum) = txn.get_for_update::<Forum>(CF_FORUMS, forum_id.as_bytes())? else {
                continue;
            };
            if forum.owner() == user {
                let (posts, comments) = Self::remove_forum(&txn, &forum)?;
                removal.forums += 1;
                removal.posts += posts;
                removal.comments += comments;
            } else {
                txn.delete(
                    CF_FORUM_MEMBERS,
                    &composite_key(forum_id.as_bytes(), user.as_bytes()),
                )?;
            }
        }
        txn.prefix_delete(CF_MEMBER_FORUMS, &prefix)?;

        for post_id in txn_ids::<PostId>(&txn, CF_MEMBER_POSTS, &prefix)? {
            if let Some(post) = txn.get_for_update::<Post>(CF_POSTS, post_id.as_bytes())? {
                let (comments, _) = Self::remove_post(&txn, &post)?;
                removal.posts += 1;
                removal.comments += comments;
            }
        }
        removal.votes += Self::retract_votes::<Post>(&txn, user)?;

        for comment_id in txn_ids::<CommentId>(&txn, CF_MEMBER_COMMENTS, &prefix)? {
            removal.comments += Self::delete_comment_tree(&txn, comment_id)?;
        }
        removal.votes += Self::retract_votes::<Comment>(&txn, user)?;

        txn.prefix_delete(CF_MEMBER_POSTS, &prefix)?;
        txn.prefix_delete(CF_MEMBER_COMMENTS, &prefix)?;
        txn.delete(CF_MEMBERS, user.as_bytes())?;
        txn.commit()?;

        info!(
            forums = removal.forums,
            posts = removal.posts,
            comments = removal.comments,
            votes = removal.votes,
            "Deleted member"
        );
        Ok(removal)
    }

    /// Lists the forums a user belongs to, owned ones included.
    pub fn member_forums(&self, user: UserId) -> Result<Vec<ForumId>> {
        let prefix = composite_prefix(user.as_bytes());
        ids_from_suffixes(self.db.prefix_suffixes(CF_MEMBER_FORUMS, &prefix)?)
    }

    /// Lists the posts a user wrote.
    pub fn member_posts(&self, user: UserId) -> Result<Vec<PostId>> {
        let prefix = composite_prefix(user.as_bytes());
        ids_from_suffixes(self.db.prefix_suffixes(CF_MEMBER_POSTS, &prefix)?)
    }

    /// Lists the comments a user wrote.
    pub fn member_comments(&self, user: UserId) -> Result<Vec<CommentId>> {
        let prefix = composite_prefix(user.as_bytes());
        ids_from_suffixes(self.db.prefix_suffixes(CF_MEMBER_COMMENTS, &prefix)?)
    }

    /// Lists the targets a user currently has a vote on.
    pub fn member_votes<T: StoredVotable>(&self, user: UserId) -> Result<Vec<T::Id>> {
        let prefix = composite_prefix(user.as_bytes());
        ids_from_suffixes(self.db.prefix_suffixes(T::VOTER_INDEX_CF, &prefix)?)
    }

    // =========================================================================
    // Forums
    // =========================================================================

    /// Stores a new forum and makes its owner a member.
    ///
    /// The name signature is locked before it is checked, so two concurrent
    /// creations with colliding names cannot both succeed.
    ///
    /// # Errors
    /// Returns `DuplicateName` if a forum with the same signature exists.
    #[instrument(skip(self, forum), fields(forum = %forum.id(), name = forum.name()))]
    pub fn insert_forum(&self, forum: &Forum) -> Result<()> {
        let id = forum.id();
        let txn = self.db.begin();

        let name_key = forum.real_name().as_bytes();
        if txn.get_raw_for_update(CF_FORUM_NAMES, name_key)?.is_some() {
            return Err(AgoraError::duplicate_name(format!(
                "a forum with signature '{}' already exists",
                forum.real_name()
            )));
        }

        txn.put(CF_FORUMS, id.as_bytes(), forum)?;
        txn.put_raw(CF_FORUM_NAMES, name_key, id.as_bytes())?;
        txn.put_raw(
            CF_FORUM_MEMBERS,
            &composite_key(id.as_bytes(), forum.owner().as_bytes()),
            MARKER,
        )?;
        txn.put_raw(
            CF_MEMBER_FORUMS,
            &composite_key(forum.owner().as_bytes(), id.as_bytes()),
            MARKER,
        )?;
        txn.commit()?;

        info!("Stored forum");
        Ok(())
    }

    /// Loads a forum by id.
    pub fn load_forum(&self, id: ForumId) -> Result<Option<Forum>> {
        self.db.get(CF_FORUMS, id.as_bytes())
    }

    /// Finds the forum whose display name is exactly `name`.
    pub fn find_forum_by_name(&self, name: &str) -> Result<Option<Forum>> {
        let name = name.trim();
        let Some(forum) = self.find_forum_by_signature(&signature(name))? else {
            return Ok(None);
        };
        Ok((forum.name() == name).then_some(forum))
    }

    /// Finds the forum holding a name signature.
    pub fn find_forum_by_signature(&self, real_name: &str) -> Result<Option<Forum>> {
        match self.db.get_raw(CF_FORUM_NAMES, real_name.as_bytes())? {
            Some(id_bytes) => self.load_forum(ForumId::from_slice(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// Lists all forums ordered by name.
    pub fn list_forums(&self) -> Result<Vec<Forum>> {
        let mut forums: Vec<Forum> = self.db.collect_all(CF_FORUMS)?;
        forums.sort_by_cached_key(|f| (f.name().to_lowercase(), f.created_at()));
        Ok(forums)
    }

    /// Removes a locked forum with its posts and memberships.
    ///
    /// Returns the number of posts and comments removed.
    fn remove_forum(txn: &DbTransaction<'_>, forum: &Forum) -> Result<(usize, usize)> {
        let id = forum.id();
        let key = id.as_bytes();
        let prefix = composite_prefix(key);

        let mut posts = 0;
        let mut comments = 0;
        for post_id in txn_ids::<PostId>(txn, CF_FORUM_POSTS, &prefix)? {
            if let Some(post) = txn.get_for_update::<Post>(CF_POSTS, post_id.as_bytes())? {
                comments += Self::remove_post(txn, &post)?.0;
                posts += 1;
            }
        }

        for user in txn_ids::<UserId>(txn, CF_FORUM_MEMBERS, &prefix)? {
            txn.delete(CF_MEMBER_FORUMS, &composite_key(user.as_bytes(), key))?;
        }
        txn.prefix_delete(CF_FORUM_MEMBERS, &prefix)?;
        txn.delete(CF_FORUM_NAMES, forum.real_name().as_bytes())?;
        txn.delete(CF_FORUMS, key)?;

        debug!(forum = %id, posts, comments, "Removed forum");
        Ok((posts, comments))
    }

    // =========================================================================
    // Forum membership
    // =========================================================================

    /// Adds a user to a forum. Returns false if they were already a member.
    pub fn add_forum_member(&self, forum: ForumId, user: UserId) -> Result<bool> {
        let key = composite_key(forum.as_bytes(), user.as_bytes());
        let txn = self.db.begin();
        Self::lock_forum_shared(&txn, forum)?;

        if txn.get_raw_for_update(CF_FORUM_MEMBERS, &key)?.is_some() {
            return Ok(false);
        }
        txn.put_raw(CF_FORUM_MEMBERS, &key, MARKER)?;
        txn.put_raw(
            CF_MEMBER_FORUMS,
            &composite_key(user.as_bytes(), forum.as_bytes()),
            MARKER,
        )?;
        txn.commit()?;

        debug!(forum = %forum, user = %user, "Added forum member");
        Ok(true)
    }

    /// Removes a user from a forum. Returns false if they were not a member.
    pub fn remove_forum_member(&self, forum: ForumId, user: UserId) -> Result<bool> {
        let key = composite_key(forum.as_bytes(), user.as_bytes());
        let txn = self.db.begin();
        Self::lock_forum_shared(&txn, forum)?;

        if txn.get_raw_for_update(CF_FORUM_MEMBERS, &key)?.is_none() {
            return Ok(false);
        }
        txn.delete(CF_FORUM_MEMBERS, &key)?;
        txn.delete(
            CF_MEMBER_FORUMS,
            &composite_key(user.as_bytes(), forum.as_bytes()),
        )?;
        txn.commit()?;

        debug!(forum = %forum, user = %user, "Removed forum member");
        Ok(true)
    }

    /// Returns true if the user belongs to the forum.
    pub fn is_forum_member(&self, forum: ForumId, user: UserId) -> Result<bool> {
        self.db.exists(
            CF_FORUM_MEMBERS,
            &composite_key(forum.as_bytes(), user.as_bytes()),
        )
    }

    /// Lists the members of a forum.
    pub fn forum_members(&self, forum: ForumId) -> Result<Vec<UserId>> {
        let prefix = composite_prefix(forum.as_bytes());
        ids_from_suffixes(self.db.prefix_suffixes(CF_FORUM_MEMBERS, &prefix)?)
    }

    /// Share-locks a forum row so it cannot be deleted under the caller.
    fn lock_forum_shared(txn: &DbTransaction<'_>, forum: ForumId) -> Result<()> {
        txn.get_raw_shared(CF_FORUMS, forum.as_bytes())?
            .map(|_| ())
            .ok_or_else(|| missing(forum))
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Stores a new post and indexes it under its forum.
    pub fn insert_post(&self, post: &Post) -> Result<()> {
        let id = post.id();
        let txn = self.db.begin();
        Self::lock_forum_shared(&txn, post.forum())?;

        txn.put(CF_POSTS, id.as_bytes(), post)?;
        txn.put_raw(
            CF_FORUM_POSTS,
            &composite_key(post.forum().as_bytes(), id.as_bytes()),
            MARKER,
        )?;
        txn.put_raw(
            CF_MEMBER_POSTS,
            &composite_key(post.poster().as_bytes(), id.as_bytes()),
            MARKER,
        )?;
        txn.commit()?;

        debug!(post = %id, forum = %post.forum(), "Stored post");
        Ok(())
    }

    /// Loads a post by id.
    pub fn load_post(&self, id: PostId) -> Result<Option<Post>> {
        self.db.get(CF_POSTS, id.as_bytes())
    }

    /// Lists the posts of a forum, newest first.
    pub fn forum_posts(&self, forum: ForumId) -> Result<Vec<Post>> {
        let prefix = composite_prefix(forum.as_bytes());
        let ids: Vec<PostId> = ids_from_suffixes(self.db.prefix_suffixes(CF_FORUM_POSTS, &prefix)?)?;

        let mut posts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(post) = self.load_post(id)? {
                posts.push(post);
            }
        }
        posts.sort_by(|a, b| b.pub_date().cmp(&a.pub_date()));
        Ok(posts)
    }

    /// Applies a change to a post under lock.
    ///
    /// The closure sees the locked record, so permission checks inside it
    /// cannot race with a concurrent delete.
    pub fn update_post<F>(&self, id: PostId, change: F) -> Result<Post>
    where
        F: FnOnce(&mut Post) -> Result<()>,
    {
        let txn = self.db.begin();
        let mut post: Post = txn
            .get_for_update(CF_POSTS, id.as_bytes())?
            .ok_or_else(|| missing(id))?;
        change(&mut post)?;
        txn.put(CF_POSTS, id.as_bytes(), &post)?;
        txn.commit()?;
        Ok(post)
    }

    /// Deletes a post with its votes and every comment beneath it.
    ///
    /// `check` runs against the locked post before anything is removed.
    #[instrument(skip(self, check))]
    pub fn delete_post<F>(&self, id: PostId, check: F) -> Result<Post>
    where
        F: FnOnce(&Post) -> Result<()>,
    {
        let txn = self.db.begin();

        let post: Post = txn
            .get_for_update(CF_POSTS, id.as_bytes())?
            .ok_or_else(|| missing(id))?;
        check(&post)?;

        let (removed_comments, removed_votes) = Self::remove_post(&txn, &post)?;
        txn.commit()?;

        info!(removed_comments, removed_votes, "Deleted post");
        Ok(post)
    }

    /// Removes a locked post with its votes and comment trees.
    ///
    /// Returns the number of comments and votes removed.
    fn remove_post(txn: &DbTransaction<'_>, post: &Post) -> Result<(usize, usize)> {
        let id = post.id();
        let key = id.as_bytes();
        let prefix = composite_prefix(key);

        let mut removed_comments = 0;
        for comment in txn_ids::<CommentId>(txn, CF_POST_COMMENTS, &prefix)? {
            removed_comments += Self::delete_comment_tree(txn, comment)?;
        }
        let removed_votes = Self::clear_ledger::<Post>(txn, key)?;
        txn.prefix_delete(CF_POST_COMMENTS, &prefix)?;
        txn.delete(CF_FORUM_POSTS, &composite_key(post.forum().as_bytes(), key))?;
        txn.delete(CF_MEMBER_POSTS, &composite_key(post.poster().as_bytes(), key))?;
        txn.delete(CF_POSTS, key)?;

        Ok((removed_comments, removed_votes))
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Stores a new comment with its author's upvote already applied.
    ///
    /// The parent is locked for the whole insert, so a comment cannot land
    /// under a post or comment that is being deleted. The self-upvote goes
    /// through the same path as any other vote and commits together with the
    /// comment.
    ///
    /// # Errors
    /// - `InvalidState` if the comment's linkage is inconsistent
    /// - `NotFound` if the parent does not exist
    #[instrument(skip(self, comment), fields(comment = %comment.id()))]
    pub fn insert_comment(&self, mut comment: Comment) -> Result<Comment> {
        let id = comment.id();
        let txn = self.db.begin();

        let index_key = match comment.link()? {
            CommentLink::Post(post) => {
                txn.get_raw_for_update(CF_POSTS, post.as_bytes())?
                    .ok_or_else(|| missing(post))?;
                (CF_POST_COMMENTS, composite_key(post.as_bytes(), id.as_bytes()))
            }
            CommentLink::Reply(parent) => {
                txn.get_raw_for_update(CF_COMMENTS, parent.as_bytes())?
                    .ok_or_else(|| missing(parent))?;
                (CF_COMMENT_REPLIES, composite_key(parent.as_bytes(), id.as_bytes()))
            }
        };

        let author = comment.commenter();
        Self::vote_in_txn(&txn, &mut comment, author, VoteKind::Upvote)?;
        txn.put_raw(index_key.0, &index_key.1, MARKER)?;
        txn.put_raw(
            CF_MEMBER_COMMENTS,
            &composite_key(author.as_bytes(), id.as_bytes()),
            MARKER,
        )?;
        txn.commit()?;

        debug!(points = comment.points(), "Stored comment");
        Ok(comment)
    }

    /// Loads a comment by id.
    pub fn load_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        self.db.get(CF_COMMENTS, id.as_bytes())
    }

    /// Lists the top-level comments of a post, oldest first.
    pub fn post_comments(&self, post: PostId) -> Result<Vec<Comment>> {
        self.indexed_comments(CF_POST_COMMENTS, post.as_bytes())
    }

    /// Lists the direct replies to a comment, oldest first.
    pub fn comment_replies(&self, comment: CommentId) -> Result<Vec<Comment>> {
        self.indexed_comments(CF_COMMENT_REPLIES, comment.as_bytes())
    }

    fn indexed_comments(&self, index_cf: &str, parent: &[u8]) -> Result<Vec<Comment>> {
        let prefix = composite_prefix(parent);
        let ids: Vec<CommentId> = ids_from_suffixes(self.db.prefix_suffixes(index_cf, &prefix)?)?;

        let mut comments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(comment) = self.load_comment(id)? {
                comments.push(comment);
            }
        }
        comments.sort_by_key(|c| c.pub_date());
        Ok(comments)
    }

    /// Applies a change to a comment under lock.
    ///
    /// # Errors
    /// Returns `InvalidState` if the change leaves the linkage inconsistent
    /// or moves the comment to a different parent.
    pub fn update_comment<F>(&self, id: CommentId, change: F) -> Result<Comment>
    where
        F: FnOnce(&mut Comment) -> Result<()>,
    {
        let txn = self.db.begin();
        let mut comment: Comment = txn
            .get_for_update(CF_COMMENTS, id.as_bytes())?
            .ok_or_else(|| missing(id))?;
        let link = comment.link()?;

        change(&mut comment)?;
        comment.check_before_write()?;
        if comment.link()? != link {
            return Err(AgoraError::invalid_state(
                "A comment cannot be moved to a different parent",
            ));
        }

        txn.put(CF_COMMENTS, id.as_bytes(), &comment)?;
        txn.commit()?;
        Ok(comment)
    }

    /// Deletes a comment with its votes and all replies beneath it.
    ///
    /// `check` runs against the locked comment before anything is removed.
    #[instrument(skip(self, check))]
    pub fn delete_comment<F>(&self, id: CommentId, check: F) -> Result<Comment>
    where
        F: FnOnce(&Comment) -> Result<()>,
    {
        let txn = self.db.begin();
        let comment: Comment = txn
            .get_for_update(CF_COMMENTS, id.as_bytes())?
            .ok_or_else(|| missing(id))?;
        check(&comment)?;

        let removed = Self::delete_comment_tree(&txn, id)?;
        txn.commit()?;

        info!(removed, "Deleted comment");
        Ok(comment)
    }

    /// Removes a comment subtree inside an open transaction.
    ///
    /// Each comment is locked before its reply index is read, so a reply
    /// inserted concurrently is either seen here or rejected for a missing
    /// parent.
    fn delete_comment_tree(txn: &DbTransaction<'_>, root: CommentId) -> Result<usize> {
        let mut pending = vec![root];
        let mut removed = 0;

        while let Some(id) = pending.pop() {
            let key = id.as_bytes();
            let Some(comment) = txn.get_for_update::<Comment>(CF_COMMENTS, key)? else {
                continue;
            };

            let prefix = composite_prefix(key);
            pending.extend(txn_ids::<CommentId>(txn, CF_COMMENT_REPLIES, &prefix)?);
            txn.prefix_delete(CF_COMMENT_REPLIES, &prefix)?;
            Self::clear_ledger::<Comment>(txn, key)?;

            match comment.link()? {
                CommentLink::Post(post) => {
                    txn.delete(CF_POST_COMMENTS, &composite_key(post.as_bytes(), key))?
                }
                CommentLink::Reply(parent) => {
                    txn.delete(CF_COMMENT_REPLIES, &composite_key(parent.as_bytes(), key))?
                }
            }
            txn.delete(
                CF_MEMBER_COMMENTS,
                &composite_key(comment.commenter().as_bytes(), key),
            )?;
            txn.delete(CF_COMMENTS, key)?;
            removed += 1;
        }

        Ok(removed)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Applies one user's vote intent to a post or comment.
    ///
    /// The score change and the ledger change commit together or not at all.
    ///
    /// # Errors
    /// Returns `NotFound` if the target does not exist, or `Storage` if a
    /// lock could not be acquired in time. Nothing is persisted on error.
    #[instrument(skip(self), fields(target = <T::Id as EntityId>::ENTITY))]
    pub fn apply_vote<T: StoredVotable>(
        &self,
        id: T::Id,
        user: UserId,
        direction: VoteKind,
    ) -> Result<VoteOutcome> {
        let txn = self.db.begin();
        let mut target: T = txn
            .get_for_update(T::RECORD_CF, id.as_bytes())?
            .ok_or_else(|| missing(id))?;

        let outcome = Self::vote_in_txn(&txn, &mut target, user, direction)?;
        txn.commit()?;

        debug!(
            score = outcome.score,
            delta = outcome.transition.delta,
            mutation = ?outcome.transition.mutation,
            "Applied vote"
        );
        Ok(outcome)
    }

    /// Resolves a vote against the ledger and writes both records.
    ///
    /// The caller must already hold the lock on `target`'s record.
    fn vote_in_txn<T: StoredVotable>(
        txn: &DbTransaction<'_>,
        target: &mut T,
        user: UserId,
        direction: VoteKind,
    ) -> Result<VoteOutcome> {
        let target_id = target.id();
        let ledger_key = composite_key(target_id.as_bytes(), user.as_bytes());

        let existing: Option<VoteRecord> = txn.get_for_update(T::LEDGER_CF, &ledger_key)?;
        debug_assert!(existing.as_ref().map_or(true, |r| r.user == user));

        let transition = VoteTransition::resolve(existing.map(|r| r.kind), direction);
        let score = transition.apply_score(target);

        let voter_key = composite_key(user.as_bytes(), target_id.as_bytes());
        match transition.mutation {
            LedgerMutation::Create(kind) => {
                txn.put(T::LEDGER_CF, &ledger_key, &VoteRecord::new(user, kind))?;
                txn.put_raw(T::VOTER_INDEX_CF, &voter_key, MARKER)?;
            }
            LedgerMutation::Flip(kind) => {
                txn.put(T::LEDGER_CF, &ledger_key, &VoteRecord::new(user, kind))?
            }
            LedgerMutation::Delete => {
                txn.delete(T::LEDGER_CF, &ledger_key)?;
                txn.delete(T::VOTER_INDEX_CF, &voter_key)?;
            }
        }

        target.check_before_write()?;
        txn.put(T::RECORD_CF, target_id.as_bytes(), target)?;

        Ok(VoteOutcome { score, transition })
    }

    /// Deletes a target's whole ledger along with the voters' index entries.
    fn clear_ledger<T: StoredVotable>(txn: &DbTransaction<'_>, target: &[u8]) -> Result<usize> {
        let prefix = composite_prefix(target);
        let keys = txn.prefix_keys(T::LEDGER_CF, &prefix)?;
        for key in &keys {
            let voter = &key[prefix.len()..];
            txn.delete(T::VOTER_INDEX_CF, &composite_key(voter, target))?;
            txn.delete(T::LEDGER_CF, key)?;
        }
        Ok(keys.len())
    }

    /// Withdraws every vote `user` holds on targets of type `T`.
    ///
    /// Each withdrawal goes through the toggle-off path, so the vote's weight
    /// leaves the target's score together with its ledger record.
    fn retract_votes<T: StoredVotable>(txn: &DbTransaction<'_>, user: UserId) -> Result<usize> {
        let prefix = composite_prefix(user.as_bytes());
        let mut retracted = 0;

        for id in txn_ids::<T::Id>(txn, T::VOTER_INDEX_CF, &prefix)? {
            let Some(mut target) = txn.get_for_update::<T>(T::RECORD_CF, id.as_bytes())? else {
                continue;
            };
            let ledger_key = composite_key(id.as_bytes(), user.as_bytes());
            let Some(record) = txn.get_for_update::<VoteRecord>(T::LEDGER_CF, &ledger_key)? else {
                continue;
            };
            Self::vote_in_txn(txn, &mut target, user, record.kind)?;
            retracted += 1;
        }
        txn.prefix_delete(T::VOTER_INDEX_CF, &prefix)?;

        Ok(retracted)
    }

    /// Reads a target's score and one viewer's vote on it.
    ///
    /// Both values are read under shared locks, so they come from the same
    /// committed state.
    pub fn vote_state<T: StoredVotable>(
        &self,
        id: T::Id,
        viewer: Option<UserId>,
    ) -> Result<VoteState> {
        let txn = self.db.begin();
        let target: T = txn
            .get_shared(T::RECORD_CF, id.as_bytes())?
            .ok_or_else(|| missing(id))?;

        let vote = match viewer {
            Some(user) => txn
                .get_shared::<VoteRecord>(
                    T::LEDGER_CF,
                    &composite_key(id.as_bytes(), user.as_bytes()),
                )?
                .map(|record| record.kind),
            None => None,
        };

        Ok(VoteState::new(target.points(), vote))
    }

    /// Returns every ledger record of a target.
    pub fn ledger<T: StoredVotable>(&self, id: T::Id) -> Result<Vec<VoteRecord>> {
        self.db
            .prefix_collect(T::LEDGER_CF, &composite_prefix(id.as_bytes()))
    }

    /// Recounts a target's ledger next to its stored score.
    ///
    /// The target's record is share-locked while the ledger is read; every
    /// vote locks that record exclusively, so the two cannot disagree
    /// because of an in-flight vote.
    pub fn tally<T: StoredVotable>(&self, id: T::Id) -> Result<VoteAudit> {
        let txn = self.db.begin();
        let target: T = txn
            .get_shared(T::RECORD_CF, id.as_bytes())?
            .ok_or_else(|| missing(id))?;
        let records: Vec<VoteRecord> =
            txn.prefix_collect(T::LEDGER_CF, &composite_prefix(id.as_bytes()))?;

        Ok(VoteAudit::new(
            target.points(),
            VoteTally::from_records(&records),
        ))
    }
}
