//! Forum operations as seen by a request handler.
//!
//! Every operation takes the acting user as `Option<UserId>`; `None` means
//! the request carries no session. The service resolves permissions and
//! delegates persistence to [`ForumStorage`], which re-checks structural
//! invariants before writing.

use crate::config::AgoraConfig;
use crate::error::{AgoraError, Result};
use crate::forum::comment::{Comment, CommentLink};
use crate::forum::community::Forum;
use crate::forum::feed::Feed;
use crate::forum::member::Member;
use crate::forum::permissions::{
    ensure_can_leave, ensure_member_of, ensure_owner, require_user,
};
use crate::forum::post::Post;
use crate::forum::storage::{ForumStorage, MemberRemoval, StoredVotable};
use crate::forum::types::{CommentId, EntityId, PostId, UserId};
use crate::forum::vote::{Votable, VoteAudit, VoteKind, VoteState};
use tracing::{info, instrument};

/// Entry point for forum operations.
#[derive(Debug)]
pub struct ForumService {
    storage: ForumStorage,
}

impl ForumService {
    /// Wraps an opened store.
    pub fn new(storage: ForumStorage) -> Self {
        Self { storage }
    }

    /// Opens the store described by `config`.
    pub fn open(config: &AgoraConfig) -> Result<Self> {
        Ok(Self::new(ForumStorage::open(config)?))
    }

    /// Returns a reference to the underlying storage.
    pub fn storage(&self) -> &ForumStorage {
        &self.storage
    }

    fn require_member(&self, actor: Option<UserId>) -> Result<Member> {
        let user = require_user(actor)?;
        self.storage
            .load_member(user)?
            .ok_or_else(|| AgoraError::not_found(format!("member {}", user)))
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Creates the acting user's member profile.
    #[instrument(skip(self, bio))]
    pub fn register_member(&self, actor: Option<UserId>, bio: Option<&str>) -> Result<Member> {
        let user = require_user(actor)?;
        let member = Member::new(user, bio)?;
        self.storage.insert_member(&member)?;
        info!(user = %user, "Registered member");
        Ok(member)
    }

    /// Replaces the acting user's bio.
    #[instrument(skip(self, bio))]
    pub fn edit_bio(&self, actor: Option<UserId>, bio: &str) -> Result<Member> {
        let user = require_user(actor)?;
        self.storage.update_member(user, |member| member.set_bio(bio))
    }

    /// Looks up a member profile.
    pub fn member(&self, user: UserId) -> Result<Member> {
        self.storage
            .load_member(user)?
            .ok_or_else(|| AgoraError::not_found(format!("member {}", user)))
    }

    /// Deletes the acting user's account and everything it owns.
    ///
    /// Owned forums go with all their content; the user's votes elsewhere
    /// are withdrawn.
    #[instrument(skip(self))]
    pub fn delete_member(&self, actor: Option<UserId>) -> Result<MemberRemoval> {
        let user = self.require_member(actor)?.user();
        let removal = self.storage.delete_member(user)?;
        info!(user = %user, forums = removal.forums, posts = removal.posts, "Deleted account");
        Ok(removal)
    }

    /// The acting member's feed: the latest post of each forum they joined
    /// and the newest replies to their posts and comments.
    #[instrument(skip(self))]
    pub fn feed(&self, actor: Option<UserId>) -> Result<Feed> {
        let user = self.require_member(actor)?.user();

        let mut forum_posts = Vec::new();
        for forum in self.storage.member_forums(user)? {
            forum_posts.push(self.storage.forum_posts(forum)?);
        }

        let mut candidates = Vec::new();
        for post in self.storage.member_posts(user)? {
            candidates.extend(self.storage.post_comments(post)?);
        }
        for comment in self.storage.member_comments(user)? {
            candidates.extend(self.storage.comment_replies(comment)?);
        }

        Ok(Feed::assemble(user, forum_posts, candidates))
    }

    // =========================================================================
    // Forums
    // =========================================================================

    /// Creates a forum owned by the acting member.
    ///
    /// # Errors
    /// Returns `DuplicateName` if the name is too similar to an existing one.
    #[instrument(skip(self, description))]
    pub fn create_forum(
        &self,
        actor: Option<UserId>,
        name: &str,
        description: &str,
    ) -> Result<Forum> {
        let owner = self.require_member(actor)?.user();
        let forum = Forum::new(owner, name, description)?;

        if let Some(existing) = self.storage.find_forum_by_signature(forum.real_name())? {
            return Err(AgoraError::duplicate_name(format!(
                "'{}' is too similar to '{}'",
                forum.name(),
                existing.name()
            )));
        }
        self.storage.insert_forum(&forum)?;

        info!(forum = %forum.id(), owner = %owner, "Created forum '{}'", forum.name());
        Ok(forum)
    }

    /// Looks up a forum by its exact name.
    pub fn forum_by_name(&self, name: &str) -> Result<Forum> {
        self.storage
            .find_forum_by_name(name)?
            .ok_or_else(|| AgoraError::not_found(format!("forum '{}'", name.trim())))
    }

    /// Lists all forums ordered by name.
    pub fn list_forums(&self) -> Result<Vec<Forum>> {
        self.storage.list_forums()
    }

    /// Adds the acting member to a forum. Returns false if already a member.
    #[instrument(skip(self))]
    pub fn join_forum(&self, actor: Option<UserId>, forum_name: &str) -> Result<bool> {
        let user = self.require_member(actor)?.user();
        let forum = self.forum_by_name(forum_name)?;
        let joined = self.storage.add_forum_member(forum.id(), user)?;
        if joined {
            info!(forum = %forum.id(), user = %user, "Joined forum");
        }
        Ok(joined)
    }

    /// Removes the acting member from a forum. Returns false if not a member.
    ///
    /// # Errors
    /// Returns `Forbidden` for the forum's owner.
    #[instrument(skip(self))]
    pub fn leave_forum(&self, actor: Option<UserId>, forum_name: &str) -> Result<bool> {
        let user = self.require_member(actor)?.user();
        let forum = self.forum_by_name(forum_name)?;
        ensure_can_leave(user, &forum)?;
        let left = self.storage.remove_forum_member(forum.id(), user)?;
        if left {
            info!(forum = %forum.id(), user = %user, "Left forum");
        }
        Ok(left)
    }

    /// Returns true if `user` belongs to the named forum.
    pub fn is_member(&self, forum_name: &str, user: UserId) -> Result<bool> {
        let forum = self.forum_by_name(forum_name)?;
        self.storage.is_forum_member(forum.id(), user)
    }

    /// Lists the members of the named forum.
    pub fn forum_members(&self, forum_name: &str) -> Result<Vec<UserId>> {
        let forum = self.forum_by_name(forum_name)?;
        self.storage.forum_members(forum.id())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Publishes a post in a forum the acting member belongs to.
    #[instrument(skip(self, content))]
    pub fn publish_post(
        &self,
        actor: Option<UserId>,
        forum_name: &str,
        title: &str,
        content: &str,
    ) -> Result<Post> {
        let user = self.require_member(actor)?.user();
        let forum = self.forum_by_name(forum_name)?;
        ensure_member_of(self.storage.is_forum_member(forum.id(), user)?, &forum)?;

        let post = Post::new(forum.id(), user, title, content)?;
        self.storage.insert_post(&post)?;

        info!(post = %post.id(), forum = %forum.id(), "Published post");
        Ok(post)
    }

    /// Looks up a post.
    pub fn post(&self, id: PostId) -> Result<Post> {
        self.storage
            .load_post(id)?
            .ok_or_else(|| not_found(id))
    }

    /// Lists the posts of the named forum, newest first.
    pub fn forum_posts(&self, forum_name: &str) -> Result<Vec<Post>> {
        let forum = self.forum_by_name(forum_name)?;
        self.storage.forum_posts(forum.id())
    }

    /// Replaces the content of the acting user's post.
    #[instrument(skip(self, content))]
    pub fn edit_post(&self, actor: Option<UserId>, id: PostId, content: &str) -> Result<Post> {
        let user = require_user(actor)?;
        self.storage.update_post(id, |post| {
            ensure_owner(user, post, "edit")?;
            post.edit(content)
        })
    }

    /// Deletes the acting user's post and everything under it.
    #[instrument(skip(self))]
    pub fn delete_post(&self, actor: Option<UserId>, id: PostId) -> Result<Post> {
        let user = require_user(actor)?;
        let post = self
            .storage
            .delete_post(id, |post| ensure_owner(user, post, "delete"))?;
        info!(post = %id, "Deleted post");
        Ok(post)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comments on a post.
    pub fn comment_on_post(
        &self,
        actor: Option<UserId>,
        post: PostId,
        content: &str,
    ) -> Result<Comment> {
        self.create_comment(actor, CommentLink::Post(post), content)
    }

    /// Replies to a comment.
    pub fn reply_to_comment(
        &self,
        actor: Option<UserId>,
        parent: CommentId,
        content: &str,
    ) -> Result<Comment> {
        self.create_comment(actor, CommentLink::Reply(parent), content)
    }

    /// Creates a comment carrying its author's upvote.
    #[instrument(skip(self, content))]
    pub fn create_comment(
        &self,
        actor: Option<UserId>,
        link: CommentLink,
        content: &str,
    ) -> Result<Comment> {
        let user = self.require_member(actor)?.user();
        let comment = self
            .storage
            .insert_comment(Comment::new(user, link, content)?)?;

        info!(comment = %comment.id(), ?link, "Created comment");
        Ok(comment)
    }

    /// Looks up a comment.
    pub fn comment(&self, id: CommentId) -> Result<Comment> {
        self.storage
            .load_comment(id)?
            .ok_or_else(|| not_found(id))
    }

    /// Lists the top-level comments of a post, oldest first.
    pub fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>> {
        self.post(post)?;
        self.storage.post_comments(post)
    }

    /// Lists the direct replies to a comment, oldest first.
    pub fn replies(&self, comment: CommentId) -> Result<Vec<Comment>> {
        self.comment(comment)?;
        self.storage.comment_replies(comment)
    }

    /// Replaces the content of the acting user's comment.
    #[instrument(skip(self, content))]
    pub fn edit_comment(
        &self,
        actor: Option<UserId>,
        id: CommentId,
        content: &str,
    ) -> Result<Comment> {
        let user = require_user(actor)?;
        self.storage.update_comment(id, |comment| {
            ensure_owner(user, comment, "edit")?;
            comment.edit(content)
        })
    }

    /// Deletes the acting user's comment and all replies beneath it.
    #[instrument(skip(self))]
    pub fn delete_comment(&self, actor: Option<UserId>, id: CommentId) -> Result<Comment> {
        let user = require_user(actor)?;
        let comment = self
            .storage
            .delete_comment(id, |comment| ensure_owner(user, comment, "delete"))?;
        info!(comment = %id, "Deleted comment");
        Ok(comment)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Casts, flips or withdraws the acting user's vote on a post.
    pub fn vote_post(
        &self,
        actor: Option<UserId>,
        id: PostId,
        direction: VoteKind,
    ) -> Result<VoteState> {
        self.vote::<Post>(actor, id, direction)
    }

    /// Casts, flips or withdraws the acting user's vote on a comment.
    pub fn vote_comment(
        &self,
        actor: Option<UserId>,
        id: CommentId,
        direction: VoteKind,
    ) -> Result<VoteState> {
        self.vote::<Comment>(actor, id, direction)
    }

    #[instrument(skip(self), fields(target = <T::Id as EntityId>::ENTITY))]
    fn vote<T: StoredVotable>(
        &self,
        actor: Option<UserId>,
        id: T::Id,
        direction: VoteKind,
    ) -> Result<VoteState> {
        let user = self.require_member(actor)?.user();
        let outcome = self.storage.apply_vote::<T>(id, user, direction)?;

        info!(
            user = %user,
            score = outcome.score,
            mutation = ?outcome.transition.mutation,
            "Applied vote"
        );
        Ok(outcome.state())
    }

    /// Score of a post and the viewer's vote on it.
    pub fn post_vote_state(&self, id: PostId, viewer: Option<UserId>) -> Result<VoteState> {
        self.storage.vote_state::<Post>(id, viewer)
    }

    /// Score of a comment and the viewer's vote on it.
    pub fn comment_vote_state(&self, id: CommentId, viewer: Option<UserId>) -> Result<VoteState> {
        self.storage.vote_state::<Comment>(id, viewer)
    }

    /// Recounts a post's ledger against its score.
    pub fn tally_post(&self, id: PostId) -> Result<VoteAudit> {
        self.storage.tally::<Post>(id)
    }

    /// Recounts a comment's ledger against its score.
    pub fn tally_comment(&self, id: CommentId) -> Result<VoteAudit> {
        self.storage.tally::<Comment>(id)
    }
}

fn not_found<I: EntityId>(id: I) -> AgoraError {
    AgoraError::not_found(format!("{} {}", I::ENTITY, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (ForumService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = ForumStorage::new(temp_dir.path()).expect("Failed to create storage");
        (ForumService::new(storage), temp_dir)
    }

    fn member(service: &ForumService) -> UserId {
        let user = UserId::new();
        service.register_member(Some(user), None).unwrap();
        user
    }

    #[test]
    fn test_anonymous_mutations_rejected() {
        let (service, _temp) = create_test_service();
        assert!(matches!(
            service.register_member(None, None).unwrap_err(),
            AgoraError::Unauthorized(_)
        ));
        assert!(matches!(
            service.create_forum(None, "rust", "desc").unwrap_err(),
            AgoraError::Unauthorized(_)
        ));
        assert!(matches!(
            service
                .vote_post(None, PostId::new(), VoteKind::Upvote)
                .unwrap_err(),
            AgoraError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_user_without_profile_cannot_create() {
        let (service, _temp) = create_test_service();
        let err = service
            .create_forum(Some(UserId::new()), "rust", "desc")
            .unwrap_err();
        assert!(matches!(err, AgoraError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_forum_message() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        service.create_forum(Some(owner), "tiktoknews", "a").unwrap();

        let err = service
            .create_forum(Some(owner), "Tik_Tok-News", "b")
            .unwrap_err();
        assert_eq!(err.user_message(), "We already have a forum with that name.");
    }

    #[test]
    fn test_publish_requires_membership() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        let outsider = member(&service);
        service.create_forum(Some(owner), "rust", "desc").unwrap();

        let err = service
            .publish_post(Some(outsider), "rust", "hi", "body")
            .unwrap_err();
        assert!(matches!(err, AgoraError::Forbidden(_)));

        service.join_forum(Some(outsider), "rust").unwrap();
        let post = service
            .publish_post(Some(outsider), "rust", "hi", "body")
            .unwrap();
        assert_eq!(service.forum_posts("rust").unwrap(), vec![post]);
    }

    #[test]
    fn test_owner_cannot_leave() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        service.create_forum(Some(owner), "rust", "desc").unwrap();
        assert!(matches!(
            service.leave_forum(Some(owner), "rust").unwrap_err(),
            AgoraError::Forbidden(_)
        ));
        assert!(service.is_member("rust", owner).unwrap());
    }

    #[test]
    fn test_only_author_edits_post() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        let other = member(&service);
        service.create_forum(Some(owner), "rust", "desc").unwrap();
        let post = service
            .publish_post(Some(owner), "rust", "hi", "body")
            .unwrap();

        let err = service
            .edit_post(Some(other), post.id(), "hacked")
            .unwrap_err();
        assert!(matches!(err, AgoraError::Forbidden(_)));
        assert!(service.delete_post(Some(other), post.id()).is_err());

        let edited = service.edit_post(Some(owner), post.id(), "fixed").unwrap();
        assert!(edited.is_edited());
        assert_eq!(service.post(post.id()).unwrap().content(), "fixed");
    }

    #[test]
    fn test_vote_returns_labels() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        service.create_forum(Some(owner), "rust", "desc").unwrap();
        let post = service
            .publish_post(Some(owner), "rust", "hi", "body")
            .unwrap();

        let state = service
            .vote_post(Some(owner), post.id(), VoteKind::Upvote)
            .unwrap();
        assert_eq!(state.score, 1);
        assert_eq!(state.buttons.upvote, "Remove Upvote");

        let state = service
            .vote_post(Some(owner), post.id(), VoteKind::Upvote)
            .unwrap();
        assert_eq!(state.score, 0);
        assert_eq!(state.buttons.upvote, "Upvote");
    }

    #[test]
    fn test_feed_shows_latest_posts_and_replies() {
        let (service, _temp) = create_test_service();
        let alice = member(&service);
        let bob = member(&service);
        service.create_forum(Some(alice), "rust", "desc").unwrap();
        service.create_forum(Some(bob), "golang", "desc").unwrap();
        service.create_forum(Some(bob), "hidden", "desc").unwrap();
        service.join_forum(Some(alice), "golang").unwrap();

        let mine = service
            .publish_post(Some(alice), "rust", "mine", "body")
            .unwrap();
        service
            .publish_post(Some(bob), "golang", "old", "body")
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(3));
        let latest_go = service
            .publish_post(Some(bob), "golang", "new", "body")
            .unwrap();
        service
            .publish_post(Some(bob), "hidden", "skip", "body")
            .unwrap();

        let own = service.comment_on_post(Some(alice), mine.id(), "self").unwrap();
        let reply = service.reply_to_comment(Some(bob), own.id(), "hi").unwrap();

        let feed = service.feed(Some(alice)).unwrap();
        let titles: Vec<&str> = feed.posts.iter().map(|p| p.title()).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"mine"));
        assert!(feed.posts.contains(&latest_go));
        assert_eq!(feed.replies, vec![reply]);

        assert!(matches!(
            service.feed(Some(UserId::new())).unwrap_err(),
            AgoraError::NotFound(_)
        ));
    }

    #[test]
    fn test_delete_member_requires_profile() {
        let (service, _temp) = create_test_service();
        assert!(matches!(
            service.delete_member(None).unwrap_err(),
            AgoraError::Unauthorized(_)
        ));
        assert!(matches!(
            service.delete_member(Some(UserId::new())).unwrap_err(),
            AgoraError::NotFound(_)
        ));

        let user = member(&service);
        let removal = service.delete_member(Some(user)).unwrap();
        assert_eq!(removal, MemberRemoval::default());
        assert!(service.member(user).is_err());
    }

    #[test]
    fn test_comment_thread() {
        let (service, _temp) = create_test_service();
        let owner = member(&service);
        let reader = member(&service);
        service.create_forum(Some(owner), "rust", "desc").unwrap();
        let post = service
            .publish_post(Some(owner), "rust", "hi", "body")
            .unwrap();

        let top = service
            .comment_on_post(Some(reader), post.id(), "first")
            .unwrap();
        let reply = service
            .reply_to_comment(Some(owner), top.id(), "second")
            .unwrap();

        assert_eq!(top.points(), 1);
        assert_eq!(service.comments_for_post(post.id()).unwrap(), vec![top.clone()]);
        assert_eq!(service.replies(top.id()).unwrap(), vec![reply]);
        assert!(service.tally_comment(top.id()).unwrap().consistent);

        assert!(matches!(
            service.comments_for_post(PostId::new()).unwrap_err(),
            AgoraError::NotFound(_)
        ));
    }
}
