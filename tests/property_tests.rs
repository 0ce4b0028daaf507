//! Property tests for the voting engine.
//!
//! Random sequences of vote intents from random users are applied to posts
//! and comments; after every step the stored score must equal the ledger
//! recount, with at most one ledger record per user.

use agora::forum::{
    Comment, CommentLink, Forum, ForumStorage, Post, StoredVotable, UserId, Votable, VoteKind,
    VoteTransition,
};
use rand::{rngs::OsRng, seq::SliceRandom, Rng};
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn random_direction(rng: &mut impl Rng) -> VoteKind {
    if rng.gen_bool(0.5) {
        VoteKind::Upvote
    } else {
        VoteKind::Downvote
    }
}

/// Checks the ledger against the stored score and a model of each user's vote.
fn assert_consistent<T: StoredVotable>(
    storage: &ForumStorage,
    id: T::Id,
    model: &HashMap<UserId, VoteKind>,
) {
    let records = storage.ledger::<T>(id).unwrap();
    let users: HashSet<UserId> = records.iter().map(|r| r.user).collect();
    assert_eq!(users.len(), records.len(), "duplicate ledger record");
    assert_eq!(records.len(), model.len());
    for record in &records {
        assert_eq!(model.get(&record.user), Some(&record.kind));
    }

    let audit = storage.tally::<T>(id).unwrap();
    let expected: i64 = model.values().map(|k| k.weight()).sum();
    assert_eq!(audit.points, expected);
    assert!(audit.consistent, "score diverged from ledger: {:?}", audit);
}

/// Property: the pure transition never disagrees with the weight change
#[test]
fn property_transition_delta_matches_weights() {
    let mut rng = OsRng;
    let kinds = [None, Some(VoteKind::Upvote), Some(VoteKind::Downvote)];

    for _ in 0..200 {
        let existing = *kinds.choose(&mut rng).unwrap();
        let direction = random_direction(&mut rng);
        let t = VoteTransition::resolve(existing, direction);

        let before = existing.map_or(0, |k| k.weight());
        let after = t.next.map_or(0, |k| k.weight());
        assert_eq!(t.delta, after - before);
        assert_eq!(t.previous, existing);
        assert!(t.delta.abs() <= 2);
    }
}

/// Property: random vote sequences keep post scores equal to the ledger sum
#[test]
fn property_post_score_tracks_ledger() {
    let mut rng = OsRng;
    let temp_dir = TempDir::new().unwrap();
    let storage = ForumStorage::new(temp_dir.path()).unwrap();

    let owner = UserId::new();
    let forum = Forum::new(owner, "prop", "property tests").unwrap();
    storage.insert_forum(&forum).unwrap();
    let post = Post::new(forum.id(), owner, "title", "body").unwrap();
    storage.insert_post(&post).unwrap();

    let users: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
    let mut model: HashMap<UserId, VoteKind> = HashMap::new();

    for _ in 0..150 {
        let user = *users.choose(&mut rng).unwrap();
        let direction = random_direction(&mut rng);

        let outcome = storage.apply_vote::<Post>(post.id(), user, direction).unwrap();
        match model.get(&user) {
            Some(kind) if *kind == direction => {
                model.remove(&user);
            }
            _ => {
                model.insert(user, direction);
            }
        }
        assert_eq!(outcome.transition.next, model.get(&user).copied());
        assert_eq!(
            storage.vote_state::<Post>(post.id(), Some(user)).unwrap().vote,
            model.get(&user).copied()
        );
        assert_consistent::<Post>(&storage, post.id(), &model);
    }
}

/// Property: comments start at one and keep tracking their ledger
#[test]
fn property_comment_score_tracks_ledger() {
    let mut rng = OsRng;
    let temp_dir = TempDir::new().unwrap();
    let storage = ForumStorage::new(temp_dir.path()).unwrap();

    let owner = UserId::new();
    let forum = Forum::new(owner, "prop", "property tests").unwrap();
    storage.insert_forum(&forum).unwrap();
    let post = Post::new(forum.id(), owner, "title", "body").unwrap();
    storage.insert_post(&post).unwrap();

    for _ in 0..5 {
        let author = UserId::new();
        let comment = storage
            .insert_comment(Comment::new(author, CommentLink::Post(post.id()), "hi").unwrap())
            .unwrap();
        assert_eq!(comment.points(), 1);

        let mut model = HashMap::from([(author, VoteKind::Upvote)]);
        assert_consistent::<Comment>(&storage, comment.id(), &model);

        let mut users: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
        users.push(author);

        for _ in 0..rng.gen_range(10..40) {
            let user = *users.choose(&mut rng).unwrap();
            let direction = random_direction(&mut rng);
            storage
                .apply_vote::<Comment>(comment.id(), user, direction)
                .unwrap();
            if model.get(&user) == Some(&direction) {
                model.remove(&user);
            } else {
                model.insert(user, direction);
            }
        }
        assert_consistent::<Comment>(&storage, comment.id(), &model);
    }
}

/// Property: the same vote twice always restores the original score
#[test]
fn property_double_vote_is_identity() {
    let mut rng = OsRng;
    let temp_dir = TempDir::new().unwrap();
    let storage = ForumStorage::new(temp_dir.path()).unwrap();

    let owner = UserId::new();
    let forum = Forum::new(owner, "prop", "property tests").unwrap();
    storage.insert_forum(&forum).unwrap();
    let post = Post::new(forum.id(), owner, "title", "body").unwrap();
    storage.insert_post(&post).unwrap();

    for _ in 0..50 {
        let user = UserId::new();
        let direction = random_direction(&mut rng);
        let before = storage.load_post(post.id()).unwrap().unwrap().points();

        storage.apply_vote::<Post>(post.id(), user, direction).unwrap();
        let restored = storage.apply_vote::<Post>(post.id(), user, direction).unwrap();

        assert_eq!(restored.score, before);
        assert!(restored.transition.is_toggle_off());
    }
}
