//! Vote ledger and the vote state machine.
//!
//! Posts and comments share one voting model:
//!
//! - A user holds at most one [`VoteRecord`] per target.
//! - Casting a vote resolves to a [`VoteTransition`]: a score delta plus the
//!   ledger mutation that keeps the record in step with it.
//! - A target's score always equals `#upvotes - #downvotes` over its ledger.
//!
//! | existing  | requested | delta | ledger          |
//! |-----------|-----------|-------|-----------------|
//! | none      | up        | +1    | create up       |
//! | none      | down      | -1    | create down     |
//! | up        | up        | -1    | delete          |
//! | up        | down      | -2    | flip to down    |
//! | down      | down      | +1    | delete          |
//! | down      | up        | +2    | flip to up      |
//!
//! The transition is pure; [`crate::forum::storage::ForumStorage`] applies it
//! to a target and its ledger inside one transaction.

use crate::error::{AgoraError, Result};
use crate::forum::types::{current_timestamp_millis, EntityId, UserId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    /// +1
    Upvote,
    /// -1
    Downvote,
}

impl VoteKind {
    /// Contribution of one record of this kind to the score.
    pub fn weight(self) -> i64 {
        match self {
            VoteKind::Upvote => 1,
            VoteKind::Downvote => -1,
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteKind::Upvote => write!(f, "upvote"),
            VoteKind::Downvote => write!(f, "downvote"),
        }
    }
}

impl FromStr for VoteKind {
    type Err = AgoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "upvote" | "u" | "+" => Ok(VoteKind::Upvote),
            "down" | "downvote" | "d" | "-" => Ok(VoteKind::Downvote),
            other => Err(AgoraError::validation(format!(
                "Unknown vote direction '{}', expected 'up' or 'down'",
                other
            ))),
        }
    }
}

/// A persisted (user, target, kind) ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Who voted.
    pub user: UserId,
    /// Current direction.
    pub kind: VoteKind,
    /// When the record was created or last flipped, in milliseconds.
    pub cast_at: u64,
}

impl VoteRecord {
    /// Creates a record stamped with the current time.
    pub fn new(user: UserId, kind: VoteKind) -> Self {
        Self {
            user,
            kind,
            cast_at: current_timestamp_millis(),
        }
    }

    /// Returns true for an upvote.
    pub fn is_upvote(&self) -> bool {
        self.kind == VoteKind::Upvote
    }

    /// Returns true for a downvote.
    pub fn is_downvote(&self) -> bool {
        self.kind == VoteKind::Downvote
    }
}

/// Change to apply to the ledger for one (user, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMutation {
    /// No record existed; insert one of this kind.
    Create(VoteKind),
    /// A record of the other kind existed; change it to this kind.
    Flip(VoteKind),
    /// A record of the same kind existed; remove it.
    Delete,
}

/// Outcome of applying a vote intent to an existing ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    /// The user's vote before the transition.
    pub previous: Option<VoteKind>,
    /// The user's vote after the transition.
    pub next: Option<VoteKind>,
    /// Amount to add to the target's score.
    pub delta: i64,
    /// Ledger change that matches `delta`.
    pub mutation: LedgerMutation,
}

impl VoteTransition {
    /// Resolves a requested direction against the user's existing vote.
    pub fn resolve(existing: Option<VoteKind>, direction: VoteKind) -> Self {
        match existing {
            None => Self {
                previous: None,
                next: Some(direction),
                delta: direction.weight(),
                mutation: LedgerMutation::Create(direction),
            },
            Some(kind) if kind == direction => Self {
                previous: Some(kind),
                next: None,
                delta: -kind.weight(),
                mutation: LedgerMutation::Delete,
            },
            Some(kind) => Self {
                previous: Some(kind),
                next: Some(direction),
                delta: direction.weight() - kind.weight(),
                mutation: LedgerMutation::Flip(direction),
            },
        }
    }

    /// Applies the score delta to a target and returns its new score.
    pub(crate) fn apply_score<T: Votable>(&self, target: &mut T) -> i64 {
        *target.points_mut() += self.delta;
        target.points()
    }

    /// Returns true if this transition removed the user's vote.
    pub fn is_toggle_off(&self) -> bool {
        self.mutation == LedgerMutation::Delete
    }
}

/// Result of a vote that was applied and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// The target's score after the vote.
    pub score: i64,
    /// How the user's vote changed.
    pub transition: VoteTransition,
}

impl VoteOutcome {
    /// The voter's view of the target after the vote.
    pub fn state(&self) -> VoteState {
        VoteState::new(self.score, self.transition.next)
    }
}

/// Labels for the two vote buttons shown next to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteButtons {
    /// Label of the upvote button.
    pub upvote: &'static str,
    /// Label of the downvote button.
    pub downvote: &'static str,
}

impl VoteButtons {
    /// Labels for a viewer whose current vote is `vote`.
    pub fn for_vote(vote: Option<VoteKind>) -> Self {
        match vote {
            Some(VoteKind::Upvote) => Self {
                upvote: "Remove Upvote",
                downvote: "Downvote",
            },
            Some(VoteKind::Downvote) => Self {
                upvote: "Upvote",
                downvote: "Remove Downvote",
            },
            None => Self {
                upvote: "Upvote",
                downvote: "Downvote",
            },
        }
    }
}

/// Score of a target together with one viewer's vote on it.
///
/// Returned both by casting a vote and by reading vote state, so a caller
/// renders the score and button labels from a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteState {
    /// The target's current score.
    pub score: i64,
    /// The viewer's current vote, if any.
    pub vote: Option<VoteKind>,
    /// Button labels derived from `vote`.
    pub buttons: VoteButtons,
}

impl VoteState {
    /// Builds the state for a score and viewer vote.
    pub fn new(score: i64, vote: Option<VoteKind>) -> Self {
        Self {
            score,
            vote,
            buttons: VoteButtons::for_vote(vote),
        }
    }
}

/// Recount of a target's ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    /// Number of upvote records.
    pub upvotes: u64,
    /// Number of downvote records.
    pub downvotes: u64,
}

impl VoteTally {
    /// Tallies a set of ledger records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a VoteRecord>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut tally, record| {
                match record.kind {
                    VoteKind::Upvote => tally.upvotes += 1,
                    VoteKind::Downvote => tally.downvotes += 1,
                }
                tally
            })
    }

    /// Score implied by the ledger.
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Returns true if a stored score agrees with the ledger.
    pub fn matches(&self, points: i64) -> bool {
        self.score() == points
    }
}

/// Stored score of a target next to a recount of its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteAudit {
    /// Score stored on the target.
    pub points: i64,
    /// Recount of the ledger.
    pub tally: VoteTally,
    /// Whether the two agree.
    pub consistent: bool,
}

impl VoteAudit {
    /// Compares a stored score against a tally.
    pub fn new(points: i64, tally: VoteTally) -> Self {
        Self {
            points,
            tally,
            consistent: tally.matches(points),
        }
    }
}

pub(crate) mod sealed {
    /// Write access to the score, reserved to the voting engine.
    pub trait Sealed {
        fn points_mut(&mut self) -> &mut i64;
    }
}

/// An entity that carries a score and a vote ledger.
///
/// Implemented by [`crate::forum::Post`] and [`crate::forum::Comment`]. The
/// trait is sealed: scores change only through [`VoteTransition`].
pub trait Votable: sealed::Sealed + Serialize + DeserializeOwned {
    /// Identifier type of the target.
    type Id: EntityId;

    /// The target's id.
    fn id(&self) -> Self::Id;

    /// The target's current score.
    fn points(&self) -> i64;
}
