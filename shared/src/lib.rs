use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Users ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub avatar_url: String,
}

// ── Entities ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Thread,
    Reply,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Thread => f.write_str("thread"),
            EntityType::Reply => f.write_str("reply"),
        }
    }
}

/// The entity a vote or reaction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Target {
    Thread(i64),
    Reply(i64),
}

impl Target {
    pub fn new(entity_type: EntityType, id: i64) -> Self {
        match entity_type {
            EntityType::Thread => Target::Thread(id),
            EntityType::Reply => Target::Reply(id),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Target::Thread(_) => EntityType::Thread,
            Target::Reply(_) => EntityType::Reply,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Target::Thread(id) | Target::Reply(id) => *id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity_type(), self.id())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Open,
    Resolved,
    Closed,
}

/// Opaque attachment reference handed out by the media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub kind: String,
}

/// One emoji tally. `count` always equals `users.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: i64,
    pub users: BTreeSet<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub view_count: u64,
    pub likes: i64,
    pub dislikes: i64,
    pub net_count: i64,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub reply_count: i64,
}

/// A comment on a thread, nested arbitrarily deep through `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: i64,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub dislikes: i64,
    pub net_count: i64,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub is_solution: bool,
    #[serde(default)]
    pub children: Vec<Reply>,
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Where a viewer stands on one entity. Derived from the last server
/// response, never stored on the entity itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    #[default]
    None,
    Liked,
    Disliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub target_type: EntityType,
    pub target_id: i64,
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub likes: i64,
    pub dislikes: i64,
    pub net_count: i64,
    pub user_vote: VoteState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerVote {
    pub target_type: EntityType,
    pub target_id: i64,
    pub state: VoteState,
}

impl ViewerVote {
    pub fn target(&self) -> Target {
        Target::new(self.target_type, self.target_id)
    }
}

// ── Reactions ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleReaction {
    pub target_type: EntityType,
    pub target_id: i64,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionReceipt {
    pub reactions: Vec<Reaction>,
}

// ── Replies ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReply {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub media: Option<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditReply {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyReceipt {
    pub reply: Reply,
    pub reply_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditReceipt {
    pub id: i64,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    pub id: i64,
    pub reply_count: i64,
}

// ── Thread detail ──

/// A thread as served to one viewer: the nested thread plus that viewer's
/// vote on every entity they have voted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub thread: Thread,
    #[serde(default)]
    pub viewer_votes: Vec<ViewerVote>,
}

// ── Sorting ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Highest `net_count` first.
    #[default]
    Best,
    /// Most likes first; dislikes are ignored.
    Top,
    /// Newest first.
    New,
    /// Oldest first.
    Old,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order `{0}` (expected best, top, new or old)")]
pub struct ParseSortOrderError(pub String);

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(SortOrder::Best),
            "top" => Ok(SortOrder::Top),
            "new" => Ok(SortOrder::New),
            "old" => Ok(SortOrder::Old),
            _ => Err(ParseSortOrderError(s.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Best => "best",
            SortOrder::Top => "top",
            SortOrder::New => "new",
            SortOrder::Old => "old",
        })
    }
}
