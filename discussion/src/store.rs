//! The thread aggregate and the reducer every change flows through.
//!
//! Public operations (`add_reply`, `edit_reply`, `delete_reply`, `vote`,
//! `react`) check their inputs, build a [`ThreadEvent`] and hand it to
//! [`ThreadStore::apply`]. Server confirmations arrive as their own events and
//! go through the same function, so reconciling an optimistic change is just
//! applying the confirmed event on top of it. Every operation either succeeds
//! or leaves the store exactly as it was.

use agora_shared::{
    Media, Reaction, Reply, SortOrder, Target, Thread, ThreadSnapshot, User, VoteDirection,
    VoteReceipt, VoteState,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ReplyCounting, StoreConfig};
use crate::content;
use crate::error::{ThreadError, ThreadResult};
use crate::forest::ReplyForest;
use crate::reactions::{self, ReactionChange};
use crate::sort;
use crate::votes::{self, VoteBook, VoteOutcome, VoteTally};

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    /// Full replacement from a fetch.
    Loaded(ThreadSnapshot),
    ReplyAdded {
        parent_id: Option<i64>,
        reply: Reply,
    },
    /// The server accepted a reply that was added under `provisional_id`.
    ReplyConfirmed {
        provisional_id: i64,
        parent_id: Option<i64>,
        reply: Reply,
        reply_count: i64,
    },
    /// Used for both the optimistic edit and the server's echo of it.
    ReplyEdited {
        reply_id: i64,
        content: String,
        updated_at: DateTime<Utc>,
    },
    ReplyDeleted {
        reply_id: i64,
    },
    ReplyDeleteConfirmed {
        reply_id: i64,
        reply_count: i64,
    },
    Voted {
        target: Target,
        viewer: i64,
        outcome: VoteOutcome,
    },
    VoteConfirmed {
        target: Target,
        viewer: i64,
        receipt: VoteReceipt,
    },
    /// Toggles `viewer`'s `emoji` on `target`.
    Reacted {
        target: Target,
        viewer: i64,
        emoji: String,
    },
    ReactionsConfirmed {
        target: Target,
        reactions: Vec<Reaction>,
    },
}

impl ThreadEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ThreadEvent::Loaded(_) => "loaded",
            ThreadEvent::ReplyAdded { .. } => "reply_added",
            ThreadEvent::ReplyConfirmed { .. } => "reply_confirmed",
            ThreadEvent::ReplyEdited { .. } => "reply_edited",
            ThreadEvent::ReplyDeleted { .. } => "reply_deleted",
            ThreadEvent::ReplyDeleteConfirmed { .. } => "reply_delete_confirmed",
            ThreadEvent::Voted { .. } => "voted",
            ThreadEvent::VoteConfirmed { .. } => "vote_confirmed",
            ThreadEvent::Reacted { .. } => "reacted",
            ThreadEvent::ReactionsConfirmed { .. } => "reactions_confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadStore {
    /// Thread fields; `head.replies` is always empty, the tree lives in `forest`.
    head: Thread,
    forest: ReplyForest,
    votes: VoteBook,
    viewer: Option<i64>,
    next_provisional: i64,
    config: StoreConfig,
}

impl ThreadStore {
    /// Builds a store from a fetched snapshot. `viewer` is whoever the
    /// snapshot's `viewer_votes` belong to.
    pub fn new(
        snapshot: ThreadSnapshot,
        viewer: Option<i64>,
        config: StoreConfig,
    ) -> ThreadResult<Self> {
        let ThreadSnapshot {
            mut thread,
            viewer_votes,
        } = snapshot;
        let replies = std::mem::take(&mut thread.replies);
        let head = thread.clone();
        thread.replies = replies;

        let mut store = Self {
            head,
            forest: ReplyForest::new(),
            votes: VoteBook::new(),
            viewer,
            next_provisional: -1,
            config,
        };
        store.apply(ThreadEvent::Loaded(ThreadSnapshot {
            thread,
            viewer_votes,
        }))?;
        Ok(store)
    }

    /// Swaps in a freshly fetched snapshot, discarding optimistic state.
    pub fn replace(&mut self, snapshot: ThreadSnapshot) -> ThreadResult<()> {
        self.apply(ThreadEvent::Loaded(snapshot))
    }

    pub fn thread_id(&self) -> i64 {
        self.head.id
    }

    /// Thread fields without the reply tree.
    pub fn head(&self) -> &Thread {
        &self.head
    }

    pub fn forest(&self) -> &ReplyForest {
        &self.forest
    }

    pub fn viewer(&self) -> Option<i64> {
        self.viewer
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn reply_count(&self) -> i64 {
        self.head.reply_count
    }

    /// Number of replies actually present in the tree.
    pub fn reachable_reply_count(&self) -> i64 {
        self.forest.len() as i64
    }

    pub fn find(&self, reply_id: i64) -> Option<&Reply> {
        self.forest.find(reply_id)
    }

    pub fn contains(&self, target: Target) -> bool {
        match target {
            Target::Thread(id) => id == self.head.id,
            Target::Reply(id) => self.forest.contains(id),
        }
    }

    pub fn vote_state(&self, viewer: i64, target: Target) -> VoteState {
        self.votes.state(viewer, target)
    }

    /// The store's own viewer's vote; `None` for anonymous readers.
    pub fn viewer_vote(&self, target: Target) -> VoteState {
        self.viewer
            .map(|viewer| self.votes.state(viewer, target))
            .unwrap_or_default()
    }

    /// Replies the server has not confirmed yet carry negative ids.
    pub fn is_provisional(reply_id: i64) -> bool {
        reply_id < 0
    }

    /// The whole thread as a nested value.
    pub fn snapshot(&self) -> Thread {
        let mut thread = self.head.clone();
        thread.replies = self.forest.to_nested();
        thread
    }

    /// Nested copy of the tree with only the top level reordered.
    pub fn sorted_replies(&self, order: SortOrder) -> Vec<Reply> {
        sort::sorted(self.forest.to_nested(), order)
    }

    pub fn reactions(&self, target: Target) -> ThreadResult<&[Reaction]> {
        match target {
            Target::Thread(id) if id == self.head.id => Ok(self.head.reactions.as_slice()),
            Target::Reply(id) => self
                .forest
                .find(id)
                .map(|r| r.reactions.as_slice())
                .ok_or(ThreadError::NotFound(target)),
            _ => Err(ThreadError::NotFound(target)),
        }
    }

    pub fn tally(&self, target: Target) -> ThreadResult<VoteTally> {
        match target {
            Target::Thread(id) if id == self.head.id => Ok(VoteTally::of_thread(&self.head)),
            Target::Reply(id) => self
                .forest
                .find(id)
                .map(VoteTally::of_reply)
                .ok_or(ThreadError::NotFound(target)),
            _ => Err(ThreadError::NotFound(target)),
        }
    }

    // ── Operations ──

    /// Adds a reply as the last child of `parent_id`, or as the last
    /// top-level reply. Returns the provisional id it was stored under.
    pub fn add_reply(
        &mut self,
        parent_id: Option<i64>,
        content: &str,
        media: Option<Media>,
        author: User,
    ) -> ThreadResult<i64> {
        if self.head.is_locked {
            return Err(ThreadError::permission_denied("thread is locked"));
        }
        content::check(content, self.config.max_content_len)?;
        if let Some(pid) = parent_id {
            if !self.forest.contains(pid) {
                return Err(ThreadError::NotFound(Target::Reply(pid)));
            }
        }

        let id = self.next_provisional;
        let reply = Reply {
            id,
            content: content.to_string(),
            author,
            created_at: Utc::now(),
            updated_at: None,
            likes: 0,
            dislikes: 0,
            net_count: 0,
            reactions: Vec::new(),
            media,
            is_solution: false,
            children: Vec::new(),
        };
        self.apply(ThreadEvent::ReplyAdded { parent_id, reply })?;
        Ok(id)
    }

    /// Replaces a reply's content. Only its author may do this; children
    /// are untouched.
    pub fn edit_reply(&mut self, reply_id: i64, content: &str, viewer: i64) -> ThreadResult<()> {
        self.authorize(reply_id, viewer, "edit")?;
        content::check(content, self.config.max_content_len)?;
        self.apply(ThreadEvent::ReplyEdited {
            reply_id,
            content: content.to_string(),
            updated_at: Utc::now(),
        })
    }

    /// Removes a reply and its whole subtree. Returns every removed id,
    /// the target first.
    pub fn delete_reply(&mut self, reply_id: i64, viewer: i64) -> ThreadResult<Vec<i64>> {
        self.authorize(reply_id, viewer, "delete")?;
        let mut removed = vec![reply_id];
        removed.extend(self.forest.descendants(reply_id));
        self.apply(ThreadEvent::ReplyDeleted { reply_id })?;
        Ok(removed)
    }

    pub fn vote(
        &mut self,
        target: Target,
        direction: VoteDirection,
        viewer: i64,
    ) -> ThreadResult<VoteOutcome> {
        let tally = self.tally(target)?;
        let outcome = votes::cast(tally, self.votes.state(viewer, target), direction);
        self.apply(ThreadEvent::Voted {
            target,
            viewer,
            outcome,
        })?;
        Ok(outcome)
    }

    pub fn react(
        &mut self,
        target: Target,
        emoji: &str,
        viewer: i64,
    ) -> ThreadResult<ReactionChange> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ThreadError::validation("reaction emoji cannot be empty"));
        }
        let change = if reactions::has_reacted(self.reactions(target)?, emoji, viewer) {
            ReactionChange::Removed
        } else {
            ReactionChange::Added
        };
        self.apply(ThreadEvent::Reacted {
            target,
            viewer,
            emoji: emoji.to_string(),
        })?;
        Ok(change)
    }

    fn authorize(&self, reply_id: i64, viewer: i64, action: &str) -> ThreadResult<()> {
        let reply = self
            .forest
            .find(reply_id)
            .ok_or(ThreadError::NotFound(Target::Reply(reply_id)))?;
        if reply.author.id != viewer {
            return Err(ThreadError::permission_denied(format!(
                "only the author may {action} reply {reply_id}"
            )));
        }
        Ok(())
    }

    // ── Reducer ──

    /// Applies one event. On error nothing has changed.
    pub fn apply(&mut self, event: ThreadEvent) -> ThreadResult<()> {
        debug!(thread_id = self.head.id, event = event.kind(), "applying thread event");

        match event {
            ThreadEvent::Loaded(snapshot) => self.load_snapshot(snapshot),

            ThreadEvent::ReplyAdded { parent_id, reply } => {
                let id = reply.id;
                self.forest.insert(parent_id, reply)?;
                if id <= self.next_provisional {
                    self.next_provisional = id - 1;
                }
                self.head.reply_count += 1;
                Ok(())
            }

            ThreadEvent::ReplyConfirmed {
                provisional_id,
                parent_id,
                reply,
                reply_count,
            } => {
                self.confirm_reply(provisional_id, parent_id, reply)?;
                self.head.reply_count = reply_count;
                Ok(())
            }

            ThreadEvent::ReplyEdited {
                reply_id,
                content,
                updated_at,
            } => self.forest.update(reply_id, |reply| {
                reply.content = content;
                reply.updated_at = Some(updated_at);
            }),

            ThreadEvent::ReplyDeleted { reply_id } => {
                let removed = self.forest.remove(reply_id)?;
                let decrement = match self.config.reply_counting {
                    ReplyCounting::PerEvent => 1,
                    ReplyCounting::Subtree => removed.len() as i64,
                };
                self.head.reply_count = (self.head.reply_count - decrement).max(0);
                self.votes
                    .retain(|target| !matches!(target, Target::Reply(id) if removed.contains(&id)));
                Ok(())
            }

            ThreadEvent::ReplyDeleteConfirmed {
                reply_id,
                reply_count,
            } => {
                // Usually already gone locally; the server's count wins either way.
                if self.forest.contains(reply_id) {
                    let removed = self.forest.remove(reply_id)?;
                    self.votes.retain(
                        |target| !matches!(target, Target::Reply(id) if removed.contains(&id)),
                    );
                }
                self.head.reply_count = reply_count;
                Ok(())
            }

            ThreadEvent::Voted {
                target,
                viewer,
                outcome,
            } => {
                self.write_tally(target, outcome.tally)?;
                self.votes.set(viewer, target, outcome.state);
                Ok(())
            }

            ThreadEvent::VoteConfirmed {
                target,
                viewer,
                receipt,
            } => {
                self.write_tally(target, VoteTally::of_receipt(&receipt))?;
                self.votes.set(viewer, target, receipt.user_vote);
                Ok(())
            }

            ThreadEvent::Reacted {
                target,
                viewer,
                emoji,
            } => {
                // Validate against a copy so a rejected emoji leaves nothing behind.
                let mut next = self.reactions(target)?.to_vec();
                reactions::toggle(&mut next, &emoji, viewer)?;
                self.write_reactions(target, next)
            }

            ThreadEvent::ReactionsConfirmed { target, reactions } => {
                self.write_reactions(target, reactions::normalize(reactions))
            }
        }
    }

    fn load_snapshot(&mut self, snapshot: ThreadSnapshot) -> ThreadResult<()> {
        let ThreadSnapshot {
            mut thread,
            viewer_votes,
        } = snapshot;

        let mut replies = std::mem::take(&mut thread.replies);
        normalize_reply_reactions(&mut replies);
        let forest = ReplyForest::from_nested(replies)?;
        thread.reactions = reactions::normalize(std::mem::take(&mut thread.reactions));

        let mut votes = VoteBook::new();
        if let Some(viewer) = self.viewer {
            for vote in &viewer_votes {
                votes.set(viewer, vote.target(), vote.state);
            }
        }

        self.head = thread;
        self.forest = forest;
        self.votes = votes;
        Ok(())
    }

    fn confirm_reply(
        &mut self,
        provisional_id: i64,
        parent_id: Option<i64>,
        mut reply: Reply,
    ) -> ThreadResult<()> {
        let server_id = reply.id;
        reply.reactions = reactions::normalize(std::mem::take(&mut reply.reactions));

        if self.forest.contains(provisional_id) {
            // Children added while the reply was pending stay attached.
            self.forest.rekey(provisional_id, server_id)?;
            return self.forest.update(server_id, |local| {
                reply.children.clear();
                *local = reply;
            });
        }
        if self.forest.contains(server_id) {
            // A reload already brought it in.
            return Ok(());
        }
        reply.children.clear();
        self.forest.insert(parent_id, reply)
    }

    fn write_tally(&mut self, target: Target, tally: VoteTally) -> ThreadResult<()> {
        match target {
            Target::Thread(id) if id == self.head.id => {
                tally.write_to_thread(&mut self.head);
                Ok(())
            }
            Target::Reply(id) => self.forest.update(id, |reply| tally.write_to_reply(reply)),
            _ => Err(ThreadError::NotFound(target)),
        }
    }

    fn write_reactions(&mut self, target: Target, reactions: Vec<Reaction>) -> ThreadResult<()> {
        match target {
            Target::Thread(id) if id == self.head.id => {
                self.head.reactions = reactions;
                Ok(())
            }
            Target::Reply(id) => self.forest.update(id, |reply| reply.reactions = reactions),
            _ => Err(ThreadError::NotFound(target)),
        }
    }
}

fn normalize_reply_reactions(replies: &mut [Reply]) {
    for reply in replies {
        reply.reactions = reactions::normalize(std::mem::take(&mut reply.reactions));
        normalize_reply_reactions(&mut reply.children);
    }
}
