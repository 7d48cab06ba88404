//! Like/dislike state machine, one per (viewer, entity).

use std::collections::HashMap;

use agora_shared::{Reply, Target, Thread, VoteAction, VoteDirection, VoteReceipt, VoteState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub likes: i64,
    pub dislikes: i64,
    pub net_count: i64,
}

impl VoteTally {
    pub fn of_reply(reply: &Reply) -> Self {
        Self {
            likes: reply.likes,
            dislikes: reply.dislikes,
            net_count: reply.net_count,
        }
    }

    pub fn of_thread(thread: &Thread) -> Self {
        Self {
            likes: thread.likes,
            dislikes: thread.dislikes,
            net_count: thread.net_count,
        }
    }

    pub fn of_receipt(receipt: &VoteReceipt) -> Self {
        Self {
            likes: receipt.likes,
            dislikes: receipt.dislikes,
            net_count: receipt.net_count,
        }
    }

    pub fn write_to_reply(&self, reply: &mut Reply) {
        reply.likes = self.likes;
        reply.dislikes = self.dislikes;
        reply.net_count = self.net_count;
    }

    pub fn write_to_thread(&self, thread: &mut Thread) {
        thread.likes = self.likes;
        thread.dislikes = self.dislikes;
        thread.net_count = self.net_count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub tally: VoteTally,
    pub state: VoteState,
    pub action: VoteAction,
}

/// Applies one vote to the current tally.
///
/// Pure: the result depends only on the tally, the viewer's current state and
/// the direction. The caller writes `outcome.tally` back onto the entity
/// rather than recomputing `net_count` itself.
pub fn cast(tally: VoteTally, state: VoteState, direction: VoteDirection) -> VoteOutcome {
    use VoteDirection::{Down, Up};

    let (next, action, likes, dislikes) = match (state, direction) {
        (VoteState::None, Up) => (VoteState::Liked, VoteAction::Added, 1, 0),
        (VoteState::None, Down) => (VoteState::Disliked, VoteAction::Added, 0, 1),
        // Same direction again toggles off
        (VoteState::Liked, Up) => (VoteState::None, VoteAction::Removed, -1, 0),
        (VoteState::Disliked, Down) => (VoteState::None, VoteAction::Removed, 0, -1),
        // Switching
        (VoteState::Liked, Down) => (VoteState::Disliked, VoteAction::Changed, -1, 1),
        (VoteState::Disliked, Up) => (VoteState::Liked, VoteAction::Changed, 1, -1),
    };

    VoteOutcome {
        tally: VoteTally {
            likes: tally.likes + likes,
            dislikes: tally.dislikes + dislikes,
            net_count: tally.net_count + likes - dislikes,
        },
        state: next,
        action,
    }
}

/// Per-(viewer, target) vote states, as last reported by the server or
/// optimistically advanced since.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteBook {
    states: HashMap<(i64, Target), VoteState>,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, viewer: i64, target: Target) -> VoteState {
        self.states
            .get(&(viewer, target))
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, viewer: i64, target: Target, state: VoteState) {
        if state == VoteState::None {
            self.states.remove(&(viewer, target));
        } else {
            self.states.insert((viewer, target), state);
        }
    }

    /// Drops every entry whose target fails `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Target) -> bool,
    {
        self.states.retain(|(_, target), _| keep(*target));
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
