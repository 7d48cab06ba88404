//! Per-emoji tallies with an explicit per-viewer membership set.

use std::collections::BTreeSet;

use agora_shared::Reaction;

use crate::error::{ThreadError, ThreadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    Added,
    Removed,
}

pub fn has_reacted(reactions: &[Reaction], emoji: &str, viewer: i64) -> bool {
    reactions
        .iter()
        .any(|r| r.emoji == emoji && r.users.contains(&viewer))
}

/// Toggles `viewer`'s `emoji` reaction in place.
///
/// Membership decides the direction: a viewer already in the set is removed
/// (and the entry dropped once empty), anyone else is added (creating the
/// entry at the end if needed). Other emojis are never touched.
pub fn toggle(
    reactions: &mut Vec<Reaction>,
    emoji: &str,
    viewer: i64,
) -> ThreadResult<ReactionChange> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return Err(ThreadError::validation("reaction emoji cannot be empty"));
    }

    match reactions.iter().position(|r| r.emoji == emoji) {
        Some(idx) => {
            let entry = &mut reactions[idx];
            let change = if entry.users.remove(&viewer) {
                ReactionChange::Removed
            } else {
                entry.users.insert(viewer);
                ReactionChange::Added
            };
            entry.count = entry.users.len() as i64;
            if entry.count == 0 {
                reactions.remove(idx);
            }
            Ok(change)
        }
        None => {
            reactions.push(Reaction {
                emoji: emoji.to_string(),
                count: 1,
                users: BTreeSet::from([viewer]),
            });
            Ok(ReactionChange::Added)
        }
    }
}

/// Recomputes counts from user sets, merges duplicate emoji entries and
/// drops empty ones. Applied to everything that arrives from the server.
pub fn normalize(reactions: Vec<Reaction>) -> Vec<Reaction> {
    let mut out: Vec<Reaction> = Vec::with_capacity(reactions.len());
    for reaction in reactions {
        match out.iter_mut().find(|r| r.emoji == reaction.emoji) {
            Some(existing) => existing.users.extend(reaction.users),
            None => out.push(reaction),
        }
    }
    out.retain(|r| !r.users.is_empty());
    for reaction in &mut out {
        reaction.count = reaction.users.len() as i64;
    }
    out
}
