//! Reply forest stored as a flat table keyed by id plus a parent/children index.
//!
//! The wire shape of a thread is recursive (`Reply::children`). Inside the
//! engine every reply lives in one [`Slot`] and the structure is kept in the
//! `parent` / `children` id lists, so lookups are O(1) and a subtree delete
//! never has to rebuild ancestors.

use std::collections::{HashMap, HashSet};

use agora_shared::{Reply, Target};

use crate::error::{ThreadError, ThreadResult};

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    /// `reply.children` is always empty here; structure lives in `children`.
    reply: Reply,
    parent: Option<i64>,
    children: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyForest {
    slots: HashMap<i64, Slot>,
    roots: Vec<i64>,
}

impl ReplyForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a forest from the nested wire shape. Ids must be unique across
    /// the whole tree.
    pub fn from_nested(replies: Vec<Reply>) -> ThreadResult<Self> {
        let mut forest = ReplyForest::new();
        for reply in replies {
            forest.insert(None, reply)?;
        }
        Ok(forest)
    }

    /// Rebuilds the nested wire shape, preserving sibling order.
    pub fn to_nested(&self) -> Vec<Reply> {
        self.roots.iter().filter_map(|id| self.subtree(*id)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.slots.contains_key(&id)
    }

    /// Top-level reply ids in display order.
    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn children_of(&self, id: i64) -> Option<&[i64]> {
        self.slots.get(&id).map(|slot| slot.children.as_slice())
    }

    /// Looks up a single reply. The returned value has no `children`; use
    /// [`ReplyForest::subtree`] for the nested form.
    pub fn find(&self, id: i64) -> Option<&Reply> {
        self.slots.get(&id).map(|slot| &slot.reply)
    }

    /// `Some(None)` for a top-level reply, `None` when `id` is unknown.
    pub fn parent_of(&self, id: i64) -> Option<Option<i64>> {
        self.slots.get(&id).map(|slot| slot.parent)
    }

    /// Number of ancestors; top-level replies have depth 0.
    pub fn depth(&self, id: i64) -> Option<usize> {
        let mut current = self.slots.get(&id)?;
        let mut depth = 0;
        while let Some(parent) = current.parent {
            current = self.slots.get(&parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// All descendants of `id` in depth-first pre-order, excluding `id`.
    pub fn descendants(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let Some(slot) = self.slots.get(&id) else {
            return out;
        };
        let mut stack: Vec<i64> = slot.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(child) = self.slots.get(&next) {
                stack.extend(child.children.iter().rev().copied());
            }
        }
        out
    }

    /// The reply with its full subtree, nested.
    pub fn subtree(&self, id: i64) -> Option<Reply> {
        let slot = self.slots.get(&id)?;
        let mut reply = slot.reply.clone();
        reply.children = slot
            .children
            .iter()
            .filter_map(|child| self.subtree(*child))
            .collect();
        Some(reply)
    }

    /// Appends `reply` (and any children it carries) as the last child of
    /// `parent`, or as the last top-level reply when `parent` is `None`.
    ///
    /// Fails without touching the forest if the parent is unknown or any id
    /// in the incoming subtree is already taken.
    pub fn insert(&mut self, parent: Option<i64>, reply: Reply) -> ThreadResult<()> {
        if let Some(pid) = parent {
            if !self.slots.contains_key(&pid) {
                return Err(ThreadError::NotFound(Target::Reply(pid)));
            }
        }

        let mut seen = HashSet::new();
        let mut pending = vec![&reply];
        while let Some(node) = pending.pop() {
            if self.slots.contains_key(&node.id) || !seen.insert(node.id) {
                return Err(ThreadError::conflict(format!(
                    "reply id {} appears more than once",
                    node.id
                )));
            }
            pending.extend(node.children.iter());
        }

        match parent {
            Some(pid) => {
                if let Some(slot) = self.slots.get_mut(&pid) {
                    slot.children.push(reply.id);
                }
            }
            None => self.roots.push(reply.id),
        }

        let mut stack = vec![(parent, reply)];
        while let Some((parent, mut node)) = stack.pop() {
            let children = std::mem::take(&mut node.children);
            let id = node.id;
            self.slots.insert(
                id,
                Slot {
                    reply: node,
                    parent,
                    children: children.iter().map(|c| c.id).collect(),
                },
            );
            stack.extend(children.into_iter().map(|c| (Some(id), c)));
        }
        Ok(())
    }

    /// Replaces the node with `f(node)`. Everything above and below it is
    /// untouched. `f` must not change the id.
    pub fn update<F>(&mut self, id: i64, f: F) -> ThreadResult<()>
    where
        F: FnOnce(&mut Reply),
    {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(ThreadError::NotFound(Target::Reply(id)))?;
        f(&mut slot.reply);
        debug_assert_eq!(slot.reply.id, id, "update must not change the reply id");
        slot.reply.id = id;
        slot.reply.children.clear();
        Ok(())
    }

    /// Removes `id` and its entire subtree. Returns the removed ids, target
    /// first, then descendants in pre-order.
    pub fn remove(&mut self, id: i64) -> ThreadResult<Vec<i64>> {
        let parent = self
            .slots
            .get(&id)
            .map(|slot| slot.parent)
            .ok_or(ThreadError::NotFound(Target::Reply(id)))?;

        match parent {
            Some(pid) => {
                if let Some(slot) = self.slots.get_mut(&pid) {
                    slot.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for gone in &removed {
            self.slots.remove(gone);
        }
        Ok(removed)
    }

    /// Moves the node stored under `old` to `new` without changing its
    /// position; used when the server confirms a provisional reply.
    pub fn rekey(&mut self, old: i64, new: i64) -> ThreadResult<()> {
        if old == new {
            return if self.contains(old) {
                Ok(())
            } else {
                Err(ThreadError::NotFound(Target::Reply(old)))
            };
        }
        if self.slots.contains_key(&new) {
            return Err(ThreadError::conflict(format!("reply id {new} already exists")));
        }
        let mut slot = self
            .slots
            .remove(&old)
            .ok_or(ThreadError::NotFound(Target::Reply(old)))?;
        slot.reply.id = new;

        let siblings = match slot.parent {
            Some(pid) => self.slots.get_mut(&pid).map(|p| &mut p.children),
            None => Some(&mut self.roots),
        };
        if let Some(siblings) = siblings {
            for sibling in siblings.iter_mut().filter(|s| **s == old) {
                *sibling = new;
            }
        }
        for child in &slot.children {
            if let Some(child_slot) = self.slots.get_mut(child) {
                child_slot.parent = Some(new);
            }
        }
        self.slots.insert(new, slot);
        Ok(())
    }

    /// Iterates over every reply in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Reply> {
        self.slots.values().map(|slot| &slot.reply)
    }
}
