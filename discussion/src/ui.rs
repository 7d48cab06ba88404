//! Ephemeral per-session view flags, kept outside the thread model.

use std::collections::HashMap;

use agora_shared::Target;

use crate::store::ThreadStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiFlags {
    pub picker_open: bool,
    /// Draft text while the entity is being edited.
    pub editing: Option<String>,
    pub confirming_delete: bool,
}

impl UiFlags {
    fn is_idle(&self) -> bool {
        !self.picker_open && self.editing.is_none() && !self.confirming_delete
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    flags: HashMap<Target, UiFlags>,
    /// Where the reply composer is attached; `Thread` means a top-level reply.
    composing: Option<Target>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self, target: Target) -> UiFlags {
        self.flags.get(&target).cloned().unwrap_or_default()
    }

    /// Opens the reaction picker on `target`, closing any other open picker.
    pub fn open_picker(&mut self, target: Target) {
        for flags in self.flags.values_mut() {
            flags.picker_open = false;
        }
        self.flags.entry(target).or_default().picker_open = true;
        self.compact();
    }

    pub fn close_picker(&mut self) {
        for flags in self.flags.values_mut() {
            flags.picker_open = false;
        }
        self.compact();
    }

    pub fn open_picker_target(&self) -> Option<Target> {
        self.flags
            .iter()
            .find(|(_, flags)| flags.picker_open)
            .map(|(target, _)| *target)
    }

    pub fn start_edit(&mut self, target: Target, draft: impl Into<String>) {
        self.flags.entry(target).or_default().editing = Some(draft.into());
    }

    pub fn update_draft(&mut self, target: Target, draft: impl Into<String>) {
        if let Some(editing) = self.flags.get_mut(&target).and_then(|f| f.editing.as_mut()) {
            *editing = draft.into();
        }
    }

    /// Ends editing and hands back the draft, if there was one.
    pub fn finish_edit(&mut self, target: Target) -> Option<String> {
        let draft = self.flags.get_mut(&target).and_then(|f| f.editing.take());
        self.compact();
        draft
    }

    pub fn request_delete(&mut self, target: Target) {
        self.flags.entry(target).or_default().confirming_delete = true;
    }

    pub fn cancel_delete(&mut self, target: Target) {
        if let Some(flags) = self.flags.get_mut(&target) {
            flags.confirming_delete = false;
        }
        self.compact();
    }

    pub fn start_composing(&mut self, target: Target) {
        self.composing = Some(target);
    }

    pub fn stop_composing(&mut self) {
        self.composing = None;
    }

    pub fn composing(&self) -> Option<Target> {
        self.composing
    }

    /// Forgets flags for entities that no longer exist in `store`.
    pub fn prune(&mut self, store: &ThreadStore) {
        self.flags.retain(|target, _| store.contains(*target));
        if self.composing.is_some_and(|t| !store.contains(t)) {
            self.composing = None;
        }
    }

    /// Moves flags from a provisional reply id to its confirmed id.
    pub fn rekey(&mut self, old: Target, new: Target) {
        if let Some(flags) = self.flags.remove(&old) {
            self.flags.insert(new, flags);
        }
        if self.composing == Some(old) {
            self.composing = Some(new);
        }
    }

    pub fn clear(&mut self) {
        self.flags.clear();
        self.composing = None;
    }

    fn compact(&mut self) {
        self.flags.retain(|_, flags| !flags.is_idle());
    }
}
