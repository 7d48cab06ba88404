//! Optimistic mutations against a remote store.
//!
//! Each operation applies its change to the local [`ThreadStore`] right away,
//! then asks the [`Persistence`] collaborator to do the same. The server's
//! answer is applied as a confirmation event on top, so its counters win.
//! When the two sides disagree the whole thread is fetched again rather
//! than patched.

use agora_shared::{
    CastVote, CreateReply, EditReply, Media, Reply, SortOrder, Target, Thread, ToggleReaction,
    VoteDirection,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::content;
use crate::error::{ThreadError, ThreadResult};
use crate::reactions::ReactionChange;
use crate::services::{Attachment, Identity, MediaService, Persistence, Viewer};
use crate::store::{ThreadEvent, ThreadStore};
use crate::ui::UiState;
use crate::votes::{VoteOutcome, VoteTally};

pub struct ThreadSession<P, I> {
    persistence: P,
    identity: I,
    config: Config,
    store: ThreadStore,
    ui: UiState,
}

impl<P: Persistence, I: Identity> ThreadSession<P, I> {
    /// Fetches `thread_id` and starts a session on it. Reading does not need
    /// a signed-in viewer.
    pub async fn open(
        persistence: P,
        identity: I,
        config: Config,
        thread_id: i64,
    ) -> ThreadResult<Self> {
        let store = fetch(&persistence, &identity, &config, thread_id).await?;
        Ok(Self {
            persistence,
            identity,
            config,
            store,
            ui: UiState::new(),
        })
    }

    pub fn store(&self) -> &ThreadStore {
        &self.store
    }

    pub fn thread(&self) -> Thread {
        self.store.snapshot()
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiState {
        &mut self.ui
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut I {
        &mut self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the local thread with a fresh fetch of `thread_id`. Any
    /// optimistic state is discarded.
    pub async fn load(&mut self, thread_id: i64) -> ThreadResult<Thread> {
        let store = fetch(&self.persistence, &self.identity, &self.config, thread_id).await?;
        if store.thread_id() != self.store.thread_id() {
            self.ui.clear();
        } else {
            self.ui.prune(&store);
        }
        self.store = store;
        Ok(self.store.snapshot())
    }

    pub async fn reload(&mut self) -> ThreadResult<Thread> {
        self.load(self.store.thread_id()).await
    }

    pub fn sorted_replies(&self, order: Option<SortOrder>) -> Vec<Reply> {
        self.store
            .sorted_replies(order.unwrap_or(self.config.default_sort))
    }

    // ── Mutations ──

    /// Adds a reply and returns its server-assigned id.
    pub async fn add_reply(
        &mut self,
        parent_id: Option<i64>,
        content: &str,
        media: Option<Media>,
    ) -> ThreadResult<i64> {
        let viewer = self.current_viewer().await?;
        if let Some(parent) = parent_id {
            ensure_confirmed(parent)?;
        }

        let checkpoint = self.store.clone();
        let provisional_id = self
            .store
            .add_reply(parent_id, content, media.clone(), viewer.user.clone())?;
        debug!(provisional_id, ?parent_id, "reply added optimistically");

        let request = CreateReply {
            parent_id,
            content: content.to_string(),
            media,
        };
        let result = self
            .persistence
            .create_reply(&viewer, self.store.thread_id(), &request)
            .await;

        let receipt = self
            .settle(checkpoint, result, |receipt| ThreadEvent::ReplyConfirmed {
                provisional_id,
                parent_id,
                reply: receipt.reply.clone(),
                reply_count: receipt.reply_count,
            })
            .await?;

        let id = receipt.reply.id;
        self.ui
            .rekey(Target::Reply(provisional_id), Target::Reply(id));
        self.ui.stop_composing();
        Ok(id)
    }

    /// Uploads `attachment` through the media service, then adds a reply
    /// referencing it. Content is checked before anything is uploaded.
    pub async fn add_reply_with_attachment<M: MediaService>(
        &mut self,
        media_service: &M,
        parent_id: Option<i64>,
        content: &str,
        attachment: Attachment,
    ) -> ThreadResult<i64> {
        let viewer = self.current_viewer().await?;
        content::check(content, self.config.max_content_len)?;
        let media = media_service.upload(&viewer, attachment).await?;
        self.add_reply(parent_id, content, Some(media)).await
    }

    pub async fn edit_reply(&mut self, reply_id: i64, content: &str) -> ThreadResult<()> {
        let viewer = self.current_viewer().await?;
        ensure_confirmed(reply_id)?;

        let checkpoint = self.store.clone();
        self.store.edit_reply(reply_id, content, viewer.id())?;
        debug!(reply_id, "reply edited optimistically");

        let request = EditReply {
            content: content.to_string(),
        };
        let result = self
            .persistence
            .edit_reply(&viewer, reply_id, &request)
            .await;

        self.settle(checkpoint, result, |receipt| ThreadEvent::ReplyEdited {
            reply_id: receipt.id,
            content: receipt.content.clone(),
            updated_at: receipt.updated_at,
        })
        .await?;

        self.ui.finish_edit(Target::Reply(reply_id));
        Ok(())
    }

    /// Deletes a reply with its subtree; returns every removed id.
    pub async fn delete_reply(&mut self, reply_id: i64) -> ThreadResult<Vec<i64>> {
        let viewer = self.current_viewer().await?;
        ensure_confirmed(reply_id)?;

        let checkpoint = self.store.clone();
        let removed = self.store.delete_reply(reply_id, viewer.id())?;
        debug!(reply_id, removed = removed.len(), "reply deleted optimistically");

        let result = self.persistence.delete_reply(&viewer, reply_id).await;
        self.settle(checkpoint, result, |receipt| ThreadEvent::ReplyDeleteConfirmed {
            reply_id: receipt.id,
            reply_count: receipt.reply_count,
        })
        .await?;

        self.ui.prune(&self.store);
        Ok(removed)
    }

    /// Casts a vote. The returned outcome carries the server's counters.
    pub async fn vote(
        &mut self,
        target: Target,
        direction: VoteDirection,
    ) -> ThreadResult<VoteOutcome> {
        let viewer = self.current_viewer().await?;
        ensure_confirmed(target.id())?;

        let checkpoint = self.store.clone();
        let optimistic = self.store.vote(target, direction, viewer.id())?;
        debug!(%target, ?direction, action = ?optimistic.action, "vote applied optimistically");

        let request = CastVote {
            target_type: target.entity_type(),
            target_id: target.id(),
            direction,
        };
        let result = self.persistence.vote(&viewer, &request).await;
        let viewer_id = viewer.id();
        let receipt = self
            .settle(checkpoint, result, |receipt| ThreadEvent::VoteConfirmed {
                target,
                viewer: viewer_id,
                receipt: receipt.clone(),
            })
            .await?;

        Ok(VoteOutcome {
            tally: VoteTally::of_receipt(&receipt),
            state: receipt.user_vote,
            action: optimistic.action,
        })
    }

    /// Toggles the viewer's `emoji` on `target`.
    pub async fn react(&mut self, target: Target, emoji: &str) -> ThreadResult<ReactionChange> {
        let viewer = self.current_viewer().await?;
        ensure_confirmed(target.id())?;

        let checkpoint = self.store.clone();
        let change = self.store.react(target, emoji, viewer.id())?;
        debug!(%target, emoji, ?change, "reaction toggled optimistically");

        let request = ToggleReaction {
            target_type: target.entity_type(),
            target_id: target.id(),
            emoji: emoji.trim().to_string(),
        };
        let result = self.persistence.react(&viewer, &request).await;
        self.settle(checkpoint, result, |receipt| ThreadEvent::ReactionsConfirmed {
            target,
            reactions: receipt.reactions.clone(),
        })
        .await?;

        self.ui.close_picker();
        Ok(change)
    }

    // ── Reconciliation ──

    /// Resolves the viewer for a mutation. When it differs from the one the
    /// thread was loaded for (after a sign-in or account switch), the thread
    /// is fetched again so vote states belong to the right viewer.
    async fn current_viewer(&mut self) -> ThreadResult<Viewer> {
        let viewer = self.identity.viewer()?;
        if self.store.viewer() != Some(viewer.id()) {
            info!(
                viewer = viewer.id(),
                previous = ?self.store.viewer(),
                "viewer changed, reloading thread"
            );
            self.reload().await?;
        }
        Ok(viewer)
    }

    /// Resolves one remote call against the optimistic state.
    ///
    /// Success applies the confirmation event; if that does not fit, the
    /// thread is reloaded and the call still counts as done. Divergence
    /// errors trigger a full reload (falling back to `checkpoint` if that
    /// fails too). Anything else is terminal for the action and restores
    /// `checkpoint`.
    async fn settle<T, F>(
        &mut self,
        checkpoint: ThreadStore,
        result: ThreadResult<T>,
        confirm: F,
    ) -> ThreadResult<T>
    where
        F: FnOnce(&T) -> ThreadEvent,
    {
        match result {
            Ok(receipt) => {
                let event = confirm(&receipt);
                if let Err(err) = self.store.apply(event) {
                    warn!(error = %err, "confirmation did not fit local state, reloading");
                    // The write is committed remotely; never roll it back locally.
                    if let Err(reload_err) = self.reload().await {
                        warn!(error = %reload_err, "reload failed, keeping optimistic state");
                    }
                }
                Ok(receipt)
            }
            Err(err) if err.requires_resync() => {
                warn!(error = %err, "remote rejected mutation, reloading thread");
                if let Err(reload_err) = self.resync(checkpoint).await {
                    debug!(error = %reload_err, "reload failed as well");
                }
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "remote refused mutation, rolling back");
                self.store = checkpoint;
                Err(err)
            }
        }
    }

    async fn resync(&mut self, checkpoint: ThreadStore) -> ThreadResult<()> {
        match self.load(checkpoint.thread_id()).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, "reload failed, restoring pre-mutation state");
                self.store = checkpoint;
                Err(err)
            }
        }
    }
}

async fn fetch<P: Persistence, I: Identity>(
    persistence: &P,
    identity: &I,
    config: &Config,
    thread_id: i64,
) -> ThreadResult<ThreadStore> {
    let viewer = identity.viewer().ok();
    let snapshot = persistence.fetch_thread(thread_id, viewer.as_ref()).await?;
    let store = ThreadStore::new(
        snapshot,
        viewer.as_ref().map(|v| v.id()),
        config.store_config(),
    )?;
    info!(
        thread_id,
        replies = store.reachable_reply_count(),
        "thread loaded"
    );
    Ok(store)
}

fn ensure_confirmed(id: i64) -> ThreadResult<()> {
    if ThreadStore::is_provisional(id) {
        return Err(ThreadError::validation(format!(
            "reply {id} has not been confirmed by the server yet"
        )));
    }
    Ok(())
}
