//! Contracts for the collaborators the engine consumes but does not implement.

use agora_shared::{
    CastVote, CreateReply, DeleteReceipt, EditReceipt, EditReply, Media, ReactionReceipt,
    ReplyReceipt, ThreadSnapshot, ToggleReaction, User, VoteReceipt,
};
use async_trait::async_trait;

use crate::error::ThreadResult;

/// The signed-in user plus the credential to present to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user: User,
    pub token: String,
}

impl Viewer {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Supplies the current viewer. Fails with `AuthenticationRequired` when
/// nobody is signed in.
pub trait Identity: Send + Sync {
    fn viewer(&self) -> ThreadResult<Viewer>;
}

/// The authoritative store. Every mutating call answers with the
/// post-mutation counters, which take precedence over local recomputation.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn fetch_thread(&self, thread_id: i64, viewer: Option<&Viewer>)
        -> ThreadResult<ThreadSnapshot>;

    async fn create_reply(
        &self,
        viewer: &Viewer,
        thread_id: i64,
        request: &CreateReply,
    ) -> ThreadResult<ReplyReceipt>;

    async fn edit_reply(
        &self,
        viewer: &Viewer,
        reply_id: i64,
        request: &EditReply,
    ) -> ThreadResult<EditReceipt>;

    async fn delete_reply(&self, viewer: &Viewer, reply_id: i64) -> ThreadResult<DeleteReceipt>;

    async fn vote(&self, viewer: &Viewer, request: &CastVote) -> ThreadResult<VoteReceipt>;

    async fn react(&self, viewer: &Viewer, request: &ToggleReaction)
        -> ThreadResult<ReactionReceipt>;
}

/// A file the viewer wants to attach to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stores attachments and hands back an opaque reference. The engine keeps
/// the reference on `Reply::media` without looking inside.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn upload(&self, viewer: &Viewer, attachment: Attachment) -> ThreadResult<Media>;
}
