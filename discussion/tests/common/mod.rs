//! In-memory stand-ins for the remote collaborators.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use agora_discussion::model::{
    CastVote, CreateReply, DeleteReceipt, EditReceipt, EditReply, Media, ReactionReceipt, Reply,
    ReplyReceipt, Target, Thread, ThreadSnapshot, ThreadStatus, ToggleReaction, User, ViewerVote,
    VoteReceipt, VoteState,
};
use agora_discussion::{
    reactions, votes, Attachment, MediaService, Persistence, StaticIdentity, ThreadError,
    ThreadResult, Viewer, VoteTally,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const THREAD_ID: i64 = 7;

// ── Fixtures ──

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + seconds, 0).unwrap()
}

pub fn user(id: i64) -> User {
    User {
        id,
        username: format!("user{id}"),
        avatar_url: String::new(),
    }
}

pub fn viewer(id: i64) -> Viewer {
    Viewer {
        user: user(id),
        token: format!("token-{id}"),
    }
}

pub fn signed_in(id: i64) -> StaticIdentity {
    StaticIdentity::signed_in(viewer(id))
}

pub fn reply(id: i64, author: i64, content: &str) -> Reply {
    Reply {
        id,
        content: content.to_string(),
        author: user(author),
        created_at: at(id),
        updated_at: None,
        likes: 0,
        dislikes: 0,
        net_count: 0,
        reactions: Vec::new(),
        media: None,
        is_solution: false,
        children: Vec::new(),
    }
}

pub fn thread(replies: Vec<Reply>) -> Thread {
    Thread {
        id: THREAD_ID,
        title: "Release notes".to_string(),
        content: "What changed in 0.4?".to_string(),
        author: user(ALICE),
        created_at: at(0),
        updated_at: None,
        tags: BTreeSet::from(["releases".to_string()]),
        status: ThreadStatus::Open,
        is_pinned: false,
        is_locked: false,
        view_count: 3,
        likes: 0,
        dislikes: 0,
        net_count: 0,
        reactions: Vec::new(),
        reply_count: count(&replies),
        replies,
    }
}

pub fn snapshot(thread: Thread) -> ThreadSnapshot {
    ThreadSnapshot {
        thread,
        viewer_votes: Vec::new(),
    }
}

pub fn count(replies: &[Reply]) -> i64 {
    replies.iter().map(|r| 1 + count(&r.children)).sum()
}

pub fn find_mut(replies: &mut [Reply], id: i64) -> Option<&mut Reply> {
    replies.iter_mut().find_map(|r| {
        if r.id == id {
            Some(r)
        } else {
            find_mut(&mut r.children, id)
        }
    })
}

fn remove(replies: &mut Vec<Reply>, id: i64) -> Option<Reply> {
    if let Some(pos) = replies.iter().position(|r| r.id == id) {
        return Some(replies.remove(pos));
    }
    replies.iter_mut().find_map(|r| remove(&mut r.children, id))
}

fn subtree_ids(reply: &Reply, out: &mut Vec<i64>) {
    out.push(reply.id);
    for child in &reply.children {
        subtree_ids(child, out);
    }
}

// ── Fake forum ──

struct ForumState {
    thread: Thread,
    votes: HashMap<(i64, Target), VoteState>,
    next_id: i64,
    failures: VecDeque<ThreadError>,
    failures_by_call: HashMap<&'static str, VecDeque<ThreadError>>,
    calls: Vec<&'static str>,
}

/// Authoritative store held in memory. Clones share state, so a test can
/// keep a handle after moving one into a session.
#[derive(Clone)]
pub struct FakeForum {
    state: Arc<Mutex<ForumState>>,
}

impl FakeForum {
    pub fn new(thread: Thread) -> Self {
        Self {
            state: Arc::new(Mutex::new(ForumState {
                thread,
                votes: HashMap::new(),
                next_id: 1000,
                failures: VecDeque::new(),
                failures_by_call: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// The next call, of any kind, fails with `err` without touching state.
    pub fn fail_next(&self, err: ThreadError) {
        self.lock().failures.push_back(err);
    }

    /// The next call named `call` fails with `err`; other calls go through.
    pub fn fail_next_call(&self, call: &'static str, err: ThreadError) {
        self.lock()
            .failures_by_call
            .entry(call)
            .or_default()
            .push_back(err);
    }

    /// Id handed to the next created reply.
    pub fn set_next_id(&self, id: i64) {
        self.lock().next_id = id;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn thread(&self) -> Thread {
        self.lock().thread.clone()
    }

    /// Mutates the stored thread as another client would.
    pub fn edit_remotely<F: FnOnce(&mut Thread)>(&self, f: F) {
        f(&mut self.lock().thread);
    }

    fn lock(&self) -> MutexGuard<'_, ForumState> {
        self.state.lock().unwrap()
    }

    fn begin(&self, call: &'static str) -> ThreadResult<MutexGuard<'_, ForumState>> {
        let mut state = self.lock();
        state.calls.push(call);
        let targeted = state
            .failures_by_call
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        match targeted.or_else(|| state.failures.pop_front()) {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl ForumState {
    fn tally(&mut self, target: Target) -> ThreadResult<VoteTally> {
        match target {
            Target::Thread(id) if id == self.thread.id => Ok(VoteTally::of_thread(&self.thread)),
            Target::Reply(id) => find_mut(&mut self.thread.replies, id)
                .map(|r| VoteTally::of_reply(r))
                .ok_or(ThreadError::NotFound(target)),
            _ => Err(ThreadError::NotFound(target)),
        }
    }

    fn write_tally(&mut self, target: Target, tally: VoteTally) {
        match target {
            Target::Thread(_) => tally.write_to_thread(&mut self.thread),
            Target::Reply(id) => {
                if let Some(reply) = find_mut(&mut self.thread.replies, id) {
                    tally.write_to_reply(reply);
                }
            }
        }
    }

    fn authored_reply(&mut self, viewer: &Viewer, id: i64) -> ThreadResult<&mut Reply> {
        let reply = find_mut(&mut self.thread.replies, id)
            .ok_or(ThreadError::NotFound(Target::Reply(id)))?;
        if reply.author.id != viewer.id() {
            return Err(ThreadError::permission_denied("not your reply"));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Persistence for FakeForum {
    async fn fetch_thread(
        &self,
        thread_id: i64,
        viewer: Option<&Viewer>,
    ) -> ThreadResult<ThreadSnapshot> {
        let state = self.begin("fetch_thread")?;
        if state.thread.id != thread_id {
            return Err(ThreadError::NotFound(Target::Thread(thread_id)));
        }
        let viewer_votes = viewer
            .map(|v| {
                state
                    .votes
                    .iter()
                    .filter(|((who, _), _)| *who == v.id())
                    .map(|((_, target), vote)| ViewerVote {
                        target_type: target.entity_type(),
                        target_id: target.id(),
                        state: *vote,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ThreadSnapshot {
            thread: state.thread.clone(),
            viewer_votes,
        })
    }

    async fn create_reply(
        &self,
        viewer: &Viewer,
        thread_id: i64,
        request: &CreateReply,
    ) -> ThreadResult<ReplyReceipt> {
        let mut state = self.begin("create_reply")?;
        if state.thread.id != thread_id {
            return Err(ThreadError::NotFound(Target::Thread(thread_id)));
        }
        if state.thread.is_locked {
            return Err(ThreadError::permission_denied("thread is locked"));
        }
        if request.content.trim().is_empty() {
            return Err(ThreadError::validation("content is required"));
        }

        let id = state.next_id;
        state.next_id += 1;
        let reply = Reply {
            id,
            content: request.content.clone(),
            author: viewer.user.clone(),
            created_at: Utc::now(),
            updated_at: None,
            likes: 0,
            dislikes: 0,
            net_count: 0,
            reactions: Vec::new(),
            media: request.media.clone(),
            is_solution: false,
            children: Vec::new(),
        };

        match request.parent_id {
            Some(parent) => find_mut(&mut state.thread.replies, parent)
                .ok_or(ThreadError::NotFound(Target::Reply(parent)))?
                .children
                .push(reply.clone()),
            None => state.thread.replies.push(reply.clone()),
        }
        state.thread.reply_count = count(&state.thread.replies);
        Ok(ReplyReceipt {
            reply,
            reply_count: state.thread.reply_count,
        })
    }

    async fn edit_reply(
        &self,
        viewer: &Viewer,
        reply_id: i64,
        request: &EditReply,
    ) -> ThreadResult<EditReceipt> {
        let mut state = self.begin("edit_reply")?;
        let reply = state.authored_reply(viewer, reply_id)?;
        let updated_at = Utc::now();
        reply.content = request.content.clone();
        reply.updated_at = Some(updated_at);
        Ok(EditReceipt {
            id: reply_id,
            content: request.content.clone(),
            updated_at,
        })
    }

    async fn delete_reply(&self, viewer: &Viewer, reply_id: i64) -> ThreadResult<DeleteReceipt> {
        let mut state = self.begin("delete_reply")?;
        state.authored_reply(viewer, reply_id)?;
        let removed = remove(&mut state.thread.replies, reply_id)
            .ok_or(ThreadError::NotFound(Target::Reply(reply_id)))?;

        let mut gone = Vec::new();
        subtree_ids(&removed, &mut gone);
        state
            .votes
            .retain(|(_, target), _| !matches!(target, Target::Reply(id) if gone.contains(id)));
        state.thread.reply_count = count(&state.thread.replies);
        Ok(DeleteReceipt {
            id: reply_id,
            reply_count: state.thread.reply_count,
        })
    }

    async fn vote(&self, viewer: &Viewer, request: &CastVote) -> ThreadResult<VoteReceipt> {
        let mut state = self.begin("vote")?;
        let target = Target::new(request.target_type, request.target_id);
        let tally = state.tally(target)?;
        let current = state
            .votes
            .get(&(viewer.id(), target))
            .copied()
            .unwrap_or_default();

        let outcome = votes::cast(tally, current, request.direction);
        state.write_tally(target, outcome.tally);
        state.votes.insert((viewer.id(), target), outcome.state);
        Ok(VoteReceipt {
            likes: outcome.tally.likes,
            dislikes: outcome.tally.dislikes,
            net_count: outcome.tally.net_count,
            user_vote: outcome.state,
        })
    }

    async fn react(&self, viewer: &Viewer, request: &ToggleReaction) -> ThreadResult<ReactionReceipt> {
        let mut state = self.begin("react")?;
        let target = Target::new(request.target_type, request.target_id);
        let list = match target {
            Target::Thread(id) if id == state.thread.id => &mut state.thread.reactions,
            Target::Reply(id) => {
                &mut find_mut(&mut state.thread.replies, id)
                    .ok_or(ThreadError::NotFound(target))?
                    .reactions
            }
            _ => return Err(ThreadError::NotFound(target)),
        };
        reactions::toggle(list, &request.emoji, viewer.id())?;
        Ok(ReactionReceipt {
            reactions: list.clone(),
        })
    }
}

// ── Fake media ──

#[derive(Clone, Default)]
pub struct FakeMedia {
    uploads: Arc<Mutex<Vec<String>>>,
}

impl FakeMedia {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaService for FakeMedia {
    async fn upload(&self, _viewer: &Viewer, attachment: Attachment) -> ThreadResult<Media> {
        self.uploads
            .lock()
            .unwrap()
            .push(attachment.file_name.clone());
        Ok(Media {
            url: format!("https://media.example/{}", attachment.file_name),
            kind: attachment.content_type,
        })
    }
}
