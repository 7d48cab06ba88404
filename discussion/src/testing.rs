//! Fixtures shared by the unit tests.

use std::collections::BTreeSet;

use agora_shared::{Reply, Thread, ThreadSnapshot, ThreadStatus, User};
use chrono::{DateTime, TimeZone, Utc};

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;

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

pub fn reply(id: i64, content: &str) -> Reply {
    Reply {
        id,
        content: content.to_string(),
        author: user(ALICE),
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

pub fn thread(id: i64, replies: Vec<Reply>) -> Thread {
    Thread {
        id,
        title: "Welcome".to_string(),
        content: "Say hi".to_string(),
        author: user(ALICE),
        created_at: at(0),
        updated_at: None,
        tags: BTreeSet::new(),
        status: ThreadStatus::Open,
        is_pinned: false,
        is_locked: false,
        view_count: 0,
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

fn count(replies: &[Reply]) -> i64 {
    replies.iter().map(|r| 1 + count(&r.children)).sum()
}
