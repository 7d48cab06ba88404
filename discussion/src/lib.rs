//! Client-side engine for threaded discussions.
//!
//! A [`ThreadStore`] holds one thread and its reply tree and applies every
//! change through a single reducer. A [`ThreadSession`] wraps a store with
//! the remote collaborators and runs the optimistic update/reconcile cycle.

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod forest;
pub mod reactions;
pub mod services;
pub mod session;
pub mod sort;
pub mod store;
pub mod ui;
pub mod votes;

#[cfg(test)]
mod testing;

pub use agora_shared as model;

pub use api::HttpPersistence;
pub use auth::{StaticIdentity, TokenIdentity};
pub use config::{Config, ConfigError, ReplyCounting, StoreConfig};
pub use error::{ThreadError, ThreadResult};
pub use forest::ReplyForest;
pub use reactions::ReactionChange;
pub use services::{Attachment, Identity, MediaService, Persistence, Viewer};
pub use session::ThreadSession;
pub use store::{ThreadEvent, ThreadStore};
pub use ui::{UiFlags, UiState};
pub use votes::{VoteBook, VoteOutcome, VoteTally};
