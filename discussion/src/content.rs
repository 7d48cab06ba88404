//! Reply body checks, run locally before any mutation is dispatched.
//!
//! Bodies are opaque text. Nothing here rewrites them; escaping and markup
//! cleaning belong to the server and to whatever renders the reply.

use crate::error::{ThreadError, ThreadResult};

/// Rejects bodies that are blank or longer than `max_len` characters.
pub fn check(content: &str, max_len: usize) -> ThreadResult<()> {
    if content.trim().is_empty() {
        return Err(ThreadError::validation("content cannot be empty"));
    }
    if content.chars().count() > max_len {
        return Err(ThreadError::validation(format!(
            "content exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}
