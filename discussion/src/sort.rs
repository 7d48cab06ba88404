//! Orderings for the top level of a reply tree.

use agora_shared::{Reply, SortOrder};

/// Reorders `replies` in place. Only the slice itself moves; each reply's
/// `children` keep their insertion order. Ties keep their relative order.
pub fn sort_replies(replies: &mut [Reply], order: SortOrder) {
    match order {
        SortOrder::Best => replies.sort_by(|a, b| b.net_count.cmp(&a.net_count)),
        SortOrder::Top => replies.sort_by(|a, b| b.likes.cmp(&a.likes)),
        SortOrder::New => replies.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Old => replies.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
}

pub fn sorted(mut replies: Vec<Reply>, order: SortOrder) -> Vec<Reply> {
    sort_replies(&mut replies, order);
    replies
}
