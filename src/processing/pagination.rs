//! Pure helpers for the paginated history walk.

use serenity::all::MessageId;

use crate::models::SourceMessage;

/// Cursor for the next "newer than" query: the newest id seen so far.
///
/// An empty page leaves the cursor where it was, and the cursor never moves
/// backwards whatever order the page arrived in.
pub fn next_cursor(current: Option<MessageId>, page: &[SourceMessage]) -> Option<MessageId> {
    page.iter().map(|m| m.id).chain(current).max()
}

/// Puts a page into chronological (oldest-first) order.
pub fn order_page(mut page: Vec<SourceMessage>) -> Vec<SourceMessage> {
    page.sort_by_key(|m| m.id);
    page
}

/// A page shorter than requested means the history is exhausted.
pub fn is_last_page(fetched: usize, page_size: u8) -> bool {
    fetched < usize::from(page_size)
}

/// System notices, bot output and messages with nothing to relay are dropped.
pub fn is_eligible(message: &SourceMessage) -> bool {
    !message.is_system && !message.author.bot && !message.is_empty()
}
