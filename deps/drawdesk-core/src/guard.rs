//! Inventory guard
//!
//! Pure predicates deciding if a draw may start. Callers must evaluate them again whenever
//! the category, the group size or the pool changes; nothing here is cached.

use crate::model::{Category, GroupSize};

/// A draw is legal when both the ticket pool and the available prizes cover the group size.
#[inline]
pub fn can_draw(ticket_pool_size: usize, available_prize_count: usize, group_size: GroupSize) -> bool {
    ticket_pool_size >= group_size.get() && available_prize_count >= group_size.get()
}

/// Why a draw can't proceed, or None when [`can_draw`] holds.
///
/// The ticket shortfall is reported before the prize shortfall.
pub fn blocking_reason(ticket_pool_size: usize, available_prize_count: usize, group_size: GroupSize, category: &Category) -> Option<String> {
    let wanted = group_size.get();
    if ticket_pool_size < wanted {
        Some(format!("Need {} more tickets", wanted - ticket_pool_size))
    } else if available_prize_count < wanted {
        Some(format!("Need {} more prizes in Category {}", wanted - available_prize_count, category))
    } else {
        None
    }
}
