//! Lost-in-the-middle context reordering.
//!
//! Language models attend best to the start and end of a long context, so
//! the strongest items are placed at both ends and the weakest in the middle.

use std::collections::VecDeque;

/// Reorder best-first `items` so relevance decreases toward the middle.
///
/// `[1, 2, 3, 4, 5]` becomes `[1, 3, 5, 4, 2]`.
pub fn reorder_for_context<T>(items: Vec<T>) -> Vec<T> {
    let mut reordered = VecDeque::with_capacity(items.len());
    for (i, item) in items.into_iter().rev().enumerate() {
        if i % 2 == 1 {
            reordered.push_back(item);
        } else {
            reordered.push_front(item);
        }
    }
    reordered.into()
}
