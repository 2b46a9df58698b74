use crate::models::{ActiveSet, ReviewId};

/// A resource is dangling when its review is not in the active set.
///
/// Every scanner goes through this predicate; nothing else decides what
/// counts as orphaned.
pub fn is_dangling(id: ReviewId, active: &ActiveSet) -> bool {
    !active.contains(id)
}
