use std::collections::HashSet;

use uuid::Uuid;

use crate::features::menu::error::{MenuError, MenuResult};

/// Position for a new sibling: one past the current maximum, 0 for an empty group
pub fn next_order(max: Option<i32>) -> i32 {
    max.map_or(0, |max| max + 1)
}

/// Position of each id in a reorder request
pub fn positions(ordered_ids: &[Uuid]) -> impl Iterator<Item = (Uuid, i32)> + '_ {
    ordered_ids
        .iter()
        .zip(0..)
        .map(|(&id, position)| (id, position))
}

/// A reorder request must list every sibling exactly once
pub fn ensure_exact_permutation(ordered_ids: &[Uuid], siblings: &HashSet<Uuid>) -> MenuResult<()> {
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if !seen.insert(*id) {
            return Err(MenuError::Validation(format!(
                "Duplicate id {} in ordered_ids",
                id
            )));
        }
        if !siblings.contains(id) {
            return Err(MenuError::Validation(format!(
                "Id {} does not belong to the sibling group",
                id
            )));
        }
    }

    if seen.len() != siblings.len() {
        return Err(MenuError::Validation(format!(
            "ordered_ids must list all {} siblings, got {}",
            siblings.len(),
            seen.len()
        )));
    }

    Ok(())
}
