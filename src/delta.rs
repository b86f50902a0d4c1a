//! Set difference between the identifiers discovered this cycle and the seen set.

use crate::history::SeenSet;
use crate::models::ArticleId;
use itertools::Itertools;

/// Identifiers in `discovered` that are not in `seen`.
///
/// The homepage lists many articles under several sections, so `discovered`
/// is deduplicated first. The result keeps first-discovery order; callers
/// should not depend on it.
pub fn new_ids<I>(discovered: I, seen: &SeenSet) -> Vec<ArticleId>
where
    I: IntoIterator<Item = ArticleId>,
{
    discovered
        .into_iter()
        .unique()
        .filter(|id| !seen.contains(id))
        .collect()
}
