//! Random block selection for the new-tab views

use std::collections::HashSet;

use rand::Rng;

use crate::model::{Block, BlockCache};

/// Pick up to `count` distinct blocks, skipping any id in `exclude`.
///
/// Uses the thread-local generator; see [`choose_random_blocks_with`].
pub fn choose_random_blocks<'c>(
    cache: &'c BlockCache,
    count: usize,
    exclude: &[String],
) -> Vec<&'c Block> {
    choose_random_blocks_with(cache, count, exclude, &mut rand::rng())
}

/// Same as [`choose_random_blocks`] with a caller-provided generator.
///
/// The pool is every distinct id in `block_ids` that is not excluded; a Fisher-Yates
/// shuffle of the pool is truncated to `count`. Ids that no longer resolve
/// to a block are dropped, so the result may be shorter than requested.
pub fn choose_random_blocks_with<'c, R: Rng + ?Sized>(
    cache: &'c BlockCache,
    count: usize,
    exclude: &[String],
    rng: &mut R,
) -> Vec<&'c Block> {
    // Taken ids join the excluded set, so repeated ids enter the pool once
    let mut excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();
    let mut pool: Vec<&str> = cache
        .block_ids
        .iter()
        .map(String::as_str)
        .filter(|id| excluded.insert(*id))
        .collect();

    let take = count.min(pool.len());
    // Only the first `take` slots need to be settled
    for i in 0..take {
        let j = rng.random_range(i..pool.len());
        pool.swap(i, j);
    }

    pool.into_iter()
        .take(take)
        .filter_map(|id| cache.get(id))
        .collect()
}
