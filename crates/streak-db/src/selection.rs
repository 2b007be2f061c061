use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::models::ChallengeRow;

/// Pick one challenge uniformly at random from `candidates`, skipping any
/// whose id is in `taken`. Returns `None` when nothing is left.
pub fn pick_available<'a, R>(
    candidates: &'a [ChallengeRow],
    taken: &HashSet<i64>,
    rng: &mut R,
) -> Option<&'a ChallengeRow>
where
    R: Rng + ?Sized,
{
    let eligible: Vec<&ChallengeRow> = candidates.iter().filter(|c| !taken.contains(&c.id)).collect();
    eligible.choose(rng).copied()
}
