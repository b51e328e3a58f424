//! Shuffle permutation for the active queue

use crate::types::{PlaybackMode, TrackRef};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Build a queue RNG, seeded when reproducible permutations are wanted
pub fn queue_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Reorder tracks according to the playback mode
///
/// Linear leaves the order untouched; shuffle applies Fisher-Yates, so every
/// permutation is equally likely.
pub fn apply_mode(tracks: &mut [TrackRef], mode: PlaybackMode, rng: &mut StdRng) {
    match mode {
        PlaybackMode::Linear => {}
        PlaybackMode::Shuffle => tracks.shuffle(rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn tracks(n: usize) -> Vec<TrackRef> {
        (0..n)
            .map(|i| TrackRef::new(format!("t{i}"), format!("/music/t{i}.flac"), Duration::from_secs(60)))
            .collect()
    }

    #[test]
    fn linear_keeps_order() {
        let mut rng = queue_rng(Some(1));
        let mut list = tracks(10);
        apply_mode(&mut list, PlaybackMode::Linear, &mut rng);
        assert_eq!(list, tracks(10));
    }

    #[test]
    fn shuffle_is_permutation() {
        let mut rng = queue_rng(Some(7));
        let mut list = tracks(50);
        apply_mode(&mut list, PlaybackMode::Shuffle, &mut rng);

        let ids: HashSet<_> = list.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 50);
        // 50 tracks staying in order by chance is practically impossible
        assert_ne!(list, tracks(50));
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut a = tracks(20);
        let mut b = tracks(20);
        apply_mode(&mut a, PlaybackMode::Shuffle, &mut queue_rng(Some(99)));
        apply_mode(&mut b, PlaybackMode::Shuffle, &mut queue_rng(Some(99)));
        assert_eq!(a, b);
    }
}
