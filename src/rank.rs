use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Pair, RankedList};

/// Orders per-key counts highest first. Equal counts fall back to the key
/// in ascending order so repeated queries return the same leaderboard.
pub fn rank<K>(counts: HashMap<K, usize>) -> RankedList<K>
where
    K: Ord + Hash,
{
    let mut pairs: Vec<Pair<K>> = counts
        .into_iter()
        .map(|(key, value)| Pair { key, value })
        .collect();

    pairs.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    RankedList::from_sorted(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, usize)]) -> HashMap<String, usize> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[test]
    fn highest_count_comes_first() {
        let ranked = rank(counts(&[("B", 1), ("A", 2)]));
        let pairs: Vec<(&str, usize)> = ranked
            .iter()
            .map(|pair| (pair.key.as_str(), pair.value))
            .collect();
        assert_eq!(pairs, vec![("A", 2), ("B", 1)]);
    }

    #[test]
    fn counts_never_increase_down_the_list() {
        let ranked = rank(counts(&[
            ("u1", 3),
            ("u2", 9),
            ("u3", 1),
            ("u4", 9),
            ("u5", 4),
            ("u6", 3),
        ]));
        assert_eq!(ranked.len(), 6);
        for window in ranked.as_slice().windows(2) {
            assert!(window[0].value >= window[1].value);
        }
    }

    #[test]
    fn ties_fall_back_to_key_order() {
        let ranked = rank(counts(&[("carol", 2), ("alice", 2), ("bob", 5)]));
        let keys: Vec<&str> = ranked.iter().map(|pair| pair.key.as_str()).collect();
        assert_eq!(keys, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn empty_counts_rank_to_empty_list() {
        let ranked = rank(HashMap::<String, usize>::new());
        assert!(ranked.is_empty());
    }
}
