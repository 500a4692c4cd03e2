//! The single-threaded merge that turns sorted per-worker buffers into
//! key groups. Runs once per job, on worker 0, between map and reduce.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Number of distinct keys across all buffers, where two keys are equal
/// iff neither orders before the other.
pub(crate) fn distinct_keys<K: Ord, V>(buffers: &[Vec<(K, V)>]) -> usize {
    let mut seen = BTreeSet::new();
    for buffer in buffers {
        for (key, _) in buffer {
            seen.insert(key);
        }
    }
    seen.len()
}

/// Merge ascending-sorted buffers into `groups` key groups, ordered by
/// descending key.
///
/// Each pass takes the largest key still present at any buffer tail and
/// drains every matching tail run, walking the buffers in slot order.
/// `on_group` fires once per completed group.
pub(crate) fn merge<K, V, F>(
    mut buffers: Vec<Vec<(K, V)>>,
    groups: usize,
    mut on_group: F,
) -> Vec<Vec<(K, V)>>
where
    K: Ord + Clone,
    F: FnMut(),
{
    let mut out = Vec::with_capacity(groups);
    for _ in 0..groups {
        let Some(key) = largest_tail_key(&buffers) else {
            break;
        };
        let mut group = Vec::new();
        for buffer in buffers.iter_mut() {
            while buffer
                .last()
                .is_some_and(|(tail, _)| tail.cmp(&key) == Ordering::Equal)
            {
                if let Some(pair) = buffer.pop() {
                    group.push(pair);
                }
            }
        }
        out.push(group);
        on_group();
    }
    out
}

/// The largest key at the tail of any non-empty buffer. Buffers are
/// ascending-sorted, so a buffer's largest remaining key is its tail.
fn largest_tail_key<K: Ord + Clone, V>(buffers: &[Vec<(K, V)>]) -> Option<K> {
    buffers
        .iter()
        .filter_map(|buffer| buffer.last())
        .map(|(key, _)| key)
        .max()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_distinct_keys_across_buffers() {
        let buffers = vec![
            vec![(1, "a"), (2, "b")],
            vec![(2, "c"), (3, "d")],
            vec![],
        ];
        assert_eq!(distinct_keys(&buffers), 3);
    }

    #[test]
    fn merges_into_descending_groups() {
        let buffers = vec![
            vec![(1, "a"), (1, "b"), (3, "c")],
            vec![(2, "d"), (3, "e")],
        ];
        let mut produced = 0;
        let groups = merge(buffers, 3, || produced += 1);
        assert_eq!(produced, 3);
        let keys: Vec<i32> = groups.iter().map(|group| group[0].0).collect();
        assert_eq!(keys, vec![3, 2, 1]);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1, 2]);
    }

    #[test]
    fn group_records_follow_tail_extraction_order() {
        // equal-key runs pop off each buffer tail, in slot order
        let buffers = vec![vec![(1, "a"), (1, "b")], vec![(1, "c")]];
        let groups = merge(buffers, 1, || {});
        assert_eq!(groups, vec![vec![(1, "b"), (1, "a"), (1, "c")]]);
    }

    #[test]
    fn no_records_make_no_groups() {
        let buffers: Vec<Vec<(i32, &str)>> = vec![vec![], vec![]];
        assert_eq!(distinct_keys(&buffers), 0);
        let groups = merge(buffers, 0, || {});
        assert!(groups.is_empty());
    }
}
