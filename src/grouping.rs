//! Tolerance grouping and subset elimination.
//!
//! `group_by` is the workhorse of the similarity pipeline: it takes one
//! quadrant-cell's averages across all images and produces overlapping
//! windows of mutually close values. `without_pair_subsets` and
//! `without_subsets` remove windows/sets wholly contained in larger ones.

use std::collections::BTreeSet;

/// Group a sequence of values by numeric proximity.
///
/// The sequence is sorted internally by `key` (callers never pre-sort).
/// For each element, the maximal contiguous window of the sorted sequence
/// whose keys lie within `[key - tolerance, key + tolerance]` is collected.
/// Windows are found with two forward-only pointers, so the scan is linear
/// (amortized) over the sorted sequence. Redundant windows contained in
/// larger ones are dropped before the groups are materialized.
///
/// Every group `g` satisfies `max(g) - min(g) <= 2 * tolerance`. With
/// `no_singles = false`, every input element appears in at least one group.
/// Windows of size 1 are discarded when `no_singles` is set.
pub fn group_by<'a, T, K>(seq: &'a [T], tolerance: f64, no_singles: bool, key: K) -> Vec<Vec<&'a T>>
where
    K: Fn(&T) -> f64,
{
    let mut sorted: Vec<&T> = seq.iter().collect();
    sorted.sort_by(|a, b| key(a).total_cmp(&key(b)));

    let mut windows: Vec<(usize, usize)> = Vec::new();
    let mut lo = 0;
    let mut hi = 0;

    for i in 0..sorted.len() {
        let val = key(sorted[i]);
        let minval = val - tolerance;
        let maxval = val + tolerance;

        // skip keys lower than minval, starting from the last low index
        // (no use going back before that)
        while lo < i && key(sorted[lo]) < minval {
            lo += 1;
        }

        // find the first key higher than maxval, starting from the last
        // high index
        while hi < sorted.len() && key(sorted[hi]) <= maxval {
            hi += 1;
        }

        // hi is not inclusive
        if hi > lo + 1 || !no_singles {
            windows.push((lo, hi));
        }
    }

    without_pair_subsets(&windows)
        .into_iter()
        .map(|(a, b)| sorted[a..b].to_vec())
        .collect()
}

/// Remove intervals contained in other intervals.
///
/// Receives pairs `(a, b)` with `a <= b`, interpreted as closed intervals.
/// Returns only those intervals not contained within another interval of
/// the input; duplicates collapse to one. Output order is unspecified.
pub fn without_pair_subsets<T: Ord + Copy>(pairs: &[(T, T)]) -> Vec<(T, T)> {
    // Sort such that we're growing on a and decreasing on b:
    // [(1, 4), (1, 3), (1, 2), (2, 5), (2, 4), (2, 3)]
    //
    // This gives two invariants: a pair contains every pair to its right
    // with an equal-or-lower b, and a pair to the right with a higher b
    // must also have a higher a, i.e. it starts an independent (possibly
    // overlapping) interval. The supersets are exactly the first pair and
    // the pairs sitting just after a low-b to high-b transition.
    let mut sorted_pairs: Vec<(T, T)> = pairs.to_vec();
    sorted_pairs.sort_by(|x, y| y.1.cmp(&x.1));
    sorted_pairs.sort_by(|x, y| x.0.cmp(&y.0)); // stable, keeps the b order

    // Delete in place rather than copying the transitions out: we expect
    // few contained subpairs in the common case.
    let mut i = 0;
    while i + 1 < sorted_pairs.len() {
        let b = sorted_pairs[i].1;

        let mut delete_to = sorted_pairs.len();
        for j in i + 1..sorted_pairs.len() {
            if sorted_pairs[j].1 > b {
                delete_to = j;
                break;
            }
        }

        sorted_pairs.drain(i + 1..delete_to);
        i += 1;
    }

    sorted_pairs
}

/// Remove sets contained in other sets of the collection.
///
/// Duplicate sets collapse to one. Supersets are only searched among
/// larger-or-equal candidates, so the common case stays cheap.
pub fn without_subsets<T, I>(sets: I) -> BTreeSet<BTreeSet<T>>
where
    T: Ord + Clone,
    I: IntoIterator<Item = BTreeSet<T>>,
{
    let mut by_len: Vec<BTreeSet<T>> = sets.into_iter().collect();
    by_len.sort_by_key(|s| s.len());

    let mut kept = BTreeSet::new();
    for i in 0..by_len.len() {
        let x = &by_len[i];
        if !by_len[i + 1..].iter().any(|other| x.is_subset(other)) {
            kept.insert(x.clone());
        }
    }
    kept
}
