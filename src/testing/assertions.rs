//! Assertion functions for testing pipe outputs.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use ironpipe::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that `actual` holds exactly the elements of `expected`, with the
/// same multiplicities, in any order.
///
/// # Panics
///
/// Panics if any element is missing, extra, or repeated a different number
/// of times.
///
/// # Example
///
/// ```
/// use ironpipe::testing::assert_permutation_of;
///
/// assert_permutation_of(&[3, 1, 2, 1], &[1, 1, 2, 3]);
/// ```
pub fn assert_permutation_of<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    let mut counts: HashMap<&T, isize> = HashMap::new();
    for e in expected {
        *counts.entry(e).or_default() += 1;
    }
    for a in actual {
        *counts.entry(a).or_default() -= 1;
    }
    let missing: Vec<_> = counts.iter().filter(|(_, c)| **c > 0).map(|(e, _)| *e).collect();
    let extra: Vec<_> = counts.iter().filter(|(_, c)| **c < 0).map(|(e, _)| *e).collect();

    assert!(
        missing.is_empty() && extra.is_empty(),
        "Not a permutation:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert the exact size of every batch, in order.
///
/// # Panics
///
/// Panics if the batch count or any batch size differs.
///
/// # Example
///
/// ```
/// use ironpipe::testing::assert_batch_sizes;
///
/// assert_batch_sizes(&[vec![1, 2], vec![3]], &[2, 1]);
/// ```
pub fn assert_batch_sizes<T: Debug>(batches: &[Vec<T>], expected: &[usize]) {
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(
        sizes, expected,
        "Batch size mismatch:\n  Expected sizes: {expected:?}\n  Actual sizes: {sizes:?}\n  Batches: {batches:?}"
    );
}

/// Assert that flattening `batches` gives a permutation of `source`.
///
/// # Panics
///
/// Panics if any element was lost, duplicated, or invented by batching.
pub fn assert_batches_cover<T: Debug + Eq + Hash + Clone>(batches: &[Vec<T>], source: &[T]) {
    let flat: Vec<T> = batches.iter().flatten().cloned().collect();
    assert_permutation_of(&flat, source);
}

/// Assert that all elements in a collection satisfy a predicate.
///
/// # Panics
///
/// Panics if any element does not satisfy the predicate.
///
/// # Example
///
/// ```
/// use ironpipe::testing::assert_all;
///
/// assert_all(&[2, 4, 6, 8], |x| x % 2 == 0);
/// ```
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Collection: {collection:?}"
        );
    }
}
