// tests/map_zipper.rs
use anyhow::Result;
use ironpipe::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn default_output_pairs_element_with_value() -> Result<()> {
    let table: HashMap<u32, &str> = [(1, "one"), (2, "two"), (3, "three")].into();
    let out = from_vec(vec![3u32, 1, 2, 1])
        .zip_with_map(table, |x| *x)
        .into_pipe()
        .collect()?;
    assert_eq!(out, vec![(3, "three"), (1, "one"), (2, "two"), (1, "one")]);
    Ok(())
}

#[test]
fn miss_names_element_and_key() -> Result<()> {
    let table: HashMap<String, u32> = [("a".to_string(), 1)].into();
    let mut it = from_vec(vec![("a", 10), ("q", 20), ("a", 30)])
        .zip_with_map(table, |e| e.0.to_string())
        .with_merge(|e, v| e.1 + v)
        .into_pipe()
        .iter();

    assert_eq!(it.next().transpose()?, Some(11));
    let Some(Err(err)) = it.next() else {
        panic!("missing key must fail");
    };
    assert!(matches!(err, PipeError::KeyNotFound { .. }));
    let msg = err.to_string();
    assert!(msg.contains("(\"q\", 20)"), "{msg}");
    assert!(msg.contains("\"q\""), "{msg}");
    assert!(it.next().is_none());
    Ok(())
}

#[test]
fn btree_and_shared_tables() -> Result<()> {
    let btree: BTreeMap<u8, char> = [(0, 'a'), (1, 'b')].into();
    let out = from_vec(vec![1u8, 0])
        .zip_with_map(btree, |x| *x)
        .with_merge(|_, c| c)
        .into_pipe()
        .collect()?;
    assert_eq!(out, vec!['b', 'a']);

    let shared: Arc<HashMap<u8, u8>> = Arc::new([(7, 70)].into());
    let a = from_vec(vec![7u8]).zip_with_map(Arc::clone(&shared), |x| *x);
    let b = from_vec(vec![7u8, 7]).zip_with_map(shared, |x| *x);
    assert_eq!(a.into_pipe().collect()?, vec![(7, 70)]);
    assert_eq!(b.into_pipe().collect()?.len(), 2);
    Ok(())
}

#[test]
fn length_follows_source() {
    let table: HashMap<u32, u32> = HashMap::new();
    let sized = from_vec(vec![1u32, 2]).zip_with_map(table.clone(), |x| *x);
    assert_eq!(sized.len(), Some(2));
    assert_eq!(sized.into_pipe().len(), Some(2));

    let unsized_source = from_fn(|| vec![1u32]).zip_with_map(table, |x| *x);
    assert_eq!(unsized_source.len(), None);
}

#[test]
fn lookups_happen_lazily() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let table: HashMap<u32, u32> = (0..5).map(|k| (k, k * k)).collect();
    let pipe = from_vec(vec![4u32, 2])
        .zip_with_map(table, move |x| {
            seen.fetch_add(1, Ordering::SeqCst);
            *x
        })
        .with_merge(|_, sq| sq)
        .into_pipe();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipe.collect()?, vec![16, 4]);
    assert_eq!(pipe.collect()?, vec![16, 4]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    Ok(())
}

#[test]
fn feeds_into_other_stages() -> Result<()> {
    let table: HashMap<u32, &str> = [(0, "even"), (1, "odd")].into();
    let plan = from_vec((0..6u32).collect::<Vec<_>>())
        .zip_with_map(table, |x| x % 2)
        .into_pipe()
        .batch(2, false)?;
    assert_eq!(plan.explain().node_types(), vec!["Source", "MapZipper", "Batch"]);
    let batches = plan.collect()?;
    assert_eq!(batches[0], vec![(0, "even"), (1, "odd")]);
    Ok(())
}
