//! Property-based tests for the chunk generator
//!
//! Checks key ranges, match accuracy, disjointness and label balance across
//! random chunk sizes, partition counts and match fractions.

#[path = "common/mod.rs"]
mod common;

use common::column;
use mergebench::datagen::{
    generate, generate_chunk, PartitionSpec, Role, DEFAULT_SEED, KEY_COLUMN, PAYLOAD_COLUMN,
    SHUFFLE_COLUMN,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn fraction() -> impl Strategy<Value = f64> {
    (1u32..=100).prop_map(|p| p as f64 / 100.0)
}

fn sorted(mut values: Vec<i64>) -> Vec<i64> {
    values.sort_unstable();
    values
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the same spec and seed always yield the same chunk
    #[test]
    fn chunks_are_deterministic(
        size in 1usize..300,
        n in 1usize..6,
        frac in fraction(),
        probe in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let role = if probe { Role::Probe } else { Role::Build };
        let spec = PartitionSpec::new(n - 1, size, n, Some(role), Some(frac)).unwrap();
        prop_assert_eq!(generate_chunk(&spec, seed), generate_chunk(&spec, seed));
    }

    /// Property: build keys are the chunk's contiguous range and are unique
    /// across the whole dataset
    #[test]
    fn build_keys_partition_the_key_space(size in 1usize..200, n in 1usize..6) {
        let mut seen = HashSet::new();
        for index in 0..n {
            let chunk = generate(index, size, n, Some(Role::Build), None).unwrap();
            let keys = column(&chunk, KEY_COLUMN);
            let expected: Vec<i64> = ((index * size) as i64..((index + 1) * size) as i64).collect();
            prop_assert_eq!(&keys, &expected);
            for key in keys {
                prop_assert!(seen.insert(key), "duplicate build key {}", key);
            }
        }
    }

    /// Property: payload is a permutation of `0..size` on both sides
    #[test]
    fn payload_is_a_permutation(size in 1usize..300, n in 1usize..6, probe in any::<bool>()) {
        let role = if probe { Role::Probe } else { Role::Build };
        let chunk = generate(0, size, n, Some(role), Some(0.5)).unwrap();
        let expected: Vec<i64> = (0..size as i64).collect();
        prop_assert_eq!(sorted(column(&chunk, PAYLOAD_COLUMN)), expected);
    }

    /// Property: each label appears floor or ceil of size / n times
    #[test]
    fn shuffle_labels_are_balanced(size in 0usize..300, n in 1usize..8) {
        let chunk = generate(0, size, n, Some(Role::Build), None).unwrap();
        let labels = column(&chunk, SHUFFLE_COLUMN);
        prop_assert_eq!(labels.len(), size);

        let floor = size / n;
        let ceil = size.div_ceil(n);
        for label in 0..n as i64 {
            let count = labels.iter().filter(|&&l| l == label).count();
            prop_assert!(count == floor || count == ceil, "label {} appears {} times", label, count);
        }
        prop_assert!(labels.iter().all(|&l| (0..n as i64).contains(&l)));
    }

    /// Property: a probe chunk matches exactly `matches_per_partition` keys
    /// of every build partition, and nothing else
    #[test]
    fn probe_matches_are_exact(
        size in 1usize..300,
        n in 1usize..6,
        frac in fraction(),
        index_seed in any::<usize>(),
    ) {
        let index = index_seed % n;
        let spec = PartitionSpec::new(index, size, n, Some(Role::Probe), Some(frac)).unwrap();
        let chunk = generate(index, size, n, Some(Role::Probe), Some(frac)).unwrap();
        let keys = column(&chunk, KEY_COLUMN);
        prop_assert_eq!(keys.len(), size);

        let unique: HashSet<i64> = keys.iter().copied().collect();
        prop_assert_eq!(unique.len(), size, "probe keys repeat within a chunk");

        let per_partition = spec.matches_per_partition();
        for partition in 0..n {
            let range = spec.build_key_range(partition);
            let hits = keys.iter().filter(|k| range.contains(k)).count();
            prop_assert_eq!(hits, per_partition);
        }

        let build_end = (size * n) as i64;
        let misses = keys.iter().filter(|&&k| k >= build_end).count();
        prop_assert_eq!(misses, size - per_partition * n);
    }

    /// Property: non-matching probe keys from different chunks never collide
    #[test]
    fn probe_misses_are_disjoint_across_chunks(size in 1usize..200, n in 2usize..5, frac in fraction()) {
        let build_end = (size * n) as i64;
        let mut seen = HashSet::new();
        for index in 0..n {
            let chunk = generate(index, size, n, Some(Role::Probe), Some(frac)).unwrap();
            for key in column(&chunk, KEY_COLUMN).into_iter().filter(|&k| k >= build_end) {
                prop_assert!(seen.insert(key), "non-matching key {} reused", key);
            }
        }
    }
}

#[test]
fn two_partition_probe_scenario() {
    // 100 rows per chunk, 2 chunks, half the keys match
    let chunk = generate(0, 100, 2, Some(Role::Probe), Some(0.5)).unwrap();
    let keys = column(&chunk, KEY_COLUMN);
    let low = keys.iter().filter(|&&k| (0..50).contains(&k)).count();
    let mid = keys.iter().filter(|&&k| (100..150).contains(&k)).count();
    let high = keys.iter().filter(|&&k| (200..250).contains(&k)).count();
    assert_eq!((low, mid, high), (25, 25, 50));
}

#[test]
fn default_seed_is_stable() {
    let a = generate(1, 64, 2, Some(Role::Build), None).unwrap();
    let spec = PartitionSpec::new(1, 64, 2, Some(Role::Build), None).unwrap();
    assert_eq!(a, generate_chunk(&spec, DEFAULT_SEED));
    assert_ne!(a, generate_chunk(&spec, DEFAULT_SEED ^ 1));
}
