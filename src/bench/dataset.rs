//! Dataset builder
//!
//! Declares the lazy build and probe datasets on a cluster. Nothing is
//! generated until the caller persists the returned handle.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::cluster::{Cluster, Dataset, PartitionTask};
use crate::datagen::{generate_chunk, PartitionSpec, Role, SHUFFLE_COLUMN};
use crate::error::{ConfigError, Result};

/// Rows in the sample chunk used to infer the dataset schema
const META_ROWS: usize = 4;

/// Declare the dataset for one side of the join
///
/// Partition `i` is `generate_chunk(i, chunk_size, num_chunks, role, frac_match)`.
/// A build side with `shuffle` enabled is re-partitioned on the shuffle label
/// with divisions `[0, 1, ..., num_chunks]`; without it the label is dropped.
/// The probe side is returned as declared.
pub fn build_dataset<C: Cluster>(
    cluster: &C,
    chunk_size: usize,
    num_chunks: usize,
    frac_match: f64,
    role: Role,
    shuffle: bool,
    seed: u64,
) -> Result<C::Dataset> {
    if num_chunks == 0 {
        return Err(
            ConfigError::invalid_setting("num_chunks", "a dataset needs at least one partition")
                .into(),
        );
    }

    let meta_spec = PartitionSpec::new(0, META_ROWS, 1, Some(role), None)?;
    let meta = generate_chunk(&meta_spec, seed).schema();

    let tasks = (0..num_chunks)
        .map(|index| {
            let spec =
                PartitionSpec::new(index, chunk_size, num_chunks, Some(role), Some(frac_match))?;
            Ok(Arc::new(move || generate_chunk(&spec, seed)) as PartitionTask)
        })
        .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

    let name = format!(
        "generate-{}-{}",
        role,
        token(chunk_size, num_chunks, frac_match, role, seed)
    );
    debug!(%name, chunk_size, num_chunks, frac_match, "Declaring dataset");
    let dataset = cluster.from_tasks(&name, meta, tasks);

    let dataset = match role {
        Role::Build if shuffle => {
            let divisions = (0..=num_chunks as i64).collect();
            dataset.set_index(SHUFFLE_COLUMN, Some(divisions))?
        }
        Role::Build => dataset.drop_column(SHUFFLE_COLUMN)?,
        Role::Probe => dataset,
    };
    Ok(dataset)
}

/// Stable name suffix for a parameter set
fn token(chunk_size: usize, num_chunks: usize, frac_match: f64, role: Role, seed: u64) -> String {
    let mut hasher = DefaultHasher::new();
    chunk_size.hash(&mut hasher);
    num_chunks.hash(&mut hasher);
    frac_match.to_bits().hash(&mut hasher);
    role.hash(&mut hasher);
    seed.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
