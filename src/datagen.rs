//! Synthetic chunk generator
//!
//! Produces one partition of a build or probe dataset. Build keys are
//! range-partitioned and unique across the whole dataset; probe keys hit the
//! build key space for a controllable fraction of rows, spread evenly over
//! every build partition, and fall into a disjoint high range otherwise.
//!
//! All randomness comes from a generator seeded with the same value on every
//! call, so a chunk is a pure function of its [`PartitionSpec`] and seed.

use crate::error::ConfigError;
use crate::frame::{Column, Field, Frame, Schema};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Seed that induces the most cross-worker traffic with two workers
pub const DEFAULT_SEED: u64 = 17_561_648_246_761_420_848;

/// Name of the join column
pub const KEY_COLUMN: &str = "key";
/// Name of the payload column
pub const PAYLOAD_COLUMN: &str = "payload";
/// Name of the synthetic re-partitioning label (build side only)
pub const SHUFFLE_COLUMN: &str = "shuffle";

/// Which side of the join a chunk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Defines the universe of unique join keys
    #[default]
    Build,
    /// Joined against the build side, controls selectivity
    Probe,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Build => "build",
            Role::Probe => "probe",
        }
    }

    /// Columns produced for this role, in order
    pub fn schema(&self) -> Schema {
        match self {
            Role::Build => Schema::new(vec![
                Field::int64(KEY_COLUMN),
                Field::int64(SHUFFLE_COLUMN),
                Field::int64(PAYLOAD_COLUMN),
            ]),
            Role::Probe => Schema::new(vec![
                Field::int64(KEY_COLUMN),
                Field::int64(PAYLOAD_COLUMN),
            ]),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "build" | "base" => Ok(Role::Build),
            "probe" | "other" => Ok(Role::Probe),
            other => Err(ConfigError::invalid_setting(
                "role",
                format!("unknown role {:?}", other),
            )),
        }
    }
}

/// Everything that determines the content of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub index: usize,
    pub size: usize,
    pub total_partitions: usize,
    pub role: Role,
    pub match_fraction: f64,
}

impl PartitionSpec {
    /// Validated spec
    ///
    /// A missing role means [`Role::Build`] and a missing match fraction
    /// means `1.0`.
    pub fn new(
        index: usize,
        size: usize,
        total_partitions: usize,
        role: Option<Role>,
        match_fraction: Option<f64>,
    ) -> Result<Self, ConfigError> {
        if total_partitions == 0 {
            return Err(ConfigError::invalid_setting(
                "total_partitions",
                "must be at least 1",
            ));
        }
        let match_fraction = match_fraction.unwrap_or(1.0);
        if !(match_fraction > 0.0 && match_fraction <= 1.0) {
            return Err(ConfigError::invalid_setting(
                "match_fraction",
                format!("{} is outside (0, 1]", match_fraction),
            ));
        }
        Ok(Self {
            index,
            size,
            total_partitions,
            role: role.unwrap_or_default(),
            match_fraction,
        })
    }

    /// Key range owned by build partition `partition`
    pub fn build_key_range(&self, partition: usize) -> Range<i64> {
        let start = (self.size * partition) as i64;
        start..start + self.size as i64
    }

    /// Rows each build partition contributes to a probe chunk's sampling pool
    pub fn sub_size(&self) -> usize {
        self.size / self.total_partitions
    }

    /// Matching keys drawn from each build partition for a probe chunk
    pub fn matches_per_partition(&self) -> usize {
        let sub = self.sub_size();
        ((sub as f64 * self.match_fraction) as usize).max(1).min(sub)
    }

    /// Range in build partition `partition` that this probe chunk samples from
    pub fn match_source_range(&self, partition: usize) -> Range<i64> {
        let sub = self.sub_size();
        let start = (self.size * partition + sub * self.index) as i64;
        start..start + sub as i64
    }

    /// Range that non-matching probe keys are taken from
    ///
    /// Starts above every build key, and above every other probe chunk's
    /// non-matching range.
    pub fn non_matching_range(&self) -> Range<i64> {
        let matched = self.matches_per_partition() * self.total_partitions;
        let missing = self.size.saturating_sub(matched);
        let start = (self.size * self.total_partitions + self.size * self.index) as i64;
        start..start + missing as i64
    }
}

/// Generate the chunk described by `spec`
pub fn generate_chunk(spec: &PartitionSpec, seed: u64) -> Frame {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = match spec.role {
        Role::Build => {
            let key: Vec<i64> = spec.build_key_range(spec.index).collect();
            let shuffle = shuffle_labels(spec.size, spec.total_partitions, &mut rng);
            let payload = permutation(spec.size, &mut rng);
            vec![
                Column::new(KEY_COLUMN, key),
                Column::new(SHUFFLE_COLUMN, shuffle),
                Column::new(PAYLOAD_COLUMN, payload),
            ]
        }
        Role::Probe => {
            let key = probe_keys(spec, &mut rng);
            let payload = permutation(spec.size, &mut rng);
            vec![
                Column::new(KEY_COLUMN, key),
                Column::new(PAYLOAD_COLUMN, payload),
            ]
        }
    };
    Frame::new(columns).unwrap_or_default()
}

/// Shorthand for [`generate_chunk`] with [`DEFAULT_SEED`]
pub fn generate(
    index: usize,
    local_size: usize,
    num_chunks: usize,
    role: Option<Role>,
    frac_match: Option<f64>,
) -> Result<Frame, ConfigError> {
    let spec = PartitionSpec::new(index, local_size, num_chunks, role, frac_match)?;
    Ok(generate_chunk(&spec, DEFAULT_SEED))
}

fn permutation(size: usize, rng: &mut StdRng) -> Vec<i64> {
    let mut values: Vec<i64> = (0..size as i64).collect();
    values.shuffle(rng);
    values
}

/// Partition labels `0..num_chunks`, each appearing `floor` or `ceil` of
/// `size / num_chunks` times, randomly ordered
fn shuffle_labels(size: usize, num_chunks: usize, rng: &mut StdRng) -> Vec<i64> {
    let per_label = size.div_ceil(num_chunks);
    let surplus = per_label * num_chunks - size;
    let mut labels = Vec::with_capacity(size);
    for label in 0..num_chunks {
        let count = if label >= num_chunks - surplus {
            per_label - 1
        } else {
            per_label
        };
        labels.extend(std::iter::repeat(label as i64).take(count));
    }
    labels.shuffle(rng);
    labels
}

fn probe_keys(spec: &PartitionSpec, rng: &mut StdRng) -> Vec<i64> {
    let take = spec.matches_per_partition();
    let mut keys = Vec::with_capacity(spec.size);

    for partition in 0..spec.total_partitions {
        let mut pool: Vec<i64> = spec.match_source_range(partition).collect();
        let (chosen, _) = pool.partial_shuffle(rng, take);
        keys.extend_from_slice(chosen);
    }

    keys.extend(spec.non_matching_range());
    keys.shuffle(rng);
    keys
}
