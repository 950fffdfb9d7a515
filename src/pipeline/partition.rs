//! Row partitioning: picks which copy of a downstream node receives each row.
//!
//! The target node's [`Partitioning`] is fixed when the graph is expanded. Every producing copy
//! gets its own [`Partitioner`] per output hop, so round-robin counters are local to that pair and
//! never shared between threads.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EngineError;
use crate::types::{Row, RowSchema, Value};

/// How rows are spread across the copies of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Partitioning {
    /// `counter++ mod copies`, counter local to the producer copy and hop.
    #[default]
    #[serde(alias = "none")]
    RoundRobin,
    /// Stable hash of the key fields `mod copies`.
    Hash { fields: Vec<String> },
    /// Euclidean remainder of an integer key field by the copy count.
    Modulo { field: String },
}

impl Partitioning {
    pub fn hash<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Partitioning::Hash {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn modulo(field: impl Into<String>) -> Self {
        Partitioning::Modulo {
            field: field.into(),
        }
    }

    pub fn is_keyed(&self) -> bool {
        !matches!(self, Partitioning::RoundRobin)
    }
}

/// Per-producer, per-hop row router.
#[derive(Debug)]
pub struct Partitioner {
    target: String,
    scheme: Partitioning,
    copies: usize,
    counter: u64,
    /// Key field indices resolved against the last schema seen.
    key_cache: Option<(Arc<RowSchema>, Vec<usize>)>,
}

impl Partitioner {
    pub fn new(target: &str, scheme: Partitioning, copies: usize) -> Self {
        Self {
            target: target.to_string(),
            scheme,
            copies: copies.max(1),
            counter: 0,
            key_cache: None,
        }
    }

    pub fn copies(&self) -> usize {
        self.copies
    }

    pub fn scheme(&self) -> &Partitioning {
        &self.scheme
    }

    /// Target copy index for `row`, in `0..copies`.
    pub fn select(&mut self, row: &Row) -> Result<usize, EngineError> {
        match &self.scheme {
            Partitioning::RoundRobin => {
                let idx = (self.counter % self.copies as u64) as usize;
                self.counter = self.counter.wrapping_add(1);
                Ok(idx)
            }
            Partitioning::Hash { .. } => {
                let keys = self.key_indices(row)?;
                let values: Vec<&Value> = keys.iter().map(|&i| &row.values()[i]).collect();
                Ok((partition_hash(&values) % self.copies as u64) as usize)
            }
            Partitioning::Modulo { field } => {
                let field = field.clone();
                let keys = self.key_indices(row)?;
                match &row.values()[keys[0]] {
                    Value::Integer(v) => Ok(v.rem_euclid(self.copies as i64) as usize),
                    other => Err(EngineError::Partition {
                        node: self.target.clone(),
                        message: format!(
                            "modulo key '{field}' must be a non-null integer, got {other:?}"
                        ),
                    }),
                }
            }
        }
    }

    fn key_indices(&mut self, row: &Row) -> Result<Vec<usize>, EngineError> {
        if let Some((schema, keys)) = &self.key_cache
            && (Arc::ptr_eq(schema, row.schema()) || **schema == **row.schema())
        {
            return Ok(keys.clone());
        }
        let names: Vec<&str> = match &self.scheme {
            Partitioning::RoundRobin => Vec::new(),
            Partitioning::Hash { fields } => fields.iter().map(String::as_str).collect(),
            Partitioning::Modulo { field } => vec![field.as_str()],
        };
        let mut keys = Vec::with_capacity(names.len());
        for name in names {
            let idx = row
                .schema()
                .index_of(name)
                .ok_or_else(|| EngineError::Partition {
                    node: self.target.clone(),
                    message: format!("key field '{name}' not in row schema {}", row.schema()),
                })?;
            keys.push(idx);
        }
        self.key_cache = Some((Arc::clone(row.schema()), keys.clone()));
        Ok(keys)
    }
}

/// Stable hash of a partition key, identical across runs and platforms.
///
/// Integers hash to themselves (so a single integer key partitions by remainder), booleans to
/// 0/1, null to 0, everything else to the first 8 bytes of the blake3 digest of its canonical
/// encoding. Multi-field keys fold as `h * 31 + field_hash`.
pub fn partition_hash(values: &[&Value]) -> u64 {
    values
        .iter()
        .fold(0u64, |h, v| h.wrapping_mul(31).wrapping_add(value_hash(v)))
}

fn value_hash(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Integer(i) => *i as u64,
        Value::Boolean(b) => u64::from(*b),
        Value::String(s) => digest64(b"s", s.as_bytes()),
        Value::Float(x) => digest64(b"f", &canonical_float_bits(*x).to_le_bytes()),
        Value::Date(d) => digest64(
            b"d",
            &d.and_utc().timestamp_millis().to_le_bytes(),
        ),
        Value::Binary(b) => digest64(b"b", b),
        Value::Decimal { mantissa, scale } => {
            let mut buf = mantissa.to_le_bytes().to_vec();
            buf.extend_from_slice(&scale.to_le_bytes());
            digest64(b"m", &buf)
        }
    }
}

/// `-0.0` folds into `0.0` and every NaN into one NaN, so equal keys share a hash.
fn canonical_float_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

fn digest64(tag: &[u8], bytes: &[u8]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tag);
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(first)
}
