use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::store::SqliteStore;
use crate::types::Registry;
use crate::verify::key_size_bucket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySizeCount {
    pub algo: Option<u32>,
    pub bits: u64,
    pub count: i64,
}

/// Read-only adoption summary for one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub registry: Registry,
    pub packages: i64,
    pub versions: i64,
    pub artifacts: i64,
    pub signed_artifacts: i64,
    /// Checked artifacts per status name.
    pub statuses: BTreeMap<String, i64>,
    pub key_sizes: Vec<KeySizeCount>,
}

pub fn summarize(store: &SqliteStore, registry: Registry) -> Result<Summary> {
    let statuses = store
        .status_counts(registry)?
        .into_iter()
        .map(|(status, count)| (status.name().to_string(), count))
        .collect();

    let mut buckets: BTreeMap<(Option<u32>, u64), i64> = BTreeMap::new();
    for (algo, bits) in store.packet_sizes(registry)? {
        if let Some(bits) = bits {
            *buckets.entry((algo, key_size_bucket(algo, bits))).or_default() += 1;
        }
    }
    let key_sizes = buckets
        .into_iter()
        .map(|((algo, bits), count)| KeySizeCount { algo, bits, count })
        .collect();

    Ok(Summary {
        registry,
        packages: store.count("packages", registry)?,
        versions: store.count("versions", registry)?,
        artifacts: store.count("artifacts", registry)?,
        signed_artifacts: store.count_signed_artifacts(registry)?,
        statuses,
        key_sizes,
    })
}
