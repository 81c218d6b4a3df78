use std::collections::HashMap as OriginalHashMap;
use std::hash::BuildHasherDefault;
use twox_hash::XxHash64;
use nohash_hasher::IntMap;

pub mod cancellation;

/// Map for composite keys (edges, names), hashed with xxHash64
pub type FullHashMap<K, V> = OriginalHashMap<K, V, BuildHasherDefault<XxHash64>>;

/// Map for integer newtypes (coils, lines, modes). Keys are used as their own hash.
pub type HashMap<K, V> = IntMap<K, V>;
