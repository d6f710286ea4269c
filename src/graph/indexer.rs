//! Open-addressing hash index between global identifiers and dense local
//! indices.
//!
//! The key array comes from a partition file; index `i` in that array IS the
//! local index of key `i`. A linear-probing table maps keys back to their
//! dense index. The table is sized once at load time and never resized.

use crate::graph::types::{Gid, Vertex};
use crate::util::load_array;

const INITIAL_SIZE: usize = 16;
const MAX_LOAD_FACTOR: f64 = 0.875;

/// Vacant probe slot marker.
const EMPTY_SLOT: u64 = u64::MAX;

/// 64-bit avalanche mixer. Original ids are dense, so identity hashing would
/// pile adjacent keys into adjacent slots.
#[inline]
fn hash_vertex(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn calc_table_size(key_num: usize) -> usize {
    let mut size = INITIAL_SIZE;
    while key_num as f64 / size as f64 >= MAX_LOAD_FACTOR {
        size *= 2;
    }
    size
}

#[derive(Debug, Default)]
pub struct Indexer {
    keys: Vec<Gid>,
    /// Dense key index per probe slot, `EMPTY_SLOT` when vacant.
    slots: Vec<u64>,
}

impl Indexer {
    /// Load the key array from `<prefix>_keys` and build the probe table.
    pub fn open(prefix: &str) -> Self {
        let keys: Vec<Gid> = load_array(format!("{prefix}_keys"));
        Self::from_keys(keys)
    }

    /// Build an indexer over an in-memory key list. Every key must be
    /// distinct.
    pub fn from_keys(keys: Vec<Gid>) -> Self {
        let table_size = calc_table_size(keys.len());
        let mut slots = vec![EMPTY_SLOT; table_size];
        for (idx, key) in keys.iter().enumerate() {
            let mut slot = (hash_vertex(*key) as usize) % table_size;
            while slots[slot] != EMPTY_SLOT {
                slot = (slot + 1) % table_size;
            }
            slots[slot] = idx as u64;
        }
        Self { keys, slots }
    }

    /// Dense local index of `key`, or `None` if the key was never loaded.
    pub fn get_index(&self, key: Gid) -> Option<Vertex> {
        let table_size = self.slots.len();
        let mut slot = (hash_vertex(key) as usize) % table_size;
        loop {
            let idx = self.slots[slot];
            if idx == EMPTY_SLOT {
                return None;
            }
            if self.keys[idx as usize] == key {
                return Some(idx);
            }
            slot = (slot + 1) % table_size;
        }
    }

    /// Key stored at dense index `index`, or `None` when out of range.
    pub fn get_key(&self, index: Vertex) -> Option<Gid> {
        self.keys.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
