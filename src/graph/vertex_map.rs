//! Per-label vertex identifier index.
//!
//! One [`Indexer`] per vertex label; the label half of a global id selects
//! the indexer, the indexer resolves the dense local index.

use rayon::prelude::*;

use crate::graph::indexer::Indexer;
use crate::graph::types::{gid_label, Gid, Label, Vertex};

#[derive(Debug, Default)]
pub struct VertexMap {
    indexers: Vec<Indexer>,
}

impl VertexMap {
    /// Load one indexer per label from `<prefix>_<label>_keys` files.
    pub fn open(prefix: &str, label_num: Label) -> Self {
        let indexers = (0..label_num as usize)
            .into_par_iter()
            .map(|i| Indexer::open(&format!("{prefix}_{i}")))
            .collect();
        Self { indexers }
    }

    pub fn from_indexers(indexers: Vec<Indexer>) -> Self {
        Self { indexers }
    }

    pub fn label_num(&self) -> Label {
        self.indexers.len() as Label
    }

    /// Decode a global id into `(label, local index)`. `None` when the label
    /// is out of range or the id was never loaded into this partition.
    pub fn get_index(&self, gid: Gid) -> Option<(Label, Vertex)> {
        let label = gid_label(gid);
        let indexer = self.indexers.get(label as usize)?;
        indexer.get_index(gid).map(|v| (label, v))
    }

    /// Global id of the vertex at `(label, index)`.
    pub fn get_gid(&self, label: Label, index: Vertex) -> Option<Gid> {
        self.indexers.get(label as usize)?.get_key(index)
    }

    /// Number of vertices loaded for `label` (0 for an out-of-range label).
    pub fn vertex_num(&self, label: Label) -> usize {
        self.indexers.get(label as usize).map_or(0, Indexer::len)
    }

    pub fn indexer(&self, label: Label) -> Option<&Indexer> {
        self.indexers.get(label as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::encode_gid;

    fn two_label_map() -> VertexMap {
        let a = Indexer::from_keys(vec![encode_gid(0, 10), encode_gid(0, 11)]);
        let b = Indexer::from_keys(vec![encode_gid(1, 20)]);
        VertexMap::from_indexers(vec![a, b])
    }

    #[test]
    fn test_decode_encode_roundtrip() {
        let vm = two_label_map();
        let gid = encode_gid(1, 20);
        let (label, idx) = vm.get_index(gid).unwrap();
        assert_eq!((label, idx), (1, 0));
        assert_eq!(vm.get_gid(label, idx), Some(gid));
    }

    #[test]
    fn test_label_out_of_range() {
        let vm = two_label_map();
        assert_eq!(vm.get_index(encode_gid(2, 10)), None);
        assert_eq!(vm.get_gid(2, 0), None);
        assert_eq!(vm.vertex_num(2), 0);
    }

    #[test]
    fn test_vertex_num_per_label() {
        let vm = two_label_map();
        assert_eq!(vm.vertex_num(0), 2);
        assert_eq!(vm.vertex_num(1), 1);
    }

    #[test]
    fn test_open_loads_key_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefix = dir.path().join("vm");
        let keys = [encode_gid(0, 5), encode_gid(0, 6)];
        let mut bytes = Vec::new();
        for k in keys {
            bytes.extend_from_slice(&k.to_le_bytes());
        }
        std::fs::write(format!("{}_0_keys", prefix.display()), &bytes).unwrap();

        let vm = VertexMap::open(prefix.to_str().unwrap(), 1);
        assert_eq!(vm.vertex_num(0), 2);
        assert_eq!(vm.get_index(keys[1]), Some((0, 1)));
    }
}
