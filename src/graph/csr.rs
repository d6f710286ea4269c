//! Compressed adjacency storage.
//!
//! [`Csr`] handles arbitrary out-degree through offset/degree arrays.
//! [`SCsr`] specializes at-most-one-edge relations into a single flat array,
//! skipping the offset indirection. Both expose the same capability set, so
//! traversal code splits work identically over either shape.

use crate::graph::types::{AdjList, AdjOffsetList, Gid, Vertex};
use crate::util::load_array;

/// Neighbor slot marker for "no edge" in an [`SCsr`].
const NO_EDGE: Gid = Gid::MAX;

#[derive(Debug, Default)]
pub struct Csr {
    neighbors: Vec<Gid>,
    offsets: Vec<u64>,
    degree: Vec<i32>,
    edge_num: usize,
}

impl Csr {
    /// Load from `<prefix>_nbrs`, `<prefix>_offsets`, `<prefix>_degree` and
    /// `<prefix>_meta` (`meta[0]` = edge count).
    pub fn open(prefix: &str) -> Self {
        let neighbors = load_array(format!("{prefix}_nbrs"));
        let offsets = load_array(format!("{prefix}_offsets"));
        let degree = load_array(format!("{prefix}_degree"));
        let meta: Vec<u64> = load_array(format!("{prefix}_meta"));
        let edge_num = meta.first().copied().unwrap_or(0) as usize;
        Self {
            neighbors,
            offsets,
            degree,
            edge_num,
        }
    }

    pub fn vertex_num(&self) -> usize {
        self.offsets.len()
    }

    pub fn edge_num(&self) -> usize {
        self.edge_num
    }

    /// Out-of-range vertices have degree 0, not an error.
    pub fn degree(&self, u: Vertex) -> usize {
        self.degree.get(u as usize).map_or(0, |d| *d as usize)
    }

    pub fn get_edges(&self, u: Vertex) -> AdjList<'_> {
        let deg = self.degree(u);
        if deg == 0 {
            return AdjList::empty();
        }
        let Some(&off) = self.offsets.get(u as usize) else {
            return AdjList::empty();
        };
        let off = off as usize;
        AdjList::new(&self.neighbors[off..off + deg])
    }

    /// Chunk `part_i` of `u`'s adjacency split into `part_num` ceiling-sized
    /// parts. An empty chunk yields an empty view.
    pub fn get_partial_edges(&self, u: Vertex, part_i: usize, part_num: usize) -> AdjList<'_> {
        let deg = self.degree(u);
        let part_size = (deg + part_num - 1) / part_num;
        let start = (part_i * part_size).min(deg);
        let end = (start + part_size).min(deg);
        if start == end {
            return AdjList::empty();
        }
        let Some(&off) = self.offsets.get(u as usize) else {
            return AdjList::empty();
        };
        let off = off as usize;
        AdjList::new(&self.neighbors[off + start..off + end])
    }

    pub fn get_edges_with_offset(&self, u: Vertex) -> AdjOffsetList<'_> {
        let deg = self.degree(u);
        if deg == 0 {
            return AdjOffsetList::empty();
        }
        let Some(&off) = self.offsets.get(u as usize) else {
            return AdjOffsetList::empty();
        };
        let off = off as usize;
        AdjOffsetList::new(&self.neighbors[off..off + deg], off)
    }
}

#[derive(Debug, Default)]
pub struct SCsr {
    nbr_list: Vec<Gid>,
    vertex_num: usize,
    edge_num: usize,
}

impl SCsr {
    /// Load from `<prefix>_nbrs` (one slot per vertex, `Gid::MAX` = no edge)
    /// and `<prefix>_meta` (`meta[0]` = vertex count, `meta[1]` = edge count).
    pub fn open(prefix: &str) -> Self {
        let nbr_list = load_array(format!("{prefix}_nbrs"));
        let meta: Vec<u64> = load_array(format!("{prefix}_meta"));
        let vertex_num = meta.first().copied().unwrap_or(0) as usize;
        let edge_num = meta.get(1).copied().unwrap_or(0) as usize;
        Self {
            nbr_list,
            vertex_num,
            edge_num,
        }
    }

    pub fn vertex_num(&self) -> usize {
        self.vertex_num
    }

    pub fn edge_num(&self) -> usize {
        self.edge_num
    }

    pub fn degree(&self, u: Vertex) -> usize {
        match self.nbr_list.get(u as usize) {
            Some(&nbr) if nbr != NO_EDGE => 1,
            _ => 0,
        }
    }

    pub fn get_edges(&self, u: Vertex) -> AdjList<'_> {
        if self.degree(u) == 0 {
            return AdjList::empty();
        }
        let u = u as usize;
        AdjList::new(&self.nbr_list[u..u + 1])
    }

    /// Only partition 0 sees the edge; every other partition gets an empty
    /// view. This lets degree-1 relations join the same data-parallel
    /// splitting protocol as multi-edge relations.
    pub fn get_partial_edges(&self, u: Vertex, part_i: usize, _part_num: usize) -> AdjList<'_> {
        if part_i == 0 {
            self.get_edges(u)
        } else {
            AdjList::empty()
        }
    }

    pub fn get_edges_with_offset(&self, u: Vertex) -> AdjOffsetList<'_> {
        if self.degree(u) == 0 {
            return AdjOffsetList::empty();
        }
        let u = u as usize;
        AdjOffsetList::new(&self.nbr_list[u..u + 1], u)
    }
}

/// Closed adjacency variant, dispatched by `match` on the hot traversal
/// path. The schema's single/multi cardinality declaration selects the
/// variant at load time.
#[derive(Debug)]
pub enum Adjacency {
    Multi(Csr),
    Single(SCsr),
}

impl Adjacency {
    pub fn vertex_num(&self) -> usize {
        match self {
            Adjacency::Multi(csr) => csr.vertex_num(),
            Adjacency::Single(scsr) => scsr.vertex_num(),
        }
    }

    pub fn edge_num(&self) -> usize {
        match self {
            Adjacency::Multi(csr) => csr.edge_num(),
            Adjacency::Single(scsr) => scsr.edge_num(),
        }
    }

    pub fn degree(&self, u: Vertex) -> usize {
        match self {
            Adjacency::Multi(csr) => csr.degree(u),
            Adjacency::Single(scsr) => scsr.degree(u),
        }
    }

    pub fn get_edges(&self, u: Vertex) -> AdjList<'_> {
        match self {
            Adjacency::Multi(csr) => csr.get_edges(u),
            Adjacency::Single(scsr) => scsr.get_edges(u),
        }
    }

    pub fn get_partial_edges(&self, u: Vertex, part_i: usize, part_num: usize) -> AdjList<'_> {
        match self {
            Adjacency::Multi(csr) => csr.get_partial_edges(u, part_i, part_num),
            Adjacency::Single(scsr) => scsr.get_partial_edges(u, part_i, part_num),
        }
    }

    pub fn get_edges_with_offset(&self, u: Vertex) -> AdjOffsetList<'_> {
        match self {
            Adjacency::Multi(csr) => csr.get_edges_with_offset(u),
            Adjacency::Single(scsr) => scsr.get_edges_with_offset(u),
        }
    }

    /// Typed handle for multi-edge relations; `None` for the single variant.
    pub fn as_multi(&self) -> Option<&Csr> {
        match self {
            Adjacency::Multi(csr) => Some(csr),
            Adjacency::Single(_) => None,
        }
    }

    /// Typed handle for single-edge relations; `None` for the multi variant.
    pub fn as_single(&self) -> Option<&SCsr> {
        match self {
            Adjacency::Multi(_) => None,
            Adjacency::Single(scsr) => Some(scsr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build a Csr in memory: one neighbor run per vertex.
    fn make_csr(adjacency: &[Vec<Gid>]) -> Csr {
        let mut neighbors = Vec::new();
        let mut offsets = Vec::new();
        let mut degree = Vec::new();
        for nbrs in adjacency {
            offsets.push(neighbors.len() as u64);
            degree.push(nbrs.len() as i32);
            neighbors.extend_from_slice(nbrs);
        }
        let edge_num = neighbors.len();
        Csr {
            neighbors,
            offsets,
            degree,
            edge_num,
        }
    }

    fn make_scsr(slots: &[Gid]) -> SCsr {
        let edge_num = slots.iter().filter(|&&s| s != NO_EDGE).count();
        SCsr {
            nbr_list: slots.to_vec(),
            vertex_num: slots.len(),
            edge_num,
        }
    }

    #[test]
    fn test_csr_basic_access() {
        let csr = make_csr(&[vec![1, 2, 3], vec![], vec![9]]);
        assert_eq!(csr.vertex_num(), 3);
        assert_eq!(csr.edge_num(), 4);
        assert_eq!(csr.degree(0), 3);
        assert_eq!(csr.degree(1), 0);
        assert_eq!(csr.get_edges(0).iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(csr.get_edges(1).is_empty());
    }

    #[test]
    fn test_csr_out_of_range_degree_is_zero() {
        let csr = make_csr(&[vec![1]]);
        assert_eq!(csr.degree(100), 0);
        assert!(csr.get_edges(100).is_empty());
        assert!(csr.get_partial_edges(100, 0, 4).is_empty());
    }

    #[test]
    fn test_csr_partial_edges_cover_exactly_once() {
        let csr = make_csr(&[(0..10).map(|i| i as Gid).collect()]);
        for part_num in 1..=12 {
            let mut seen = Vec::new();
            for part_i in 0..part_num {
                seen.extend(csr.get_partial_edges(0, part_i, part_num).iter());
            }
            assert_eq!(
                seen,
                csr.get_edges(0).iter().collect::<Vec<_>>(),
                "part_num = {part_num}"
            );
        }
    }

    #[test]
    fn test_csr_edges_with_offset_align_to_columns() {
        let csr = make_csr(&[vec![5, 6], vec![7]]);
        let pairs: Vec<_> = csr.get_edges_with_offset(1).iter().collect();
        assert_eq!(pairs, vec![(7, 2)]);
    }

    #[test]
    fn test_scsr_degree_zero_or_one() {
        let scsr = make_scsr(&[42, NO_EDGE, 43]);
        assert_eq!(scsr.degree(0), 1);
        assert_eq!(scsr.degree(1), 0);
        assert_eq!(scsr.degree(2), 1);
        assert_eq!(scsr.degree(3), 0);
        assert_eq!(scsr.edge_num(), 2);
    }

    #[test]
    fn test_scsr_partial_edges_only_first_partition() {
        let scsr = make_scsr(&[42]);
        assert_eq!(scsr.get_partial_edges(0, 0, 4).iter().collect::<Vec<_>>(), vec![42]);
        for part_i in 1..4 {
            assert!(scsr.get_partial_edges(0, part_i, 4).is_empty());
        }
    }

    #[test]
    fn test_scsr_offset_is_vertex_index() {
        let scsr = make_scsr(&[NO_EDGE, 42]);
        let pairs: Vec<_> = scsr.get_edges_with_offset(1).iter().collect();
        assert_eq!(pairs, vec![(42, 1)]);
    }

    #[test]
    fn test_adjacency_capability_queries() {
        let multi = Adjacency::Multi(make_csr(&[vec![1]]));
        let single = Adjacency::Single(make_scsr(&[1]));
        assert!(multi.as_multi().is_some());
        assert!(multi.as_single().is_none());
        assert!(single.as_single().is_some());
        assert!(single.as_multi().is_none());
        assert_eq!(multi.degree(0), 1);
        assert_eq!(single.degree(0), 1);
    }

    #[test]
    fn test_csr_open_missing_files_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefix = dir.path().join("oe_0_0_0");
        let csr = Csr::open(prefix.to_str().unwrap());
        assert_eq!(csr.vertex_num(), 0);
        assert_eq!(csr.edge_num(), 0);
    }

    proptest! {
        /// The union of all partial views equals the full adjacency, each
        /// neighbor exactly once, for any partition count >= 1.
        #[test]
        fn prop_partial_edges_partition_coverage(
            degrees in prop::collection::vec(0usize..40, 1..8),
            part_num in 1usize..10,
        ) {
            let adjacency: Vec<Vec<Gid>> = degrees
                .iter()
                .enumerate()
                .map(|(u, &d)| (0..d).map(|i| (u * 1000 + i) as Gid).collect())
                .collect();
            let csr = make_csr(&adjacency);
            for u in 0..adjacency.len() as Vertex {
                let mut seen = Vec::new();
                for part_i in 0..part_num {
                    seen.extend(csr.get_partial_edges(u, part_i, part_num).iter());
                }
                prop_assert_eq!(seen, csr.get_edges(u).iter().collect::<Vec<_>>());
            }
        }
    }
}
