//! Immutable, memory-resident property-graph partition storage.

pub mod csr;
pub mod db;
pub mod indexer;
pub mod schema;
pub mod types;
pub mod vertex_map;
pub mod view;

pub use csr::{Adjacency, Csr, SCsr};
pub use db::{Direction, GraphDB};
pub use indexer::Indexer;
pub use schema::{LabelTriplet, PartitionType, Schema};
pub use types::{encode_gid, gid_label, gid_oid, AdjList, AdjOffsetList, Gid, Label, Vertex};
pub use vertex_map::VertexMap;
pub use view::{GraphView, SingleGraphView};
