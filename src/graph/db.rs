//! Partition-local graph database.
//!
//! One `GraphDB` aggregates the schema, the vertex identifier index, the
//! vertex/edge property tables, and every adjacency structure declared for
//! this partition. It is built once at startup and read-only afterwards, so
//! all worker threads share it without locking.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::graph::csr::{Adjacency, Csr, SCsr};
use crate::graph::schema::{LabelTriplet, Schema};
use crate::graph::types::{Gid, Label, Vertex};
use crate::graph::vertex_map::VertexMap;
use crate::graph::view::{GraphView, SingleGraphView};
use crate::property::column::Column;
use crate::property::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug)]
pub struct GraphDB {
    partition_id: usize,
    partition_num: usize,
    vertex_label_num: Label,
    edge_label_num: Label,

    oe: Vec<Option<Adjacency>>,
    ie: Vec<Option<Adjacency>>,

    vertex_props: Vec<Table>,
    oe_props: HashMap<usize, Table>,
    ie_props: HashMap<usize, Table>,

    vertex_map: VertexMap,
    schema: Schema,
}

impl GraphDB {
    /// Load one graph partition: schema, vertex map, property tables and
    /// adjacency structures. Label triplets load in parallel; missing data
    /// files degrade to empty structures with a logged warning.
    pub fn open(prefix: &str, partition_id: usize, partition_num: usize) -> Result<GraphDB> {
        info!(prefix, partition_id, partition_num, "opening graph partition");
        let schema = Schema::open(format!("{prefix}/graph_schema/schema.json"))?;
        let vertex_label_num = schema.vertex_label_num();
        let edge_label_num = schema.edge_label_num();

        let bin_prefix = format!("{prefix}/graph_data_bin/partition_{partition_id}");

        let vertex_map = VertexMap::open(&format!("{bin_prefix}/vm"), vertex_label_num);
        info!(labels = vertex_label_num, "vertex map loaded");

        let vertex_props: Vec<Table> = (0..vertex_label_num as usize)
            .into_par_iter()
            .map(|i| {
                let header = schema
                    .get_vertex_header(i as Label)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                Table::open(&format!("{bin_prefix}/vp_{i}"), header)
            })
            .collect();
        info!("vertex property tables loaded");

        let triplets: Vec<LabelTriplet> = schema.edge_triplets().collect();
        let loaded: Vec<_> = triplets
            .par_iter()
            .map(|&t| {
                let suffix = format!("{}_{}_{}", t.src_label, t.edge_label, t.dst_label);
                let oe = if schema.oe_is_single(t) {
                    Adjacency::Single(SCsr::open(&format!("{bin_prefix}/oe_{suffix}")))
                } else {
                    Adjacency::Multi(Csr::open(&format!("{bin_prefix}/oe_{suffix}")))
                };
                let ie = if schema.ie_is_single(t) {
                    Adjacency::Single(SCsr::open(&format!("{bin_prefix}/ie_{suffix}")))
                } else {
                    Adjacency::Multi(Csr::open(&format!("{bin_prefix}/ie_{suffix}")))
                };

                let header = schema
                    .get_edge_header(t)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let props = if header.is_empty() {
                    None
                } else {
                    Some((
                        Table::open(&format!("{bin_prefix}/oep_{suffix}"), header),
                        Table::open(&format!("{bin_prefix}/iep_{suffix}"), header),
                    ))
                };
                (t, oe, ie, props)
            })
            .collect();
        info!(triplets = triplets.len(), "adjacency structures loaded");

        let csr_list_size =
            vertex_label_num as usize * edge_label_num as usize * vertex_label_num as usize;
        let mut db = GraphDB {
            partition_id,
            partition_num,
            vertex_label_num,
            edge_label_num,
            oe: (0..csr_list_size).map(|_| None).collect(),
            ie: (0..csr_list_size).map(|_| None).collect(),
            vertex_props,
            oe_props: HashMap::new(),
            ie_props: HashMap::new(),
            vertex_map,
            schema,
        };

        for (t, oe, ie, props) in loaded {
            let idx = db.triplet_index(t);
            db.oe[idx] = Some(oe);
            db.ie[idx] = Some(ie);
            if let Some((oep, iep)) = props {
                db.oe_props.insert(idx, oep);
                db.ie_props.insert(idx, iep);
            }
        }

        Ok(db)
    }

    fn triplet_index(&self, t: LabelTriplet) -> usize {
        t.src_label as usize * self.edge_label_num as usize * self.vertex_label_num as usize
            + t.dst_label as usize * self.edge_label_num as usize
            + t.edge_label as usize
    }

    pub fn get_adjacency(&self, t: LabelTriplet, dir: Direction) -> Option<&Adjacency> {
        let idx = self.triplet_index(t);
        match dir {
            Direction::Outgoing => self.oe.get(idx)?.as_ref(),
            Direction::Incoming => self.ie.get(idx)?.as_ref(),
        }
    }

    /// Typed view over a multi-edge relation; `None` when the triplet is
    /// absent or declared single-valued for this direction.
    pub fn graph_view(&self, t: LabelTriplet, dir: Direction) -> Option<GraphView<'_>> {
        self.get_adjacency(t, dir)?.as_multi().map(GraphView::new)
    }

    /// Typed view over a single-edge relation; `None` when the triplet is
    /// absent or declared multi-valued for this direction.
    pub fn single_graph_view(&self, t: LabelTriplet, dir: Direction) -> Option<SingleGraphView<'_>> {
        self.get_adjacency(t, dir)?
            .as_single()
            .map(SingleGraphView::new)
    }

    pub fn vertex_table(&self, label: Label) -> Option<&Table> {
        self.vertex_props.get(label as usize)
    }

    pub fn get_vertex_property(&self, label: Label, name: &str) -> Option<&Column> {
        self.vertex_props.get(label as usize)?.get_column_by_name(name)
    }

    pub fn get_edge_property(&self, t: LabelTriplet, dir: Direction, name: &str) -> Option<&Column> {
        let idx = self.triplet_index(t);
        let table = match dir {
            Direction::Outgoing => self.oe_props.get(&idx)?,
            Direction::Incoming => self.ie_props.get(&idx)?,
        };
        table.get_column_by_name(name)
    }

    pub fn vertex_map(&self) -> &VertexMap {
        &self.vertex_map
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of vertices loaded for `label` in this partition.
    pub fn vertex_num(&self, label: Label) -> usize {
        self.vertex_map.vertex_num(label)
    }

    /// Global id of the vertex at `(label, index)` in this partition.
    pub fn get_gid(&self, label: Label, index: Vertex) -> Option<Gid> {
        self.vertex_map.get_gid(label, index)
    }

    /// Decode a global id into `(label, local index)`.
    pub fn get_index(&self, gid: Gid) -> Option<(Label, Vertex)> {
        self.vertex_map.get_index(gid)
    }

    pub fn partition_id(&self) -> usize {
        self.partition_id
    }

    pub fn partition_num(&self) -> usize {
        self.partition_num
    }
}
