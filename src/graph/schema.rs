//! Declarative graph schema.
//!
//! The schema document declares vertex labels (name, partitioning mode,
//! property list) and edge triplets (source/edge/destination label names,
//! optional single-valued strategy per direction, optional property list).
//! Dense label ids are assigned in first-seen order. Data errors inside the
//! document are tolerated: an edge naming an unknown vertex label is
//! reported and skipped, an unknown type name maps to a null type.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, warn};

use crate::error::Result;
use crate::graph::types::Label;
use crate::property::types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Dynamic,
    Static,
}

impl PartitionType {
    fn parse(name: &str) -> PartitionType {
        match name {
            "Dynamic" => PartitionType::Dynamic,
            "Static" => PartitionType::Static,
            other => {
                warn!(partition_type = other, "unsupported partition type, defaulting to Dynamic");
                PartitionType::Dynamic
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelTriplet {
    pub src_label: Label,
    pub edge_label: Label,
    pub dst_label: Label,
}

impl LabelTriplet {
    pub fn new(src_label: Label, edge_label: Label, dst_label: Label) -> Self {
        Self {
            src_label,
            edge_label,
            dst_label,
        }
    }
}

pub type PropertyHeader = Vec<(String, DataType)>;

#[derive(Debug, Deserialize)]
struct PropDecl {
    name: String,
    data_type: String,
}

#[derive(Debug, Deserialize)]
struct VertexDecl {
    label: String,
    #[serde(default)]
    partition_type: Option<String>,
    #[serde(default)]
    properties: Vec<PropDecl>,
}

#[derive(Debug, Deserialize)]
struct EdgeDecl {
    src_label: String,
    label: String,
    dst_label: String,
    #[serde(default)]
    oe_strategy: Option<String>,
    #[serde(default)]
    ie_strategy: Option<String>,
    #[serde(default)]
    properties: Vec<PropDecl>,
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(default)]
    vertex: Vec<VertexDecl>,
    #[serde(default)]
    edge: Vec<EdgeDecl>,
}

#[derive(Debug, Default)]
pub struct Schema {
    vertex_label_ids: HashMap<String, Label>,
    edge_label_ids: HashMap<String, Label>,
    vertex_headers: Vec<PropertyHeader>,
    vertex_partition: Vec<PartitionType>,
    edge_headers: BTreeMap<LabelTriplet, PropertyHeader>,
    oe_single: HashSet<LabelTriplet>,
    ie_single: HashSet<LabelTriplet>,
}

impl Schema {
    /// Read a schema document from disk. A missing or unparseable schema
    /// file is a fatal load error: nothing else about the partition can be
    /// interpreted without it.
    pub fn open(path: impl AsRef<Path>) -> Result<Schema> {
        let text = fs::read_to_string(path)?;
        Schema::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Schema> {
        let doc: SchemaDoc = serde_json::from_str(text)?;
        Ok(Schema::from_doc(doc))
    }

    fn from_doc(doc: SchemaDoc) -> Schema {
        let mut schema = Schema::default();

        for vertex in doc.vertex {
            let label = schema.vertex_headers.len() as Label;
            schema.vertex_label_ids.insert(vertex.label, label);
            schema.vertex_partition.push(
                vertex
                    .partition_type
                    .as_deref()
                    .map_or(PartitionType::Dynamic, PartitionType::parse),
            );
            schema.vertex_headers.push(parse_header(vertex.properties));
        }

        let mut next_edge_label: Label = 0;
        for edge in doc.edge {
            let (Some(&src_label), Some(&dst_label)) = (
                schema.vertex_label_ids.get(&edge.src_label),
                schema.vertex_label_ids.get(&edge.dst_label),
            ) else {
                error!(
                    src = %edge.src_label,
                    edge = %edge.label,
                    dst = %edge.dst_label,
                    "vertex label not found, skipping edge triplet"
                );
                continue;
            };

            let edge_label = *schema.edge_label_ids.entry(edge.label).or_insert_with(|| {
                let id = next_edge_label;
                next_edge_label += 1;
                id
            });

            let triplet = LabelTriplet::new(src_label, edge_label, dst_label);
            if edge.oe_strategy.as_deref() == Some("Single") {
                schema.oe_single.insert(triplet);
            }
            if edge.ie_strategy.as_deref() == Some("Single") {
                schema.ie_single.insert(triplet);
            }
            schema
                .edge_headers
                .insert(triplet, parse_header(edge.properties));
        }

        schema
    }

    pub fn vertex_label_num(&self) -> Label {
        self.vertex_headers.len() as Label
    }

    pub fn edge_label_num(&self) -> Label {
        self.edge_label_ids.len() as Label
    }

    pub fn vertex_label_id(&self, name: &str) -> Option<Label> {
        self.vertex_label_ids.get(name).copied()
    }

    pub fn edge_label_id(&self, name: &str) -> Option<Label> {
        self.edge_label_ids.get(name).copied()
    }

    pub fn get_vertex_header(&self, label: Label) -> Option<&PropertyHeader> {
        self.vertex_headers.get(label as usize)
    }

    pub fn vertex_partition_type(&self, label: Label) -> Option<PartitionType> {
        self.vertex_partition.get(label as usize).copied()
    }

    pub fn exist_edge_triplet(&self, triplet: LabelTriplet) -> bool {
        self.edge_headers.contains_key(&triplet)
    }

    pub fn get_edge_header(&self, triplet: LabelTriplet) -> Option<&PropertyHeader> {
        self.edge_headers.get(&triplet)
    }

    pub fn oe_is_single(&self, triplet: LabelTriplet) -> bool {
        self.oe_single.contains(&triplet)
    }

    pub fn ie_is_single(&self, triplet: LabelTriplet) -> bool {
        self.ie_single.contains(&triplet)
    }

    /// All declared edge triplets, in triplet order.
    pub fn edge_triplets(&self) -> impl Iterator<Item = LabelTriplet> + '_ {
        self.edge_headers.keys().copied()
    }
}

fn parse_header(props: Vec<PropDecl>) -> PropertyHeader {
    props
        .into_iter()
        .map(|p| {
            let data_type = DataType::parse(&p.data_type);
            (p.name, data_type)
        })
        .collect()
}
