//! Integration test: load a toy partition and run a three-operator plan.
//!
//! The partition holds two vertex labels (only the first populated: A0 and
//! A1) and one edge A0 -> A1. The plan seeds A0, traverses the edge, and
//! counts destination ids; the sink must report exactly one occurrence of
//! A1's global identifier.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use trellis::comm::shuffle::Communicator;
use trellis::comm::spec::{get_partition, CommSpec};
use trellis::dataflow::dag::DataFlow;
use trellis::dataflow::operator::{NullaryOperator, UnaryOperator};
use trellis::dataflow::stream::{ReadStream, WriteStream};
use trellis::graph::db::{Direction, GraphDB};
use trellis::graph::schema::LabelTriplet;
use trellis::graph::types::{encode_gid, Gid};
use trellis::plan::{Plan, WorkerContext};
use trellis::worker::Worker;

const SCHEMA: &str = r#"{
    "vertex": [
        {"label": "person", "partition_type": "Dynamic", "properties": []},
        {"label": "post", "partition_type": "Dynamic", "properties": []}
    ],
    "edge": [
        {"src_label": "person", "label": "knows", "dst_label": "person"}
    ]
}"#;

fn write_u64s(path: &Path, values: &[u64]) {
    let mut bytes = Vec::new();
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

fn write_i32s(path: &Path, values: &[i32]) {
    let mut bytes = Vec::new();
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

/// Write the toy partition under `prefix` and return (A0, A1).
fn write_partition(prefix: &Path) -> (Gid, Gid) {
    let a0 = encode_gid(0, 0);
    let a1 = encode_gid(0, 1);

    let schema_dir = prefix.join("graph_schema");
    fs::create_dir_all(&schema_dir).unwrap();
    fs::write(schema_dir.join("schema.json"), SCHEMA).unwrap();

    let bin = prefix.join("graph_data_bin/partition_0");
    fs::create_dir_all(&bin).unwrap();

    write_u64s(&bin.join("vm_0_keys"), &[a0, a1]);
    write_u64s(&bin.join("vm_1_keys"), &[]);

    // A0 -> A1 over "knows"
    write_u64s(&bin.join("oe_0_0_0_nbrs"), &[a1]);
    write_u64s(&bin.join("oe_0_0_0_offsets"), &[0, 1]);
    write_i32s(&bin.join("oe_0_0_0_degree"), &[1, 0]);
    write_u64s(&bin.join("oe_0_0_0_meta"), &[1]);

    write_u64s(&bin.join("ie_0_0_0_nbrs"), &[a0]);
    write_u64s(&bin.join("ie_0_0_0_offsets"), &[0, 0]);
    write_i32s(&bin.join("ie_0_0_0_degree"), &[0, 1]);
    write_u64s(&bin.join("ie_0_0_0_meta"), &[1]);

    (a0, a1)
}

// ── The three-operator plan ────────────────────────────────────────

struct TraverseCtx<'g> {
    graph: &'g GraphDB,
    worker: WorkerContext,
}

impl TraverseCtx<'_> {
    fn owner_of(&self, gid: Gid) -> usize {
        get_partition(gid, self.worker.local_worker_num(), self.worker.server_num())
    }
}

/// Seed: global worker 0 resolves the "start" parameter to a person gid and
/// routes it to its owning worker.
struct SeedStart;

impl<'g> NullaryOperator<TraverseCtx<'g>> for SeedStart {
    fn execute(&self, ctx: &TraverseCtx<'g>, output: &mut [WriteStream]) {
        if ctx.worker.global_worker_id() != 0 {
            return;
        }
        let Some(oid) = ctx.worker.get_param("start").and_then(|v| v.parse().ok()) else {
            return;
        };
        let gid = encode_gid(0, oid);
        output[ctx.owner_of(gid)].write_gid(gid);
    }
}

/// Traverse: each received vertex fans its outgoing "knows" neighbors out
/// to their owners.
struct TraverseKnows;

impl<'g> UnaryOperator<TraverseCtx<'g>> for TraverseKnows {
    fn execute(&self, ctx: &TraverseCtx<'g>, input: &mut ReadStream<'_>, output: &mut [WriteStream]) {
        let triplet = LabelTriplet::new(0, 0, 0);
        let Some(view) = ctx.graph.graph_view(triplet, Direction::Outgoing) else {
            return;
        };
        while let Some(gid) = input.read_gid() {
            let Some((_, v)) = ctx.graph.get_index(gid) else {
                continue;
            };
            for neighbor in view.get_edges(v) {
                output[ctx.owner_of(neighbor)].write_gid(neighbor);
            }
        }
    }
}

/// Count destinations: each worker reports (gid, occurrences) pairs to its
/// own slot.
struct CountDestinations;

impl<'g> UnaryOperator<TraverseCtx<'g>> for CountDestinations {
    fn execute(&self, ctx: &TraverseCtx<'g>, input: &mut ReadStream<'_>, output: &mut [WriteStream]) {
        let mut counts: HashMap<Gid, u64> = HashMap::new();
        while let Some(gid) = input.read_gid() {
            *counts.entry(gid).or_default() += 1;
        }
        let own = ctx.worker.global_worker_id();
        for (gid, count) in counts {
            output[own].write_gid(gid);
            output[own].write_u64(count);
        }
    }
}

struct TraversePlan;

impl Plan for TraversePlan {
    type Ctx<'g> = TraverseCtx<'g>
    where
        Self: 'g;

    fn dataflow<'g>(&'g self) -> DataFlow<TraverseCtx<'g>> {
        let mut flow = DataFlow::new();
        let seed = flow.add_nullary(Box::new(SeedStart));
        let traverse = flow.add_unary(Box::new(TraverseKnows), seed);
        let count = flow.add_unary(Box::new(CountDestinations), traverse);
        flow.sink(count);
        flow
    }

    fn create_context<'g>(&'g self, graph: &'g GraphDB, worker: WorkerContext) -> TraverseCtx<'g> {
        TraverseCtx { graph, worker }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[test]
fn storage_layer_sees_the_toy_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let (a0, a1) = write_partition(dir.path());

    let graph = GraphDB::open(dir.path().to_str().unwrap(), 0, 1).unwrap();
    assert_eq!(graph.vertex_num(0), 2);
    assert_eq!(graph.vertex_num(1), 0);

    let (label, v0) = graph.get_index(a0).unwrap();
    assert_eq!(label, 0);
    assert_eq!(graph.get_gid(label, v0), Some(a0));

    let triplet = LabelTriplet::new(0, 0, 0);
    let oe = graph.get_adjacency(triplet, Direction::Outgoing).unwrap();
    assert_eq!(oe.degree(v0), 1);
    assert_eq!(oe.get_edges(v0).iter().collect::<Vec<_>>(), vec![a1]);

    let (_, v1) = graph.get_index(a1).unwrap();
    let ie = graph.get_adjacency(triplet, Direction::Incoming).unwrap();
    assert_eq!(ie.get_edges(v1).iter().collect::<Vec<_>>(), vec![a0]);

    // the triplet is multi-valued in both directions
    assert!(graph.graph_view(triplet, Direction::Outgoing).is_some());
    assert!(graph.single_graph_view(triplet, Direction::Outgoing).is_none());
}

#[test]
fn three_operator_plan_reports_one_destination() {
    let dir = tempfile::TempDir::new().unwrap();
    let (_, a1) = write_partition(dir.path());

    let graph = GraphDB::open(dir.path().to_str().unwrap(), 0, 1).unwrap();

    let worker_num = 2;
    let worker = Worker::new(worker_num, 0, 1);
    let mut comm = Communicator::solo(CommSpec::new(worker_num, 1));

    let mut params = HashMap::new();
    params.insert("start".to_string(), "0".to_string());

    let sink = worker
        .eval(&graph, &TraversePlan, &params, &mut comm)
        .unwrap();

    // collect (gid, count) pairs across every worker slot
    let mut counts: HashMap<Gid, u64> = HashMap::new();
    for local in 0..worker_num {
        let mut stream = ReadStream::new(sink.get(local));
        while let Some(gid) = stream.read_gid() {
            let count = stream.read_u64().unwrap();
            *counts.entry(gid).or_default() += count;
        }
    }

    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get(&a1), Some(&1));
}

#[test]
fn batch_evaluation_reuses_the_compiled_dataflow() {
    let dir = tempfile::TempDir::new().unwrap();
    let (_, a1) = write_partition(dir.path());

    let graph = GraphDB::open(dir.path().to_str().unwrap(), 0, 1).unwrap();
    let worker = Worker::new(1, 0, 1);
    let mut comm = Communicator::solo(CommSpec::new(1, 1));

    // run the traversal from both vertices: A0 reaches A1, A1 reaches nothing
    let batch = vec![
        HashMap::from([("start".to_string(), "0".to_string())]),
        HashMap::from([("start".to_string(), "1".to_string())]),
    ];
    let results = worker
        .eval_batch(&graph, &TraversePlan, &batch, &mut comm)
        .unwrap();
    assert_eq!(results.len(), 2);

    let mut first = ReadStream::new(results[0].get(0));
    assert_eq!(first.read_gid(), Some(a1));
    assert_eq!(first.read_u64(), Some(1));
    assert!(first.is_empty());

    let mut second = ReadStream::new(results[1].get(0));
    assert!(second.is_empty());
}
