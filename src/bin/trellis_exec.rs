//! Trellis query executor.
//!
//! Loads one graph partition, agrees a cluster-wide worker count, then runs
//! every batch from the query config file through its registered plan.
//!
//! Usage:
//!   trellis-exec <partition-prefix> <query-config>
//!       [--partition N] [--server-id N] [--hosts host:port,host:port,...]
//!
//! Single-server by default. With `--hosts`, every server process names the
//! full address list and its own `--server-id`; the processes establish a
//! TCP mesh before the run starts.

use std::time::Instant;

use anyhow::{bail, Context};
use tracing::{info, warn};

use trellis::comm::shuffle::{min_all_reduce, Communicator};
use trellis::comm::spec::CommSpec;
use trellis::comm::transport::connect_tcp;
use trellis::config::parse_query_config;
use trellis::dataflow::dag::DataFlow;
use trellis::dataflow::operator::{NullaryOperator, UnaryOperator};
use trellis::dataflow::stream::{ReadStream, WriteStream};
use trellis::graph::db::GraphDB;
use trellis::plan::{Plan, PlanRegistry, WorkerContext};
use trellis::worker::Worker;

// ── Built-in plan: vertex count per label ──────────────────────────
//
// Parameter "label" names a vertex label; the sink reports the total number
// of that label's vertices across all partitions.

struct VertexCountCtx<'g> {
    graph: &'g GraphDB,
    worker: WorkerContext,
}

/// Each local worker counts its strided share of the partition's vertices
/// and reports the partial count to global worker 0.
struct ScanVertices;

impl<'g> NullaryOperator<VertexCountCtx<'g>> for ScanVertices {
    fn execute(&self, ctx: &VertexCountCtx<'g>, output: &mut [WriteStream]) {
        let Some(label) = ctx
            .worker
            .get_param("label")
            .and_then(|name| ctx.graph.schema().vertex_label_id(name))
        else {
            return;
        };

        let vertex_num = ctx.graph.vertex_num(label) as u64;
        let stride = ctx.worker.local_worker_num() as u64;
        let mut count = 0u64;
        let mut v = ctx.worker.local_worker_id() as u64;
        while v < vertex_num {
            if ctx.graph.get_gid(label, v).is_some() {
                count += 1;
            }
            v += stride;
        }
        output[0].write_u64(count);
    }
}

/// Global worker 0 sums the partial counts and formats the result.
struct SumCounts;

impl<'g> UnaryOperator<VertexCountCtx<'g>> for SumCounts {
    fn execute(
        &self,
        ctx: &VertexCountCtx<'g>,
        input: &mut ReadStream<'_>,
        output: &mut [WriteStream],
    ) {
        let mut total = 0u64;
        let mut any = false;
        while let Some(partial) = input.read_u64() {
            total += partial;
            any = true;
        }
        if any {
            output[ctx.worker.global_worker_id()].write_str(&total.to_string());
        }
    }
}

struct VertexCountPlan;

impl Plan for VertexCountPlan {
    type Ctx<'g> = VertexCountCtx<'g>
    where
        Self: 'g;

    fn dataflow<'g>(&'g self) -> DataFlow<VertexCountCtx<'g>> {
        let mut flow = DataFlow::new();
        let scan = flow.add_nullary(Box::new(ScanVertices));
        let sum = flow.add_unary(Box::new(SumCounts), scan);
        flow.sink(sum);
        flow
    }

    fn create_context<'g>(&'g self, graph: &'g GraphDB, worker: WorkerContext) -> VertexCountCtx<'g> {
        VertexCountCtx { graph, worker }
    }
}

fn builtin_plans() -> PlanRegistry {
    let mut registry = PlanRegistry::new();
    registry.register(1, VertexCountPlan);
    registry
}

// ── Command line ───────────────────────────────────────────────────

struct Args {
    prefix: String,
    query_config: String,
    partition_id: Option<usize>,
    server_id: usize,
    hosts: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut partition_id = None;
    let mut server_id = 0;
    let mut hosts = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--partition" => {
                let value = args.next().context("--partition needs a value")?;
                partition_id = Some(value.parse().context("--partition must be a number")?);
            }
            "--server-id" => {
                let value = args.next().context("--server-id needs a value")?;
                server_id = value.parse().context("--server-id must be a number")?;
            }
            "--hosts" => {
                let value = args.next().context("--hosts needs a value")?;
                hosts = value.split(',').map(str::to_string).collect();
            }
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        bail!("usage: trellis-exec <partition-prefix> <query-config> [--partition N] [--server-id N] [--hosts a,b,...]");
    }
    let mut positional = positional.into_iter();
    Ok(Args {
        prefix: positional.next().unwrap_or_default(),
        query_config: positional.next().unwrap_or_default(),
        partition_id,
        server_id,
        hosts,
    })
}

fn print_results(plan_id: u32, results: &[trellis::comm::spec::MessageBatch], worker_num: usize) {
    for (run, batch) in results.iter().enumerate() {
        for local_worker in 0..worker_num {
            let buffers = batch.get(local_worker);
            if buffers.is_empty() {
                continue;
            }
            let mut stream = ReadStream::new(buffers);
            while let Some(value) = stream.read_string() {
                println!("plan {plan_id} run {run} worker {local_worker}: {value}");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = parse_args()?;

    let server_num = args.hosts.len().max(1);
    if args.server_id >= server_num {
        bail!("server id {} out of range for {server_num} servers", args.server_id);
    }
    let partition_id = args.partition_id.unwrap_or(args.server_id);

    let graph = GraphDB::open(&args.prefix, partition_id, server_num)?;

    let local_parallelism = std::thread::available_parallelism().map_or(1, usize::from);
    let mut links = if server_num > 1 {
        connect_tcp(args.server_id, &args.hosts)?
    } else {
        vec![None]
    };
    let worker_num = min_all_reduce(args.server_id, &mut links, local_parallelism as u64)? as usize;
    info!(worker_num, server_num, "topology agreed");

    let comm_spec = CommSpec::new(worker_num, server_num);
    let mut comm = if server_num == 1 {
        Communicator::solo(comm_spec)
    } else {
        Communicator::new(args.server_id, comm_spec, links)?
    };

    let worker = Worker::new(worker_num, args.server_id, server_num);
    let registry = builtin_plans();
    let queries = parse_query_config(&args.query_config);

    for (plan_id, batch) in &queries {
        if !registry.contains(*plan_id) {
            warn!(plan_id = *plan_id, "no registered plan, skipping batch");
            continue;
        }

        let start = Instant::now();
        let results = registry.eval_batch(*plan_id, &worker, &graph, batch, &mut comm)?;
        let elapsed = start.elapsed();
        info!(
            plan_id = *plan_id,
            queries = batch.len(),
            total_s = elapsed.as_secs_f64(),
            avg_us = elapsed.as_micros() as f64 / batch.len().max(1) as f64,
            "batch complete"
        );
        print_results(*plan_id, &results, worker_num);
    }

    Ok(())
}
