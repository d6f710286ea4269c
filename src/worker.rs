//! Per-server query driver.
//!
//! A worker owns the topology of one server's slice of the cluster and
//! drives complete query executions: build per-worker contexts, then
//! alternate local superstep execution with cross-server shuffles until the
//! schedule is exhausted, and hand back the sink output.

use std::collections::HashMap;

use crate::comm::shuffle::Communicator;
use crate::comm::spec::{CommSpec, MessageBatch};
use crate::dataflow::dag::DataFlow;
use crate::dataflow::runner::DataFlowRunner;
use crate::error::Result;
use crate::graph::db::GraphDB;
use crate::plan::{Plan, WorkerContext};

pub struct Worker {
    server_id: usize,
    comm_spec: CommSpec,
}

impl Worker {
    pub fn new(worker_num: usize, server_id: usize, server_num: usize) -> Self {
        Self {
            server_id,
            comm_spec: CommSpec::new(worker_num, server_num),
        }
    }

    pub fn comm_spec(&self) -> CommSpec {
        self.comm_spec
    }

    pub fn server_id(&self) -> usize {
        self.server_id
    }

    /// Run one query instance; returns the sink output, one buffer list per
    /// local worker.
    pub fn eval<P: Plan>(
        &self,
        graph: &GraphDB,
        plan: &P,
        params: &HashMap<String, String>,
        comm: &mut Communicator,
    ) -> Result<MessageBatch> {
        let dataflow = plan.dataflow();
        self.run_once(graph, plan, &dataflow, params, comm)
    }

    /// Run a batch of parameterizations over one compiled dataflow.
    pub fn eval_batch<P: Plan>(
        &self,
        graph: &GraphDB,
        plan: &P,
        batch: &[HashMap<String, String>],
        comm: &mut Communicator,
    ) -> Result<Vec<MessageBatch>> {
        let dataflow = plan.dataflow();
        batch
            .iter()
            .map(|params| self.run_once(graph, plan, &dataflow, params, comm))
            .collect()
    }

    fn run_once<'g, P: Plan>(
        &self,
        graph: &'g GraphDB,
        plan: &'g P,
        dataflow: &DataFlow<P::Ctx<'g>>,
        params: &HashMap<String, String>,
        comm: &mut Communicator,
    ) -> Result<MessageBatch> {
        let contexts: Vec<P::Ctx<'g>> = (0..self.comm_spec.local_worker_num())
            .map(|local_worker_id| {
                let mut worker = WorkerContext::new(local_worker_id, self.server_id, self.comm_spec);
                for (key, value) in params {
                    worker.set_param(key, value);
                }
                plan.create_context(graph, worker)
            })
            .collect();

        let mut runner = DataFlowRunner::new(dataflow, &contexts, self.comm_spec)?;
        while !runner.terminated() {
            let outbound = runner.step_start();
            let inbound = comm.shuffle(outbound)?;
            runner.step_finish(inbound);
        }
        Ok(runner.get_sink().clone())
    }
}
