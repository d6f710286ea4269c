//! Query-plan boundary.
//!
//! A plan supplies two things: the operator DAG, and a per-worker execution
//! context bound to a loaded [`GraphDB`]. The context type is chosen by the
//! plan itself, so operator code works against concrete fields instead of
//! querying a shared interface at runtime. Plans are registered under a
//! numeric id; a batch referencing an unknown id is reported and skipped,
//! never fatal.

use std::collections::{BTreeMap, HashMap};

use crate::comm::shuffle::Communicator;
use crate::comm::spec::{CommSpec, MessageBatch};
use crate::dataflow::dag::DataFlow;
use crate::error::{EngineError, Result};
use crate::graph::db::GraphDB;
use crate::worker::Worker;

/// Worker-slot identity plus the string parameters of one query instance.
/// Plans embed this into their own context types.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    local_worker_id: usize,
    local_worker_num: usize,
    server_id: usize,
    server_num: usize,
    params: HashMap<String, String>,
}

impl WorkerContext {
    pub fn new(local_worker_id: usize, server_id: usize, comm_spec: CommSpec) -> Self {
        Self {
            local_worker_id,
            local_worker_num: comm_spec.local_worker_num(),
            server_id,
            server_num: comm_spec.server_num(),
            params: HashMap::new(),
        }
    }

    pub fn local_worker_id(&self) -> usize {
        self.local_worker_id
    }

    pub fn local_worker_num(&self) -> usize {
        self.local_worker_num
    }

    pub fn server_id(&self) -> usize {
        self.server_id
    }

    pub fn server_num(&self) -> usize {
        self.server_num
    }

    pub fn global_worker_id(&self) -> usize {
        self.server_id * self.local_worker_num + self.local_worker_id
    }

    pub fn global_worker_num(&self) -> usize {
        self.local_worker_num * self.server_num
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn clear_params(&mut self) {
        self.params.clear();
    }
}

/// A compiled query plan.
pub trait Plan: Send + Sync {
    /// Per-worker execution context, borrowing the loaded graph.
    type Ctx<'g>: Send + Sync
    where
        Self: 'g;

    /// Build the operator DAG (with its sink fixed).
    fn dataflow<'g>(&'g self) -> DataFlow<Self::Ctx<'g>>;

    /// Build one worker's execution context.
    fn create_context<'g>(&'g self, graph: &'g GraphDB, worker: WorkerContext) -> Self::Ctx<'g>;
}

/// Object-safe adapter so plans with different context types share one
/// registry.
trait RunnablePlan: Send + Sync {
    fn eval_batch(
        &self,
        worker: &Worker,
        graph: &GraphDB,
        batch: &[HashMap<String, String>],
        comm: &mut Communicator,
    ) -> Result<Vec<MessageBatch>>;
}

impl<P: Plan> RunnablePlan for P {
    fn eval_batch(
        &self,
        worker: &Worker,
        graph: &GraphDB,
        batch: &[HashMap<String, String>],
        comm: &mut Communicator,
    ) -> Result<Vec<MessageBatch>> {
        worker.eval_batch(graph, self, batch, comm)
    }
}

/// Registry of available plans, keyed by plan id.
#[derive(Default)]
pub struct PlanRegistry {
    plans: BTreeMap<u32, Box<dyn RunnablePlan>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Plan + 'static>(&mut self, id: u32, plan: P) {
        self.plans.insert(id, Box::new(plan));
    }

    pub fn contains(&self, id: u32) -> bool {
        self.plans.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.plans.keys().copied()
    }

    /// Run every parameterization of one batch through the identified plan.
    pub fn eval_batch(
        &self,
        id: u32,
        worker: &Worker,
        graph: &GraphDB,
        batch: &[HashMap<String, String>],
        comm: &mut Communicator,
    ) -> Result<Vec<MessageBatch>> {
        let plan = self.plans.get(&id).ok_or(EngineError::PlanNotFound(id))?;
        plan.eval_batch(worker, graph, batch, comm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_context_projections() {
        let spec = CommSpec::new(3, 2);
        let ctx = WorkerContext::new(1, 1, spec);
        assert_eq!(ctx.local_worker_id(), 1);
        assert_eq!(ctx.local_worker_num(), 3);
        assert_eq!(ctx.server_id(), 1);
        assert_eq!(ctx.global_worker_id(), 4);
        assert_eq!(ctx.global_worker_num(), 6);
    }

    #[test]
    fn test_worker_context_params() {
        let mut ctx = WorkerContext::new(0, 0, CommSpec::new(1, 1));
        ctx.set_param("tag", "Peru");
        assert_eq!(ctx.get_param("tag"), Some("Peru"));
        assert_eq!(ctx.get_param("missing"), None);
        ctx.clear_params();
        assert_eq!(ctx.get_param("tag"), None);
    }
}
