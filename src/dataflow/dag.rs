//! Operator DAG with dependency-ordered scheduling.
//!
//! Operators are added with explicit upstream references; fixing the sink
//! triggers schedule generation. The schedule is a topological order built
//! by Kahn's algorithm batched into dependency-free waves, restricted to
//! operators that can actually reach the sink. While ordering, every
//! operator accumulates the number of downstream consumers of its
//! materialized output; that reference count drives buffer release during
//! execution.

use std::collections::{BTreeSet, VecDeque};

use crate::dataflow::operator::{BinaryOperator, NullaryOperator, Operator, UnaryOperator};

pub type OpId = usize;

pub struct DataFlow<C> {
    operators: Vec<Operator<C>>,
    upstreams: Vec<Vec<OpId>>,
    order: Vec<OpId>,
    output_refcount: Vec<u32>,
    sink_op: Option<OpId>,
}

impl<C> Default for DataFlow<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DataFlow<C> {
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            upstreams: Vec::new(),
            order: Vec::new(),
            output_refcount: Vec::new(),
            sink_op: None,
        }
    }

    pub fn add_nullary(&mut self, op: Box<dyn NullaryOperator<C>>) -> OpId {
        self.operators.push(Operator::Nullary(op));
        self.upstreams.push(Vec::new());
        self.operators.len() - 1
    }

    pub fn add_unary(&mut self, op: Box<dyn UnaryOperator<C>>, upstream: OpId) -> OpId {
        assert!(upstream < self.operators.len(), "unknown upstream operator {upstream}");
        self.operators.push(Operator::Unary(op));
        self.upstreams.push(vec![upstream]);
        self.operators.len() - 1
    }

    pub fn add_binary(
        &mut self,
        op: Box<dyn BinaryOperator<C>>,
        upstream0: OpId,
        upstream1: OpId,
    ) -> OpId {
        assert!(upstream0 < self.operators.len(), "unknown upstream operator {upstream0}");
        assert!(upstream1 < self.operators.len(), "unknown upstream operator {upstream1}");
        self.operators.push(Operator::Binary(op));
        self.upstreams.push(vec![upstream0, upstream1]);
        self.operators.len() - 1
    }

    /// Fix the terminal operator and generate the execution schedule.
    pub fn sink(&mut self, op_id: OpId) {
        assert!(op_id < self.operators.len(), "unknown sink operator {op_id}");
        self.sink_op = Some(op_id);
        self.generate_order(op_id);
    }

    fn generate_order(&mut self, sink: OpId) {
        let op_num = self.upstreams.len();

        // operators that cannot reach the sink are never scheduled
        let mut reachable = BTreeSet::new();
        let mut queue = VecDeque::new();
        reachable.insert(sink);
        queue.push_back(sink);
        while let Some(cur) = queue.pop_front() {
            for &up in &self.upstreams[cur] {
                if reachable.insert(up) {
                    queue.push_back(up);
                }
            }
        }

        let mut deps: Vec<BTreeSet<OpId>> = vec![BTreeSet::new(); op_num];
        for &v in &reachable {
            deps[v] = self.upstreams[v].iter().copied().collect();
        }
        let mut not_scheduled = reachable;

        // peel dependency-free waves; operators inside one wave have no
        // mutual ordering requirement
        let mut waves: Vec<Vec<OpId>> = Vec::new();
        while !not_scheduled.is_empty() {
            let wave: Vec<OpId> = not_scheduled
                .iter()
                .copied()
                .filter(|&v| deps[v].is_empty())
                .collect();
            if wave.is_empty() {
                break;
            }
            for &v in &wave {
                not_scheduled.remove(&v);
            }
            for &v in &not_scheduled {
                for &peeled in &wave {
                    deps[v].remove(&peeled);
                }
            }
            waves.push(wave);
        }
        assert!(
            not_scheduled.is_empty(),
            "operator graph contains a dependency cycle"
        );

        self.output_refcount = vec![0; op_num];
        self.order.clear();
        for wave in waves {
            for v in wave {
                self.order.push(v);
                for &up in &self.upstreams[v] {
                    self.output_refcount[up] += 1;
                }
            }
        }
    }

    pub fn operator_num(&self) -> usize {
        self.operators.len()
    }

    pub fn operator(&self, id: OpId) -> &Operator<C> {
        &self.operators[id]
    }

    pub fn upstreams(&self, id: OpId) -> &[OpId] {
        &self.upstreams[id]
    }

    /// Linear execution order; empty until a sink is fixed.
    pub fn order(&self) -> &[OpId] {
        &self.order
    }

    pub fn output_refcount(&self, id: OpId) -> u32 {
        self.output_refcount[id]
    }

    pub fn sink_op(&self) -> Option<OpId> {
        self.sink_op
    }
}
