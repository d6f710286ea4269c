//! Superstep execution engine.
//!
//! The runner walks the dataflow's linear schedule one operator per
//! superstep: `step_start` executes the current operator on every local
//! worker in parallel (a full fork-join barrier), the caller shuffles the
//! produced batch across servers, and `step_finish` ingests the shuffled
//! result into the operator's message slot. Slots are reference counted by
//! downstream consumer count and release their buffers on the last deref.
//! All slot mutation happens on the single runner thread; operator threads
//! only read fully initialized slots.

use crate::comm::spec::{CommSpec, MessageBatch};
use crate::dataflow::dag::{DataFlow, OpId};
use crate::dataflow::operator::Operator;
use crate::dataflow::stream::{ReadStream, WriteStream};
use crate::error::{EngineError, Result};

/// Reference-counted holder of one operator's shuffled output.
#[derive(Debug, Default)]
pub struct MessageSlot {
    batch: MessageBatch,
    ref_count: u32,
    populated: bool,
}

impl MessageSlot {
    fn init(&mut self, ref_count: u32) {
        self.ref_count = ref_count;
    }

    fn ingest(&mut self, batch: MessageBatch) {
        self.batch = batch;
        self.populated = true;
    }

    fn get(&self, local_worker: usize) -> &[Vec<u8>] {
        self.batch.get(local_worker)
    }

    fn is_populated(&self) -> bool {
        self.populated
    }

    /// Drop one consumer reference; the buffered bytes are released when
    /// the count reaches zero.
    fn deref(&mut self) {
        debug_assert!(self.ref_count > 0, "slot dereferenced more often than consumed");
        self.ref_count = self.ref_count.saturating_sub(1);
        if self.ref_count == 0 {
            self.batch.clear();
        }
    }
}

pub struct DataFlowRunner<'a, C> {
    dataflow: &'a DataFlow<C>,
    contexts: &'a [C],
    slots: Vec<MessageSlot>,
    comm_spec: CommSpec,
    sink_op: OpId,
    cur_step: usize,
}

impl<'a, C: Sync> DataFlowRunner<'a, C> {
    /// The dataflow must have a fixed sink, and there must be exactly one
    /// context per local worker slot.
    pub fn new(dataflow: &'a DataFlow<C>, contexts: &'a [C], comm_spec: CommSpec) -> Result<Self> {
        let Some(sink_op) = dataflow.sink_op() else {
            return Err(EngineError::Topology("dataflow has no sink".into()));
        };
        if contexts.len() != comm_spec.local_worker_num() {
            return Err(EngineError::Topology(format!(
                "expected {} worker contexts, got {}",
                comm_spec.local_worker_num(),
                contexts.len()
            )));
        }
        Ok(Self {
            dataflow,
            contexts,
            slots: (0..dataflow.operator_num()).map(|_| MessageSlot::default()).collect(),
            comm_spec,
            sink_op,
            cur_step: 0,
        })
    }

    /// Execute the current operator on every local worker and collect the
    /// outbound batch, keyed by destination global worker. The caller is
    /// responsible for shuffling it before `step_finish`.
    pub fn step_start(&mut self) -> MessageBatch {
        let global_num = self.comm_spec.global_worker_num();
        let local_num = self.comm_spec.local_worker_num();
        let mut outbound = MessageBatch::new(global_num);
        if self.cur_step == self.dataflow.order().len() {
            return outbound;
        }
        let dataflow = self.dataflow;
        let cur_op = dataflow.order()[self.cur_step];
        let contexts = self.contexts;

        let per_worker: Vec<Vec<(usize, Vec<u8>)>> = match dataflow.operator(cur_op) {
            Operator::Nullary(op) => std::thread::scope(|scope| {
                let handles: Vec<_> = (0..local_num)
                    .map(|tid| {
                        scope.spawn(move || {
                            let mut output = make_output(global_num);
                            op.execute(&contexts[tid], &mut output);
                            collect_output(output)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
            }),
            Operator::Unary(op) => {
                let upstream = dataflow.upstreams(cur_op)[0];
                let slot = &self.slots[upstream];
                assert!(slot.is_populated(), "upstream slot {upstream} is not populated");

                let results = std::thread::scope(|scope| {
                    let handles: Vec<_> = (0..local_num)
                        .map(|tid| {
                            scope.spawn(move || {
                                let mut input = ReadStream::new(slot.get(tid));
                                let mut output = make_output(global_num);
                                op.execute(&contexts[tid], &mut input, &mut output);
                                collect_output(output)
                            })
                        })
                        .collect();
                    handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
                });

                // release the consumed input after the fork-join barrier
                self.slots[upstream].deref();
                results
            }
            Operator::Binary(op) => {
                let upstreams = dataflow.upstreams(cur_op);
                let (up0, up1) = (upstreams[0], upstreams[1]);
                let slot0 = &self.slots[up0];
                let slot1 = &self.slots[up1];
                assert!(slot0.is_populated(), "upstream slot {up0} is not populated");
                assert!(slot1.is_populated(), "upstream slot {up1} is not populated");

                let results = std::thread::scope(|scope| {
                    let handles: Vec<_> = (0..local_num)
                        .map(|tid| {
                            scope.spawn(move || {
                                let mut left = ReadStream::new(slot0.get(tid));
                                let mut right = ReadStream::new(slot1.get(tid));
                                let mut output = make_output(global_num);
                                op.execute(&contexts[tid], &mut left, &mut right, &mut output);
                                collect_output(output)
                            })
                        })
                        .collect();
                    handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
                });

                self.slots[up0].deref();
                self.slots[up1].deref();
                results
            }
        };

        // merge per-thread results in local-worker order
        for worker_output in per_worker {
            for (dst, buffer) in worker_output {
                outbound.put(dst, buffer);
            }
        }
        outbound
    }

    /// Ingest the shuffled batch as the just-executed operator's slot
    /// content and advance to the next superstep.
    pub fn step_finish(&mut self, messages: MessageBatch) {
        let cur_op = self.dataflow.order()[self.cur_step];
        self.cur_step += 1;
        let slot = &mut self.slots[cur_op];
        slot.init(self.dataflow.output_refcount(cur_op));
        slot.ingest(messages);
    }

    /// True once every scheduled operator has executed.
    pub fn terminated(&self) -> bool {
        self.cur_step == self.dataflow.order().len()
    }

    /// The sink operator's materialized output: one buffer list per local
    /// worker.
    pub fn get_sink(&self) -> &MessageBatch {
        &self.slots[self.sink_op].batch
    }
}

fn make_output(global_num: usize) -> Vec<WriteStream> {
    (0..global_num).map(|_| WriteStream::new()).collect()
}

fn collect_output(output: Vec<WriteStream>) -> Vec<(usize, Vec<u8>)> {
    output
        .into_iter()
        .enumerate()
        .filter(|(_, stream)| !stream.is_empty())
        .map(|(dst, stream)| (dst, stream.into_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::operator::{NullaryOperator, UnaryOperator};

    /// Emits one u64 per worker to every global worker.
    struct Emit(u64);

    impl NullaryOperator<usize> for Emit {
        fn execute(&self, ctx: &usize, output: &mut [WriteStream]) {
            for stream in output.iter_mut() {
                stream.write_u64(self.0 + *ctx as u64);
            }
        }
    }

    /// Sums every incoming u64 and reports it to worker 0.
    struct Sum;

    impl UnaryOperator<usize> for Sum {
        fn execute(&self, _ctx: &usize, input: &mut ReadStream<'_>, output: &mut [WriteStream]) {
            let mut total = 0;
            while let Some(v) = input.read_u64() {
                total += v;
            }
            output[0].write_u64(total);
        }
    }

    /// Forwards its input untouched to worker 0.
    struct Forward;

    impl UnaryOperator<usize> for Forward {
        fn execute(&self, _ctx: &usize, input: &mut ReadStream<'_>, output: &mut [WriteStream]) {
            while let Some(v) = input.read_u64() {
                output[0].write_u64(v);
            }
        }
    }

    fn drive(runner: &mut DataFlowRunner<'_, usize>, comm: &mut crate::comm::Communicator) {
        while !runner.terminated() {
            let out = runner.step_start();
            let shuffled = comm.shuffle(out).unwrap();
            runner.step_finish(shuffled);
        }
    }

    #[test]
    fn test_single_worker_pipeline() {
        let mut flow: DataFlow<usize> = DataFlow::new();
        let seed = flow.add_nullary(Box::new(Emit(5)));
        let sum = flow.add_unary(Box::new(Sum), seed);
        flow.sink(sum);

        let spec = CommSpec::new(1, 1);
        let contexts = vec![0usize];
        let mut comm = crate::comm::Communicator::solo(spec);
        let mut runner = DataFlowRunner::new(&flow, &contexts, spec).unwrap();
        drive(&mut runner, &mut comm);

        let sink = runner.get_sink();
        let mut stream = ReadStream::new(sink.get(0));
        assert_eq!(stream.read_u64(), Some(5));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_two_workers_aggregate_at_worker_zero() {
        let mut flow: DataFlow<usize> = DataFlow::new();
        let seed = flow.add_nullary(Box::new(Emit(10)));
        let sum = flow.add_unary(Box::new(Sum), seed);
        flow.sink(sum);

        let spec = CommSpec::new(2, 1);
        let contexts = vec![0usize, 1];
        let mut comm = crate::comm::Communicator::solo(spec);
        let mut runner = DataFlowRunner::new(&flow, &contexts, spec).unwrap();
        drive(&mut runner, &mut comm);

        // each worker received 10 and 11 from the seed step; worker 0 holds
        // both partial sums
        let sink = runner.get_sink();
        let mut stream = ReadStream::new(sink.get(0));
        let mut seen = vec![stream.read_u64().unwrap(), stream.read_u64().unwrap()];
        seen.sort_unstable();
        assert_eq!(seen, vec![21, 21]);
        assert!(sink.get(1).is_empty());
    }

    #[test]
    fn test_shared_upstream_buffers_survive_first_consumer() {
        // seed feeds two forwards; the seed slot must stay readable for the
        // second consumer and be released only after it
        let mut flow: DataFlow<usize> = DataFlow::new();
        let seed = flow.add_nullary(Box::new(Emit(1)));
        let left = flow.add_unary(Box::new(Forward), seed);
        let right = flow.add_unary(Box::new(Forward), left);
        let join = flow.add_binary(
            Box::new(JoinCount),
            seed,
            right,
        );
        flow.sink(join);
        assert_eq!(flow.output_refcount(seed), 2);

        let spec = CommSpec::new(1, 1);
        let contexts = vec![0usize];
        let mut comm = crate::comm::Communicator::solo(spec);
        let mut runner = DataFlowRunner::new(&flow, &contexts, spec).unwrap();
        drive(&mut runner, &mut comm);

        let sink = runner.get_sink();
        let mut stream = ReadStream::new(sink.get(0));
        // both inputs of the join still carried the seed value
        assert_eq!(stream.read_u64(), Some(2));
    }

    /// Counts total u64 values across both inputs.
    struct JoinCount;

    impl crate::dataflow::operator::BinaryOperator<usize> for JoinCount {
        fn execute(
            &self,
            _ctx: &usize,
            left: &mut ReadStream<'_>,
            right: &mut ReadStream<'_>,
            output: &mut [WriteStream],
        ) {
            let mut count = 0;
            while left.read_u64().is_some() {
                count += 1;
            }
            while right.read_u64().is_some() {
                count += 1;
            }
            output[0].write_u64(count);
        }
    }

    #[test]
    fn test_runner_requires_sink() {
        let flow: DataFlow<usize> = DataFlow::new();
        let contexts = vec![0usize];
        let spec = CommSpec::new(1, 1);
        assert!(DataFlowRunner::new(&flow, &contexts, spec).is_err());
    }

    #[test]
    fn test_runner_requires_one_context_per_worker() {
        let mut flow: DataFlow<usize> = DataFlow::new();
        let seed = flow.add_nullary(Box::new(Emit(0)));
        flow.sink(seed);
        let contexts = vec![0usize];
        let spec = CommSpec::new(2, 1);
        assert!(DataFlowRunner::new(&flow, &contexts, spec).is_err());
    }
}
