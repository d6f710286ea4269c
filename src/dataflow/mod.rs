//! Dataflow execution engine: operator DAG, schedule, superstep runner.

pub mod dag;
pub mod operator;
pub mod runner;
pub mod stream;

pub use dag::{DataFlow, OpId};
pub use operator::{BinaryOperator, NullaryOperator, Operator, OperatorKind, UnaryOperator};
pub use runner::{DataFlowRunner, MessageSlot};
pub use stream::{ReadStream, WriteStream};
