//! Operator interface.
//!
//! An operator is the unit of computation: it consumes zero, one or two
//! upstream message streams and writes output messages, one stream per
//! destination global worker. The execution context type `C` is chosen by
//! the query plan at construction time, so plan code works against its own
//! concrete context with no runtime type queries.

use crate::dataflow::stream::{ReadStream, WriteStream};

pub trait NullaryOperator<C>: Send + Sync {
    fn execute(&self, ctx: &C, output: &mut [WriteStream]);
}

pub trait UnaryOperator<C>: Send + Sync {
    fn execute(&self, ctx: &C, input: &mut ReadStream<'_>, output: &mut [WriteStream]);
}

pub trait BinaryOperator<C>: Send + Sync {
    fn execute(
        &self,
        ctx: &C,
        left: &mut ReadStream<'_>,
        right: &mut ReadStream<'_>,
        output: &mut [WriteStream],
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Nullary,
    Unary,
    Binary,
}

/// Closed operator variant; arity is fixed at construction.
pub enum Operator<C> {
    Nullary(Box<dyn NullaryOperator<C>>),
    Unary(Box<dyn UnaryOperator<C>>),
    Binary(Box<dyn BinaryOperator<C>>),
}

impl<C> Operator<C> {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Nullary(_) => OperatorKind::Nullary,
            Operator::Unary(_) => OperatorKind::Unary,
            Operator::Binary(_) => OperatorKind::Binary,
        }
    }
}
