//! Worker topology, transport links and the all-to-all shuffle.

pub mod shuffle;
pub mod spec;
pub mod transport;

pub use shuffle::{min_all_reduce, Communicator};
pub use spec::{get_partition, CommSpec, MessageBatch};
pub use transport::{connect_tcp, memory_mesh, Duplex};
