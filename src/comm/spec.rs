//! Worker/server topology and message batches.

use crate::graph::types::{gid_oid, Gid};

/// Maps `(server_id, local_worker_id)` pairs to flat global worker ids and
/// back: `global = server * local_worker_num + local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommSpec {
    local_worker_num: usize,
    server_num: usize,
}

impl Default for CommSpec {
    fn default() -> Self {
        Self {
            local_worker_num: 1,
            server_num: 1,
        }
    }
}

impl CommSpec {
    pub fn new(local_worker_num: usize, server_num: usize) -> Self {
        assert!(local_worker_num > 0, "need at least one local worker");
        assert!(server_num > 0, "need at least one server");
        Self {
            local_worker_num,
            server_num,
        }
    }

    pub fn global_worker_id(&self, server_id: usize, local_worker_id: usize) -> usize {
        server_id * self.local_worker_num + local_worker_id
    }

    pub fn local_worker_id(&self, global_worker_id: usize) -> usize {
        global_worker_id % self.local_worker_num
    }

    pub fn server_id(&self, global_worker_id: usize) -> usize {
        global_worker_id / self.local_worker_num
    }

    pub fn global_worker_num(&self) -> usize {
        self.local_worker_num * self.server_num
    }

    pub fn local_worker_num(&self) -> usize {
        self.local_worker_num
    }

    pub fn server_num(&self) -> usize {
        self.server_num
    }
}

/// Deterministic placement of a vertex onto a global worker, independent of
/// which worker currently holds the data. Placement uses the original-id
/// half of the gid so every label spreads over all workers.
pub fn get_partition(gid: Gid, worker_num: usize, server_num: usize) -> usize {
    (gid_oid(gid) % (worker_num * server_num) as u64) as usize
}

/// Materialized message buffers keyed by worker slot: one `Vec<Vec<u8>>`
/// message list per destination (or source) worker.
#[derive(Debug, Clone, Default)]
pub struct MessageBatch {
    messages: Vec<Vec<Vec<u8>>>,
}

impl MessageBatch {
    pub fn new(worker_num: usize) -> Self {
        Self {
            messages: (0..worker_num).map(|_| Vec::new()).collect(),
        }
    }

    pub fn put(&mut self, dst: usize, buffer: Vec<u8>) {
        self.messages[dst].push(buffer);
    }

    /// Message list for one worker slot; empty for an out-of-range slot.
    pub fn get(&self, idx: usize) -> &[Vec<u8>] {
        self.messages.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Move one worker slot's message list out, leaving it empty.
    pub fn take(&mut self, idx: usize) -> Vec<Vec<u8>> {
        self.messages.get_mut(idx).map(std::mem::take).unwrap_or_default()
    }

    /// Release every buffer.
    pub fn clear(&mut self) {
        self.messages = Vec::new();
    }

    /// Number of worker slots.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
