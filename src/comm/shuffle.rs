//! All-to-all message shuffle between servers.
//!
//! The shuffle is the BSP exchange primitive: every server trades its
//! locally produced messages with every other server in a ring pattern
//! (round `i`: send to `(self+i) % N` while receiving from
//! `(self+N-i) % N`), with one dedicated sending thread and one dedicated
//! receiving thread per call so neither direction blocks the other.
//! Messages destined for the local server skip the network entirely.

use tracing::info;

use crate::comm::spec::{CommSpec, MessageBatch};
use crate::comm::transport::{recv_bufs, send_bufs, Duplex, RecvLink, SendLink};
use crate::error::{EngineError, Result};

/// Placeholder occupying a server's own slot in the link arrays; the ring
/// never addresses it.
struct SelfLink;

impl SendLink for SelfLink {
    fn send(&mut self, _data: &[u8]) -> Result<()> {
        Err(EngineError::Topology("no link to self".into()))
    }
}

impl RecvLink for SelfLink {
    fn recv(&mut self, _data: &mut [u8]) -> Result<()> {
        Err(EngineError::Topology("no link to self".into()))
    }
}

/// Communication handle scoped to one run. Owns one duplex link per remote
/// server; dropped links tear the mesh down on scope exit.
pub struct Communicator {
    server_id: usize,
    comm_spec: CommSpec,
    senders: Vec<Box<dyn SendLink>>,
    receivers: Vec<Box<dyn RecvLink>>,
}

impl Communicator {
    /// Wrap an established link mesh. `links[peer]` must hold a duplex for
    /// every remote peer and `None` at the server's own position.
    pub fn new(server_id: usize, comm_spec: CommSpec, links: Vec<Option<Duplex>>) -> Result<Self> {
        if server_id >= comm_spec.server_num() {
            return Err(EngineError::Topology(format!(
                "server id {server_id} out of range for {} servers",
                comm_spec.server_num()
            )));
        }
        if links.len() != comm_spec.server_num() {
            return Err(EngineError::Topology(format!(
                "expected {} link slots, got {}",
                comm_spec.server_num(),
                links.len()
            )));
        }

        let mut senders: Vec<Box<dyn SendLink>> = Vec::with_capacity(links.len());
        let mut receivers: Vec<Box<dyn RecvLink>> = Vec::with_capacity(links.len());
        for (peer, link) in links.into_iter().enumerate() {
            match link {
                Some(duplex) => {
                    if peer == server_id {
                        return Err(EngineError::Topology("unexpected link to self".into()));
                    }
                    senders.push(duplex.sender);
                    receivers.push(duplex.receiver);
                }
                None => {
                    if peer != server_id {
                        return Err(EngineError::Topology(format!(
                            "missing link to server {peer}"
                        )));
                    }
                    senders.push(Box::new(SelfLink));
                    receivers.push(Box::new(SelfLink));
                }
            }
        }

        Ok(Self {
            server_id,
            comm_spec,
            senders,
            receivers,
        })
    }

    /// Single-server communicator: every shuffle is a local move.
    pub fn solo(comm_spec: CommSpec) -> Self {
        assert_eq!(comm_spec.server_num(), 1, "solo communicator needs exactly one server");
        Self {
            server_id: 0,
            comm_spec,
            senders: vec![Box::new(SelfLink)],
            receivers: vec![Box::new(SelfLink)],
        }
    }

    pub fn server_id(&self) -> usize {
        self.server_id
    }

    pub fn comm_spec(&self) -> CommSpec {
        self.comm_spec
    }

    /// Exchange one superstep's output. `input` must be dimensioned by
    /// global worker count; the output is dimensioned by local worker
    /// count, with every remote server's messages already routed to the
    /// right local worker slot.
    pub fn shuffle(&mut self, mut input: MessageBatch) -> Result<MessageBatch> {
        let spec = self.comm_spec;
        assert_eq!(
            input.len(),
            spec.global_worker_num(),
            "shuffle input batch has the wrong worker dimension"
        );
        let server_num = spec.server_num();
        let local_num = spec.local_worker_num();
        let server_id = self.server_id;

        // local messages bypass the network; pull them out before the
        // exchange threads take the remaining slots
        let local: Vec<Vec<Vec<u8>>> = (0..local_num)
            .map(|j| input.take(spec.global_worker_id(server_id, j)))
            .collect();

        let senders = &mut self.senders;
        let receivers = &mut self.receivers;
        let input = &input;

        std::thread::scope(|scope| {
            let send_handle = scope.spawn(move || -> Result<()> {
                for round in 1..server_num {
                    let target = (server_id + round) % server_num;
                    for j in 0..local_num {
                        let global = spec.global_worker_id(target, j);
                        send_bufs(&mut *senders[target], input.get(global))?;
                    }
                }
                Ok(())
            });

            let recv_handle = scope.spawn(move || -> Result<MessageBatch> {
                let mut output = MessageBatch::new(local_num);
                for round in 1..server_num {
                    let source = (server_id + server_num - round) % server_num;
                    for j in 0..local_num {
                        let buf = recv_bufs(&mut *receivers[source])?;
                        output.put(j, buf);
                    }
                }
                for (j, bufs) in local.into_iter().enumerate() {
                    for buf in bufs {
                        output.put(j, buf);
                    }
                }
                Ok(output)
            });

            let output = recv_handle.join().expect("receive thread panicked");
            let sent = send_handle.join().expect("send thread panicked");
            sent?;
            output
        })
    }
}

/// Agree on the cluster-wide minimum of a value (one u64 ring exchange over
/// the raw link mesh). Runs before the [`Communicator`] is constructed so
/// the agreed worker count can seed the [`CommSpec`].
pub fn min_all_reduce(server_id: usize, links: &mut [Option<Duplex>], value: u64) -> Result<u64> {
    let server_num = links.len();
    if server_num <= 1 {
        return Ok(value);
    }

    let mut send_halves: Vec<Option<&mut Box<dyn SendLink>>> = Vec::with_capacity(server_num);
    let mut recv_halves: Vec<Option<&mut Box<dyn RecvLink>>> = Vec::with_capacity(server_num);
    for link in links.iter_mut() {
        match link {
            Some(Duplex { sender, receiver }) => {
                send_halves.push(Some(sender));
                recv_halves.push(Some(receiver));
            }
            None => {
                send_halves.push(None);
                recv_halves.push(None);
            }
        }
    }

    let agreed = std::thread::scope(|scope| {
        let mut send_halves = send_halves;
        let mut recv_halves = recv_halves;

        let send_handle = scope.spawn(move || -> Result<()> {
            for round in 1..server_num {
                let target = (server_id + round) % server_num;
                let Some(link) = send_halves[target].as_mut() else {
                    return Err(EngineError::Topology(format!("missing link to server {target}")));
                };
                link.send(&value.to_le_bytes())?;
            }
            Ok(())
        });

        let recv_handle = scope.spawn(move || -> Result<u64> {
            let mut min = value;
            for round in 1..server_num {
                let source = (server_id + server_num - round) % server_num;
                let Some(link) = recv_halves[source].as_mut() else {
                    return Err(EngineError::Topology(format!("missing link to server {source}")));
                };
                let mut bytes = [0u8; 8];
                link.recv(&mut bytes)?;
                min = min.min(u64::from_le_bytes(bytes));
            }
            Ok(min)
        });

        let min = recv_handle.join().expect("receive thread panicked");
        let sent = send_handle.join().expect("send thread panicked");
        sent?;
        min
    })?;

    info!(value, agreed, "cluster minimum agreed");
    Ok(agreed)
}
