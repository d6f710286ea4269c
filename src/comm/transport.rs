//! Blocking byte links between servers.
//!
//! A link is one direction of a duplex pipe to one peer server. The wire
//! encoding of a message list is a count, a size table, then the
//! concatenated payloads; payload transfers are chunked so no single
//! transport operation exceeds [`CHUNK_SIZE`]. Links come in two flavors: a
//! TCP stream pair for real deployments, and a crossbeam-channel pipe for
//! in-process server meshes (tests, single-machine runs).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::util::decode_array;

/// Upper bound for one transport operation.
pub const CHUNK_SIZE: usize = 16 * 1024 * 1024;

const CONNECT_RETRIES: usize = 100;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub trait SendLink: Send {
    fn send(&mut self, data: &[u8]) -> Result<()>;
}

pub trait RecvLink: Send {
    /// Fill `data` exactly with the peer's next bytes.
    fn recv(&mut self, data: &mut [u8]) -> Result<()>;
}

/// One duplex connection to a peer server.
pub struct Duplex {
    pub sender: Box<dyn SendLink>,
    pub receiver: Box<dyn RecvLink>,
}

fn send_chunked(link: &mut dyn SendLink, data: &[u8]) -> Result<()> {
    let mut rest = data;
    while rest.len() >= CHUNK_SIZE {
        link.send(&rest[..CHUNK_SIZE])?;
        rest = &rest[CHUNK_SIZE..];
    }
    link.send(rest)
}

fn recv_chunked(link: &mut dyn RecvLink, data: &mut [u8]) -> Result<()> {
    let mut rest = data;
    while rest.len() >= CHUNK_SIZE {
        let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(CHUNK_SIZE);
        link.recv(chunk)?;
        rest = tail;
    }
    link.recv(rest)
}

/// Wire-encode and send one message list: count, size table, payloads.
pub fn send_bufs(link: &mut dyn SendLink, bufs: &[Vec<u8>]) -> Result<()> {
    link.send(&(bufs.len() as u64).to_le_bytes())?;
    let mut sizes = Vec::with_capacity(bufs.len() * 8);
    for buf in bufs {
        sizes.extend_from_slice(&(buf.len() as u64).to_le_bytes());
    }
    send_chunked(link, &sizes)?;
    for buf in bufs {
        send_chunked(link, buf)?;
    }
    Ok(())
}

/// Receive one message list, concatenated into a single buffer.
pub fn recv_bufs(link: &mut dyn RecvLink) -> Result<Vec<u8>> {
    let mut count_bytes = [0u8; 8];
    link.recv(&mut count_bytes)?;
    let count = u64::from_le_bytes(count_bytes) as usize;

    let mut size_bytes = vec![0u8; count * 8];
    recv_chunked(link, &mut size_bytes)?;
    let sizes: Vec<u64> = decode_array(&size_bytes);

    let total: usize = sizes.iter().map(|&s| s as usize).sum();
    let mut out = vec![0u8; total];
    let mut pos = 0;
    for size in sizes {
        let size = size as usize;
        recv_chunked(link, &mut out[pos..pos + size])?;
        pos += size;
    }
    Ok(out)
}

// ── TCP links ──────────────────────────────────────────────────────

pub struct TcpSendLink {
    stream: TcpStream,
}

impl SendLink for TcpSendLink {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }
}

pub struct TcpRecvLink {
    stream: TcpStream,
}

impl RecvLink for TcpRecvLink {
    fn recv(&mut self, data: &mut [u8]) -> Result<()> {
        self.stream.read_exact(data)?;
        Ok(())
    }
}

fn duplex_from_stream(stream: TcpStream) -> Result<Duplex> {
    let read_half = stream.try_clone()?;
    Ok(Duplex {
        sender: Box::new(TcpSendLink { stream }),
        receiver: Box::new(TcpRecvLink { stream: read_half }),
    })
}

fn connect_with_retry(addr: &str) -> Result<TcpStream> {
    let mut last_err = None;
    for _ in 0..CONNECT_RETRIES {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                std::thread::sleep(CONNECT_RETRY_DELAY);
            }
        }
    }
    Err(EngineError::Transport(format!(
        "cannot connect to {addr}: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Establish the full duplex mesh over TCP. Every server listens on its own
/// address; each pair connects once, the higher id dialing the lower id and
/// announcing itself with an 8-byte id handshake.
pub fn connect_tcp(server_id: usize, hosts: &[String]) -> Result<Vec<Option<Duplex>>> {
    let server_num = hosts.len();
    if server_id >= server_num {
        return Err(EngineError::Topology(format!(
            "server id {server_id} out of range for {server_num} hosts"
        )));
    }

    let listener = TcpListener::bind(&hosts[server_id])?;
    let mut links: Vec<Option<Duplex>> = (0..server_num).map(|_| None).collect();

    for peer in 0..server_id {
        let mut stream = connect_with_retry(&hosts[peer])?;
        stream.write_all(&(server_id as u64).to_le_bytes())?;
        links[peer] = Some(duplex_from_stream(stream)?);
        info!(peer, "connected to lower-id server");
    }

    let mut remaining = server_num - 1 - server_id;
    while remaining > 0 {
        let (mut stream, _) = listener.accept()?;
        let mut id_bytes = [0u8; 8];
        stream.read_exact(&mut id_bytes)?;
        let peer = u64::from_le_bytes(id_bytes) as usize;
        if peer <= server_id || peer >= server_num {
            return Err(EngineError::Topology(format!(
                "unexpected handshake from server {peer}"
            )));
        }
        if links[peer].is_some() {
            return Err(EngineError::Topology(format!(
                "duplicate connection from server {peer}"
            )));
        }
        links[peer] = Some(duplex_from_stream(stream)?);
        info!(peer, "accepted higher-id server");
        remaining -= 1;
    }

    Ok(links)
}

// ── In-process links ───────────────────────────────────────────────

pub struct MemorySendLink {
    tx: Sender<Vec<u8>>,
}

impl SendLink for MemorySendLink {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| EngineError::Transport("peer receiver dropped".into()))
    }
}

pub struct MemoryRecvLink {
    rx: Receiver<Vec<u8>>,
}

impl RecvLink for MemoryRecvLink {
    fn recv(&mut self, data: &mut [u8]) -> Result<()> {
        let msg = self
            .rx
            .recv()
            .map_err(|_| EngineError::Transport("peer sender dropped".into()))?;
        if msg.len() != data.len() {
            return Err(EngineError::Transport(format!(
                "chunk size mismatch: expected {}, received {}",
                data.len(),
                msg.len()
            )));
        }
        data.copy_from_slice(&msg);
        Ok(())
    }
}

/// Build a full duplex mesh for `server_num` in-process servers. Row `i`
/// holds server `i`'s links, `None` at its own position.
pub fn memory_mesh(server_num: usize) -> Vec<Vec<Option<Duplex>>> {
    let mut rows: Vec<Vec<Option<Duplex>>> = (0..server_num)
        .map(|_| (0..server_num).map(|_| None).collect())
        .collect();

    for i in 0..server_num {
        for j in (i + 1)..server_num {
            let (tx_ij, rx_ij) = unbounded();
            let (tx_ji, rx_ji) = unbounded();
            rows[i][j] = Some(Duplex {
                sender: Box::new(MemorySendLink { tx: tx_ij }),
                receiver: Box::new(MemoryRecvLink { rx: rx_ji }),
            });
            rows[j][i] = Some(Duplex {
                sender: Box::new(MemorySendLink { tx: tx_ji }),
                receiver: Box::new(MemoryRecvLink { rx: rx_ij }),
            });
        }
    }
    rows
}
