//! Byte streams carrying operator messages.
//!
//! A [`WriteStream`] accumulates one outbound buffer. A [`ReadStream`]
//! replays a worker's list of received buffers as one logical sequence,
//! reading across buffer boundaries. All values are little-endian; strings
//! are length-prefixed (u64 length, then UTF-8 bytes).

use crate::graph::types::Gid;
use crate::property::types::{Date, DateTime};

#[derive(Debug, Default)]
pub struct WriteStream {
    buffer: Vec<u8>,
}

macro_rules! write_fn {
    ($($name:ident: $t:ty),* $(,)?) => {$(
        #[inline]
        pub fn $name(&mut self, value: $t) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    )*};
}

impl WriteStream {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    write_fn!(
        write_u8: u8,
        write_i8: i8,
        write_u32: u32,
        write_i32: i32,
        write_u64: u64,
        write_i64: i64,
        write_f64: f64,
    );

    #[inline]
    pub fn write_gid(&mut self, gid: Gid) {
        self.write_u64(gid);
    }

    #[inline]
    pub fn write_date(&mut self, date: Date) {
        self.write_i32(date.to_i32());
    }

    #[inline]
    pub fn write_datetime(&mut self, datetime: DateTime) {
        self.write_i64(datetime.to_i64());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.buffer.extend_from_slice(s.as_bytes());
    }
}

#[derive(Debug)]
pub struct ReadStream<'a> {
    buffers: &'a [Vec<u8>],
    idx: usize,
    offset: usize,
}

macro_rules! read_fn {
    ($($name:ident: $t:ty),* $(,)?) => {$(
        #[inline]
        pub fn $name(&mut self) -> Option<$t> {
            let mut bytes = [0u8; std::mem::size_of::<$t>()];
            self.read_exact(&mut bytes).then(|| <$t>::from_le_bytes(bytes))
        }
    )*};
}

impl<'a> ReadStream<'a> {
    pub fn new(buffers: &'a [Vec<u8>]) -> Self {
        let mut stream = Self {
            buffers,
            idx: 0,
            offset: 0,
        };
        stream.skip_empty();
        stream
    }

    /// True once every buffer is exhausted.
    pub fn is_empty(&self) -> bool {
        self.idx == self.buffers.len()
    }

    fn skip_empty(&mut self) {
        while self.idx < self.buffers.len() && self.offset == self.buffers[self.idx].len() {
            self.idx += 1;
            self.offset = 0;
        }
    }

    /// Fill `out` exactly, spanning buffer boundaries. Returns false when
    /// the stream ends first; the stream is then positioned at its end.
    fn read_exact(&mut self, out: &mut [u8]) -> bool {
        let mut written = 0;
        while written < out.len() {
            if self.idx == self.buffers.len() {
                return false;
            }
            let buffer = &self.buffers[self.idx];
            let take = (buffer.len() - self.offset).min(out.len() - written);
            out[written..written + take].copy_from_slice(&buffer[self.offset..self.offset + take]);
            self.offset += take;
            written += take;
            self.skip_empty();
        }
        true
    }

    read_fn!(
        read_u8: u8,
        read_i8: i8,
        read_u32: u32,
        read_i32: i32,
        read_u64: u64,
        read_i64: i64,
        read_f64: f64,
    );

    #[inline]
    pub fn read_gid(&mut self) -> Option<Gid> {
        self.read_u64()
    }

    #[inline]
    pub fn read_date(&mut self) -> Option<Date> {
        self.read_i32().map(Date)
    }

    #[inline]
    pub fn read_datetime(&mut self) -> Option<DateTime> {
        self.read_i64().map(DateTime)
    }

    pub fn read_string(&mut self) -> Option<String> {
        let length = self.read_u64()? as usize;
        let mut bytes = vec![0u8; length];
        if !self.read_exact(&mut bytes) {
            return None;
        }
        String::from_utf8(bytes).ok()
    }
}
