//! Per-connection outbound buffer.
//!
//! Holds bytes read from a connection's peer that the socket has not yet
//! accepted. Writes never drop data: whatever the socket refuses stays queued
//! in order until the next writable event.

use std::io::{self, Write};

/// Outcome of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Everything queued has been written.
    Drained,
    /// The socket would block with bytes still queued.
    Blocked,
}

#[derive(Debug, Default)]
pub struct OutboundBuffer {
    data: Vec<u8>,
    /// Start of the unsent region.
    pos: usize,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.pos == self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Unsent bytes.
    #[cfg(test)]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write as much as the writer accepts. Returns bytes written alongside the outcome.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> io::Result<(usize, Flush)> {
        let mut written = 0;
        while self.pos < self.data.len() {
            match writer.write(&self.data[self.pos..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer accepted zero bytes",
                    ))
                }
                Ok(n) => {
                    self.pos += n;
                    written += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.compact();
                    return Ok((written, Flush::Blocked));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.data.clear();
        self.pos = 0;
        Ok((written, Flush::Drained))
    }

    /// Move all unsent bytes out, leaving this buffer empty.
    pub fn take(&mut self) -> OutboundBuffer {
        self.compact();
        std::mem::take(self)
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
    }
}
