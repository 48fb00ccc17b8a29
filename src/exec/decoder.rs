// src/exec/decoder.rs

//! Incremental line splitting for process pipes.
//!
//! Bytes arrive in arbitrary chunks. Complete lines are decoded as they are
//! seen; an unterminated tail is kept until the next chunk or until
//! [`LineDecoder::finish`] at end of stream. Invalid UTF-8 is replaced,
//! never fatal.

/// Splits a byte stream into lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(take_line(&mut self.pending));
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Flush the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(take_line(&mut self.pending))
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    line
}
