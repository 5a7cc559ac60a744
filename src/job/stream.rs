use std::mem;

use crate::job::buffer::{ReadCursor, WriteCursor};

/// Output a codec has produced but the caller has not yet taken.
#[derive(Debug, Default)]
pub struct Tube {
    buf: Vec<u8>,
    pos: usize,
}

impl Tube {
    pub fn write(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn pending(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Moves queued bytes into `out` until one of them runs dry.
    pub fn flush(&mut self, out: &mut WriteCursor<'_>) -> usize {
        let n = out.put(&self.buf[self.pos..]);
        self.pos += n;
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        n
    }
}

/// What a codec sees during one job iteration.
///
/// Reads come from the scoop first, then from the caller's input. Fixed-size
/// fields that straddle two iterations are collected in the scoop, so codecs
/// never observe how the input happened to be split.
pub struct Stream<'s> {
    input: ReadCursor<'s>,
    scoop: &'s mut Vec<u8>,
    tube: &'s mut Tube,
}

impl<'s> Stream<'s> {
    pub fn new(input: ReadCursor<'s>, scoop: &'s mut Vec<u8>, tube: &'s mut Tube) -> Self {
        Self { input, scoop, tube }
    }

    /// Returns exactly `n` bytes once they are all available.
    pub fn read_exact(&mut self, n: usize) -> Option<Vec<u8>> {
        if self.scoop.is_empty() && self.input.available() >= n {
            return Some(self.input.take(n).to_vec());
        }

        if self.scoop.len() < n {
            let needed = n - self.scoop.len();
            self.scoop.extend_from_slice(self.input.take(needed));
        }

        if self.scoop.len() >= n {
            Some(self.scoop.drain(..n).collect())
        } else {
            None
        }
    }

    /// Like `read_exact`, but at end of input hands back whatever is left,
    /// possibly nothing.
    pub fn read_block(&mut self, n: usize) -> Option<Vec<u8>> {
        match self.read_exact(n) {
            Some(block) => Some(block),
            None if self.input.is_exhausted() => Some(mem::take(self.scoop)),
            None => None,
        }
    }

    /// Appends up to `max` input bytes to `dst`.
    pub fn pull_into(&mut self, dst: &mut Vec<u8>, max: usize) -> usize {
        let from_scoop = max.min(self.scoop.len());
        dst.extend(self.scoop.drain(..from_scoop));

        let from_input = self.input.take(max - from_scoop);
        dst.extend_from_slice(from_input);

        from_scoop + from_input.len()
    }

    /// Copies up to `max` input bytes straight to the output queue.
    pub fn pass_through(&mut self, max: usize) -> usize {
        let from_scoop = max.min(self.scoop.len());
        self.tube.write(&self.scoop[..from_scoop]);
        self.scoop.drain(..from_scoop);

        let from_input = self.input.take(max - from_scoop);
        self.tube.write(from_input);

        from_scoop + from_input.len()
    }

    pub fn write(&mut self, data: &[u8]) {
        self.tube.write(data);
    }

    pub fn has_pending_output(&self) -> bool {
        !self.tube.is_empty()
    }

    pub fn flush(&mut self, out: &mut WriteCursor<'_>) -> usize {
        self.tube.flush(out)
    }

    /// Bytes buffered here or still offered by the caller.
    pub fn buffered(&self) -> usize {
        self.scoop.len() + self.input.available()
    }

    /// No more input will ever arrive, though the scoop may hold a
    /// partial field.
    pub fn at_eof(&self) -> bool {
        self.input.is_exhausted()
    }

    /// End of input with nothing left over.
    pub fn is_exhausted(&self) -> bool {
        self.input.is_exhausted() && self.scoop.is_empty()
    }

    /// Caller bytes taken so far in this iteration.
    pub fn consumed(&self) -> usize {
        self.input.consumed()
    }
}
