/// Bounded view over the bytes a caller offers to a job.
#[derive(Debug)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    eof: bool,
}

impl<'a> ReadCursor<'a> {
    /// `eof` says no bytes will follow the ones in `buf`.
    pub fn new(buf: &'a [u8], eof: bool) -> Self {
        Self { buf, pos: 0, eof }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Takes up to `max` bytes off the front.
    pub fn take(&mut self, max: usize) -> &'a [u8] {
        let n = max.min(self.available());
        let taken = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        taken
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// True once the source has ended and every offered byte is taken.
    pub fn is_exhausted(&self) -> bool {
        self.eof && self.available() == 0
    }
}

/// Bounded view over the space a caller offers for output.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn space(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn written(&self) -> usize {
        self.pos
    }

    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    /// Copies as much of `data` as fits and returns how much that was.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.space());
        self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
        self.pos += n;
        n
    }
}
