//! Resumable, single-threaded driver shared by every pipeline.
//!
//! A [`Job`] wraps one codec (signature writer, signature loader, delta
//! encoder or patch decoder). [`Job::iter`] runs the codec against whatever
//! input and output space the caller offers and returns at the first point
//! where it needs more of either. [`Job::drive`] is the blocking loop built
//! on top of it for callers that have a [`ByteSource`] and a [`ByteSink`].

pub mod buffer;
pub mod stream;

use std::io::{self, Read, Write};
use std::time::Instant;

use log::debug;

use crate::error::{DeltaError, JobFailure, JobResult, Result};
use crate::options::BufferSizes;
use crate::output::Stats;
use buffer::{ReadCursor, WriteCursor};
use stream::{Stream, Tube};

/// Outcome of one codec step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Progress was made; call again.
    Continue,
    /// Nothing more can happen until more input arrives.
    NeedsInput,
    /// The codec has produced its last byte.
    Done,
}

/// A pluggable step function driven by a [`Job`].
pub trait Codec {
    fn name(&self) -> &'static str;

    /// Consumes some input and/or queues some output.
    ///
    /// Implementations must not depend on how the input is split across
    /// calls: the same bytes must yield the same output whatever the
    /// buffer sizes.
    fn step(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step>;
}

/// Why [`Job::iter`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    NeedsMoreInput,
    BlockedOnOutputSpace,
    Done,
}

/// Result of one [`Job::iter`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub consumed: usize,
    pub produced: usize,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Filling,
    Running,
    Draining,
    Done,
    Error,
}

/// Pulls bytes into the job's input buffer.
pub trait ByteSource {
    /// Returns 0 at end of input.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Read> ByteSource for R {
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Receives bytes from the job's output buffer.
pub trait ByteSink {
    /// May accept fewer bytes than offered.
    fn drain(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> ByteSink for W {
    fn drain(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// One run of a single pipeline.
pub struct Job<C> {
    codec: C,
    scoop: Vec<u8>,
    tube: Tube,
    stats: Stats,
    state: JobState,
    codec_done: bool,
    started: Instant,
}

impl<C: Codec> Job<C> {
    pub fn new(codec: C) -> Self {
        let stats = Stats::new(codec.name());
        debug!("{}: job started", codec.name());
        Self {
            codec,
            scoop: Vec::new(),
            tube: Tube::default(),
            stats,
            state: JobState::Running,
            codec_done: false,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn into_codec(self) -> C {
        self.codec
    }

    /// Runs the codec against `input` and `output` until it finishes or
    /// needs more of one of them.
    ///
    /// `eof` tells the job that no input follows `input`. Unconsumed input
    /// must be offered again on the next call.
    pub fn iter(&mut self, input: &[u8], eof: bool, output: &mut [u8]) -> Result<Progress> {
        match self.state {
            JobState::Done => {
                return Ok(Progress {
                    consumed: 0,
                    produced: 0,
                    status: JobStatus::Done,
                })
            }
            JobState::Error => {
                return Err(DeltaError::Param("job already failed".to_string()));
            }
            _ => {}
        }

        let mut out = WriteCursor::new(output);
        let mut stream = Stream::new(ReadCursor::new(input, eof), &mut self.scoop, &mut self.tube);

        let outcome = loop {
            stream.flush(&mut out);
            if stream.has_pending_output() {
                break Ok(JobStatus::BlockedOnOutputSpace);
            }
            if self.codec_done {
                break Ok(JobStatus::Done);
            }

            match self.codec.step(&mut stream, &mut self.stats) {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => self.codec_done = true,
                Ok(Step::NeedsInput) => {
                    stream.flush(&mut out);
                    if stream.has_pending_output() {
                        break Ok(JobStatus::BlockedOnOutputSpace);
                    }
                    if stream.at_eof() {
                        break Err(DeltaError::Input(format!(
                            "{}: unexpected end of input",
                            self.codec.name()
                        )));
                    }
                    break Ok(JobStatus::NeedsMoreInput);
                }
                Err(e) => break Err(e),
            }
        };

        let consumed = stream.consumed();
        let produced = out.written();
        self.stats.in_bytes += consumed as u64;
        self.stats.out_bytes += produced as u64;
        self.stats.elapsed = self.started.elapsed();

        match outcome {
            Ok(status) => {
                if status == JobStatus::Done {
                    self.state = JobState::Done;
                    debug!("{}: job finished: {}", self.codec.name(), self.stats);
                }
                Ok(Progress {
                    consumed,
                    produced,
                    status,
                })
            }
            Err(e) => {
                self.state = JobState::Error;
                debug!("{}: job failed: {}", self.codec.name(), e);
                Err(e)
            }
        }
    }

    /// Pumps bytes from `source` through the codec into `sink` until the
    /// job completes or fails.
    ///
    /// A missing source behaves as empty input; output produced without a
    /// sink is discarded. Bytes already drained stay drained on failure.
    pub fn drive(
        &mut self,
        mut source: Option<&mut dyn ByteSource>,
        mut sink: Option<&mut dyn ByteSink>,
        sizes: BufferSizes,
    ) -> JobResult<Stats> {
        if let Err(e) = sizes.validate() {
            return Err(self.fail(e));
        }

        let mut inbuf = vec![0u8; sizes.input];
        let mut in_start = 0;
        let mut in_end = 0;
        let mut eof = source.is_none();

        let mut outbuf = vec![0u8; sizes.output];
        let mut out_len = 0;

        loop {
            // Filling
            if !eof && in_start == in_end {
                self.state = JobState::Filling;
                in_start = 0;
                in_end = 0;
                if let Some(src) = source.as_mut() {
                    match src.fill(&mut inbuf) {
                        Ok(0) => eof = true,
                        Ok(n) => in_end = n,
                        Err(e) => return Err(self.fail(e.into())),
                    }
                }
            }

            // Running
            self.state = JobState::Running;
            let progress = match self.iter(&inbuf[in_start..in_end], eof, &mut outbuf[out_len..]) {
                Ok(progress) => progress,
                Err(e) => return Err(self.failure(e)),
            };
            in_start += progress.consumed;
            out_len += progress.produced;

            // Draining
            let finished = progress.status == JobStatus::Done;
            if out_len == outbuf.len() || (finished && out_len > 0) {
                self.state = JobState::Draining;
                if let Some(snk) = sink.as_mut() {
                    if let Err(e) = drain_all(&mut **snk, &outbuf[..out_len]) {
                        return Err(self.fail(e.into()));
                    }
                }
                out_len = 0;
            }

            if finished {
                if let Some(snk) = sink.as_mut() {
                    if let Err(e) = snk.finish() {
                        return Err(self.fail(e.into()));
                    }
                }
                self.state = JobState::Done;
                return Ok(self.stats.clone());
            }

            if progress.status == JobStatus::NeedsMoreInput && in_start < in_end {
                // The codec stalled with input still on offer.
                return Err(self.fail(DeltaError::Input(format!(
                    "{}: stalled with {} unconsumed bytes",
                    self.codec.name(),
                    in_end - in_start
                ))));
            }
        }
    }

    fn fail(&mut self, error: DeltaError) -> JobFailure {
        self.state = JobState::Error;
        debug!("{}: job failed: {}", self.codec.name(), error);
        self.failure(error)
    }

    fn failure(&self, error: DeltaError) -> JobFailure {
        JobFailure::new(error, self.stats.clone())
    }
}

fn drain_all(sink: &mut dyn ByteSink, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match sink.drain(data)? {
            0 => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                ))
            }
            n => data = &data[n..],
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upper-cases its input, one byte per step.
    struct Shout;

    impl Codec for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn step(&mut self, stream: &mut Stream<'_>, _stats: &mut Stats) -> Result<Step> {
            match stream.read_block(1) {
                Some(byte) if byte.is_empty() => Ok(Step::Done),
                Some(byte) => {
                    stream.write(&byte.to_ascii_uppercase());
                    Ok(Step::Continue)
                }
                None => Ok(Step::NeedsInput),
            }
        }
    }

    /// Wants a 4-byte header and nothing else.
    struct Header;

    impl Codec for Header {
        fn name(&self) -> &'static str {
            "header"
        }

        fn step(&mut self, stream: &mut Stream<'_>, _stats: &mut Stats) -> Result<Step> {
            match stream.read_exact(4) {
                Some(_) => Ok(Step::Done),
                None => Ok(Step::NeedsInput),
            }
        }
    }

    #[test]
    fn test_iter_reports_blocked_on_output() -> Result<()> {
        let mut job = Job::new(Shout);
        let mut out = [0u8; 2];

        let progress = job.iter(b"abcd", true, &mut out)?;
        assert_eq!(progress.status, JobStatus::BlockedOnOutputSpace);
        assert_eq!(progress.produced, 2);
        assert_eq!(&out, b"AB");

        // "C" was queued before the first call ran out of room.
        let progress = job.iter(&b"abcd"[progress.consumed..], true, &mut out)?;
        assert_eq!(progress.status, JobStatus::Done);
        assert_eq!(&out, b"CD");

        Ok(())
    }

    #[test]
    fn test_iter_needs_more_input() -> Result<()> {
        let mut job = Job::new(Header);
        let mut out = [0u8; 1];

        let progress = job.iter(b"ab", false, &mut out)?;
        assert_eq!(progress.status, JobStatus::NeedsMoreInput);
        assert_eq!(progress.consumed, 2);

        let progress = job.iter(b"cd", false, &mut out)?;
        assert_eq!(progress.status, JobStatus::Done);
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.stats().in_bytes, 4);

        Ok(())
    }

    #[test]
    fn test_iter_truncated_input_is_input_error() {
        let mut job = Job::new(Header);
        let mut out = [0u8; 1];

        let err = job.iter(b"ab", true, &mut out).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
        assert_eq!(job.state(), JobState::Error);
        assert!(job.iter(b"", true, &mut out).is_err());
    }

    #[test]
    fn test_drive_with_tiny_buffers() {
        let mut input: &[u8] = b"hello, world";
        let mut output = Vec::new();

        let mut job = Job::new(Shout);
        let stats = job
            .drive(Some(&mut input), Some(&mut output), BufferSizes::new(1, 1))
            .unwrap();

        assert_eq!(output, b"HELLO, WORLD");
        assert_eq!(stats.in_bytes, 12);
        assert_eq!(stats.out_bytes, 12);
    }

    #[test]
    fn test_drive_without_source_sees_empty_input() {
        let mut output = Vec::new();
        let mut job = Job::new(Shout);
        let stats = job.drive(None, Some(&mut output), BufferSizes::default()).unwrap();
        assert!(output.is_empty());
        assert_eq!(stats.in_bytes, 0);
    }

    #[test]
    fn test_drive_failure_keeps_stats() {
        let mut input: &[u8] = b"xy";
        let mut job = Job::new(Header);
        let failure = job.drive(Some(&mut input), None, BufferSizes::default()).unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Input);
        assert_eq!(failure.stats.in_bytes, 2);
    }

    #[test]
    fn test_drive_rejects_zero_buffers() {
        let mut job = Job::new(Shout);
        let failure = job.drive(None, None, BufferSizes::new(0, 0)).unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Param);
    }
}
