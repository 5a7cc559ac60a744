//! Streaming rsync-style signatures, deltas and patches.
//!
//! A basis file is summarised as a [`Signature`] of per-block checksums.
//! The delta encoder slides a window over a new file, looks each window up
//! in a [`MatchIndex`] built from the signature, and emits COPY and LITERAL
//! commands. The patch decoder replays those commands against the basis.
//! Every pipeline runs inside a [`Job`], which works with input and output
//! buffers of any size, down to a single byte.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod job;
pub mod options;
pub mod output;
pub mod whole;

pub use algorithm::{BasisRead, Command, MatchIndex, Signature};
pub use error::{DeltaError, ErrorKind, JobFailure, JobResult, Result};
pub use job::{ByteSink, ByteSource, Codec, Job, JobStatus, Progress};
pub use options::{BufferSizes, ChecksumAlgorithm, RollingAlgorithm, SignatureFormat, SignatureOptions};
pub use output::Stats;
pub use whole::{
    apply_patch, build_delta, build_match_index, build_signature, delta_file, load_sig_file,
    load_signature, patch_file, sig_file, FileOptions,
};
