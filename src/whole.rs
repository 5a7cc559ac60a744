//! One-call signature, delta and patch over readers and writers, and over
//! paths where `-` names stdin or stdout.

use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::algorithm::{BasisRead, Generator, MatchIndex, Receiver, Sender, Signature, SignatureLoader};
use crate::error::{DeltaError, JobFailure, JobResult, Result};
use crate::filesystem::{self, FileSink};
use crate::job::Job;
use crate::options::{recommended_block_len, BufferSizes, SignatureOptions};
use crate::output::{ProgressReader, Stats};

/// Writes the signature of `basis` to `sig`.
pub fn build_signature<R: Read, W: Write>(
    basis: &mut R,
    sig: &mut W,
    options: &SignatureOptions,
    sizes: BufferSizes,
) -> JobResult<Stats> {
    let generator = Generator::new(options).map_err(|e| before_start("signature", e))?;
    Job::new(generator).drive(Some(basis), Some(sig), sizes)
}

/// Reads a whole signature stream into memory.
pub fn load_signature<R: Read>(sig: &mut R, sizes: BufferSizes) -> JobResult<(Signature, Stats)> {
    let mut job = Job::new(SignatureLoader::new());
    let stats = job.drive(Some(sig), None, sizes)?;
    match job.into_codec().into_signature() {
        Some(signature) => Ok((signature, stats)),
        None => Err(JobFailure::new(
            DeltaError::Format("signature stream has no header".to_string()),
            stats,
        )),
    }
}

pub fn build_match_index(signature: Signature) -> Result<MatchIndex> {
    MatchIndex::build(signature)
}

/// Encodes `new` against an indexed signature, writing the delta to `delta`.
pub fn build_delta<R: Read, W: Write>(
    index: &MatchIndex,
    new: &mut R,
    delta: &mut W,
    sizes: BufferSizes,
) -> JobResult<Stats> {
    Job::new(Sender::new(index)).drive(Some(new), Some(delta), sizes)
}

/// Applies `delta` to `basis`, writing the reconstructed file to `out`.
pub fn apply_patch<B: BasisRead, R: Read, W: Write>(
    basis: B,
    delta: &mut R,
    out: &mut W,
    sizes: BufferSizes,
) -> JobResult<Stats> {
    Job::new(Receiver::new(basis)).drive(Some(delta), Some(out), sizes)
}

fn before_start(op: &'static str, error: DeltaError) -> JobFailure {
    JobFailure::new(error, Stats::new(op))
}

/// How the file-level operations treat their inputs and outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOptions {
    /// Overrides the per-operation buffer defaults.
    pub buffers: Option<BufferSizes>,
    /// Replace existing output files.
    pub force: bool,
    /// Draw a progress bar over the main input.
    pub progress: bool,
}

impl FileOptions {
    fn sizes(&self, defaults: BufferSizes) -> BufferSizes {
        self.buffers.unwrap_or(defaults)
    }
}

fn open_input(path: &Path, label: &str, options: &FileOptions) -> Result<ProgressReader<filesystem::FileSource>> {
    let source = filesystem::open_source(path)?;
    let total = filesystem::regular_file_size(path);
    Ok(ProgressReader::new(source, total, label, options.progress))
}

fn commit(sink: FileSink, stats: Stats) -> JobResult<Stats> {
    match sink.commit() {
        Ok(()) => Ok(stats),
        Err(e) => Err(JobFailure::new(e, stats)),
    }
}

/// Block length for signing the file at `basis_path` when none is given.
pub fn auto_block_len(basis_path: &Path) -> Option<u32> {
    filesystem::regular_file_size(basis_path).map(recommended_block_len)
}

pub fn sig_file(
    basis_path: &Path,
    sig_path: &Path,
    sig_options: &SignatureOptions,
    options: &FileOptions,
) -> JobResult<Stats> {
    let generator = Generator::new(sig_options).map_err(|e| before_start("signature", e))?;
    if let Some(size) = filesystem::regular_file_size(basis_path) {
        generator.check_basis_size(size);
    }

    let mut basis = open_input(basis_path, "signature", options).map_err(|e| before_start("signature", e))?;
    let mut sink = filesystem::open_sink(sig_path, options.force).map_err(|e| before_start("signature", e))?;

    debug!(
        "signature of {} with {}-byte blocks",
        basis_path.display(),
        generator.block_len()
    );
    let stats = Job::new(generator).drive(
        Some(&mut basis),
        Some(&mut sink),
        options.sizes(BufferSizes::for_signature()),
    )?;
    basis.finish();
    commit(sink, stats)
}

pub fn load_sig_file(sig_path: &Path, options: &FileOptions) -> JobResult<(Signature, Stats)> {
    let mut sig = filesystem::open_source(sig_path).map_err(|e| before_start("loadsig", e))?;
    load_signature(&mut sig, options.sizes(BufferSizes::for_load_signature()))
}

pub fn delta_file(
    sig_path: &Path,
    new_path: &Path,
    delta_path: &Path,
    options: &FileOptions,
) -> JobResult<Stats> {
    let (signature, sig_stats) = load_sig_file(sig_path, options)?;
    debug!("{}", sig_stats);
    let index = build_match_index(signature).map_err(|e| JobFailure::new(e, sig_stats))?;

    let mut new = open_input(new_path, "delta", options).map_err(|e| before_start("delta", e))?;
    let mut sink = filesystem::open_sink(delta_path, options.force).map_err(|e| before_start("delta", e))?;

    let stats = build_delta(&index, &mut new, &mut sink, options.sizes(BufferSizes::for_delta()))?;
    new.finish();
    commit(sink, stats)
}

pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    new_path: &Path,
    options: &FileOptions,
) -> JobResult<Stats> {
    let basis = filesystem::open_basis(basis_path).map_err(|e| before_start("patch", e))?;
    let mut delta = open_input(delta_path, "patch", options).map_err(|e| before_start("patch", e))?;
    let mut sink = filesystem::open_sink(new_path, options.force).map_err(|e| before_start("patch", e))?;

    let stats = apply_patch(basis, &mut delta, &mut sink, options.sizes(BufferSizes::for_patch()))?;
    delta.finish();
    commit(sink, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SignatureFormat;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn round_trip(basis: &[u8], new: &[u8], options: &SignatureOptions, sizes: BufferSizes) -> Vec<u8> {
        let mut sig = Vec::new();
        build_signature(&mut &basis[..], &mut sig, options, sizes).unwrap();

        let (signature, _) = load_signature(&mut &sig[..], sizes).unwrap();
        let index = build_match_index(signature).unwrap();

        let mut delta = Vec::new();
        build_delta(&index, &mut &new[..], &mut delta, sizes).unwrap();

        let mut out = Vec::new();
        apply_patch(Cursor::new(basis), &mut &delta[..], &mut out, sizes).unwrap();
        out
    }

    #[test]
    fn test_round_trip_each_format() {
        let basis: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 256) as u8).collect();
        let mut new = basis.clone();
        new.drain(1000..1100);
        new.splice(3000..3000, b"fresh bytes".iter().cloned());

        for format in [
            SignatureFormat::Md4,
            SignatureFormat::Blake2,
            SignatureFormat::RabinKarpMd4,
            SignatureFormat::RabinKarpBlake2,
        ] {
            let options = SignatureOptions {
                format,
                block_len: 64,
                strong_len: 8,
            };
            assert_eq!(round_trip(&basis, &new, &options, BufferSizes::default()), new);
        }
    }

    #[test]
    fn test_identity_delta_is_all_copy() -> Result<()> {
        let basis = vec![7u8; 10_000];
        let options = SignatureOptions {
            block_len: 100,
            ..SignatureOptions::default()
        };

        let mut sig = Vec::new();
        build_signature(&mut &basis[..], &mut sig, &options, BufferSizes::default())?;
        let (signature, load_stats) = load_signature(&mut &sig[..], BufferSizes::default())?;
        assert_eq!(load_stats.sig_blocks, 100);

        let index = build_match_index(signature)?;
        let mut delta = Vec::new();
        let stats = build_delta(&index, &mut &basis[..], &mut delta, BufferSizes::default())?;

        assert_eq!(stats.lit_bytes, 0);
        assert_eq!(stats.matched_bytes(), basis.len() as u64);
        Ok(())
    }

    #[test]
    fn test_empty_inputs() {
        let options = SignatureOptions::default();
        assert!(round_trip(b"", b"", &options, BufferSizes::default()).is_empty());
        assert_eq!(round_trip(b"", b"new", &options, BufferSizes::default()), b"new");
        assert!(round_trip(b"basis", b"", &options, BufferSizes::default()).is_empty());
    }

    #[test]
    fn test_load_signature_reports_truncation() {
        let mut sig = Vec::new();
        let options = SignatureOptions {
            block_len: 4,
            ..SignatureOptions::default()
        };
        build_signature(&mut &b"0123456789"[..], &mut sig, &options, BufferSizes::default()).unwrap();
        sig.truncate(sig.len() - 1);

        let failure = load_signature(&mut &sig[..], BufferSizes::default()).unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Format);
        assert_eq!(failure.stats.sig_blocks, 2);
    }

    #[test]
    fn test_bad_options_fail_before_start() {
        let options = SignatureOptions {
            block_len: 0,
            ..SignatureOptions::default()
        };
        let failure = build_signature(&mut &b"x"[..], &mut Vec::<u8>::new(), &options, BufferSizes::default())
            .unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Param);
        assert_eq!(failure.stats.in_bytes, 0);
    }

    #[test]
    fn test_file_operations() -> Result<()> {
        let dir = TempDir::new()?;
        let basis = dir.path().join("basis");
        let new = dir.path().join("new");
        let sig = dir.path().join("basis.sig");
        let delta = dir.path().join("new.delta");
        let out = dir.path().join("out");

        let basis_data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut new_data = basis_data.clone();
        new_data.splice(500..600, vec![0xee; 37]);
        fs::write(&basis, &basis_data)?;
        fs::write(&new, &new_data)?;

        let options = FileOptions::default();
        let sig_options = SignatureOptions {
            block_len: 512,
            ..SignatureOptions::default()
        };

        let stats = sig_file(&basis, &sig, &sig_options, &options)?;
        assert_eq!(stats.sig_blocks, 40);
        let stats = delta_file(&sig, &new, &delta, &options)?;
        assert!(stats.copy_bytes > 0);
        let stats = patch_file(&basis, &delta, &out, &options)?;
        assert_eq!(stats.out_bytes, new_data.len() as u64);

        assert_eq!(fs::read(&out)?, new_data);
        Ok(())
    }

    #[test]
    fn test_failed_patch_leaves_no_output() -> Result<()> {
        let dir = TempDir::new()?;
        let basis = dir.path().join("basis");
        let delta = dir.path().join("delta");
        let out = dir.path().join("out");
        fs::write(&basis, b"tiny")?;

        let mut bytes = crate::options::DELTA_MAGIC.to_be_bytes().to_vec();
        bytes.extend(crate::algorithm::Command::copy(0, 100).encode());
        bytes.extend(crate::algorithm::Command::End.encode());
        fs::write(&delta, &bytes)?;

        let failure = patch_file(&basis, &delta, &out, &FileOptions::default()).unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Input);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_existing_output_needs_force() -> Result<()> {
        let dir = TempDir::new()?;
        let basis = dir.path().join("basis");
        let sig = dir.path().join("sig");
        fs::write(&basis, b"contents")?;
        fs::write(&sig, b"keep me")?;

        let failure = sig_file(&basis, &sig, &SignatureOptions::default(), &FileOptions::default())
            .unwrap_err();
        assert_eq!(failure.kind(), crate::error::ErrorKind::Param);
        assert_eq!(fs::read(&sig)?, b"keep me");

        let force = FileOptions {
            force: true,
            ..FileOptions::default()
        };
        sig_file(&basis, &sig, &SignatureOptions::default(), &force)?;
        assert_ne!(fs::read(&sig)?, b"keep me");
        Ok(())
    }

    #[test]
    fn test_auto_block_len() -> Result<()> {
        let dir = TempDir::new()?;
        let small = dir.path().join("small");
        fs::write(&small, b"abc")?;
        assert_eq!(auto_block_len(&small), Some(crate::options::DEFAULT_BLOCK_LEN));
        assert_eq!(auto_block_len(Path::new("-")), None);
        Ok(())
    }
}
