use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{DeltaError, Result};

/// Path that stands for standard input or standard output.
pub const STDIO_PATH: &str = "-";

pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

/// Size of a regular file, or `None` for stdin and anything else.
pub fn regular_file_size(path: &Path) -> Option<u64> {
    if is_stdio(path) {
        return None;
    }
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

fn with_path(err: io::Error, path: &Path) -> DeltaError {
    DeltaError::Io(io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}

/// Input read from a named file or from stdin.
pub enum FileSource {
    Stdin(io::Stdin),
    File(File),
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::Stdin(stdin) => stdin.read(buf),
            FileSource::File(file) => file.read(buf),
        }
    }
}

pub fn open_source(path: &Path) -> Result<FileSource> {
    if is_stdio(path) {
        return Ok(FileSource::Stdin(io::stdin()));
    }
    let file = File::open(path).map_err(|e| with_path(e, path))?;
    Ok(FileSource::File(file))
}

/// Opens the basis of a patch, which is read by offset.
pub fn open_basis(path: &Path) -> Result<File> {
    if is_stdio(path) {
        return Err(DeltaError::Param(
            "basis must be a seekable file, not standard input".to_string(),
        ));
    }
    File::open(path).map_err(|e| with_path(e, path))
}

/// Output written to stdout, or to a temporary file renamed over the
/// destination by [`FileSink::commit`].
///
/// Dropping an uncommitted file sink removes the temporary file, so a
/// failed job never leaves a partial output at the destination.
pub enum FileSink {
    Stdout(io::Stdout),
    Atomic {
        temp: NamedTempFile,
        dest: PathBuf,
        force: bool,
    },
}

impl FileSink {
    pub fn commit(self) -> Result<()> {
        match self {
            FileSink::Stdout(mut stdout) => stdout.flush()?,
            FileSink::Atomic {
                mut temp,
                dest,
                force,
            } => {
                temp.flush()?;
                let persisted = if force {
                    temp.persist(&dest)
                } else {
                    temp.persist_noclobber(&dest)
                };
                persisted.map_err(|e| with_path(e.error, &dest))?;
                debug!("wrote {}", dest.display());
            }
        }
        Ok(())
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Stdout(stdout) => stdout.write(buf),
            FileSink::Atomic { temp, .. } => temp.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Stdout(stdout) => stdout.flush(),
            FileSink::Atomic { temp, .. } => temp.flush(),
        }
    }
}

/// Opens an output; an existing file is refused unless `force` is set.
pub fn open_sink(path: &Path, force: bool) -> Result<FileSink> {
    if is_stdio(path) {
        return Ok(FileSink::Stdout(io::stdout()));
    }
    if !force && path.exists() {
        return Err(DeltaError::Param(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir).map_err(|e| with_path(e, dir))?;
    debug!("staging {} in {}", path.display(), temp.path().display());

    Ok(FileSink::Atomic {
        temp,
        dest: path.to_path_buf(),
        force,
    })
}
