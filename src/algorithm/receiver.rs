use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::algorithm::delta::{Command, Opcode};
use crate::error::{DeltaError, Result};
use crate::job::stream::Stream;
use crate::job::{Codec, Step};
use crate::options::DELTA_MAGIC;
use crate::output::Stats;

/// Largest slice of the basis copied per step.
const COPY_CHUNK: usize = 64 * 1024;

/// Random-access reads from the basis during patching.
pub trait BasisRead {
    /// Total basis length in bytes.
    fn basis_len(&mut self) -> io::Result<u64>;

    /// Fills `buf` from `offset`; a short basis is an error.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> BasisRead for T {
    fn basis_len(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Command,
    Params(Opcode),
    Literal { remaining: u64 },
    Copy { offset: u64, remaining: u64 },
    /// END seen; only end of input may follow.
    Trailer,
}

/// Applies a delta stream to a basis, in command order.
pub struct Receiver<B> {
    basis: B,
    basis_len: Option<u64>,
    state: State,
    chunk: Vec<u8>,
}

impl<B: BasisRead> Receiver<B> {
    pub fn new(basis: B) -> Self {
        Self {
            basis,
            basis_len: None,
            state: State::Header,
            chunk: Vec::new(),
        }
    }

    pub fn into_basis(self) -> B {
        self.basis
    }

    fn basis_len(&mut self) -> Result<u64> {
        match self.basis_len {
            Some(len) => Ok(len),
            None => {
                let len = self.basis.basis_len()?;
                self.basis_len = Some(len);
                Ok(len)
            }
        }
    }

    fn begin(&mut self, command: Command, stats: &mut Stats) -> Result<State> {
        trace!("apply {:?}", command);
        match command {
            Command::End => Ok(State::Trailer),
            Command::Literal { len } => {
                stats.lit_cmds += 1;
                stats.lit_bytes += len;
                stats.lit_cmdbytes += command.size() as u64;
                Ok(State::Literal { remaining: len })
            }
            Command::Copy { offset, len } => {
                let basis_len = self.basis_len()?;
                let in_range = offset
                    .checked_add(len)
                    .map_or(false, |end| end <= basis_len);
                if !in_range {
                    return Err(DeltaError::Input(format!(
                        "copy of {} bytes at offset {} exceeds basis of {} bytes",
                        len, offset, basis_len
                    )));
                }
                stats.copy_cmds += 1;
                stats.copy_bytes += len;
                stats.copy_cmdbytes += command.size() as u64;
                Ok(State::Copy {
                    offset,
                    remaining: len,
                })
            }
        }
    }
}

impl<B: BasisRead> Codec for Receiver<B> {
    fn name(&self) -> &'static str {
        "patch"
    }

    fn step(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        match self.state {
            State::Header => {
                let magic = match stream.read_exact(4) {
                    Some(magic) => BigEndian::read_u32(&magic),
                    None if stream.at_eof() => {
                        return Err(DeltaError::Format("delta header truncated".to_string()));
                    }
                    None => return Ok(Step::NeedsInput),
                };
                if magic != DELTA_MAGIC {
                    return Err(DeltaError::Format(format!(
                        "bad delta magic {:#010x}",
                        magic
                    )));
                }
                self.state = State::Command;
            }
            State::Command => {
                let tag = match stream.read_exact(1) {
                    Some(tag) => tag[0],
                    None if stream.at_eof() => {
                        return Err(DeltaError::Input(
                            "delta ended without END command".to_string(),
                        ));
                    }
                    None => return Ok(Step::NeedsInput),
                };
                self.state = State::Params(Opcode::decode(tag)?);
            }
            State::Params(opcode) => {
                let params = match stream.read_exact(opcode.param_len()) {
                    Some(params) => params,
                    None if stream.at_eof() => {
                        return Err(DeltaError::Input(
                            "delta ended inside command parameters".to_string(),
                        ));
                    }
                    None => return Ok(Step::NeedsInput),
                };
                let command = opcode.command(&params)?;
                self.state = self.begin(command, stats)?;
            }
            State::Literal { remaining } => {
                let max = usize::try_from(remaining).unwrap_or(usize::MAX);
                let moved = stream.pass_through(max);
                if moved == 0 {
                    if stream.at_eof() {
                        return Err(DeltaError::Input(format!(
                            "delta ended with {} literal bytes missing",
                            remaining
                        )));
                    }
                    return Ok(Step::NeedsInput);
                }
                let remaining = remaining - moved as u64;
                self.state = if remaining == 0 {
                    State::Command
                } else {
                    State::Literal { remaining }
                };
            }
            State::Copy { offset, remaining } => {
                let len = remaining.min(COPY_CHUNK as u64) as usize;
                self.chunk.resize(len, 0);
                self.basis.read_at(offset, &mut self.chunk).map_err(|e| {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        DeltaError::Input(format!("basis ended before offset {}", offset + len as u64))
                    } else {
                        DeltaError::Io(e)
                    }
                })?;
                stream.write(&self.chunk);

                let remaining = remaining - len as u64;
                self.state = if remaining == 0 {
                    State::Command
                } else {
                    State::Copy {
                        offset: offset + len as u64,
                        remaining,
                    }
                };
            }
            State::Trailer => {
                if stream.buffered() > 0 {
                    return Err(DeltaError::Format(format!(
                        "{} trailing bytes after END command",
                        stream.buffered()
                    )));
                }
                if stream.is_exhausted() {
                    return Ok(Step::Done);
                }
                return Ok(Step::NeedsInput);
            }
        }
        Ok(Step::Continue)
    }
}
