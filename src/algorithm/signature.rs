use byteorder::{BigEndian, ByteOrder};
use log::{trace, warn};

use crate::algorithm::checksum::{compute_strong_checksum, compute_weak_checksum, StrongChecksum};
use crate::error::{DeltaError, Result};
use crate::job::stream::Stream;
use crate::job::{Codec, Step};
use crate::options::{minimum_strong_len, SignatureFormat, SignatureOptions};
use crate::output::Stats;

/// Magic, block length and strong length, 4 bytes each.
pub const HEADER_LEN: usize = 12;

/// Weak and strong checksum pair for one basis block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChecksum {
    /// Position of the block in the basis.
    pub index: u32,
    pub weak: u32,
    pub strong: StrongChecksum,
}

/// Per-block checksums describing a basis file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    format: SignatureFormat,
    block_len: u32,
    strong_len: usize,
    blocks: Vec<BlockChecksum>,
}

impl Signature {
    pub fn new(format: SignatureFormat, block_len: u32, strong_len: usize) -> Self {
        Self {
            format,
            block_len,
            strong_len,
            blocks: Vec::new(),
        }
    }

    pub fn format(&self) -> SignatureFormat {
        self.format
    }

    pub fn block_len(&self) -> u32 {
        self.block_len
    }

    pub fn strong_len(&self) -> usize {
        self.strong_len
    }

    pub fn blocks(&self) -> &[BlockChecksum] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Appends the next block's sums.
    pub fn push(&mut self, weak: u32, strong: StrongChecksum) -> Result<()> {
        let index = u32::try_from(self.blocks.len())
            .map_err(|_| DeltaError::OutOfMemory("signature exceeds u32 blocks".to_string()))?;
        self.blocks.try_reserve(1)?;
        self.blocks.push(BlockChecksum { index, weak, strong });
        Ok(())
    }

    /// Sums for `data` computed the way this signature computes them.
    pub fn weak_sum(&self, data: &[u8]) -> u32 {
        compute_weak_checksum(data, self.format.rolling())
    }

    pub fn strong_sum(&self, data: &[u8]) -> StrongChecksum {
        compute_strong_checksum(data, self.format.strong(), self.strong_len)
    }

    /// Serialized size of the signature.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.blocks.len() * (4 + self.strong_len)
    }
}

fn encode_header(format: SignatureFormat, block_len: u32, strong_len: usize) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    BigEndian::write_u32(&mut header[0..4], format.magic());
    BigEndian::write_u32(&mut header[4..8], block_len);
    BigEndian::write_u32(&mut header[8..12], strong_len as u32);
    header
}

/// Streams a basis file block by block into a signature.
pub struct Generator {
    format: SignatureFormat,
    block_len: u32,
    strong_len: usize,
    header_written: bool,
}

impl Generator {
    pub fn new(options: &SignatureOptions) -> Result<Self> {
        options.validate()?;
        let strong_len = options.resolved_strong_len()?;
        if strong_len < 4 {
            warn!("strong sum length {} makes false matches likely", strong_len);
        }
        Ok(Self {
            format: options.format,
            block_len: options.block_len,
            strong_len,
            header_written: false,
        })
    }

    /// Warns when the strong length is weak for a basis of this size.
    pub fn check_basis_size(&self, basis_size: u64) {
        let minimum = minimum_strong_len(basis_size, self.block_len);
        if self.strong_len < minimum {
            warn!(
                "strong sum length {} is below the {} bytes recommended for a {}-byte basis",
                self.strong_len, minimum, basis_size
            );
        }
    }

    pub fn block_len(&self) -> u32 {
        self.block_len
    }
}

impl Codec for Generator {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn step(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        if !self.header_written {
            stream.write(&encode_header(self.format, self.block_len, self.strong_len));
            stats.block_len = self.block_len;
            self.header_written = true;
            return Ok(Step::Continue);
        }

        let block = match stream.read_block(self.block_len as usize) {
            Some(block) => block,
            None => return Ok(Step::NeedsInput),
        };
        if block.is_empty() {
            return Ok(Step::Done);
        }

        let weak = compute_weak_checksum(&block, self.format.rolling());
        let strong = compute_strong_checksum(&block, self.format.strong(), self.strong_len);
        trace!("block {}: weak={:#010x} strong={:?}", stats.sig_blocks, weak, strong);

        let mut record = [0u8; 4];
        BigEndian::write_u32(&mut record, weak);
        stream.write(&record);
        stream.write(strong.as_bytes());

        stats.sig_cmds += 1;
        stats.sig_blocks += 1;
        stats.sig_bytes += (4 + strong.len()) as u64;
        Ok(Step::Continue)
    }
}

/// Parses a signature stream into a [`Signature`].
pub struct SignatureLoader {
    signature: Option<Signature>,
}

impl SignatureLoader {
    pub fn new() -> Self {
        Self { signature: None }
    }

    /// The loaded signature, once the job reports done.
    pub fn into_signature(self) -> Option<Signature> {
        self.signature
    }

    fn read_header(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        let header = match stream.read_exact(HEADER_LEN) {
            Some(header) => header,
            None if stream.at_eof() => {
                return Err(DeltaError::Format(format!(
                    "signature header truncated at {} bytes",
                    stream.buffered()
                )));
            }
            None => return Ok(Step::NeedsInput),
        };

        let magic = BigEndian::read_u32(&header[0..4]);
        let format = SignatureFormat::from_magic(magic).ok_or_else(|| {
            DeltaError::Format(format!("unknown signature magic {:#010x}", magic))
        })?;

        let block_len = BigEndian::read_u32(&header[4..8]);
        if block_len == 0 {
            return Err(DeltaError::Format("signature block length is zero".to_string()));
        }

        let strong_len = BigEndian::read_u32(&header[8..12]) as usize;
        let native = format.strong().native_len();
        if strong_len == 0 || strong_len > native {
            return Err(DeltaError::Format(format!(
                "signature strong length {} outside 1..={}",
                strong_len, native
            )));
        }

        stats.block_len = block_len;
        self.signature = Some(Signature::new(format, block_len, strong_len));
        Ok(Step::Continue)
    }
}

impl Default for SignatureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SignatureLoader {
    fn name(&self) -> &'static str {
        "loadsig"
    }

    fn step(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        let signature = match self.signature.as_mut() {
            Some(signature) => signature,
            None => return self.read_header(stream, stats),
        };

        if stream.is_exhausted() {
            return Ok(Step::Done);
        }

        let record_len = 4 + signature.strong_len;
        let record = match stream.read_exact(record_len) {
            Some(record) => record,
            None if stream.at_eof() => {
                return Err(DeltaError::Format(format!(
                    "truncated signature record: {} of {} bytes after {} blocks",
                    stream.buffered(),
                    record_len,
                    signature.len()
                )));
            }
            None => return Ok(Step::NeedsInput),
        };

        let weak = BigEndian::read_u32(&record[0..4]);
        signature.push(weak, StrongChecksum::from_slice(&record[4..]))?;

        stats.sig_blocks += 1;
        stats.sig_bytes += record_len as u64;
        Ok(Step::Continue)
    }
}
