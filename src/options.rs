use crate::error::{DeltaError, Result};

/// Default block length when the caller does not choose one.
pub const DEFAULT_BLOCK_LEN: u32 = 2048;

/// Upper bound for auto-tuned block lengths.
pub const MAX_RECOMMENDED_BLOCK_LEN: u32 = 128 * 1024;

/// Longest strong sum any supported algorithm produces.
pub const MAX_STRONG_SUM_LEN: usize = 32;

/// Magic number at the start of every delta stream.
pub const DELTA_MAGIC: u32 = 0x7273_0236;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingAlgorithm {
    Rollsum,
    RabinKarp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md4,
    Blake2,
}

impl ChecksumAlgorithm {
    /// Digest length before truncation.
    pub fn native_len(self) -> usize {
        match self {
            ChecksumAlgorithm::Md4 => 16,
            ChecksumAlgorithm::Blake2 => 32,
        }
    }
}

/// Signature variant, as identified by the magic number in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    Md4,
    Blake2,
    RabinKarpMd4,
    RabinKarpBlake2,
}

impl Default for SignatureFormat {
    fn default() -> Self {
        SignatureFormat::Blake2
    }
}

impl SignatureFormat {
    pub fn new(rolling: RollingAlgorithm, strong: ChecksumAlgorithm) -> Self {
        match (rolling, strong) {
            (RollingAlgorithm::Rollsum, ChecksumAlgorithm::Md4) => SignatureFormat::Md4,
            (RollingAlgorithm::Rollsum, ChecksumAlgorithm::Blake2) => SignatureFormat::Blake2,
            (RollingAlgorithm::RabinKarp, ChecksumAlgorithm::Md4) => SignatureFormat::RabinKarpMd4,
            (RollingAlgorithm::RabinKarp, ChecksumAlgorithm::Blake2) => SignatureFormat::RabinKarpBlake2,
        }
    }

    pub fn magic(self) -> u32 {
        match self {
            SignatureFormat::Md4 => 0x7273_0136,
            SignatureFormat::Blake2 => 0x7273_0137,
            SignatureFormat::RabinKarpMd4 => 0x7273_0146,
            SignatureFormat::RabinKarpBlake2 => 0x7273_0147,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            0x7273_0136 => Some(SignatureFormat::Md4),
            0x7273_0137 => Some(SignatureFormat::Blake2),
            0x7273_0146 => Some(SignatureFormat::RabinKarpMd4),
            0x7273_0147 => Some(SignatureFormat::RabinKarpBlake2),
            _ => None,
        }
    }

    pub fn rolling(self) -> RollingAlgorithm {
        match self {
            SignatureFormat::Md4 | SignatureFormat::Blake2 => RollingAlgorithm::Rollsum,
            SignatureFormat::RabinKarpMd4 | SignatureFormat::RabinKarpBlake2 => {
                RollingAlgorithm::RabinKarp
            }
        }
    }

    pub fn strong(self) -> ChecksumAlgorithm {
        match self {
            SignatureFormat::Md4 | SignatureFormat::RabinKarpMd4 => ChecksumAlgorithm::Md4,
            SignatureFormat::Blake2 | SignatureFormat::RabinKarpBlake2 => ChecksumAlgorithm::Blake2,
        }
    }

    /// Parses the names used on the command line and in config files.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md4" => Ok(SignatureFormat::Md4),
            "blake2" => Ok(SignatureFormat::Blake2),
            "rk-md4" => Ok(SignatureFormat::RabinKarpMd4),
            "rk-blake2" => Ok(SignatureFormat::RabinKarpBlake2),
            other => Err(DeltaError::Param(format!("unknown signature format: {}", other))),
        }
    }
}

/// Parameters for building a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    pub format: SignatureFormat,
    pub block_len: u32,
    /// Truncated strong sum length; 0 selects the native digest length.
    pub strong_len: usize,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            format: SignatureFormat::default(),
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: 0,
        }
    }
}

impl SignatureOptions {
    /// Options tuned for a basis of `basis_size` bytes.
    pub fn for_basis_size(basis_size: u64) -> Self {
        Self {
            block_len: recommended_block_len(basis_size),
            ..Self::default()
        }
    }

    /// Strong sum length after resolving the 0 shorthand and range checks.
    pub fn resolved_strong_len(&self) -> Result<usize> {
        let native = self.format.strong().native_len();
        match self.strong_len {
            0 => Ok(native),
            n if n <= native => Ok(n),
            n => Err(DeltaError::Param(format!(
                "strong sum length {} exceeds the {}-byte digest",
                n, native
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_len == 0 {
            return Err(DeltaError::Param("block length must be at least 1".to_string()));
        }
        self.resolved_strong_len()?;
        Ok(())
    }
}

/// Block length for a basis of the given size.
///
/// Small files use the default; past `DEFAULT_BLOCK_LEN²` bytes the block
/// length grows with the square root of the size so the record count
/// stays bounded.
pub fn recommended_block_len(basis_size: u64) -> u32 {
    let default = DEFAULT_BLOCK_LEN as u64;
    if basis_size <= default * default {
        return DEFAULT_BLOCK_LEN;
    }

    let root = (basis_size as f64).sqrt().ceil() as u64;
    let rounded = (root + 127) / 128 * 128;
    rounded.clamp(default, MAX_RECOMMENDED_BLOCK_LEN as u64) as u32
}

/// Smallest strong sum length that keeps false matches unlikely for a
/// basis of `basis_size` bytes split into `block_len` blocks.
pub fn minimum_strong_len(basis_size: u64, block_len: u32) -> usize {
    let block_len = block_len.max(1) as u64;
    let bits = log2(basis_size + (1 << 24)) + log2(basis_size / block_len + 1);
    2 + (bits as usize + 7) / 8
}

fn log2(n: u64) -> u32 {
    63 - n.max(1).leading_zeros()
}

/// Staging memory for one job. Each operation has its own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    pub input: usize,
    pub output: usize,
}

impl Default for BufferSizes {
    fn default() -> Self {
        Self {
            input: 64 * 1024,
            output: 64 * 1024,
        }
    }
}

impl BufferSizes {
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }

    pub fn for_signature() -> Self {
        Self::new(64 * 1024, 16 * 1024)
    }

    pub fn for_load_signature() -> Self {
        Self::new(64 * 1024, 1)
    }

    pub fn for_delta() -> Self {
        Self::default()
    }

    pub fn for_patch() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.input == 0 || self.output == 0 {
            return Err(DeltaError::Param(format!(
                "buffer sizes must be non-zero (input={}, output={})",
                self.input, self.output
            )));
        }
        Ok(())
    }
}
