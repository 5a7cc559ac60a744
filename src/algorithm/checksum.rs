use crate::options::{ChecksumAlgorithm, RollingAlgorithm, MAX_STRONG_SUM_LEN};
use blake2::Blake2b;
use digest::consts::U32;
use digest::Digest;
use md4::Md4 as Md4Hasher;

type Blake2b256 = Blake2b<U32>;

/// Added to every byte so runs of zeros still move the sums.
const CHAR_OFFSET: u16 = 31;

const RABINKARP_SEED: u32 = 1;
const RABINKARP_MULT: u32 = 0x0810_4225;
/// `RABINKARP_SEED * (RABINKARP_MULT - 1)`, cancels the seed when rolling.
const RABINKARP_ADJ: u32 = RABINKARP_SEED.wrapping_mul(RABINKARP_MULT.wrapping_sub(1));
const RABINKARP_INV_MULT: u32 = mod_inverse(RABINKARP_MULT);

/// Multiplicative inverse modulo 2^32 of an odd number (Newton iteration).
const fn mod_inverse(n: u32) -> u32 {
    let mut x = n;
    let mut i = 0;
    while i < 5 {
        x = x.wrapping_mul(2u32.wrapping_sub(n.wrapping_mul(x)));
        i += 1;
    }
    x
}

/// Two-part rolling checksum over a window of bytes.
#[derive(Debug, Clone, Default)]
pub struct RollingChecksum {
    a: u16,
    b: u16,
    count: usize,
}

impl RollingChecksum {
    pub fn new(data: &[u8]) -> Self {
        let mut checksum = Self::default();
        checksum.update(data);
        checksum
    }

    /// Appends bytes to the end of the window.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = self.a.wrapping_add(byte as u16 + CHAR_OFFSET);
            self.b = self.b.wrapping_add(self.a);
        }
        self.count += data.len();
    }

    /// Slides the window one byte: `old_byte` leaves, `new_byte` enters.
    pub fn roll(&mut self, old_byte: u8, new_byte: u8) {
        let old = old_byte as u16 + CHAR_OFFSET;
        self.a = self
            .a
            .wrapping_sub(old)
            .wrapping_add(new_byte as u16 + CHAR_OFFSET);
        self.b = self
            .b
            .wrapping_sub((self.count as u16).wrapping_mul(old))
            .wrapping_add(self.a);
    }

    /// Drops `old_byte` from the front, shrinking the window.
    pub fn rollout(&mut self, old_byte: u8) {
        let old = old_byte as u16 + CHAR_OFFSET;
        self.a = self.a.wrapping_sub(old);
        self.b = self.b.wrapping_sub((self.count as u16).wrapping_mul(old));
        self.count -= 1;
    }

    pub fn checksum(&self) -> u32 {
        ((self.b as u32) << 16) | (self.a as u32)
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Polynomial rolling hash, `seed·M^n + Σ b_i·M^(n-i)` modulo 2^32.
#[derive(Debug, Clone)]
pub struct RabinKarp {
    hash: u32,
    /// `RABINKARP_MULT^count`
    mult: u32,
    count: usize,
}

impl Default for RabinKarp {
    fn default() -> Self {
        Self {
            hash: RABINKARP_SEED,
            mult: 1,
            count: 0,
        }
    }
}

impl RabinKarp {
    pub fn new(data: &[u8]) -> Self {
        let mut checksum = Self::default();
        checksum.update(data);
        checksum
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.hash = self.hash.wrapping_mul(RABINKARP_MULT).wrapping_add(byte as u32);
            self.mult = self.mult.wrapping_mul(RABINKARP_MULT);
        }
        self.count += data.len();
    }

    pub fn roll(&mut self, old_byte: u8, new_byte: u8) {
        self.hash = self
            .hash
            .wrapping_mul(RABINKARP_MULT)
            .wrapping_add(new_byte as u32)
            .wrapping_sub(self.mult.wrapping_mul((old_byte as u32).wrapping_add(RABINKARP_ADJ)));
    }

    pub fn rollout(&mut self, old_byte: u8) {
        self.count -= 1;
        self.mult = self.mult.wrapping_mul(RABINKARP_INV_MULT);
        self.hash = self
            .hash
            .wrapping_sub(self.mult.wrapping_mul((old_byte as u32).wrapping_add(RABINKARP_ADJ)));
    }

    pub fn checksum(&self) -> u32 {
        self.hash
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// The weak sum selected by a signature's magic number.
///
/// Signature generation and delta search both go through this type so the
/// two sides always compute the same function.
#[derive(Debug, Clone)]
pub enum WeakSum {
    Rollsum(RollingChecksum),
    RabinKarp(RabinKarp),
}

impl WeakSum {
    pub fn new(algorithm: RollingAlgorithm, data: &[u8]) -> Self {
        match algorithm {
            RollingAlgorithm::Rollsum => WeakSum::Rollsum(RollingChecksum::new(data)),
            RollingAlgorithm::RabinKarp => WeakSum::RabinKarp(RabinKarp::new(data)),
        }
    }

    pub fn roll(&mut self, old_byte: u8, new_byte: u8) {
        match self {
            WeakSum::Rollsum(sum) => sum.roll(old_byte, new_byte),
            WeakSum::RabinKarp(sum) => sum.roll(old_byte, new_byte),
        }
    }

    pub fn rollout(&mut self, old_byte: u8) {
        match self {
            WeakSum::Rollsum(sum) => sum.rollout(old_byte),
            WeakSum::RabinKarp(sum) => sum.rollout(old_byte),
        }
    }

    pub fn digest(&self) -> u32 {
        match self {
            WeakSum::Rollsum(sum) => sum.checksum(),
            WeakSum::RabinKarp(sum) => sum.checksum(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            WeakSum::Rollsum(sum) => sum.count(),
            WeakSum::RabinKarp(sum) => sum.count(),
        }
    }
}

/// Weak checksum of a whole block.
pub fn compute_weak_checksum(data: &[u8], algorithm: RollingAlgorithm) -> u32 {
    WeakSum::new(algorithm, data).digest()
}

/// A strong sum truncated to the signature's configured length.
#[derive(Clone, Copy)]
pub struct StrongChecksum {
    bytes: [u8; MAX_STRONG_SUM_LEN],
    len: u8,
}

impl StrongChecksum {
    /// Copies a stored (already truncated) sum, e.g. read from a signature.
    pub fn from_slice(data: &[u8]) -> Self {
        let len = data.len().min(MAX_STRONG_SUM_LEN);
        let mut bytes = [0u8; MAX_STRONG_SUM_LEN];
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes, len: len as u8 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for StrongChecksum {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for StrongChecksum {}

impl std::fmt::Debug for StrongChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Strong digest of `data`, truncated to `strong_len` bytes.
pub fn compute_strong_checksum(
    data: &[u8],
    algorithm: ChecksumAlgorithm,
    strong_len: usize,
) -> StrongChecksum {
    match algorithm {
        ChecksumAlgorithm::Md4 => {
            let mut hasher = Md4Hasher::new();
            hasher.update(data);
            let result = hasher.finalize();
            StrongChecksum::from_slice(&result[..strong_len.min(result.len())])
        }
        ChecksumAlgorithm::Blake2 => {
            let mut hasher = Blake2b256::new();
            hasher.update(data);
            let result = hasher.finalize();
            StrongChecksum::from_slice(&result[..strong_len.min(result.len())])
        }
    }
}
