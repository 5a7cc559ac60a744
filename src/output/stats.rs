use std::fmt;
use std::time::Duration;

/// Counters accumulated by one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Operation name ("signature", "loadsig", "delta", "patch").
    pub op: &'static str,
    pub in_bytes: u64,
    pub out_bytes: u64,

    pub lit_cmds: u64,
    pub lit_bytes: u64,
    /// Bytes spent on literal command headers.
    pub lit_cmdbytes: u64,

    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Bytes spent on copy commands.
    pub copy_cmdbytes: u64,

    pub sig_cmds: u64,
    pub sig_bytes: u64,
    pub sig_blocks: u64,
    pub block_len: u32,

    /// Weak checksum hits the strong checksum rejected.
    pub false_matches: u64,

    pub elapsed: Duration,
}

impl Stats {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }

    pub fn matched_bytes(&self) -> u64 {
        self.copy_bytes
    }

    pub fn literal_bytes(&self) -> u64 {
        self.lit_bytes
    }

    /// Bytes per second over the input side.
    pub fn speed(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.in_bytes as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print(&self) {
        eprintln!("{} statistics:", self.op);
        eprintln!("  Bytes in: {}", self.in_bytes);
        eprintln!("  Bytes out: {}", self.out_bytes);
        if self.lit_cmds > 0 {
            eprintln!(
                "  Literal: {} cmds, {} bytes, {} cmdbytes",
                self.lit_cmds, self.lit_bytes, self.lit_cmdbytes
            );
        }
        if self.copy_cmds > 0 || self.false_matches > 0 {
            eprintln!(
                "  Copy: {} cmds, {} bytes, {} cmdbytes, {} false matches",
                self.copy_cmds, self.copy_bytes, self.copy_cmdbytes, self.false_matches
            );
        }
        if self.sig_blocks > 0 || self.sig_cmds > 0 {
            eprintln!(
                "  Signature: {} blocks of {} bytes, {} bytes of sums",
                self.sig_blocks, self.block_len, self.sig_bytes
            );
        }
        eprintln!("  Elapsed: {:?} ({:.2} B/s)", self.elapsed, self.speed());
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: in={} out={}", self.op, self.in_bytes, self.out_bytes)?;
        if self.lit_cmds > 0 {
            write!(
                f,
                " literal[{} cmds, {} bytes, {} cmdbytes]",
                self.lit_cmds, self.lit_bytes, self.lit_cmdbytes
            )?;
        }
        if self.copy_cmds > 0 {
            write!(
                f,
                " copy[{} cmds, {} bytes, {} false, {} cmdbytes]",
                self.copy_cmds, self.copy_bytes, self.false_matches, self.copy_cmdbytes
            )?;
        }
        if self.sig_blocks > 0 {
            write!(
                f,
                " signature[{} blocks, {} bytes per block]",
                self.sig_blocks, self.block_len
            )?;
        }
        Ok(())
    }
}
