use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{DeltaError, Result};
use crate::options::{
    BufferSizes, ChecksumAlgorithm, RollingAlgorithm, SignatureFormat, SignatureOptions,
};
use crate::whole::{self, FileOptions};

#[derive(Parser, Debug)]
#[command(name = "rdelta")]
#[command(version)]
#[command(about = "Compute and apply rsync-style binary deltas", long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print job statistics to stderr
    #[arg(short = 's', long = "statistics", global = true)]
    pub statistics: bool,

    /// Show progress while reading the main input
    #[arg(long = "progress", global = true)]
    pub progress: bool,

    /// Overwrite existing output files
    #[arg(short = 'f', long = "force", global = true)]
    pub force: bool,

    /// Read defaults from a TOML file
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Append a timestamped summary of each run to FILE
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Input buffer size in bytes
    #[arg(long = "input-size", global = true)]
    pub input_size: Option<usize>,

    /// Output buffer size in bytes
    #[arg(long = "output-size", global = true)]
    pub output_size: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the signature of a basis file
    Signature(SignatureArgs),

    /// Write the delta turning the signed basis into NEW
    Delta {
        /// Signature of the basis
        sig: PathBuf,
        /// New file (- for stdin)
        new: PathBuf,
        /// Delta output (- for stdout)
        #[arg(default_value = "-")]
        delta: PathBuf,
    },

    /// Apply a delta to a basis file
    Patch {
        /// Basis file; must be seekable
        basis: PathBuf,
        /// Delta input (- for stdin)
        #[arg(default_value = "-")]
        delta: PathBuf,
        /// Reconstructed output (- for stdout)
        #[arg(default_value = "-")]
        new: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct SignatureArgs {
    /// Block length in bytes (default: tuned to the basis size)
    #[arg(short = 'b', long = "block-size")]
    pub block_len: Option<u32>,

    /// Strong sum length in bytes (0 for the full digest)
    #[arg(short = 'S', long = "sum-size")]
    pub strong_len: Option<usize>,

    /// Strong hash
    #[arg(short = 'H', long = "hash", value_enum)]
    pub hash: Option<HashArg>,

    /// Rolling hash
    #[arg(short = 'R', long = "rollsum", value_enum)]
    pub rollsum: Option<RollsumArg>,

    /// Basis file (- for stdin)
    pub basis: PathBuf,

    /// Signature output (- for stdout)
    #[arg(default_value = "-")]
    pub sig: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashArg {
    Md4,
    Blake2,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollsumArg {
    Rollsum,
    Rabinkarp,
}

impl From<HashArg> for ChecksumAlgorithm {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Md4 => ChecksumAlgorithm::Md4,
            HashArg::Blake2 => ChecksumAlgorithm::Blake2,
        }
    }
}

impl From<RollsumArg> for RollingAlgorithm {
    fn from(arg: RollsumArg) -> Self {
        match arg {
            RollsumArg::Rollsum => RollingAlgorithm::Rollsum,
            RollsumArg::Rabinkarp => RollingAlgorithm::RabinKarp,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }

    /// File handling options; buffer flags override the config file, which
    /// overrides the per-operation defaults.
    pub fn file_options(&self, config: &Config) -> Result<FileOptions> {
        let set_by_config = config.buffers.input.is_some() || config.buffers.output.is_some();
        let set_by_flags = self.input_size.is_some() || self.output_size.is_some();

        let buffers = if set_by_config || set_by_flags {
            let base = config.buffer_sizes(self.default_buffers());
            let sizes = BufferSizes {
                input: self.input_size.unwrap_or(base.input),
                output: self.output_size.unwrap_or(base.output),
            };
            sizes.validate()?;
            Some(sizes)
        } else {
            None
        };

        Ok(FileOptions {
            buffers,
            force: self.force,
            progress: self.progress,
        })
    }

    fn default_buffers(&self) -> BufferSizes {
        match self.command {
            Commands::Signature(_) => BufferSizes::for_signature(),
            Commands::Delta { .. } => BufferSizes::for_delta(),
            Commands::Patch { .. } => BufferSizes::for_patch(),
        }
    }
}

impl SignatureArgs {
    /// Resolves flags over config values over built-in defaults.
    pub fn signature_options(&self, config: &Config) -> Result<SignatureOptions> {
        let base = config.format()?.unwrap_or_default();
        let rolling = self.rollsum.map(RollingAlgorithm::from).unwrap_or(base.rolling());
        let strong = self.hash.map(ChecksumAlgorithm::from).unwrap_or(base.strong());

        let block_len = match self.block_len.or(config.signature.block_len) {
            Some(0) => {
                return Err(DeltaError::Param("block size must be at least 1".to_string()));
            }
            Some(block_len) => block_len,
            None => whole::auto_block_len(&self.basis).unwrap_or(crate::options::DEFAULT_BLOCK_LEN),
        };

        let options = SignatureOptions {
            format: SignatureFormat::new(rolling, strong),
            block_len,
            strong_len: self.strong_len.or(config.signature.strong_len).unwrap_or(0),
        };
        options.validate()?;
        Ok(options)
    }
}
