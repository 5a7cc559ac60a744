use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DeltaError, Result};
use crate::options::{BufferSizes, SignatureFormat};

/// Defaults read from a TOML file. Every field is optional.
///
/// ```toml
/// [signature]
/// block_len = 4096
/// strong_len = 8
/// format = "rk-blake2"
///
/// [buffers]
/// input = 131072
/// output = 65536
/// ```
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub signature: SignatureConfig,
    pub buffers: BufferConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SignatureConfig {
    pub block_len: Option<u32>,
    pub strong_len: Option<usize>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    pub input: Option<usize>,
    pub output: Option<usize>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DeltaError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.signature.block_len == Some(0) {
            return Err(DeltaError::Config("signature.block_len must be at least 1".to_string()));
        }
        if self.buffers.input == Some(0) || self.buffers.output == Some(0) {
            return Err(DeltaError::Config("buffer sizes must be non-zero".to_string()));
        }
        self.format()?;
        Ok(())
    }

    pub fn format(&self) -> Result<Option<SignatureFormat>> {
        match self.signature.format.as_deref() {
            Some(name) => SignatureFormat::parse(name)
                .map(Some)
                .map_err(|_| DeltaError::Config(format!("unknown signature.format {:?}", name))),
            None => Ok(None),
        }
    }

    /// `defaults` with any sizes this file sets applied on top.
    pub fn buffer_sizes(&self, defaults: BufferSizes) -> BufferSizes {
        BufferSizes {
            input: self.buffers.input.unwrap_or(defaults.input),
            output: self.buffers.output.unwrap_or(defaults.output),
        }
    }
}
