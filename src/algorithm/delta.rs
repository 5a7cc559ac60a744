use byteorder::{BigEndian, ByteOrder};
use crate::error::{DeltaError, Result};

/// Largest payload a single literal command carries.
pub const MAX_LITERAL_LEN: usize = 64 * 1024;

const OP_END: u8 = 0x00;
/// Literals of 1..=64 bytes store the length in the tag itself.
const OP_LITERAL_INLINE_MAX: u8 = 0x40;
const OP_LITERAL_N1: u8 = 0x41;
const OP_COPY_BASE: u8 = 0x45;
const OP_COPY_LAST: u8 = 0x54;

/// Parameter widths in bytes, indexed by their 2-bit code.
const WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// One command of a delta stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `len` bytes from the basis starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// `len` bytes of inline payload follow the command header.
    Literal { len: u64 },
    End,
}

impl Command {
    pub fn copy(offset: u64, len: u64) -> Self {
        Command::Copy { offset, len }
    }

    pub fn literal(len: u64) -> Self {
        Command::Literal { len }
    }

    /// Header bytes, without any literal payload.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Command::End => vec![OP_END],
            Command::Literal { len } if (1..=OP_LITERAL_INLINE_MAX as u64).contains(&len) => {
                vec![len as u8]
            }
            Command::Literal { len } => {
                let code = width_code(len);
                let mut out = vec![OP_LITERAL_N1 + code as u8];
                push_uint(&mut out, len, WIDTHS[code]);
                out
            }
            Command::Copy { offset, len } => {
                let offset_code = width_code(offset);
                let len_code = width_code(len);
                let mut out = vec![OP_COPY_BASE + (offset_code * 4 + len_code) as u8];
                push_uint(&mut out, offset, WIDTHS[offset_code]);
                push_uint(&mut out, len, WIDTHS[len_code]);
                out
            }
        }
    }

    /// Encoded header size in bytes.
    pub fn size(&self) -> usize {
        match *self {
            Command::End => 1,
            Command::Literal { len } if (1..=OP_LITERAL_INLINE_MAX as u64).contains(&len) => 1,
            Command::Literal { len } => 1 + WIDTHS[width_code(len)],
            Command::Copy { offset, len } => {
                1 + WIDTHS[width_code(offset)] + WIDTHS[width_code(len)]
            }
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Command::Copy { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Command::Literal { .. })
    }
}

/// What a tag byte announces before its parameters are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    End,
    LiteralInline(u64),
    Literal { len_width: usize },
    Copy { offset_width: usize, len_width: usize },
}

impl Opcode {
    pub fn decode(tag: u8) -> Result<Self> {
        match tag {
            OP_END => Ok(Opcode::End),
            1..=OP_LITERAL_INLINE_MAX => Ok(Opcode::LiteralInline(tag as u64)),
            OP_LITERAL_N1..=0x44 => Ok(Opcode::Literal {
                len_width: WIDTHS[(tag - OP_LITERAL_N1) as usize],
            }),
            OP_COPY_BASE..=OP_COPY_LAST => {
                let code = (tag - OP_COPY_BASE) as usize;
                Ok(Opcode::Copy {
                    offset_width: WIDTHS[code / 4],
                    len_width: WIDTHS[code % 4],
                })
            }
            _ => Err(DeltaError::Format(format!("invalid command tag 0x{:02x}", tag))),
        }
    }

    /// Parameter bytes that follow the tag.
    pub fn param_len(&self) -> usize {
        match *self {
            Opcode::End | Opcode::LiteralInline(_) => 0,
            Opcode::Literal { len_width } => len_width,
            Opcode::Copy {
                offset_width,
                len_width,
            } => offset_width + len_width,
        }
    }

    /// Builds the command from exactly `param_len()` parameter bytes.
    pub fn command(&self, params: &[u8]) -> Result<Command> {
        let command = match *self {
            Opcode::End => Command::End,
            Opcode::LiteralInline(len) => Command::Literal { len },
            Opcode::Literal { len_width } => Command::Literal {
                len: BigEndian::read_uint(params, len_width),
            },
            Opcode::Copy {
                offset_width,
                len_width,
            } => Command::Copy {
                offset: BigEndian::read_uint(params, offset_width),
                len: BigEndian::read_uint(&params[offset_width..], len_width),
            },
        };

        match command {
            Command::Literal { len: 0 } => {
                Err(DeltaError::Format("zero-length literal command".to_string()))
            }
            Command::Copy { len: 0, .. } => {
                Err(DeltaError::Format("zero-length copy command".to_string()))
            }
            command => Ok(command),
        }
    }
}

/// Index into `WIDTHS` of the narrowest width holding `value`.
fn width_code(value: u64) -> usize {
    if value <= 0xff {
        0
    } else if value <= 0xffff {
        1
    } else if value <= 0xffff_ffff {
        2
    } else {
        3
    }
}

fn push_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    let mut buf = [0u8; 8];
    BigEndian::write_uint(&mut buf, value, width);
    out.extend_from_slice(&buf[..width]);
}

/// Per-stream summary of a decoded command list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaStats {
    pub copy_cmds: usize,
    pub copy_bytes: u64,
    pub literal_cmds: usize,
    pub literal_bytes: u64,
    /// Header bytes, payload excluded.
    pub command_bytes: usize,
}

impl DeltaStats {
    pub fn from_commands(commands: &[Command]) -> Self {
        let mut stats = Self::default();
        for command in commands {
            stats.command_bytes += command.size();
            match *command {
                Command::Copy { len, .. } => {
                    stats.copy_cmds += 1;
                    stats.copy_bytes += len;
                }
                Command::Literal { len } => {
                    stats.literal_cmds += 1;
                    stats.literal_bytes += len;
                }
                Command::End => {}
            }
        }
        stats
    }
}

/// Splits a complete delta body (after the magic) into its commands.
///
/// Inspection helper for tests and tooling; patching goes through the
/// streaming decoder instead.
pub fn parse_commands(mut data: &[u8]) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    loop {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| DeltaError::Input("delta ended without END".to_string()))?;
        let opcode = Opcode::decode(tag)?;
        let param_len = opcode.param_len();
        if rest.len() < param_len {
            return Err(DeltaError::Input("truncated command parameters".to_string()));
        }
        let command = opcode.command(&rest[..param_len])?;
        data = &rest[param_len..];

        if let Command::Literal { len } = command {
            let len = usize::try_from(len)
                .ok()
                .filter(|&len| len <= data.len())
                .ok_or_else(|| DeltaError::Input("truncated literal payload".to_string()))?;
            data = &data[len..];
        }

        commands.push(command);
        if command == Command::End {
            if !data.is_empty() {
                return Err(DeltaError::Format(format!(
                    "{} trailing bytes after END",
                    data.len()
                )));
            }
            return Ok(commands);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_literal_headers() {
        assert_eq!(Command::literal(1).encode(), vec![0x01]);
        assert_eq!(Command::literal(64).encode(), vec![0x40]);
        assert_eq!(Command::literal(65).encode(), vec![0x41, 65]);
        assert_eq!(Command::literal(300).encode(), vec![0x42, 0x01, 0x2c]);
        assert_eq!(Command::literal(70_000).encode(), vec![0x43, 0x00, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn test_encode_copy_widths() {
        assert_eq!(Command::copy(0, 2048).encode(), vec![0x46, 0x00, 0x08, 0x00]);
        assert_eq!(Command::copy(0x1_0000, 16).encode(), vec![0x4d, 0x00, 0x01, 0x00, 0x00, 0x10]);
        let wide = Command::copy(1 << 40, 1);
        assert_eq!(wide.encode()[0], 0x51);
        assert_eq!(wide.size(), 10);
    }

    #[test]
    fn test_decode_matches_encode() -> Result<()> {
        let commands = [
            Command::literal(7),
            Command::literal(1000),
            Command::copy(4096, 2048),
            Command::copy(u64::MAX - 5, 5),
            Command::End,
        ];
        for command in commands {
            let bytes = command.encode();
            assert_eq!(bytes.len(), command.size());
            let opcode = Opcode::decode(bytes[0])?;
            assert_eq!(opcode.param_len(), bytes.len() - 1);
            assert_eq!(opcode.command(&bytes[1..])?, command);
        }
        Ok(())
    }

    #[test]
    fn test_decode_invalid_tag() {
        for tag in [0x55u8, 0x80, 0xff] {
            let err = Opcode::decode(tag).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        }
    }

    #[test]
    fn test_zero_length_commands_rejected() {
        let literal = Opcode::decode(0x41).unwrap();
        assert!(literal.command(&[0]).is_err());

        let copy = Opcode::decode(0x45).unwrap();
        assert!(copy.command(&[3, 0]).is_err());
    }

    #[test]
    fn test_parse_commands() -> Result<()> {
        let mut body = Command::literal(3).encode();
        body.extend_from_slice(b"xyz");
        body.extend(Command::copy(0, 10).encode());
        body.extend(Command::End.encode());

        let commands = parse_commands(&body)?;
        assert_eq!(
            commands,
            vec![Command::literal(3), Command::copy(0, 10), Command::End]
        );

        let stats = DeltaStats::from_commands(&commands);
        assert_eq!(stats.literal_bytes, 3);
        assert_eq!(stats.copy_bytes, 10);
        assert_eq!(stats.command_bytes, 1 + 3 + 1);

        body.push(0);
        assert!(parse_commands(&body).is_err());
        Ok(())
    }
}
