use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::algorithm::checksum::WeakSum;
use crate::algorithm::delta::{Command, MAX_LITERAL_LEN};
use crate::algorithm::index::MatchIndex;
use crate::error::Result;
use crate::job::stream::Stream;
use crate::job::{Codec, Step};
use crate::options::DELTA_MAGIC;
use crate::output::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Search,
    Finished,
}

/// Scans a new file against a basis signature and emits the delta.
///
/// The encoder keeps its own buffer holding the pending literal run
/// followed by the search window, so literal bytes are never copied twice.
pub struct Sender<'a> {
    index: &'a MatchIndex,
    block_len: usize,
    state: State,
    buf: Vec<u8>,
    /// Start of the pending literal run in `buf`.
    lit_start: usize,
    /// Start of the search window in `buf`; the literal run ends here.
    win_start: usize,
    /// Weak sum of the current window, if one has been computed.
    weak: Option<WeakSum>,
    /// Copy held back in case the next match continues it.
    pending_copy: Option<(u64, u64)>,
}

impl<'a> Sender<'a> {
    pub fn new(index: &'a MatchIndex) -> Self {
        Self {
            index,
            block_len: index.block_len() as usize,
            state: State::Header,
            buf: Vec::new(),
            lit_start: 0,
            win_start: 0,
            weak: None,
            pending_copy: None,
        }
    }

    /// Tops the buffer up to one byte past a full window.
    fn fill_window(&mut self, stream: &mut Stream<'_>) -> usize {
        let want = self.block_len + 1;
        let have = self.buf.len() - self.win_start;
        if have < want {
            stream.pull_into(&mut self.buf, want - have);
        }
        self.buf.len() - self.win_start
    }

    fn flush_literal(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> bool {
        let len = self.win_start - self.lit_start;
        if len == 0 {
            return false;
        }

        let command = Command::literal(len as u64);
        trace!("emit {:?}", command);
        stream.write(&command.encode());
        stream.write(&self.buf[self.lit_start..self.win_start]);

        stats.lit_cmds += 1;
        stats.lit_bytes += len as u64;
        stats.lit_cmdbytes += command.size() as u64;
        self.lit_start = self.win_start;
        true
    }

    fn flush_copy(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> bool {
        let (offset, len) = match self.pending_copy.take() {
            Some(copy) => copy,
            None => return false,
        };

        let command = Command::copy(offset, len);
        trace!("emit {:?}", command);
        stream.write(&command.encode());

        stats.copy_cmds += 1;
        stats.copy_bytes += len;
        stats.copy_cmdbytes += command.size() as u64;
        true
    }

    /// Extends the pending copy when contiguous, otherwise replaces it.
    fn push_copy(&mut self, offset: u64, len: u64, stream: &mut Stream<'_>, stats: &mut Stats) {
        if let Some((pending_offset, pending_len)) = self.pending_copy.as_mut() {
            if *pending_offset + *pending_len == offset {
                *pending_len += len;
                return;
            }
        }
        self.flush_copy(stream, stats);
        self.pending_copy = Some((offset, len));
    }

    /// Drops bytes that are no longer part of the literal run or window.
    fn compact(&mut self) {
        if self.lit_start > 0 {
            self.buf.drain(..self.lit_start);
            self.win_start -= self.lit_start;
            self.lit_start = 0;
        }
    }

    fn search(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        let rolling = self.index.signature().format().rolling();

        loop {
            let have = self.fill_window(stream);
            if have <= self.block_len && !stream.at_eof() {
                return Ok(Step::NeedsInput);
            }

            if have == 0 {
                self.flush_literal(stream, stats);
                self.flush_copy(stream, stats);
                trace!("emit {:?}", Command::End);
                stream.write(&Command::End.encode());
                self.state = State::Finished;
                return Ok(Step::Done);
            }

            let win_len = have.min(self.block_len);
            let window = &self.buf[self.win_start..self.win_start + win_len];
            let weak = self
                .weak
                .get_or_insert_with(|| WeakSum::new(rolling, window));

            if let Some(index) = self
                .index
                .find(weak.digest(), window, &mut stats.false_matches)
            {
                self.flush_literal(stream, stats);
                let offset = self.index.offset_of(index);
                self.push_copy(offset, win_len as u64, stream, stats);

                self.win_start += win_len;
                self.lit_start = self.win_start;
                self.weak = None;
                self.compact();
                return Ok(Step::Continue);
            }

            let old_byte = self.buf[self.win_start];
            if have > self.block_len {
                weak.roll(old_byte, self.buf[self.win_start + self.block_len]);
            } else {
                weak.rollout(old_byte);
            }
            self.win_start += 1;

            // a copy held back must precede the literal that now begins
            let mut emitted = self.flush_copy(stream, stats);
            if self.win_start - self.lit_start >= MAX_LITERAL_LEN {
                emitted |= self.flush_literal(stream, stats);
            }
            if emitted {
                self.compact();
                return Ok(Step::Continue);
            }
        }
    }
}

impl Codec for Sender<'_> {
    fn name(&self) -> &'static str {
        "delta"
    }

    fn step(&mut self, stream: &mut Stream<'_>, stats: &mut Stats) -> Result<Step> {
        match self.state {
            State::Header => {
                let mut magic = [0u8; 4];
                BigEndian::write_u32(&mut magic, DELTA_MAGIC);
                stream.write(&magic);
                stats.block_len = self.index.block_len();
                self.state = State::Search;
                Ok(Step::Continue)
            }
            State::Search => self.search(stream, stats),
            State::Finished => Ok(Step::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::delta::parse_commands;
    use crate::algorithm::signature::{Generator, Signature, SignatureLoader};
    use crate::job::Job;
    use crate::options::{BufferSizes, SignatureFormat, SignatureOptions};

    fn signature(basis: &[u8], format: SignatureFormat, block_len: u32) -> Signature {
        let options = SignatureOptions {
            format,
            block_len,
            strong_len: 0,
        };
        let mut input = basis;
        let mut sig = Vec::new();
        Job::new(Generator::new(&options).unwrap())
            .drive(Some(&mut input), Some(&mut sig), BufferSizes::default())
            .unwrap();

        let mut input = &sig[..];
        let mut job = Job::new(SignatureLoader::new());
        job.drive(Some(&mut input), None, BufferSizes::default()).unwrap();
        job.into_codec().into_signature().unwrap()
    }

    fn delta(index: &MatchIndex, new: &[u8], sizes: BufferSizes) -> (Vec<u8>, Stats) {
        let mut input = new;
        let mut output = Vec::new();
        let stats = Job::new(Sender::new(index))
            .drive(Some(&mut input), Some(&mut output), sizes)
            .unwrap();
        (output, stats)
    }

    fn commands(delta: &[u8]) -> Vec<Command> {
        assert_eq!(BigEndian::read_u32(&delta[..4]), DELTA_MAGIC);
        parse_commands(&delta[4..]).unwrap()
    }

    #[test]
    fn test_identical_files_single_copy() -> Result<()> {
        let content = b"Hello, this is a test file for rsync algorithm!";
        let index = MatchIndex::build(signature(content, SignatureFormat::Blake2, 10))?;

        let (bytes, stats) = delta(&index, content, BufferSizes::default());

        assert_eq!(
            commands(&bytes),
            vec![Command::copy(0, content.len() as u64), Command::End]
        );
        assert_eq!(stats.matched_bytes(), content.len() as u64);
        assert_eq!(stats.literal_bytes(), 0);
        Ok(())
    }

    #[test]
    fn test_empty_new_file_is_end_only() -> Result<()> {
        let index = MatchIndex::build(signature(b"basis", SignatureFormat::Md4, 4))?;
        let (bytes, _) = delta(&index, b"", BufferSizes::default());
        assert_eq!(commands(&bytes), vec![Command::End]);
        assert_eq!(bytes.len(), 5);
        Ok(())
    }

    #[test]
    fn test_completely_different() -> Result<()> {
        let index = MatchIndex::build(signature(b"AAAAAAAAAA", SignatureFormat::Md4, 10))?;
        let (bytes, stats) = delta(&index, b"BBBBBBBBBB", BufferSizes::default());

        assert_eq!(commands(&bytes), vec![Command::literal(10), Command::End]);
        assert_eq!(&bytes[5..15], b"BBBBBBBBBB");
        assert_eq!(stats.lit_cmds, 1);
        Ok(())
    }

    #[test]
    fn test_partial_match() -> Result<()> {
        let index = MatchIndex::build(signature(b"AAAAAABBBBBBCCCCCC", SignatureFormat::Blake2, 6))?;
        let (bytes, _) = delta(&index, b"AAAAAADDDDDDCCCCCC", BufferSizes::default());

        assert_eq!(
            commands(&bytes),
            vec![
                Command::copy(0, 6),
                Command::literal(6),
                Command::copy(12, 6),
                Command::End
            ]
        );
        Ok(())
    }

    #[test]
    fn test_shifted_content_found() -> Result<()> {
        let basis: Vec<u8> = (0..200u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut new = b"prefix".to_vec();
        new.extend_from_slice(&basis);

        let index = MatchIndex::build(signature(&basis, SignatureFormat::RabinKarpBlake2, 16))?;
        let (bytes, stats) = delta(&index, &new, BufferSizes::default());

        assert_eq!(
            commands(&bytes),
            vec![Command::literal(6), Command::copy(0, 200), Command::End]
        );
        assert_eq!(stats.copy_bytes, 200);
        Ok(())
    }

    #[test]
    fn test_weak_collision_emits_literal() -> Result<()> {
        let index = MatchIndex::build(signature(&[0, 2, 0], SignatureFormat::Md4, 3))?;
        let (bytes, stats) = delta(&index, &[1, 0, 1], BufferSizes::default());

        assert_eq!(commands(&bytes), vec![Command::literal(3), Command::End]);
        assert_eq!(stats.copy_bytes, 0);
        assert!(stats.false_matches >= 1);
        Ok(())
    }

    #[test]
    fn test_literal_runs_are_capped() -> Result<()> {
        let index = MatchIndex::build(signature(b"", SignatureFormat::Md4, 8))?;
        let new = vec![0x5a; MAX_LITERAL_LEN + 10];
        let (bytes, stats) = delta(&index, &new, BufferSizes::default());

        assert_eq!(
            commands(&bytes),
            vec![
                Command::literal(MAX_LITERAL_LEN as u64),
                Command::literal(10),
                Command::End
            ]
        );
        assert_eq!(stats.lit_bytes, new.len() as u64);
        Ok(())
    }

    #[test]
    fn test_reordered_blocks_not_merged() -> Result<()> {
        let index = MatchIndex::build(signature(b"aaaabbbbcccc", SignatureFormat::Blake2, 4))?;
        let (bytes, _) = delta(&index, b"ccccaaaabbbb", BufferSizes::default());

        assert_eq!(
            commands(&bytes),
            vec![Command::copy(8, 4), Command::copy(0, 8), Command::End]
        );
        Ok(())
    }

    #[test]
    fn test_output_independent_of_buffer_sizes() -> Result<()> {
        let basis: Vec<u8> = (0..500u32).map(|i| (i % 13) as u8 ^ (i / 7) as u8).collect();
        let mut new = basis.clone();
        new.splice(100..120, b"inserted text".iter().cloned());
        new.extend_from_slice(b"tail");

        let index = MatchIndex::build(signature(&basis, SignatureFormat::Blake2, 32))?;
        let (large, _) = delta(&index, &new, BufferSizes::default());
        let (tiny, _) = delta(&index, &new, BufferSizes::new(1, 1));
        let (odd, _) = delta(&index, &new, BufferSizes::new(7, 3));

        assert_eq!(large, tiny);
        assert_eq!(large, odd);
        Ok(())
    }
}
