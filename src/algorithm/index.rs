use std::collections::HashMap;

use log::debug;

use crate::algorithm::checksum::StrongChecksum;
use crate::algorithm::signature::Signature;
use crate::error::Result;

/// Weak checksum lookup table over a loaded signature.
///
/// Blocks sharing a weak checksum are kept in block order, so the first
/// strong match found is always the lowest block index.
#[derive(Debug)]
pub struct MatchIndex {
    signature: Signature,
    table: HashMap<u32, Vec<u32>>,
}

impl MatchIndex {
    pub fn build(signature: Signature) -> Result<Self> {
        let mut table: HashMap<u32, Vec<u32>> = HashMap::new();
        table.try_reserve(signature.len())?;

        for block in signature.blocks() {
            let candidates = table.entry(block.weak).or_default();
            candidates.try_reserve(1)?;
            candidates.push(block.index);
        }

        debug!(
            "match index: {} blocks, {} distinct weak sums",
            signature.len(),
            table.len()
        );
        Ok(Self { signature, table })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn block_len(&self) -> u32 {
        self.signature.block_len()
    }

    /// Blocks whose weak checksum equals `weak`, lowest index first.
    pub fn candidates(&self, weak: u32) -> &[u32] {
        self.table.get(&weak).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds the basis block whose content equals `window`.
    ///
    /// The weak checksum only narrows the candidates; a block is accepted
    /// once its strong checksum matches too. A window shorter than a block
    /// can only be the basis's final block. Candidates rejected by the
    /// strong checksum are counted in `false_matches`.
    pub fn find(&self, weak: u32, window: &[u8], false_matches: &mut u64) -> Option<u32> {
        let candidates = self.candidates(weak);
        if candidates.is_empty() {
            return None;
        }

        let short = window.len() < self.block_len() as usize;
        let last = self.signature.len().checked_sub(1)? as u32;
        let mut strong: Option<StrongChecksum> = None;

        for &index in candidates {
            if short && index != last {
                continue;
            }
            let strong = strong.get_or_insert_with(|| self.signature.strong_sum(window));
            if self.signature.blocks()[index as usize].strong == *strong {
                return Some(index);
            }
            *false_matches += 1;
        }
        None
    }

    /// Byte offset of a block in the basis.
    pub fn offset_of(&self, index: u32) -> u64 {
        index as u64 * self.block_len() as u64
    }
}
