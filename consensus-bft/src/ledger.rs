//! Append-only, fork-free block ledger.

use {
    crate::{error::LedgerError, types::Block},
    std::sync::Arc,
};

/// Ordered chain of committed blocks, indexed by height.
///
/// Always holds at least the genesis block, so the initial height is 0.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Arc<Block>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Arc::new(Block::genesis())],
        }
    }

    /// Append `block` at `current_height() + 1`.
    pub fn add_block(&mut self, block: Arc<Block>) -> Result<(), LedgerError> {
        let expected = self.next_height();
        if block.height() != expected {
            return Err(LedgerError::HeightMismatch {
                expected,
                actual: block.height(),
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn get_block(&self, height: u64) -> Option<&Arc<Block>> {
        usize::try_from(height)
            .ok()
            .and_then(|index| self.blocks.get(index))
    }

    pub fn has_block(&self, height: u64) -> bool {
        self.get_block(height).is_some()
    }

    /// Height of the highest committed block.
    pub fn current_height(&self) -> u64 {
        self.tip().height()
    }

    fn next_height(&self) -> u64 {
        self.current_height().saturating_add(1)
    }

    pub fn tip(&self) -> &Arc<Block> {
        // The genesis block is never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Blocks in height order, genesis first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check that every block names its predecessor's hash.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        for pair in self.blocks.windows(2) {
            if pair[1].previous() != pair[0].sha256_base64_hash() {
                return Err(LedgerError::BrokenLink {
                    height: pair[1].height(),
                });
            }
        }
        Ok(())
    }
}
