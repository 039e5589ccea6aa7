//! Token-budget-aware batching of filtered blocks
//!
//! Blocks are packed greedily in extraction order so prompts keep page and
//! semantic locality. Every filtered block lands in exactly one batch; a
//! single block whose own cost exceeds the budget becomes an oversized batch
//! of one rather than being split or dropped.

use shared_types::TextBlock;
use std::collections::BTreeSet;
use tracing::debug;

/// Token budget per model call
pub const MAX_TOKENS_PER_BATCH: usize = 11_000;

/// Block text is capped to this many characters in the prompt
pub const PROMPT_BLOCK_TEXT_CAP: usize = 450;

/// Serialization overhead per block (page/index/flag markup), in characters
const BLOCK_OVERHEAD_CHARS: usize = 60;

/// Rough chars-per-token ratio for prompt text
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token cost of `chars` characters of prompt text
pub fn estimate_tokens(chars: usize) -> usize {
    chars / CHARS_PER_TOKEN + 1
}

/// Marginal token cost of one block in a prompt
pub fn block_token_cost(block: &TextBlock) -> usize {
    let text_chars = block.text.chars().count().min(PROMPT_BLOCK_TEXT_CAP);
    estimate_tokens(text_chars + BLOCK_OVERHEAD_CHARS)
}

/// Bin-packed group of blocks destined for one model call
#[derive(Debug, Clone)]
pub struct Batch {
    pub blocks: Vec<TextBlock>,
    pub pages: BTreeSet<u32>,
    pub estimated_tokens: usize,
}

impl Batch {
    fn seeded(overhead_tokens: usize) -> Self {
        Self {
            blocks: Vec::new(),
            pages: BTreeSet::new(),
            estimated_tokens: overhead_tokens,
        }
    }

    fn push(&mut self, block: TextBlock, cost: usize) {
        self.pages.insert(block.page_number);
        self.estimated_tokens += cost;
        self.blocks.push(block);
    }
}

/// Packs blocks into token-budget-bounded batches
pub struct BatchPlanner {
    budget: usize,
}

impl BatchPlanner {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Pack `blocks` in order, seeding every batch with the token cost of the
    /// rendered controls summary.
    pub fn plan(&self, blocks: &[TextBlock], prompt_overhead_tokens: usize) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        let mut current = Batch::seeded(prompt_overhead_tokens);

        for block in blocks {
            let cost = block_token_cost(block);
            if !current.blocks.is_empty() && current.estimated_tokens + cost > self.budget {
                batches.push(std::mem::replace(
                    &mut current,
                    Batch::seeded(prompt_overhead_tokens),
                ));
            }
            current.push(block.clone(), cost);
        }
        if !current.blocks.is_empty() {
            batches.push(current);
        }

        debug!(
            "planned {} batches for {} blocks (budget {})",
            batches.len(),
            blocks.len(),
            self.budget
        );
        batches
    }
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new(MAX_TOKENS_PER_BATCH)
    }
}
