//! Greedy character-budget batching of outline blocks.

use outliner_shared::OutlineBlock;
use tracing::warn;

/// Blocks sent to the LLM in one call, in page order.
pub type Batch = Vec<OutlineBlock>;

/// Group blocks into batches whose summed `char_count` stays within
/// `max_chars`.
///
/// Single greedy pass in input order. A block that does not fit closes the
/// running batch and starts a new one, so a block larger than the budget
/// always travels alone. Blocks are never split or reordered.
pub fn batch_by_char_limit(blocks: Vec<OutlineBlock>, max_chars: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current: Batch = Vec::new();
    let mut current_chars = 0usize;

    for block in blocks {
        if current_chars + block.char_count <= max_chars {
            current_chars += block.char_count;
            current.push(block);
            continue;
        }

        if !current.is_empty() {
            batches.push(std::mem::take(&mut current));
        }
        if block.char_count > max_chars {
            warn!(
                page_number = block.page_number,
                char_count = block.char_count,
                max_chars,
                "block exceeds batch budget, sending it alone"
            );
        }
        current_chars = block.char_count;
        current.push(block);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
