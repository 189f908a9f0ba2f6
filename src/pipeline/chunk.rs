//! Page-bounded chunking of document text.
//!
//! Pages are packed greedily into chunks under a soft character budget.
//! A page is never split: if adding the next page would push a non-empty
//! chunk over budget, the chunk is closed first, and a page that alone
//! exceeds the budget travels as its own oversized chunk. Hard truncation
//! happens later, in [`crate::prompts::trim_for_prompt`].
//!
//! Each page is preceded by a `===== PAGE i / N =====` marker so the model
//! knows where in the document a chunk sits.

/// Render the boundary marker placed before page `index` (0-based).
pub fn page_marker(index: usize, total: usize) -> String {
    format!("\n\n===== PAGE {} / {} =====\n", index + 1, total)
}

/// Split ordered page texts into chunks of at most `budget` characters.
///
/// Zero pages yield a single empty chunk so the pipeline always has
/// something to dispatch. Budgets count Unicode scalar values, markers
/// included.
pub fn chunk_pages<S: AsRef<str>>(pages: &[S], budget: usize) -> Vec<String> {
    if pages.is_empty() {
        return vec![String::new()];
    }

    let total = pages.len();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for (i, page) in pages.iter().enumerate() {
        let block = format!("{}{}", page_marker(i, total), page.as_ref());
        let block_chars = block.chars().count();

        if current_chars > 0 && current_chars + block_chars > budget {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        current.push_str(&block);
        current_chars += block_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
