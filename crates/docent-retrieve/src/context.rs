//! Budgeted prompt context with per-passage citations.

use docent_core::{BudgetUnit, ContextConfig, ScoredChunk};

/// Placed between rendered passages.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Conservative token estimate: characters / 4, rounded up.
///
/// # Examples
///
/// ```
/// use docent_retrieve::context::estimate_tokens;
///
/// assert_eq!(estimate_tokens(0), 0);
/// assert_eq!(estimate_tokens(4), 1);
/// assert_eq!(estimate_tokens(5), 2);
/// ```
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Renders ranked passages into a block that fits a size budget.
///
/// Passages are added in the order given while they fit. The first one that
/// does not fit is cut down to the remaining space if at least
/// `min_truncate_chars` remain, and dropped otherwise; nothing after it is
/// considered. The result never exceeds the budget.
///
/// # Examples
///
/// ```
/// use docent_core::{BudgetUnit, Chunk, ScoredChunk};
/// use docent_retrieve::context::ContextAssembler;
///
/// let hit = ScoredChunk {
///     chunk: Chunk {
///         id: "x".into(),
///         source_name: "handbook.pdf".into(),
///         source_path: "/docs/handbook.pdf".into(),
///         section: Some("Benefits".into()),
///         text: "Dental coverage starts after 90 days.".into(),
///         order: 4,
///     },
///     score: 0.7,
///     rank: 1,
///     neighbor: false,
/// };
/// let context = ContextAssembler::new(1000, BudgetUnit::Chars, 200).assemble(&[hit]);
/// assert_eq!(context, "[handbook.pdf > Benefits]\nDental coverage starts after 90 days.");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    budget: usize,
    unit: BudgetUnit,
    min_truncate_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget: usize, unit: BudgetUnit, min_truncate_chars: usize) -> Self {
        Self {
            budget,
            unit,
            min_truncate_chars,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.budget, config.unit, config.min_truncate_chars)
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Budget expressed in characters. `n` tokens allow `4n` characters,
    /// since `estimate_tokens(4n) == n`.
    pub fn char_capacity(&self) -> usize {
        match self.unit {
            BudgetUnit::Chars => self.budget,
            BudgetUnit::Tokens => self.budget.saturating_mul(4),
        }
    }

    /// Size of `text` in the budget's unit.
    pub fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self.unit {
            BudgetUnit::Chars => chars,
            BudgetUnit::Tokens => estimate_tokens(chars),
        }
    }

    pub fn assemble(&self, hits: &[ScoredChunk]) -> String {
        let capacity = self.char_capacity();
        let separator_len = SEPARATOR.chars().count();
        let mut out = String::new();
        let mut used = 0usize;

        for hit in hits {
            let block = render_block(hit);
            let block_len = block.chars().count();
            let sep = if out.is_empty() { 0 } else { separator_len };

            if used + sep + block_len <= capacity {
                if sep > 0 {
                    out.push_str(SEPARATOR);
                }
                out.push_str(&block);
                used += sep + block_len;
                continue;
            }

            let remaining = capacity.saturating_sub(used + sep);
            let header_len = block.find('\n').map_or(block_len, |i| block[..i].chars().count() + 1);
            if remaining >= self.min_truncate_chars && remaining > header_len {
                if sep > 0 {
                    out.push_str(SEPARATOR);
                }
                out.push_str(truncate_chars(&block, remaining).trim_end());
                tracing::debug!(id = %hit.chunk.id, kept = remaining, of = block_len, "truncated passage");
            } else {
                tracing::debug!(id = %hit.chunk.id, remaining, "dropped passage over budget");
            }
            break;
        }

        out
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

/// `[source (> section)]` header line followed by the passage text.
pub fn render_block(hit: &ScoredChunk) -> String {
    format!("[{}]\n{}", hit.chunk.label(), hit.chunk.text)
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::Chunk;

    fn hit(rank: usize, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("c{rank}"),
                source_name: "guide.md".into(),
                source_path: "/docs/guide.md".into(),
                section: None,
                text: text.to_string(),
                order: rank,
            },
            score: 1.0 / rank as f64,
            rank,
            neighbor: false,
        }
    }

    #[test]
    fn empty_hits_give_empty_context() {
        assert_eq!(ContextAssembler::default().assemble(&[]), "");
    }

    #[test]
    fn blocks_are_separated_and_labelled() {
        let hits = vec![hit(1, "first"), hit(2, "second")];
        let context = ContextAssembler::new(1000, BudgetUnit::Chars, 200).assemble(&hits);
        assert_eq!(context, "[guide.md]\nfirst\n\n---\n\n[guide.md]\nsecond");
    }

    #[test]
    fn overflowing_block_is_truncated_when_room_remains() {
        let hits = vec![hit(1, &"a".repeat(100)), hit(2, &"b".repeat(1000))];
        let assembler = ContextAssembler::new(500, BudgetUnit::Chars, 200);
        let context = assembler.assemble(&hits);
        assert!(context.chars().count() <= 500);
        assert!(context.contains("bbbb"));
        assert!(context.starts_with("[guide.md]\naaaa"));
    }

    #[test]
    fn overflowing_block_is_dropped_when_little_room_remains() {
        let hits = vec![hit(1, &"a".repeat(300)), hit(2, &"b".repeat(1000)), hit(3, "c")];
        let context = ContextAssembler::new(450, BudgetUnit::Chars, 200).assemble(&hits);
        assert!(!context.contains('b'));
        // assembly stops at the first overflow, even if a later block would fit
        assert!(!context.contains("\nc"));
        assert_eq!(context.chars().count(), "[guide.md]\n".len() + 300);
    }

    #[test]
    fn first_block_can_be_truncated() {
        let hits = vec![hit(1, &"z".repeat(5000))];
        let context = ContextAssembler::new(300, BudgetUnit::Chars, 200).assemble(&hits);
        assert_eq!(context.chars().count(), 300);
        assert!(context.starts_with("[guide.md]\n"));
    }

    #[test]
    fn token_budget_is_respected() {
        let hits: Vec<ScoredChunk> = (1..=20).map(|i| hit(i, &"word ".repeat(60))).collect();
        let assembler = ContextAssembler::new(250, BudgetUnit::Tokens, 200);
        let context = assembler.assemble(&hits);
        assert!(assembler.measure(&context) <= 250);
        assert!(!context.is_empty());
    }

    #[test]
    fn never_exceeds_budget() {
        for budget in [0, 10, 150, 199, 200, 201, 777, 2000] {
            let hits: Vec<ScoredChunk> = (1..=8).map(|i| hit(i, &"x".repeat(i * 97))).collect();
            let context = ContextAssembler::new(budget, BudgetUnit::Chars, 200).assemble(&hits);
            assert!(context.chars().count() <= budget, "budget {budget}");
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let hits = vec![hit(1, &"é".repeat(1000))];
        let context = ContextAssembler::new(250, BudgetUnit::Chars, 200).assemble(&hits);
        assert_eq!(context.chars().count(), 250);
    }
}
