//! Keyword relevance: a corpus-wide IDF table and the query overlap score.

use std::collections::{HashMap, HashSet};

/// Weight for query tokens that occur in no chunk as a whole token.
pub const OOV_WEIGHT: f64 = 0.5;

/// Lowercase alphanumeric runs of `text`.
///
/// # Examples
///
/// ```
/// use docent_retrieve::lexical::tokenize;
///
/// let tokens: Vec<String> = tokenize("Wi-Fi setup, step 2").collect();
/// assert_eq!(tokens, vec!["wi", "fi", "setup", "step", "2"]);
/// ```
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Distinct tokens of `text`, in first-seen order.
pub fn distinct_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text).filter(|t| seen.insert(t.clone())).collect()
}

/// Inverse document frequency over a set of chunk texts:
/// `idf(t) = ln((N + 1) / (df(t) + 1)) + 1`.
///
/// # Examples
///
/// ```
/// use docent_retrieve::lexical::IdfTable;
///
/// let table = IdfTable::build(["parking permit", "parking garage", "expense report"]);
/// assert!(table.weight("permit") > table.weight("parking"));
/// assert_eq!(table.weight("unheard"), 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdfTable {
    weights: HashMap<String, f64>,
    docs: usize,
}

impl IdfTable {
    pub fn build<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut docs = 0;
        for text in texts {
            docs += 1;
            let unique: HashSet<String> = tokenize(text).collect();
            for token in unique {
                *df.entry(token).or_insert(0) += 1;
            }
        }

        let n = docs as f64;
        let weights = df
            .into_iter()
            .map(|(token, count)| {
                let idf = ((n + 1.0) / (count as f64 + 1.0)).ln() + 1.0;
                (token, idf)
            })
            .collect();
        Self { weights, docs }
    }

    /// Number of texts the table was built from.
    pub fn document_count(&self) -> usize {
        self.docs
    }

    /// IDF of `token`, or [`OOV_WEIGHT`] if it never occurs as a token.
    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(OOV_WEIGHT)
    }

    /// Sum of weights of the query tokens found in `lowered_text`.
    ///
    /// Matching is by substring on the lowercased chunk text, so a query
    /// token can match inside a longer word. Such partial matches that are
    /// not themselves corpus tokens score [`OOV_WEIGHT`].
    pub fn keyword_score(&self, query_tokens: &[String], lowered_text: &str) -> f64 {
        query_tokens
            .iter()
            .filter(|t| lowered_text.contains(t.as_str()))
            .map(|t| self.weight(t))
            .sum()
    }
}

/// Squash a raw keyword score into `[0, 1)`.
pub fn normalize_keyword_score(score: f64) -> f64 {
    (0.5 * score).tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_non_alphanumeric() {
        let tokens: Vec<String> = tokenize("  VPN: reset_password()  ").collect();
        assert_eq!(tokens, vec!["vpn", "reset", "password"]);
    }

    #[test]
    fn tokenize_keeps_unicode_letters() {
        let tokens: Vec<String> = tokenize("Überstunden München").collect();
        assert_eq!(tokens, vec!["überstunden", "münchen"]);
    }

    #[test]
    fn distinct_tokens_dedupes() {
        assert_eq!(distinct_tokens("the cat and THE dog"), vec!["the", "cat", "and", "dog"]);
    }

    #[test]
    fn idf_matches_formula() {
        let table = IdfTable::build(["a b", "a c", "a d", "e"]);
        assert_eq!(table.document_count(), 4);
        let expected_a = (5.0f64 / 4.0).ln() + 1.0;
        let expected_b = (5.0f64 / 2.0).ln() + 1.0;
        assert!((table.weight("a") - expected_a).abs() < 1e-12);
        assert!((table.weight("b") - expected_b).abs() < 1e-12);
    }

    #[test]
    fn repeated_token_counts_once_per_document() {
        let table = IdfTable::build(["leave leave leave", "other"]);
        let expected = (3.0f64 / 2.0).ln() + 1.0;
        assert!((table.weight("leave") - expected).abs() < 1e-12);
    }

    #[test]
    fn keyword_score_sums_present_tokens() {
        let table = IdfTable::build(["remote work policy", "office parking"]);
        let query = distinct_tokens("remote policy budget");
        let score = table.keyword_score(&query, "remote work policy");
        let expected = table.weight("remote") + table.weight("policy");
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn partial_match_uses_oov_weight() {
        let table = IdfTable::build(["vacation days"]);
        let query = distinct_tokens("vacat");
        assert_eq!(table.keyword_score(&query, "vacation days"), OOV_WEIGHT);
    }

    #[test]
    fn normalized_score_is_bounded() {
        assert_eq!(normalize_keyword_score(0.0), 0.0);
        assert!(normalize_keyword_score(100.0) <= 1.0);
        assert!(normalize_keyword_score(2.0) > normalize_keyword_score(1.0));
    }
}
