//! Maximal Marginal Relevance selection.

/// Dot product; cosine similarity for unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// Greedily pick up to `k` of `candidates`, each time taking the one that
/// maximizes `lambda * relevance - (1 - lambda) * max_sim_to_selected`.
///
/// `candidates` are indices into `relevance` and `vectors`. Ties go to the
/// candidate listed first, so callers pass them best-first for a stable
/// result. Returns the chosen indices in selection order.
///
/// # Examples
///
/// ```
/// use docent_retrieve::mmr::select;
///
/// let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
/// let relevance = vec![0.9, 0.89, 0.5];
/// let picked = select(&[0, 1, 2], &relevance, &vectors, 2, 0.6);
/// assert_eq!(picked, vec![0, 2]);
/// ```
pub fn select(
    candidates: &[usize],
    relevance: &[f64],
    vectors: &[Vec<f32>],
    k: usize,
    lambda: f64,
) -> Vec<usize> {
    let mut remaining: Vec<usize> = candidates.to_vec();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f64::NEG_INFINITY;

        for (pos, &candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| dot(&vectors[candidate], &vectors[s]))
                .fold(None, |acc: Option<f64>, sim| Some(acc.map_or(sim, |a| a.max(sim))))
                .unwrap_or(0.0);
            let score = lambda * relevance[candidate] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_one_is_pure_relevance() {
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let relevance = vec![0.9, 0.8, 0.1];
        assert_eq!(select(&[0, 1, 2], &relevance, &vectors, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn near_duplicates_are_diversified() {
        let vectors = vec![
            vec![0.0, 1.0, 0.0],
            vec![0.99, 0.141, 0.0],
            vec![1.0, 0.0, 0.0],
        ];
        // 1 and 2 are near-duplicates with the highest relevance
        let relevance = vec![0.4, 0.92, 0.93];
        let picked = select(&[2, 1, 0], &relevance, &vectors, 2, 0.6);
        assert_eq!(picked, vec![2, 0]);
    }

    #[test]
    fn ties_prefer_earlier_candidate() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let relevance = vec![0.5, 0.5];
        assert_eq!(select(&[1, 0], &relevance, &vectors, 1, 0.6), vec![1]);
        assert_eq!(select(&[0, 1], &relevance, &vectors, 1, 0.6), vec![0]);
    }

    #[test]
    fn k_larger_than_pool_returns_all() {
        let vectors = vec![vec![1.0], vec![1.0]];
        let relevance = vec![0.3, 0.2];
        assert_eq!(select(&[0, 1], &relevance, &vectors, 10, 0.6).len(), 2);
    }

    #[test]
    fn empty_inputs() {
        assert!(select(&[], &[], &[], 3, 0.6).is_empty());
        let vectors = vec![vec![1.0]];
        assert!(select(&[0], &[1.0], &vectors, 0, 0.6).is_empty());
    }

    #[test]
    fn dot_of_unit_vectors() {
        assert!((dot(&[0.6, 0.8], &[0.6, 0.8]) - 1.0).abs() < 1e-6);
        assert_eq!(dot(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
