//! Univariate feature selection by F-regression score

/// F statistic of a single-column linear fit against the target.
///
/// Constant columns and samples too small to estimate score zero.
pub fn f_regression(column: &[f64], target: &[f64]) -> f64 {
    let n = column.len().min(target.len());
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = column[..n].iter().sum::<f64>() / nf;
    let mean_y = target[..n].iter().sum::<f64>() / nf;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in column[..n].iter().zip(&target[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return 0.0;
    }

    let r2 = (sxy * sxy) / (sxx * syy);
    let residual = 1.0 - r2;
    if residual <= f64::EPSILON {
        return f64::MAX;
    }
    let score = r2 / residual * (nf - 2.0);
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Indices of the `k` best-scoring columns, returned in candidate order.
///
/// Ties keep the earlier candidate.
pub fn select_k_best(columns: &[Vec<f64>], target: &[f64], k: usize) -> Vec<usize> {
    if k >= columns.len() {
        return (0..columns.len()).collect();
    }
    let scores: Vec<f64> = columns.iter().map(|c| f_regression(c, target)).collect();
    let mut ranked: Vec<usize> = (0..columns.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    let mut chosen: Vec<usize> = ranked.into_iter().take(k).collect();
    chosen.sort_unstable();
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_correlation_scores_highest() {
        let target = [1.0, 2.0, 3.0, 4.0, 5.0];
        let exact = [2.0, 4.0, 6.0, 8.0, 10.0];
        let noisy = [1.0, 3.0, 2.0, 5.0, 4.0];
        assert!(f_regression(&exact, &target) > f_regression(&noisy, &target));
    }

    #[test]
    fn test_constant_column_scores_zero() {
        let target = [1.0, 2.0, 3.0];
        assert_eq!(f_regression(&[7.0, 7.0, 7.0], &target), 0.0);
    }

    #[test]
    fn test_small_sample_scores_zero() {
        assert_eq!(f_regression(&[1.0, 2.0], &[3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_select_keeps_candidate_order() {
        let target = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let columns = vec![
            vec![5.0, 5.0, 5.0, 5.0, 5.0],
            vec![1.0, 3.0, 2.0, 5.0, 4.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        ];
        assert_eq!(select_k_best(&columns, &target, 2), vec![1, 2]);
    }

    #[test]
    fn test_ties_prefer_earlier_candidates() {
        let target = vec![1.0, 2.0, 3.0];
        let columns = vec![vec![0.0; 3], vec![0.0; 3], vec![0.0; 3]];
        assert_eq!(select_k_best(&columns, &target, 2), vec![0, 1]);
    }

    #[test]
    fn test_k_larger_than_candidates_keeps_all() {
        let columns = vec![vec![1.0, 2.0, 3.0]];
        assert_eq!(select_k_best(&columns, &[1.0, 2.0, 3.0], 50), vec![0]);
    }
}
