//! Weighted random selection.
//!
//! Every probabilistic choice in the engine goes through [weighted_index] so
//! that the cumulative comparison convention is the same everywhere: bucket
//! `i` covers `[Σ_{j<i} w_j, Σ_{j≤i} w_j)` of the normalized mass.

use rand::Rng;

/// Weight as used in selection: non-finite and negative weights count as zero.
fn effective(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Index selected by a uniform draw `r ∈ [0, 1)` over `weights`.
///
/// Returns the first `i` with `r < Σ_{j≤i} w_j / Σw`. Returns `None` when the
/// total weight is not positive. A draw that lands on floating-point slack past
/// the last bucket selects the last positive-weight index.
pub fn weighted_index(weights: &[f64], r: f64) -> Option<usize> {
    let total: f64 = weights.iter().map(|w| effective(*w)).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    let target = r.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, w) in weights.iter().enumerate() {
        let w = effective(*w);
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = Some(i);
        if target < cumulative {
            return Some(i);
        }
    }
    last_positive
}

/// Draw an index proportional to `weights` using `rng`.
pub fn choose_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let r: f64 = rng.gen();
    weighted_index(weights, r)
}

/// Weighted draw that falls back to the first candidate when all weights are
/// degenerate (zero, negative or NaN). `None` only for an empty slice.
pub fn choose_weighted_or_first<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    Some(choose_weighted(rng, weights).unwrap_or(0))
}

/// Uniform index in `0..len`, or `None` for an empty range.
pub fn choose_uniform<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(rng.gen_range(0..len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn index_lies_in_its_cumulative_bucket() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let n = rng.gen_range(1..8);
            let weights: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..5.0)).collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                continue;
            }
            let r: f64 = rng.gen();
            let i = weighted_index(&weights, r).expect("positive total");
            let below: f64 = weights[..i].iter().sum::<f64>() / total;
            let upto: f64 = weights[..=i].iter().sum::<f64>() / total;
            assert!(below <= r + 1e-12, "r={r} below={below}");
            assert!(r < upto + 1e-12, "r={r} upto={upto}");
        }
    }

    #[test]
    fn boundaries_are_upper_exclusive() {
        let weights = [1.0, 1.0, 2.0];
        assert_eq!(weighted_index(&weights, 0.0), Some(0));
        assert_eq!(weighted_index(&weights, 0.25), Some(1));
        assert_eq!(weighted_index(&weights, 0.4999), Some(1));
        assert_eq!(weighted_index(&weights, 0.5), Some(2));
        assert_eq!(weighted_index(&weights, 0.999_999), Some(2));
    }

    #[test]
    fn zero_weights_are_never_selected() {
        let weights = [0.0, 3.0, 0.0, f64::NAN, -1.0];
        for step in 0..100 {
            let r = step as f64 / 100.0;
            assert_eq!(weighted_index(&weights, r), Some(1));
        }
    }

    #[test]
    fn degenerate_weights_fall_back_to_first() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(weighted_index(&[0.0, 0.0], 0.3), None);
        assert_eq!(choose_weighted_or_first(&mut rng, &[0.0, f64::NAN]), Some(0));
        assert_eq!(choose_weighted_or_first(&mut rng, &[]), None);
    }

    #[test]
    fn empirical_frequencies_follow_weights() {
        let mut rng = StdRng::seed_from_u64(99);
        let weights = [1.0, 3.0];
        let mut counts = [0usize; 2];
        for _ in 0..20_000 {
            counts[choose_weighted(&mut rng, &weights).unwrap()] += 1;
        }
        let share = counts[1] as f64 / 20_000.0;
        assert!((share - 0.75).abs() < 0.02, "share={share}");
    }
}
