//! Hit probability for draws without replacement

/// Probability that `draws` codes drawn without replacement from a pool of
/// `total` include at least one of `target` designated codes.
///
/// Computes `1 - C(total - target, draws) / C(total, draws)` as the
/// running product `Π (total - target - i) / (total - i)`, which stays
/// within `[0, 1]` at every step instead of overflowing like factorials.
///
/// Non-positive inputs give `0.0`; `draws` and `target` are clamped to
/// `total`; once `draws` exceeds the number of non-target codes the result
/// is exactly `1.0`.
pub fn cumulative_hit_probability(total: i64, target: i64, draws: i64) -> f64 {
    if draws <= 0 || target <= 0 || total <= 0 {
        return 0.0;
    }

    let draws = draws.min(total);
    let target = target.min(total);
    let misses = total - target;

    if draws > misses {
        return 1.0;
    }

    let mut miss_probability = 1.0f64;
    for i in 0..draws {
        miss_probability *= (misses - i) as f64 / (total - i) as f64;
    }

    (1.0 - miss_probability).clamp(0.0, 1.0)
}
