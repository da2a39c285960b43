//! Small numeric helpers shared by the transforms and strategies.

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub(crate) fn std_dev(values: &[f64], ddof: usize) -> f64 {
    if values.len() <= ddof {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - ddof) as f64).sqrt()
}

/// Percentile `q` (0–100) with linear interpolation between closest ranks.
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Squash a non-negative raw score into `[0, 1)` relative to a cut-off, so
/// the cut-off itself maps to 0.5.
pub(crate) fn relative_to_cutoff(raw: f64, cutoff: f64) -> f64 {
    if !raw.is_finite() {
        return 1.0;
    }
    let raw = raw.max(0.0);
    if cutoff <= f64::EPSILON {
        return if raw > 0.0 { 1.0 } else { 0.0 };
    }
    raw / (raw + cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_ddof() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v, 0) - 2.0).abs() < 1e-12);
        assert!(std_dev(&v, 1) > 2.0);
        assert_eq!(std_dev(&[1.0], 1), 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&v, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&v, 100.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&v, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn cutoff_maps_to_half() {
        assert!((relative_to_cutoff(2.0, 2.0) - 0.5).abs() < 1e-12);
        assert!(relative_to_cutoff(100.0, 2.0) < 1.0);
        assert_eq!(relative_to_cutoff(0.0, 0.0), 0.0);
        assert_eq!(relative_to_cutoff(f64::NAN, 1.0), 1.0);
    }
}
