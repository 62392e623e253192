//! Sample statistics shared by normalization and the distance metrics.

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
pub fn variance(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// `max - min`, zero for an empty slice.
pub fn range(xs: &[f64]) -> f64 {
    let (lo, hi) = xs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    if xs.is_empty() {
        0.0
    } else {
        hi - lo
    }
}

pub fn mean_square(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().map(|x| x * x).sum::<f64>() / xs.len() as f64
}

/// Population covariance of two equally long slices.
pub fn covariance(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return 0.0;
    }
    let (mx, my) = (mean(xs), mean(ys));
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / xs.len() as f64
}

/// Pearson correlation, `None` when either side has no spread above `eps`.
pub fn pearson(xs: &[f64], ys: &[f64], eps: f64) -> Option<f64> {
    let (sx, sy) = (std_dev(xs), std_dev(ys));
    if sx < eps || sy < eps {
        return None;
    }
    Some((covariance(xs, ys) / (sx * sy)).clamp(-1.0, 1.0))
}

/// Value at quantile `q` of an ascending-sorted slice, linearly interpolated.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&xs) - 2.5).abs() < 1e-12);
        assert!((variance(&xs) - 1.25).abs() < 1e-12);
        assert!((range(&xs) - 3.0).abs() < 1e-12);
        assert!((mean_square(&xs) - 7.5).abs() < 1e-12);
        assert_eq!(range(&[]), 0.0);
    }

    #[test]
    fn pearson_of_affine_copies() {
        let xs = [0.3, -1.0, 2.0, 0.7];
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 1.0).collect();
        let neg: Vec<f64> = xs.iter().map(|x| -x).collect();
        assert!((pearson(&xs, &ys, 1e-12).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &neg, 1e-12).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&xs, &[1.0; 4], 1e-12).is_none());
    }

    #[test]
    fn quantiles_interpolate() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&xs, 0.5) - 2.0).abs() < 1e-12);
        assert!((quantile_sorted(&xs, 0.125) - 0.5).abs() < 1e-12);
        assert!((quantile_sorted(&xs, 1.0) - 4.0).abs() < 1e-12);
    }
}
