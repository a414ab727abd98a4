//! Prediction-interval engine (C14).
//!
//! Given in-sample residuals and a variance-growth rule, produces
//! lower/upper bounds at a requested confidence level. Two growth rules
//! are offered: the flat/drift closed forms the distilled spec gives
//! literally for the simple baselines (C6), and a general innovations
//! state-space variance accumulation (Hyndman, Koehler, Ord & Snyder's
//! single-source-of-error representation) used by the ETS family (C3),
//! which the spec leaves as "the closed-form growing variance" without
//! pinning an exact formula — see `DESIGN.md`.

use statrs::distribution::{ContinuousCDF, Normal};

/// Standard-normal quantile at `(1+confidence_level)/2`, i.e. the
/// two-sided critical value `z` such that `point +/- z*sigma` covers
/// `confidence_level` of the mass under Gaussian innovations.
pub fn z_quantile(confidence_level: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    normal.inverse_cdf((1.0 + confidence_level) / 2.0)
}

/// Residual variance `sigma^2 = RSS / (N - k)` with `k` free parameters.
/// Falls back to the raw mean-square when `N <= k` (degenerate fits with
/// very short series) rather than dividing by zero or a negative number.
pub fn innovation_variance(residuals: &[f64], k: usize) -> f64 {
    let n = residuals.len();
    let rss: f64 = residuals.iter().map(|e| e * e).sum();
    if n > k {
        rss / (n - k) as f64
    } else if n > 0 {
        rss / n as f64
    } else {
        0.0
    }
}

/// Turns per-horizon variance multipliers (`Var_h / sigma^2`) into
/// lower/upper bounds around `point`. When `log_scale` is set (used for
/// strictly positive series under multiplicative error) the bound is
/// computed in log space and exponentiated back, which keeps the lower
/// bound positive instead of letting it cross zero.
pub fn bounds_from_multipliers(
    point: &[f64],
    multipliers: &[f64],
    sigma2: f64,
    confidence_level: f64,
    log_scale: bool,
) -> (Vec<f64>, Vec<f64>) {
    let z = z_quantile(confidence_level);
    let mut lower = Vec::with_capacity(point.len());
    let mut upper = Vec::with_capacity(point.len());
    for (i, &p) in point.iter().enumerate() {
        let var_h = sigma2 * multipliers.get(i).copied().unwrap_or(1.0);
        let half_width = z * var_h.max(0.0).sqrt();
        if log_scale && p > 0.0 {
            let log_p = p.ln();
            lower.push((log_p - half_width).exp());
            upper.push((log_p + half_width).exp());
        } else {
            lower.push(p - half_width);
            upper.push(p + half_width);
        }
    }
    (lower, upper)
}

/// `f_variant(h) = h`, the spec's literal rule for Naive/SES/SMA (C6).
pub fn flat_multipliers(horizon: usize) -> Vec<f64> {
    (1..=horizon).map(|h| h as f64).collect()
}

/// `f_variant(h) = h * (1 + h/N)`, the spec's literal rule for
/// RandomWalkDrift (C6).
pub fn drift_multipliers(horizon: usize, n: usize) -> Vec<f64> {
    (1..=horizon)
        .map(|h| {
            let h = h as f64;
            h * (1.0 + h / n.max(1) as f64)
        })
        .collect()
}

/// The single-source-of-error innovations state-space form `(w, F, g)` of
/// an additive-error ETS configuration, used purely to derive exact
/// horizon-growing prediction-interval variances — not to run the fit
/// recursion itself (that lives in `crate::ets`).
///
/// State vector ordering: `[level, trend?, s_{t-1}, ..., s_{t-m}]` (the
/// seasonal block mirrors the rotating buffer's "oldest last" convention
/// from `spec.md` §3).
pub struct InnovationsStateSpace {
    w: Vec<f64>,
    f: Vec<Vec<f64>>,
    g: Vec<f64>,
}

impl InnovationsStateSpace {
    pub fn new(has_trend: bool, phi: f64, alpha: f64, beta: f64, seasonal_m: usize, gamma: f64) -> Self {
        let has_seasonal = seasonal_m > 1;
        let dim = 1 + has_trend as usize + if has_seasonal { seasonal_m } else { 0 };
        let mut w = vec![0.0; dim];
        let mut g = vec![0.0; dim];
        let mut f = vec![vec![0.0; dim]; dim];

        w[0] = 1.0;
        g[0] = alpha;
        f[0][0] = 1.0;

        let mut next = 1;
        if has_trend {
            let bi = next;
            next += 1;
            w[bi] = phi;
            g[bi] = beta;
            f[0][bi] = phi;
            f[bi][bi] = phi;
        }
        if has_seasonal {
            let start = next;
            let last = start + seasonal_m - 1;
            w[last] = 1.0;
            g[start] = gamma;
            f[start][last] = 1.0;
            for k in 1..seasonal_m {
                f[start + k][start + k - 1] = 1.0;
            }
        }
        Self { w, f, g }
    }

    fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        self.f
            .iter()
            .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
            .collect()
    }

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    /// Returns `Var_h / sigma^2` for `h = 1..=horizon`:
    /// `Var(h) = sigma^2 * (1 + sum_{j=1}^{h-1} c_j^2)`, `c_j = w' F^{j-1} g`.
    pub fn variance_multipliers(&self, horizon: usize) -> Vec<f64> {
        let mut multipliers = Vec::with_capacity(horizon);
        let mut acc = 1.0;
        multipliers.push(acc);
        let mut fj_g = self.g.clone();
        for _ in 1..horizon {
            let c = Self::dot(&self.w, &fj_g);
            acc += c * c;
            multipliers.push(acc);
            fj_g = self.mat_vec(&fj_g);
        }
        multipliers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_quantile_90_is_about_1_645() {
        assert!((z_quantile(0.90) - 1.6448536).abs() < 1e-4);
    }

    #[test]
    fn naive_state_space_recovers_linear_growth() {
        // ETS(A,N,N) with alpha = 1 degenerates to Naive: Var(h) = h * sigma^2.
        let ssm = InnovationsStateSpace::new(false, 1.0, 1.0, 0.0, 1, 0.0);
        let mult = ssm.variance_multipliers(5);
        assert_eq!(mult, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn ses_variance_grows_sub_linearly() {
        let ssm = InnovationsStateSpace::new(false, 1.0, 0.3, 0.0, 1, 0.0);
        let mult = ssm.variance_multipliers(4);
        // 1 + (h-1)*alpha^2
        let expected: Vec<f64> = (0..4).map(|j| 1.0 + j as f64 * 0.09).collect();
        for (a, b) in mult.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn bounds_are_symmetric_around_point() {
        let point = vec![10.0, 10.0];
        let mult = vec![1.0, 2.0];
        let (lower, upper) = bounds_from_multipliers(&point, &mult, 1.0, 0.90, false);
        for i in 0..2 {
            assert!((lower[i] + upper[i]) / 2.0 - point[i] < 1e-9);
            assert!(lower[i] <= point[i] && point[i] <= upper[i]);
        }
    }
}
