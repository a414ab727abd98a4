//! MFLES (C9): multi-seasonal generalization using bounded piecewise-
//! linear trend segments and a boosting-style additive expansion.
//!
//! Each round fits a small piecewise-linear correction to the current
//! residual (bounded by the residual's own scale so rounds cannot
//! diverge) then, for every configured seasonal period, folds in that
//! period's seasonal means of the residual. This mirrors the moving-
//! average seasonal-means step used in `mstl`, applied repeatedly as an
//! additive boosting expansion instead of a single decomposition pass.

use crate::error::{ErrorKind, Result};
use crate::intervals::{bounds_from_multipliers, flat_multipliers, innovation_variance};
use crate::optim::{CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

const DEFAULT_ITERATIONS: usize = 10;
const DEFAULT_MAX_ROUNDS: usize = 20;
const LEARNING_RATE: f64 = 0.3;

/// One bounded piecewise-linear segment fit by OLS over its window,
/// shrunk by `LEARNING_RATE` (the boosting step size).
fn piecewise_linear_round(residual: &[f64], n_segments: usize) -> Vec<f64> {
    let n = residual.len();
    let seg_len = (n / n_segments.max(1)).max(1);
    let mut correction = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let end = (start + seg_len).min(n);
        let window = &residual[start..end];
        let (intercept, slope) = crate::ets::simple_linear_regression(window);
        for (i, c) in correction[start..end].iter_mut().enumerate() {
            *c = (intercept + slope * i as f64) * LEARNING_RATE;
        }
        start = end;
    }
    correction
}

fn seasonal_round(residual: &[f64], period: usize) -> Vec<f64> {
    let n = residual.len();
    let mut means = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, v) in residual.iter().enumerate() {
        means[i % period] += v;
        counts[i % period] += 1;
    }
    for (m, c) in means.iter_mut().zip(&counts) {
        if *c > 0 {
            *m = *m / *c as f64 * LEARNING_RATE;
        }
    }
    (0..n).map(|i| means[i % period]).collect()
}

/// MFLES: `seasonal_periods`, `n_iterations` (default 10), `max_rounds`.
#[derive(Debug, Clone)]
pub struct Mfles {
    level: f64,
    trend_segments: Vec<Vec<f64>>,
    seasonal_totals: Vec<(usize, f64)>,
    seasonal_means: Vec<(usize, Vec<f64>)>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    n: usize,
    n_segments: usize,
}

impl Mfles {
    pub fn new() -> Self {
        Self {
            level: 0.0,
            trend_segments: Vec::new(),
            seasonal_totals: Vec::new(),
            seasonal_means: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
            n: 0,
            n_segments: 4,
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let periods = params.seasonal_periods(&[]);
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }
        let min_len = periods.iter().copied().max().unwrap_or(1) * 2 + 3;
        if y.len() < min_len {
            return Err(ErrorKind::InsufficientData { needed: min_len, got: y.len() });
        }
        let n_iterations = params.get_usize("n_iterations").unwrap_or(DEFAULT_ITERATIONS).max(1);
        let max_rounds = params.get_usize("max_rounds").unwrap_or(DEFAULT_MAX_ROUNDS).max(n_iterations);

        let level = y.iter().sum::<f64>() / y.len() as f64;
        let mut residual: Vec<f64> = y.iter().map(|v| v - level).collect();
        let mut fitted = vec![level; y.len()];
        let mut seasonal_means: Vec<(usize, Vec<f64>)> = periods.iter().map(|p| (*p, vec![0.0; *p])).collect();
        let mut trend_segments: Vec<Vec<f64>> = Vec::new();

        let rounds = n_iterations.min(max_rounds);
        for _round in 0..rounds {
            if cancel.cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            let correction = piecewise_linear_round(&residual, self.n_segments);
            for i in 0..y.len() {
                residual[i] -= correction[i];
                fitted[i] += correction[i];
            }
            trend_segments.push(correction);

            for (period, means) in seasonal_means.iter_mut() {
                let round_means = seasonal_round(&residual, *period);
                for i in 0..y.len() {
                    residual[i] -= round_means[i];
                    fitted[i] += round_means[i];
                }
                for (phase, m) in means.iter_mut().enumerate() {
                    *m += round_means[phase % *period];
                }
            }
        }

        self.level = level;
        self.trend_segments = trend_segments;
        self.seasonal_totals = seasonal_means.iter().map(|(p, m)| (*p, m.iter().sum::<f64>() / m.len() as f64)).collect();
        self.seasonal_means = seasonal_means;
        self.residuals = y.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        self.fitted = fitted;
        self.n = y.len();
        Ok(())
    }

    fn trend_extrapolation(&self, h: usize) -> f64 {
        // Repeat the final segment's local slope, matching the bounded
        // piecewise-linear segments used during fitting.
        let Some(last_segment) = self.trend_segments.last() else { return 0.0 };
        if last_segment.len() < 2 {
            return last_segment.last().copied().unwrap_or(0.0);
        }
        let slope = last_segment[last_segment.len() - 1] - last_segment[last_segment.len() - 2];
        last_segment[last_segment.len() - 1] + slope * h as f64
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(ErrorKind::InvalidParameter {
                param: "confidence_level".to_string(),
                value: confidence_level.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }
        if self.n == 0 {
            return Err(ErrorKind::PredictBeforeFit);
        }
        let point: Vec<f64> = (1..=horizon)
            .map(|h| {
                let seasonal_sum: f64 = self
                    .seasonal_means
                    .iter()
                    .map(|(period, means)| means[(self.n + h - 1) % period])
                    .sum();
                self.level + self.trend_extrapolation(h) + seasonal_sum
            })
            .collect();
        let sigma2 = innovation_variance(&self.residuals, self.trend_segments.len().max(1));
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "MFLES".to_string(),
            confidence_level,
            fitted: None,
            aic: None,
            bic: None,
            aicc: None,
        })
    }

    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_and_forecasts_multiseasonal_series() {
        let mut y = Vec::new();
        for day in 0..140 {
            let weekly = 4.0 * (2.0 * std::f64::consts::PI * day as f64 / 7.0).sin();
            y.push(20.0 + 0.02 * day as f64 + weekly);
        }
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_periods", vec![7.0]);
        params.insert("n_iterations", 6i64);
        let mut model = Mfles::new();
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(7, 0.90).unwrap();
        assert_eq!(result.point.len(), 7);
        assert!(result.point.iter().all(|p| p.is_finite()));
    }
}
