//! Reduced TBATS (C9): trigonometric seasonal components (configurable
//! harmonic count per period) combined with a damped-trend ETS state.
//! `AutoTBATS` enumerates harmonic counts and selects by AICc, reusing
//! the ETS core's information-criterion bookkeeping.

use crate::error::{ErrorKind, Result};
use crate::ets::simple_linear_regression;
use crate::intervals::{bounds_from_multipliers, innovation_variance};
use crate::optim::{lbfgs, Bounds, CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

/// One trigonometric seasonal block at period `m` with `k` harmonics:
/// state is `2k` coefficients `(a_1, b_1, ..., a_k, b_k)`, recursion per
/// De Livera/Hyndman/Snyder/Grose (2011), simplified to fixed smoothing
/// shared across all harmonics of a block (the "reduced" part of this
/// port).
#[derive(Debug, Clone)]
struct TrigBlock {
    period: f64,
    harmonics: usize,
    state: Vec<f64>,
}

impl TrigBlock {
    fn new(period: f64, harmonics: usize) -> Self {
        Self { period, harmonics, state: vec![0.0; 2 * harmonics] }
    }

    fn lambda(&self, j: usize) -> f64 {
        2.0 * std::f64::consts::PI * (j as f64 + 1.0) / self.period
    }

    fn seasonal_value(&self) -> f64 {
        self.state.iter().step_by(2).sum()
    }

    fn step(&mut self, gamma1: f64, gamma2: f64, error: f64) {
        let mut next = vec![0.0; self.state.len()];
        for j in 0..self.harmonics {
            let lam = self.lambda(j);
            let (cos_l, sin_l) = (lam.cos(), lam.sin());
            let a = self.state[2 * j];
            let b = self.state[2 * j + 1];
            next[2 * j] = a * cos_l + b * sin_l + gamma1 * error;
            next[2 * j + 1] = -a * sin_l + b * cos_l + gamma2 * error;
        }
        self.state = next;
    }
}

/// Reduced TBATS model: one damped-trend ETS-style level/trend pair plus
/// one `TrigBlock` per configured seasonal period.
#[derive(Debug, Clone)]
pub struct Tbats {
    phi: f64,
    alpha: f64,
    beta: f64,
    gamma1: f64,
    gamma2: f64,
    level: f64,
    trend: f64,
    blocks: Vec<TrigBlock>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    n: usize,
    k: usize,
}

fn run(
    y: &[f64],
    periods: &[usize],
    harmonics: &[usize],
    phi: f64,
    alpha: f64,
    beta: f64,
    gamma1: f64,
    gamma2: f64,
) -> (f64, f64, Vec<TrigBlock>, Vec<f64>, f64) {
    let (mut level, mut trend) = simple_linear_regression(&y[..y.len().min(10).max(2)]);
    let mut blocks: Vec<TrigBlock> = periods.iter().zip(harmonics).map(|(p, h)| TrigBlock::new(*p as f64, *h)).collect();
    let mut fitted = Vec::with_capacity(y.len());
    let mut rss = 0.0;

    for &yt in y {
        let seasonal: f64 = blocks.iter().map(|b| b.seasonal_value()).sum();
        let predicted = level + phi * trend + seasonal;
        fitted.push(predicted);
        let error = yt - predicted;
        rss += error * error;

        let new_level = level + phi * trend + alpha * error;
        let new_trend = phi * trend + beta * error;
        for block in &mut blocks {
            block.step(gamma1, gamma2, error);
        }
        level = new_level;
        trend = new_trend;
    }
    (level, trend, blocks, fitted, rss)
}

impl Tbats {
    pub fn new() -> Self {
        Self {
            phi: 0.98,
            alpha: 0.3,
            beta: 0.05,
            gamma1: 0.05,
            gamma2: 0.05,
            level: 0.0,
            trend: 0.0,
            blocks: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
            n: 0,
            k: 0,
        }
    }

    pub fn fit_with_harmonics(&mut self, series: &TimeSeries, params: &ModelParams, harmonics: &[usize], cancel: &CancelFlag) -> Result<f64> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let periods = params.seasonal_periods(&[]);
        if periods.is_empty() {
            return Err(ErrorKind::InvalidParameter {
                param: "seasonal_periods".to_string(),
                value: "[]".to_string(),
                reason: "TBATS requires at least one seasonal period".to_string(),
            });
        }
        if periods.len() != harmonics.len() {
            return Err(ErrorKind::InvalidParameter {
                param: "harmonics".to_string(),
                value: format!("{:?}", harmonics),
                reason: "must have one harmonic count per seasonal period".to_string(),
            });
        }
        let min_len = periods.iter().copied().max().unwrap_or(1) * 2 + 3;
        if y.len() < min_len {
            return Err(ErrorKind::InsufficientData { needed: min_len, got: y.len() });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }

        let bounds = Bounds::new(
            vec![0.80, 1e-4, 1e-4, 1e-4, 1e-4],
            vec![0.98, 0.9999, 0.9999, 0.9999, 0.9999],
        );
        let obj = |x: &[f64]| -> f64 {
            let (_, _, _, _, rss) = run(y, &periods, harmonics, x[0], x[1], x[2], x[3], x[4]);
            (rss / y.len() as f64).max(1e-12).ln()
        };
        let seed = [0.95, 0.3, 0.05, 0.05, 0.05];
        let result = lbfgs(obj, &seed, &bounds, 1e-6, 200, cancel);

        let (level, trend, blocks, fitted, rss) = run(y, &periods, harmonics, result.x[0], result.x[1], result.x[2], result.x[3], result.x[4]);

        self.phi = result.x[0];
        self.alpha = result.x[1];
        self.beta = result.x[2];
        self.gamma1 = result.x[3];
        self.gamma2 = result.x[4];
        self.level = level;
        self.trend = trend;
        self.blocks = blocks;
        self.residuals = y.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        self.fitted = fitted;
        self.n = y.len();
        self.k = 5 + harmonics.iter().map(|h| 2 * h).sum::<usize>();

        let mse = (rss / y.len() as f64).max(1e-12);
        Ok(y.len() as f64 * mse.ln() + 2.0 * self.k as f64)
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        let periods = params.seasonal_periods(&[]);
        let harmonics: Vec<usize> = periods
            .iter()
            .map(|p| params.get_usize("harmonics").unwrap_or(3).min((*p / 2).max(1)))
            .collect();
        self.fit_with_harmonics(series, params, &harmonics, cancel)?;
        Ok(())
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
        let mut blocks = self.blocks.clone();
        let mut level = self.level;
        let mut trend = self.trend;
        let mut point = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let seasonal: f64 = blocks.iter().map(|b| b.seasonal_value()).sum();
            let forecast = level + self.phi * trend + seasonal;
            point.push(forecast);
            level += self.phi * trend;
            trend *= self.phi;
            for block in &mut blocks {
                block.step(0.0, 0.0, 0.0);
            }
        }
        let sigma2 = innovation_variance(&self.residuals, self.k);
        let multipliers: Vec<f64> = (1..=horizon).map(|h| h as f64).collect();
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: format!("TBATS({} harmonics)", self.blocks.iter().map(|b| b.harmonics).collect::<Vec<_>>().iter().map(|h| h.to_string()).collect::<Vec<_>>().join(",")),
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

    pub fn aic(&self) -> Option<f64> {
        if self.n == 0 {
            return None;
        }
        let rss: f64 = self.residuals.iter().map(|e| e * e).sum();
        let mse = (rss / self.n as f64).max(1e-12);
        Some(self.n as f64 * mse.ln() + 2.0 * self.k as f64)
    }
}

/// Enumerates harmonic counts `1..=max_harmonics` per configured period
/// and selects the combination with smallest AIC (`spec.md` §4.9).
pub struct AutoTbats {
    pub best: Tbats,
}

impl AutoTbats {
    pub fn fit(series: &TimeSeries, params: &ModelParams, max_harmonics: usize, cancel: &CancelFlag) -> Result<Self> {
        let periods = params.seasonal_periods(&[]);
        if periods.is_empty() {
            return Err(ErrorKind::InvalidParameter {
                param: "seasonal_periods".to_string(),
                value: "[]".to_string(),
                reason: "AutoTBATS requires at least one seasonal period".to_string(),
            });
        }
        let candidate_counts: Vec<usize> = (1..=max_harmonics.max(1)).collect();

        let mut best: Option<(Tbats, f64)> = None;
        for &h in &candidate_counts {
            if cancel.cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            let harmonics: Vec<usize> = periods.iter().map(|p| h.min((*p / 2).max(1))).collect();
            let mut model = Tbats::new();
            if let Ok(aic) = model.fit_with_harmonics(series, params, &harmonics, cancel) {
                let better = match &best {
                    None => true,
                    Some((_, best_aic)) => aic < *best_aic,
                };
                if better {
                    best = Some((model, aic));
                }
            }
        }

        match best {
            Some((model, _)) => Ok(Self { best: model }),
            None => Err(ErrorKind::ModelFitFailed("no TBATS harmonic count converged".to_string())),
        }
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        self.best.predict(horizon, confidence_level)
    }

    pub fn fitted_values(&self) -> &[f64] {
        self.best.fitted_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_single_seasonal_period() {
        let mut y = Vec::new();
        for day in 0..100 {
            y.push(30.0 + 5.0 * (2.0 * std::f64::consts::PI * day as f64 / 7.0).sin());
        }
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_periods", vec![7.0]);
        let mut model = Tbats::new();
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(7, 0.90).unwrap();
        assert_eq!(result.point.len(), 7);
        assert!(result.point.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn auto_tbats_selects_a_harmonic_count() {
        let mut y = Vec::new();
        for day in 0..80 {
            y.push(10.0 + 2.0 * (2.0 * std::f64::consts::PI * day as f64 / 7.0).sin());
        }
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_periods", vec![7.0]);
        let auto = AutoTbats::fit(&series, &params, 3, &CancelFlag::new()).unwrap();
        let result = auto.predict(5, 0.90).unwrap();
        assert_eq!(result.point.len(), 5);
    }
}
