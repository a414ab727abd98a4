//! Theta/Pegels core (C5): a single unified state-space recursion backing
//! all four Theta variants (`spec.md` §4.5).
//!
//! The state `(level, mean_y, an, bn, mu)` tracks a Pegels-style running
//! level alongside the sufficient statistics of an incremental OLS
//! regression of `y` on time (`an`/`bn` accumulate Welford's online
//! covariance/variance terms, so `an/bn` is the running trend slope
//! without re-summing the whole history). `mu` is the theta-weighted
//! drift applied on top of the level at forecast time.

use crate::ets::simple_linear_regression;
use crate::error::{ErrorKind, Result};
use crate::intervals::{bounds_from_multipliers, innovation_variance};
use crate::optim::{nelder_mead, Bounds, CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

const ALPHA_LOWER: f64 = 1e-4;
const ALPHA_UPPER: f64 = 0.9999;
const THETA_LOWER: f64 = 1.0;
const THETA_UPPER: f64 = 3.0;

/// Which of `alpha`/`theta` are searched vs. fixed, and whether the trend
/// slope is recomputed every step ("dynamic") or frozen at its full-sample
/// value (`spec.md` §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThetaVariant {
    Theta,
    OptimizedTheta,
    DynamicTheta,
    DynamicOptimizedTheta,
}

impl ThetaVariant {
    fn is_optimized(self) -> bool {
        matches!(self, ThetaVariant::OptimizedTheta | ThetaVariant::DynamicOptimizedTheta)
    }

    fn is_dynamic(self) -> bool {
        matches!(self, ThetaVariant::DynamicTheta | ThetaVariant::DynamicOptimizedTheta)
    }

    fn name(self) -> &'static str {
        match self {
            ThetaVariant::Theta => "Theta",
            ThetaVariant::OptimizedTheta => "OptimizedTheta",
            ThetaVariant::DynamicTheta => "DynamicTheta",
            ThetaVariant::DynamicOptimizedTheta => "DynamicOptimizedTheta",
        }
    }
}

/// The unified Pegels state vector (`spec.md` §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct ThetaState {
    pub level: f64,
    pub mean_y: f64,
    pub an: f64,
    pub bn: f64,
    pub mu: f64,
    mean_t: f64,
    n: f64,
}

impl ThetaState {
    /// `init_state`: seeds the level at the first observation and the
    /// running regression accumulators empty; `mean_y` is filled in as
    /// observations are folded through `update`.
    pub fn init(y0: f64) -> Self {
        Self {
            level: y0,
            mean_y: 0.0,
            an: 0.0,
            bn: 0.0,
            mu: 0.0,
            mean_t: 0.0,
            n: 0.0,
        }
    }

    /// Folds observation `y_t` (at integer time index `t`) into the
    /// state: SES-style level update at rate `alpha`, Welford-style
    /// incremental update of the time-regression accumulators.
    pub fn update(&mut self, t: f64, y_t: f64, alpha: f64, theta: f64, dynamic: bool) {
        self.n += 1.0;
        let dt = t - self.mean_t;
        self.mean_t += dt / self.n;
        let dy = y_t - self.mean_y;
        self.mean_y += dy / self.n;
        self.an += dt * (y_t - self.mean_y);
        self.bn += dt * (t - self.mean_t);
        self.level += alpha * (y_t - self.level);
        if dynamic {
            self.mu = self.drift(theta);
        }
    }

    fn slope(&self) -> f64 {
        if self.bn.abs() > 1e-12 {
            self.an / self.bn
        } else {
            0.0
        }
    }

    /// The theta-weighted drift `(theta-1)/theta * b`: at `theta=1` the
    /// Theta line collapses to pure SES (no drift); larger theta injects
    /// more of the long-run linear trend.
    fn drift(&self, theta: f64) -> f64 {
        ((theta - 1.0) / theta) * self.slope()
    }

    /// `forecast(h)`: the level plus `h` steps of theta-weighted drift.
    pub fn forecast(&self, h: usize) -> f64 {
        self.level + self.mu * h as f64
    }
}

/// `calc(y, alpha, theta)`: sum of squared one-step errors, the joint
/// optimization objective for `OptimizedTheta`/`DynamicOptimizedTheta`.
fn calc(y: &[f64], alpha: f64, theta: f64, dynamic: bool) -> (f64, Vec<f64>) {
    let mut state = ThetaState::init(y[0]);
    let mut fitted = Vec::with_capacity(y.len());
    let mut sse = 0.0;
    for (t, &yt) in y.iter().enumerate() {
        let predicted = state.forecast(0);
        fitted.push(predicted);
        sse += (yt - predicted).powi(2);
        state.update(t as f64, yt, alpha, theta, dynamic);
    }
    if !dynamic {
        state.mu = state.drift(theta);
    }
    (sse, fitted)
}

/// Additive seasonal indices from the first two full cycles (mirrors the
/// averaging-by-phase approach used for ETS state init), centered so
/// `sum(seasonal) == 0`.
fn seasonal_indices(y: &[f64], m: usize) -> Vec<f64> {
    let cycles = (y.len() / m).max(1);
    let mut indices = vec![0.0; m];
    for phase in 0..m {
        let mut sum = 0.0;
        let mut count = 0;
        for c in 0..cycles {
            let idx = c * m + phase;
            if idx < y.len() {
                sum += y[idx];
                count += 1;
            }
        }
        indices[phase] = if count > 0 { sum / count as f64 } else { 0.0 };
    }
    let overall_mean = y.iter().sum::<f64>() / y.len() as f64;
    let phase_mean = indices.iter().sum::<f64>() / m as f64;
    for idx in &mut indices {
        *idx += overall_mean - phase_mean;
    }
    let seasonal_mean = indices.iter().sum::<f64>() / m as f64;
    for idx in &mut indices {
        *idx -= seasonal_mean;
    }
    indices
}

/// The Theta/Pegels model (C5): one of four named variants over the
/// shared recursion above.
#[derive(Debug, Clone)]
pub struct ThetaModel {
    variant: ThetaVariant,
    seasonal_period: usize,
    alpha: f64,
    theta: f64,
    seasonal: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    final_state: ThetaState,
    n: usize,
}

impl ThetaModel {
    pub fn new(variant: ThetaVariant) -> Self {
        Self {
            variant,
            seasonal_period: 1,
            alpha: 0.2,
            theta: 2.0,
            seasonal: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
            final_state: ThetaState::default(),
            n: 0,
        }
    }

    pub fn min_length(&self, seasonal_period: usize) -> usize {
        if seasonal_period > 1 {
            2 * seasonal_period
        } else {
            3
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y_raw = series.values();
        let m = params.seasonal_period(1).max(1);
        let needed = self.min_length(m);
        if y_raw.len() < needed {
            return Err(ErrorKind::InsufficientData { needed, got: y_raw.len() });
        }
        if y_raw.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }

        let seasonal = if m > 1 { seasonal_indices(y_raw, m) } else { vec![0.0; 1] };
        let deseasonalized: Vec<f64> = if m > 1 {
            y_raw.iter().enumerate().map(|(i, v)| v - seasonal[i % m]).collect()
        } else {
            y_raw.to_vec()
        };

        let dynamic = self.variant.is_dynamic();
        let (alpha, theta) = if self.variant.is_optimized() {
            let bounds = Bounds::new(vec![ALPHA_LOWER, THETA_LOWER], vec![ALPHA_UPPER, THETA_UPPER]);
            let result = nelder_mead(
                |x| calc(&deseasonalized, x[0], x[1], dynamic).0,
                &[0.2, 2.0],
                &bounds,
                1e-10,
                800,
                cancel,
            );
            (result.x[0], result.x[1])
        } else {
            let (_, slope) = simple_linear_regression(&deseasonalized);
            let n = deseasonalized.len() as f64;
            let moment_alpha = if slope.abs() > 1e-9 { (2.0 / (n + 1.0)).clamp(ALPHA_LOWER, ALPHA_UPPER) } else { 0.2 };
            (moment_alpha, 2.0)
        };

        let mut state = ThetaState::init(deseasonalized[0]);
        let mut fitted = Vec::with_capacity(deseasonalized.len());
        for (t, &yt) in deseasonalized.iter().enumerate() {
            fitted.push(state.forecast(0) + if m > 1 { seasonal[t % m] } else { 0.0 });
            state.update(t as f64, yt, alpha, theta, dynamic);
        }
        if !dynamic {
            state.mu = state.drift(theta);
        }

        self.alpha = alpha;
        self.theta = theta;
        self.seasonal_period = m;
        self.seasonal = seasonal;
        self.residuals = y_raw.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        self.fitted = fitted;
        self.final_state = state;
        self.n = y_raw.len();
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
        let m = self.seasonal_period;
        let point: Vec<f64> = (1..=horizon)
            .map(|h| {
                let base = self.final_state.forecast(h);
                if m > 1 {
                    base + self.seasonal[(self.n + h - 1) % m]
                } else {
                    base
                }
            })
            .collect();

        let sigma2 = innovation_variance(&self.residuals, 2);
        let multipliers: Vec<f64> = (1..=horizon).map(|h| h as f64).collect();
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: self.variant.name().to_string(),
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
    fn flat_series_forecasts_flat() {
        let series = TimeSeries::from_values(vec![7.0; 10]).unwrap();
        let mut model = ThetaModel::new(ThetaVariant::Theta);
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(4, 0.90).unwrap();
        for p in result.point {
            assert!((p - 7.0).abs() < 1e-6);
        }
    }

    #[test]
    fn optimized_theta_extrapolates_linear_trend() {
        let y: Vec<f64> = (0..30).map(|i| 10.0 + 2.0 * i as f64).collect();
        let series = TimeSeries::from_values(y).unwrap();
        let mut model = ThetaModel::new(ThetaVariant::OptimizedTheta);
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(3, 0.90).unwrap();
        assert!(result.point[2] > result.point[0]);
        // roughly continues the linear trend, not flat
        assert!(result.point[2] - result.point[0] > 1.0);
    }

    #[test]
    fn dynamic_optimized_theta_runs_on_seasonal_series() {
        let mut y = Vec::new();
        for cycle in 0..6 {
            for phase in 0..4 {
                y.push(20.0 + phase as f64 * 3.0 + cycle as f64 * 0.5);
            }
        }
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 4i64);
        let mut model = ThetaModel::new(ThetaVariant::DynamicOptimizedTheta);
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(4, 0.90).unwrap();
        assert_eq!(result.point.len(), 4);
        for p in &result.point {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn rejects_series_shorter_than_minimum() {
        let series = TimeSeries::from_values(vec![1.0, 2.0]).unwrap();
        let mut model = ThetaModel::new(ThetaVariant::Theta);
        assert!(model.fit(&series, &ModelParams::new(), &CancelFlag::new()).is_err());
    }
}
