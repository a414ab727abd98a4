//! Seasonal exponential smoothing variants (C8): ETS(A,N,A)/ETS(A,N,M)
//! subsets specialized for purely seasonal, trendless data, plus the
//! plain seasonal-window average.

use crate::error::{ErrorKind, Result};
use crate::ets::{EtsModel, EtsSpec, ErrorType, SeasonalType, TrendType};
use crate::intervals::{bounds_from_multipliers, flat_multipliers, innovation_variance};
use crate::optim::{CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

fn check_confidence(c: f64) -> Result<()> {
    if !(c > 0.0 && c < 1.0) {
        return Err(ErrorKind::InvalidParameter {
            param: "confidence_level".to_string(),
            value: c.to_string(),
            reason: "must be strictly between 0 and 1".to_string(),
        });
    }
    Ok(())
}

/// A fixed-smoothing-constant pass over the ETS(A,N,seasonal) recursion:
/// `alpha` from the SES moment estimator, `gamma` at a conservative
/// default, no optimizer run. `SeasonalESOptimized` below instead runs
/// the full MLE fit via `EtsModel`, mirroring the SES/SESOptimized split
/// in C6.
#[derive(Debug, Clone)]
pub struct SeasonalEs {
    multiplicative: bool,
    m: usize,
    level: f64,
    seasonal: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl SeasonalEs {
    pub fn new(multiplicative: bool) -> Self {
        Self {
            multiplicative,
            m: 1,
            level: 0.0,
            seasonal: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let m = params.seasonal_period(2).max(2);
        if y.len() < m + 3 {
            return Err(ErrorKind::InsufficientData { needed: m + 3, got: y.len() });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }
        if self.multiplicative && y.iter().any(|v| *v <= 0.0) {
            return Err(ErrorKind::InvalidParameter {
                param: "error".to_string(),
                value: "multiplicative".to_string(),
                reason: "multiplicative seasonal requires strictly positive observations".to_string(),
            });
        }

        let alpha = (2.0 / (y.len() as f64 + 1.0)).clamp(1e-4, 0.9999);
        let gamma = 0.1_f64;

        let cycles = y.len() / m;
        let mut seasonal = vec![0.0; m];
        for phase in 0..m {
            let mut sum = 0.0;
            let mut count = 0;
            for c in 0..cycles {
                let idx = c * m + phase;
                if idx < y.len() {
                    if self.multiplicative {
                        let cycle_mean = y[c * m..(c + 1) * m].iter().sum::<f64>() / m as f64;
                        sum += y[idx] / cycle_mean.max(1e-9);
                    } else {
                        let cycle_mean = y[c * m..(c + 1) * m].iter().sum::<f64>() / m as f64;
                        sum += y[idx] - cycle_mean;
                    }
                    count += 1;
                }
            }
            seasonal[phase] = if count > 0 { sum / count as f64 } else if self.multiplicative { 1.0 } else { 0.0 };
        }

        let mut level = if self.multiplicative {
            y[0] / seasonal[0].max(1e-9)
        } else {
            y[0] - seasonal[0]
        };
        let mut fitted = Vec::with_capacity(y.len());
        for (t, &yt) in y.iter().enumerate() {
            let phase = t % m;
            let predicted = if self.multiplicative { level * seasonal[phase] } else { level + seasonal[phase] };
            fitted.push(predicted);
            if self.multiplicative {
                let new_level = alpha * (yt / seasonal[phase].max(1e-9)) + (1.0 - alpha) * level;
                seasonal[phase] = gamma * (yt / new_level.max(1e-9)) + (1.0 - gamma) * seasonal[phase];
                level = new_level;
            } else {
                let new_level = alpha * (yt - seasonal[phase]) + (1.0 - alpha) * level;
                seasonal[phase] = gamma * (yt - new_level) + (1.0 - gamma) * seasonal[phase];
                level = new_level;
            }
        }

        self.m = m;
        self.level = level;
        self.seasonal = seasonal;
        self.residuals = y.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        self.fitted = fitted;
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point: Vec<f64> = (0..horizon)
            .map(|h| {
                let phase = (self.fitted.len() + h) % self.m;
                if self.multiplicative {
                    self.level * self.seasonal[phase]
                } else {
                    self.level + self.seasonal[phase]
                }
            })
            .collect();
        let sigma2 = innovation_variance(&self.residuals, 2);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, self.multiplicative);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "SeasonalES".to_string(),
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

/// ETS(A,N,seasonal), fully MLE-optimized via the shared recursion
/// (`crate::ets`).
#[derive(Debug, Clone)]
pub struct SeasonalEsOptimized {
    inner: EtsModel,
}

impl SeasonalEsOptimized {
    pub fn new(multiplicative: bool, seasonal_period: usize) -> Self {
        let seasonal = if multiplicative { SeasonalType::Multiplicative } else { SeasonalType::Additive };
        Self {
            inner: EtsModel::new(EtsSpec::new(ErrorType::Additive, TrendType::None, seasonal), seasonal_period),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        self.inner.fit(series, params, cancel)
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        let mut result = self.inner.predict(horizon, confidence_level)?;
        result.model_name = "SeasonalESOptimized".to_string();
        Ok(result)
    }

    pub fn fitted_values(&self) -> &[f64] {
        self.inner.fitted_values()
    }
}

/// `y_hat[N+h] = mean of observations at the same phase over the last k
/// cycles` (`spec.md` §4.8).
#[derive(Debug, Clone)]
pub struct SeasonalWindowAverage {
    m: usize,
    phase_means: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl SeasonalWindowAverage {
    pub fn new() -> Self {
        Self {
            m: 1,
            phase_means: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let m = params.seasonal_period(2).max(2);
        let k = params.get_usize("window_cycles").unwrap_or(3).max(1);
        if y.len() < m + 3 {
            return Err(ErrorKind::InsufficientData { needed: m + 3, got: y.len() });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }

        let mut phase_means = vec![0.0; m];
        for phase in 0..m {
            let mut values: Vec<f64> = y
                .iter()
                .enumerate()
                .filter(|(i, _)| i % m == phase)
                .map(|(_, v)| *v)
                .collect();
            let last_k = values.split_off(values.len().saturating_sub(k));
            phase_means[phase] = if last_k.is_empty() { 0.0 } else { last_k.iter().sum::<f64>() / last_k.len() as f64 };
        }

        self.m = m;
        self.phase_means = phase_means;
        self.fitted = (0..y.len()).map(|i| self.phase_means[i % m]).collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point: Vec<f64> = (0..horizon)
            .map(|h| {
                let phase = (self.fitted.len() + h) % self.m;
                self.phase_means[phase]
            })
            .collect();
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "SeasonalWindowAverage".to_string(),
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

    fn seasonal_series() -> Vec<f64> {
        let mut y = Vec::new();
        for cycle in 0..10 {
            for phase in 0..4 {
                y.push(10.0 + phase as f64 * 3.0 + if cycle % 2 == 0 { 0.5 } else { -0.5 });
            }
        }
        y
    }

    #[test]
    fn seasonal_es_forecasts_repeat_with_period() {
        let series = TimeSeries::from_values(seasonal_series()).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 4i64);
        let mut model = SeasonalEs::new(false);
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(8, 0.90).unwrap();
        assert!((result.point[0] - result.point[4]).abs() < 1e-6);
    }

    #[test]
    fn seasonal_es_optimized_runs_via_ets() {
        let series = TimeSeries::from_values(seasonal_series()).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 4i64);
        let mut model = SeasonalEsOptimized::new(false, 4);
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(4, 0.90).unwrap();
        assert_eq!(result.point.len(), 4);
    }

    #[test]
    fn seasonal_window_average_uses_last_k_cycles() {
        let series = TimeSeries::from_values(seasonal_series()).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 4i64);
        params.insert("window_cycles", 3i64);
        let mut model = SeasonalWindowAverage::new();
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(4, 0.90).unwrap();
        assert_eq!(result.point.len(), 4);
    }
}
