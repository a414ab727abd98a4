//! MSTL (C9): iterative moving-average decomposition against each
//! seasonal period (longest last), trend+remainder forecast by AutoETS
//! with seasonal forced off, seasonal parts extrapolated by repeating
//! the last full cycle.
//!
//! Grounded on the moving-average STL approximation used for the host's
//! single-period decomposition, generalized here to iterate one period
//! at a time (Bandara/Hyndman MSTL's "iterate over periods, longest
//! last" schedule) instead of stopping after the first.

use crate::error::{ErrorKind, Result};
use crate::ets::auto::AutoEtsModel;
use crate::optim::CancelFlag;
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

struct Decomposition {
    trend: Vec<f64>,
    seasonal_by_period: Vec<(usize, Vec<f64>)>,
    remainder: Vec<f64>,
}

fn centered_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let window = if period % 2 == 0 { period + 1 } else { period };
    let half = window / 2;
    let mut trend = vec![f64::NAN; n];
    if n > 2 * half {
        for i in half..(n - half) {
            trend[i] = values[i - half..=i + half].iter().sum::<f64>() / window as f64;
        }
    }
    let first_valid = trend.iter().position(|v| !v.is_nan()).unwrap_or(0);
    let last_valid = trend.iter().rposition(|v| !v.is_nan()).unwrap_or(n.saturating_sub(1));
    for t in trend.iter_mut().take(first_valid) {
        *t = values.first().copied().unwrap_or(0.0);
    }
    for i in (last_valid + 1)..n {
        trend[i] = trend[last_valid.min(n - 1)];
    }
    if n <= 2 * half {
        let mean = values.iter().sum::<f64>() / n.max(1) as f64;
        trend = vec![mean; n];
    }
    trend
}

fn seasonal_component(detrended: &[f64], period: usize) -> Vec<f64> {
    let n = detrended.len();
    let mut seasonal = vec![0.0; n];
    let cycles = n / period;
    for phase in 0..period {
        let mut sum = 0.0;
        let mut count = 0;
        for c in 0..=cycles {
            let idx = c * period + phase;
            if idx < n {
                sum += detrended[idx];
                count += 1;
            }
        }
        let avg = if count > 0 { sum / count as f64 } else { 0.0 };
        for c in 0..=cycles {
            let idx = c * period + phase;
            if idx < n {
                seasonal[idx] = avg;
            }
        }
    }
    let mean = seasonal.iter().sum::<f64>() / n as f64;
    for s in &mut seasonal {
        *s -= mean;
    }
    seasonal
}

/// Iterates `periods` sorted ascending so the longest period's seasonal
/// component is extracted last, against the residual left after all
/// shorter periods have been removed.
fn decompose(values: &[f64], periods: &[usize]) -> Result<Decomposition> {
    let mut sorted = periods.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    for &p in &sorted {
        if values.len() < 2 * p {
            return Err(ErrorKind::InsufficientData { needed: 2 * p, got: values.len() });
        }
    }

    let mut residual = values.to_vec();
    let mut seasonal_by_period = Vec::with_capacity(sorted.len());
    let mut trend = centered_moving_average(values, *sorted.last().unwrap_or(&1));

    for _round in 0..2 {
        for &period in &sorted {
            let local_trend = centered_moving_average(&residual, period);
            let detrended: Vec<f64> = residual.iter().zip(&local_trend).map(|(v, t)| v - t).collect();
            let seasonal = seasonal_component(&detrended, period);
            for i in 0..residual.len() {
                residual[i] -= seasonal[i];
            }
            if let Some(entry) = seasonal_by_period.iter_mut().find(|(p, _)| *p == period) {
                *entry = (period, seasonal);
            } else {
                seasonal_by_period.push((period, seasonal));
            }
        }
        trend = centered_moving_average(&residual, *sorted.last().unwrap_or(&1));
    }

    let remainder: Vec<f64> = residual.iter().zip(&trend).map(|(v, t)| v - t).collect();
    Ok(Decomposition { trend, seasonal_by_period, remainder })
}

/// MSTL: decomposition plus per-component forecast. Trend+remainder is
/// forecast with AutoETS (seasonal forced off, see module doc);
/// seasonal parts repeat their last full cycle.
#[derive(Debug, Clone)]
pub struct Mstl {
    periods: Vec<usize>,
    seasonal_by_period: Vec<(usize, Vec<f64>)>,
    trend_remainder_forecast: Vec<f64>,
    trend_remainder_lower: Vec<f64>,
    trend_remainder_upper: Vec<f64>,
    fitted: Vec<f64>,
    n: usize,
}

impl Mstl {
    pub fn new() -> Self {
        Self {
            periods: Vec::new(),
            seasonal_by_period: Vec::new(),
            trend_remainder_forecast: Vec::new(),
            trend_remainder_lower: Vec::new(),
            trend_remainder_upper: Vec::new(),
            fitted: Vec::new(),
            n: 0,
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, horizon_hint: usize, cancel: &CancelFlag) -> Result<()> {
        let y = series.values();
        let periods = params.seasonal_periods(&[]);
        if periods.is_empty() {
            return Err(ErrorKind::InvalidParameter {
                param: "seasonal_periods".to_string(),
                value: "[]".to_string(),
                reason: "MSTL requires at least one seasonal period".to_string(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }
        let decomposition = decompose(y, &periods)?;

        let mut trend_remainder = vec![0.0; y.len()];
        for i in 0..y.len() {
            trend_remainder[i] = decomposition.trend[i] + decomposition.remainder[i];
        }
        let tr_series = TimeSeries::from_values(trend_remainder.clone())?;
        let auto = AutoEtsModel::fit(&tr_series, &ModelParams::new(), 1, cancel)?;
        let horizon = horizon_hint.max(1);
        let tr_forecast = auto.predict(horizon, 0.90)?;

        let mut fitted = vec![0.0; y.len()];
        for i in 0..y.len() {
            let seasonal_sum: f64 = decomposition.seasonal_by_period.iter().map(|(_, s)| s[i]).sum();
            fitted[i] = trend_remainder[i] + seasonal_sum;
        }

        self.periods = periods;
        self.seasonal_by_period = decomposition.seasonal_by_period;
        self.trend_remainder_forecast = tr_forecast.point;
        self.trend_remainder_lower = tr_forecast.lower;
        self.trend_remainder_upper = tr_forecast.upper;
        self.fitted = fitted;
        self.n = y.len();
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
        let available = self.trend_remainder_forecast.len().min(horizon);
        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for h in 0..horizon {
            let tr = if h < available {
                self.trend_remainder_forecast[h]
            } else {
                *self.trend_remainder_forecast.last().unwrap_or(&0.0)
            };
            let tr_lower = if h < available { self.trend_remainder_lower[h] } else { tr };
            let tr_upper = if h < available { self.trend_remainder_upper[h] } else { tr };
            let seasonal_sum: f64 = self
                .seasonal_by_period
                .iter()
                .map(|(period, s)| s[(self.n + h) % period])
                .sum();
            point.push(tr + seasonal_sum);
            lower.push(tr_lower + seasonal_sum);
            upper.push(tr_upper + seasonal_sum);
        }
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "MSTL".to_string(),
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
    fn decomposes_and_forecasts_two_periods() {
        let mut y = Vec::new();
        for day in 0..120 {
            let weekly = 3.0 * (2.0 * std::f64::consts::PI * day as f64 / 7.0).sin();
            let monthly = 1.5 * (2.0 * std::f64::consts::PI * day as f64 / 30.0).sin();
            y.push(50.0 + 0.05 * day as f64 + weekly + monthly);
        }
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_periods", vec![7.0, 30.0]);
        let mut model = Mstl::new();
        model.fit(&series, &params, 14, &CancelFlag::new()).unwrap();
        let result = model.predict(14, 0.90).unwrap();
        assert_eq!(result.point.len(), 14);
        assert!(result.point.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn rejects_missing_seasonal_periods() {
        let series = TimeSeries::from_values(vec![1.0; 20]).unwrap();
        let mut model = Mstl::new();
        assert!(model.fit(&series, &ModelParams::new(), 5, &CancelFlag::new()).is_err());
    }
}
