//! Intermittent-demand models (C7): Croston family, ADIDA, IMAPA, TSB.
//!
//! All return a flat, constant-per-horizon point forecast (`spec.md`
//! §4.7); intervals use the residual-based sigma / sqrt(h) scaling shared
//! with the other flat baselines (C14).

use crate::baselines::Ses;
use crate::error::{ErrorKind, Result};
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

fn check_len(y: &[f64], needed: usize) -> Result<()> {
    if y.len() < needed {
        return Err(ErrorKind::InsufficientData { needed, got: y.len() });
    }
    if y.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ErrorKind::NonFiniteObservation(
            "intermittent-demand series must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Exponentially smooths the non-zero demand sizes `Z` and inter-demand
/// intervals `P` at a common rate `alpha`, returning `(forecast, fitted,
/// residuals)` where `forecast = Z/P`.
fn croston_recursion(y: &[f64], alpha: f64) -> (f64, Vec<f64>) {
    let mut z = None;
    let mut p = None;
    let mut interval_since_last = 1.0;
    let mut fitted = vec![0.0; y.len()];

    for (t, &yt) in y.iter().enumerate() {
        if let (Some(zv), Some(pv)) = (z, p) {
            fitted[t] = zv / pv;
        }
        if yt > 0.0 {
            z = Some(match z {
                Some(zv) => zv + alpha * (yt - zv),
                None => yt,
            });
            p = Some(match p {
                Some(pv) => pv + alpha * (interval_since_last - pv),
                None => interval_since_last,
            });
            interval_since_last = 1.0;
        } else {
            interval_since_last += 1.0;
        }
    }
    let forecast = match (z, p) {
        (Some(zv), Some(pv)) if pv > 1e-9 => zv / pv,
        _ => 0.0,
    };
    (forecast, fitted)
}

fn croston_sse(y: &[f64], alpha: f64) -> f64 {
    let (_, fitted) = croston_recursion(y, alpha);
    y.iter()
        .zip(&fitted)
        .filter(|(_, f)| **f > 0.0)
        .map(|(a, f)| (a - f).powi(2))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrostonVariant {
    Classic,
    Optimized,
    Sba,
}

/// Croston family (C7): constant-demand-rate forecaster for sparse series.
#[derive(Debug, Clone)]
pub struct Croston {
    variant: CrostonVariant,
    alpha: f64,
    forecast_value: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl Croston {
    pub fn new(variant: CrostonVariant) -> Self {
        Self {
            variant,
            alpha: 0.1,
            forecast_value: 0.0,
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 3)?;

        let alpha = if self.variant == CrostonVariant::Optimized {
            let bounds = crate::optim::Bounds::new(vec![1e-4], vec![0.9999]);
            let result = crate::optim::nelder_mead(|x| croston_sse(y, x[0]), &[0.1], &bounds, 1e-10, 400, cancel);
            result.x[0]
        } else {
            params.get_real("alpha").unwrap_or(0.1).clamp(1e-4, 0.9999)
        };

        let (mut forecast_value, fitted) = croston_recursion(y, alpha);
        if self.variant == CrostonVariant::Sba {
            forecast_value *= 1.0 - alpha / 2.0;
        }

        self.alpha = alpha;
        self.forecast_value = forecast_value;
        self.residuals = y
            .iter()
            .zip(&fitted)
            .map(|(a, f)| if *f > 0.0 { a - f } else { 0.0 })
            .collect();
        self.fitted = fitted;
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.forecast_value; horizon];
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        let name = match self.variant {
            CrostonVariant::Classic => "CrostonClassic",
            CrostonVariant::Optimized => "CrostonOptimized",
            CrostonVariant::Sba => "CrostonSBA",
        };
        Ok(ForecastResult {
            point,
            lower: lower.iter().map(|v| v.max(0.0)).collect(),
            upper,
            model_name: name.to_string(),
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

/// ADIDA (C7): aggregate into buckets sized by the mean inter-demand
/// interval, forecast the aggregate with SES, disaggregate by dividing
/// evenly back across the bucket.
#[derive(Debug, Clone)]
pub struct Adida {
    bucket_size: usize,
    per_period_forecast: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

fn mean_inter_demand_interval(y: &[f64]) -> usize {
    let nonzero_positions: Vec<usize> = y.iter().enumerate().filter(|(_, v)| **v > 0.0).map(|(i, _)| i).collect();
    if nonzero_positions.len() < 2 {
        return 1;
    }
    let gaps: Vec<usize> = nonzero_positions.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = gaps.iter().sum::<usize>() as f64 / gaps.len() as f64;
    mean.round().max(1.0) as usize
}

fn aggregate(y: &[f64], bucket: usize) -> Vec<f64> {
    y.chunks(bucket).map(|chunk| chunk.iter().sum()).collect()
}

impl Adida {
    pub fn new() -> Self {
        Self {
            bucket_size: 1,
            per_period_forecast: 0.0,
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, _params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 4)?;
        let bucket = mean_inter_demand_interval(y).max(1);
        let aggregated = aggregate(y, bucket);
        if aggregated.len() < 2 {
            return Err(ErrorKind::InsufficientData { needed: 2 * bucket, got: y.len() });
        }
        let aggregated_series = TimeSeries::from_values(aggregated.clone())?;
        let mut ses = Ses::new(false);
        ses.fit(&aggregated_series, &ModelParams::new(), cancel)?;
        let aggregate_forecast = ses.predict(1, 0.90)?.point[0];

        self.bucket_size = bucket;
        self.per_period_forecast = aggregate_forecast / bucket as f64;
        self.fitted = (0..y.len())
            .map(|i| {
                let bucket_idx = i / bucket;
                aggregated.get(bucket_idx).copied().unwrap_or(0.0) / bucket as f64
            })
            .collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.per_period_forecast; horizon];
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower: lower.iter().map(|v| v.max(0.0)).collect(),
            upper,
            model_name: "ADIDA".to_string(),
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

/// IMAPA (C7): an ensemble of ADIDA-style aggregations at multiple
/// aggregation levels (1 plus multiples of the mean inter-demand
/// interval), averaged.
#[derive(Debug, Clone)]
pub struct Imapa {
    per_period_forecast: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl Imapa {
    pub fn new() -> Self {
        Self {
            per_period_forecast: 0.0,
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, _params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 4)?;
        let midi = mean_inter_demand_interval(y).max(1);
        let levels: Vec<usize> = [1, midi, midi * 2]
            .into_iter()
            .filter(|b| *b >= 1 && y.len() / *b >= 2)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut forecasts = Vec::new();
        let mut fitted_per_level: Vec<Vec<f64>> = Vec::new();
        for &bucket in &levels {
            let aggregated = aggregate(y, bucket);
            if aggregated.len() < 2 {
                continue;
            }
            let aggregated_series = TimeSeries::from_values(aggregated.clone())?;
            let mut ses = Ses::new(false);
            if ses.fit(&aggregated_series, &ModelParams::new(), cancel).is_err() {
                continue;
            }
            let Ok(prediction) = ses.predict(1, 0.90) else { continue };
            forecasts.push(prediction.point[0] / bucket as f64);
            fitted_per_level.push(
                (0..y.len())
                    .map(|i| {
                        let idx = i / bucket;
                        aggregated.get(idx).copied().unwrap_or(0.0) / bucket as f64
                    })
                    .collect(),
            );
        }
        if forecasts.is_empty() {
            return Err(ErrorKind::ModelFitFailed("no aggregation level converged".to_string()));
        }

        self.per_period_forecast = forecasts.iter().sum::<f64>() / forecasts.len() as f64;
        self.fitted = (0..y.len())
            .map(|i| fitted_per_level.iter().map(|f| f[i]).sum::<f64>() / fitted_per_level.len() as f64)
            .collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.per_period_forecast; horizon];
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower: lower.iter().map(|v| v.max(0.0)).collect(),
            upper,
            model_name: "IMAPA".to_string(),
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

/// TSB (C7): probabilistic smoothing of demand probability `p` and size
/// `z`, both updated on every observation regardless of whether it is
/// zero.
#[derive(Debug, Clone)]
pub struct Tsb {
    alpha_d: f64,
    alpha_p: f64,
    forecast_value: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl Tsb {
    pub fn new() -> Self {
        Self {
            alpha_d: 0.1,
            alpha_p: 0.1,
            forecast_value: 0.0,
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }

    fn run(y: &[f64], alpha_d: f64, alpha_p: f64) -> (f64, Vec<f64>) {
        let mut p = y.iter().filter(|v| **v > 0.0).count() as f64 / y.len() as f64;
        let mut z = y.iter().filter(|v| **v > 0.0).sum::<f64>().max(1e-9)
            / y.iter().filter(|v| **v > 0.0).count().max(1) as f64;
        let mut fitted = Vec::with_capacity(y.len());
        for &yt in y {
            fitted.push(p * z);
            let demand_occurred = if yt > 0.0 { 1.0 } else { 0.0 };
            p += alpha_p * (demand_occurred - p);
            if yt > 0.0 {
                z += alpha_d * (yt - z);
            }
        }
        (p * z, fitted)
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 3)?;
        let alpha_d = params.get_real("alpha_d").unwrap_or(0.1).clamp(1e-4, 0.9999);
        let alpha_p = params.get_real("alpha_p").unwrap_or(0.1).clamp(1e-4, 0.9999);
        let (forecast_value, fitted) = Self::run(y, alpha_d, alpha_p);
        self.alpha_d = alpha_d;
        self.alpha_p = alpha_p;
        self.forecast_value = forecast_value;
        self.residuals = y.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        self.fitted = fitted;
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.forecast_value; horizon];
        let sigma2 = innovation_variance(&self.residuals, 2);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower: lower.iter().map(|v| v.max(0.0)).collect(),
            upper,
            model_name: "TSB".to_string(),
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

    fn intermittent_series() -> Vec<f64> {
        vec![0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 2.0, 0.0, 4.0, 0.0, 0.0, 1.0]
    }

    #[test]
    fn croston_classic_produces_nonnegative_flat_forecast() {
        let series = TimeSeries::from_values(intermittent_series()).unwrap();
        let mut model = Croston::new(CrostonVariant::Classic);
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(5, 0.90).unwrap();
        assert!(result.point.iter().all(|p| *p >= 0.0));
        assert!(result.point.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-9));
    }

    #[test]
    fn sba_forecast_is_lower_than_classic() {
        let series = TimeSeries::from_values(intermittent_series()).unwrap();
        let mut classic = Croston::new(CrostonVariant::Classic);
        classic.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let mut sba = Croston::new(CrostonVariant::Sba);
        sba.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        assert!(sba.forecast_value <= classic.forecast_value + 1e-9);
    }

    #[test]
    fn adida_runs_on_sparse_series() {
        let series = TimeSeries::from_values(intermittent_series()).unwrap();
        let mut model = Adida::new();
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(3, 0.90).unwrap();
        assert_eq!(result.point.len(), 3);
        assert!(result.point[0] >= 0.0);
    }

    #[test]
    fn tsb_forecast_between_zero_and_max_demand() {
        let y = intermittent_series();
        let max_demand = y.iter().cloned().fold(0.0, f64::max);
        let series = TimeSeries::from_values(y).unwrap();
        let mut model = Tsb::new();
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(4, 0.90).unwrap();
        for p in result.point {
            assert!((0.0..=max_demand).contains(&p));
        }
    }
}
