//! Simple baselines (C6): Naive, SeasonalNaive, RandomWalkDrift, SMA, SES
//! and SESOptimized, plus Holt/HoltWinters as named ETS(A,*,*) presets
//! (`SPEC_FULL.md` §4.6a).

use crate::error::{ErrorKind, Result};
use crate::ets::{EtsModel, EtsSpec, ErrorType, SeasonalType, TrendType};
use crate::intervals::{bounds_from_multipliers, drift_multipliers, flat_multipliers, innovation_variance};
use crate::optim::{CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

fn check_len(y: &[f64], needed: usize) -> Result<()> {
    if y.len() < needed {
        return Err(ErrorKind::InsufficientData { needed, got: y.len() });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
    }
    Ok(())
}

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

/// `point[h] = y[N-1]` for all h (`spec.md` §4.6, §8).
#[derive(Debug, Clone, Default)]
pub struct Naive {
    last: f64,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl Naive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, series: &TimeSeries, _params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 3)?;
        self.last = y[y.len() - 1];
        self.fitted = std::iter::once(y[0]).chain(y[..y.len() - 1].iter().copied()).collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.last; horizon];
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "Naive".to_string(),
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

/// `point[h] = y[N - m + ((h-1) mod m)]` (`spec.md` §4.6, §8).
#[derive(Debug, Clone, Default)]
pub struct SeasonalNaive {
    tail: Vec<f64>,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl SeasonalNaive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let m = params.seasonal_period(1).max(1);
        check_len(y, (m + 3).max(3))?;
        self.tail = y[y.len() - m..].to_vec();
        self.fitted = (0..y.len())
            .map(|i| if i < m { y[i] } else { y[i - m] })
            .collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let m = self.tail.len();
        let point: Vec<f64> = (0..horizon).map(|h| self.tail[h % m]).collect();
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "SeasonalNaive".to_string(),
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

/// `point[h] = y[N-1] + h * (y[N-1] - y[0]) / (N-1)` (`spec.md` §4.6, §8).
#[derive(Debug, Clone, Default)]
pub struct RandomWalkDrift {
    last: f64,
    drift: f64,
    n: usize,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl RandomWalkDrift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, series: &TimeSeries, _params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 3)?;
        let n = y.len();
        self.drift = (y[n - 1] - y[0]) / (n - 1) as f64;
        self.last = y[n - 1];
        self.n = n;
        self.fitted = (0..n)
            .map(|i| if i == 0 { y[0] } else { y[i - 1] + self.drift })
            .collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point: Vec<f64> = (1..=horizon).map(|h| self.last + h as f64 * self.drift).collect();
        let sigma2 = innovation_variance(&self.residuals, 2);
        let multipliers = drift_multipliers(horizon, self.n);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "RandomWalkDrift".to_string(),
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

/// `point[h] = mean(y[N-w..N-1])` for all h (flat), `spec.md` §4.6.
#[derive(Debug, Clone, Default)]
pub struct Sma {
    mean: f64,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl Sma {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let w = params.get_usize("window").unwrap_or(3).max(1);
        check_len(y, w.max(3))?;
        self.mean = y[y.len() - w..].iter().sum::<f64>() / w as f64;
        self.fitted = (0..y.len())
            .map(|i| {
                let start = i.saturating_sub(w);
                let window = &y[start..i.max(1)];
                window.iter().sum::<f64>() / window.len() as f64
            })
            .collect();
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.mean; horizon];
        let sigma2 = innovation_variance(&self.residuals, 1);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: "SMA".to_string(),
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

/// Simple exponential smoothing. `optimized = false` uses the moment
/// estimator `alpha = 2 / (N+1)` (a common plug-in SES seed); `optimized
/// = true` searches alpha by one-dimensional Nelder-Mead over [1e-4,
/// 0.9999] (`spec.md` §4.6).
#[derive(Debug, Clone)]
pub struct Ses {
    optimized: bool,
    alpha: f64,
    level: f64,
    residuals: Vec<f64>,
    fitted: Vec<f64>,
}

impl Ses {
    pub fn new(optimized: bool) -> Self {
        Self {
            optimized,
            alpha: 0.3,
            level: 0.0,
            residuals: Vec::new(),
            fitted: Vec::new(),
        }
    }

    fn run(y: &[f64], alpha: f64) -> (f64, Vec<f64>, f64) {
        let mut level = y[0];
        let mut fitted = Vec::with_capacity(y.len());
        let mut rss = 0.0;
        for &yt in y {
            fitted.push(level);
            rss += (yt - level).powi(2);
            level += alpha * (yt - level);
        }
        (level, fitted, rss)
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        check_len(y, 3)?;
        let alpha = if self.optimized {
            let bounds = crate::optim::Bounds::new(vec![1e-4], vec![0.9999]);
            let result = crate::optim::nelder_mead(
                |x| Self::run(y, x[0]).2,
                &[0.3],
                &bounds,
                1e-10,
                500,
                cancel,
            );
            result.x[0]
        } else {
            params.get_real("alpha").unwrap_or(2.0 / (y.len() as f64 + 1.0)).clamp(1e-4, 0.9999)
        };
        let (level, fitted, _) = Self::run(y, alpha);
        self.alpha = alpha;
        self.level = level;
        self.fitted = fitted;
        self.residuals = y.iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        check_confidence(confidence_level)?;
        let point = vec![self.level; horizon];
        let sigma2 = innovation_variance(&self.residuals, 2);
        let multipliers = flat_multipliers(horizon);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, false);
        let name = if self.optimized { "SESOptimized" } else { "SES" };
        Ok(ForecastResult {
            point,
            lower,
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

/// ETS(A,A,N): a named two-parameter preset over the shared ETS recursion
/// (`SPEC_FULL.md` §4.6a).
#[derive(Debug, Clone)]
pub struct Holt {
    inner: EtsModel,
}

impl Holt {
    pub fn new() -> Self {
        Self {
            inner: EtsModel::new(EtsSpec::new(ErrorType::Additive, TrendType::Additive, SeasonalType::None), 1),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        self.inner.fit(series, params, cancel)
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        let mut result = self.inner.predict(horizon, confidence_level)?;
        result.model_name = "Holt".to_string();
        Ok(result)
    }

    pub fn fitted_values(&self) -> &[f64] {
        self.inner.fitted_values()
    }
}

/// ETS(A,A,A): a named three-parameter preset over the shared ETS
/// recursion (`SPEC_FULL.md` §4.6a).
#[derive(Debug, Clone)]
pub struct HoltWinters {
    inner: EtsModel,
}

impl HoltWinters {
    pub fn new(seasonal_period: usize) -> Self {
        Self {
            inner: EtsModel::new(
                EtsSpec::new(ErrorType::Additive, TrendType::Additive, SeasonalType::Additive),
                seasonal_period,
            ),
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        self.inner.fit(series, params, cancel)
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        let mut result = self.inner.predict(horizon, confidence_level)?;
        result.model_name = "HoltWinters".to_string();
        Ok(result)
    }

    pub fn fitted_values(&self) -> &[f64] {
        self.inner.fitted_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_constant_series() {
        let series = TimeSeries::from_values(vec![10.0; 5]).unwrap();
        let mut model = Naive::new();
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(3, 0.90).unwrap();
        assert_eq!(result.point, vec![10.0, 10.0, 10.0]);
        assert_eq!(result.lower, vec![10.0, 10.0, 10.0]);
        assert_eq!(result.upper, vec![10.0, 10.0, 10.0]);
        assert_eq!(result.model_name, "Naive");
    }

    #[test]
    fn seasonal_naive_weekly() {
        let y: Vec<f64> = (0..21).map(|i| ((i % 7) + 1) as f64).collect();
        let series = TimeSeries::from_values(y).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 7i64);
        let mut model = SeasonalNaive::new();
        model.fit(&series, &params, &CancelFlag::new()).unwrap();
        let result = model.predict(7, 0.90).unwrap();
        assert_eq!(result.point, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn random_walk_drift_linear() {
        let series = TimeSeries::from_values(vec![10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        let mut model = RandomWalkDrift::new();
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(3, 0.90).unwrap();
        assert_eq!(result.point, vec![60.0, 70.0, 80.0]);
    }

    #[test]
    fn ses_optimized_on_noisy_trendless_series() {
        let y: Vec<f64> = (0..50)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let series = TimeSeries::from_values(y).unwrap();
        let mut model = Ses::new(true);
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        let result = model.predict(5, 0.90).unwrap();
        for p in &result.point {
            assert!(*p >= 99.0 && *p <= 101.0);
        }
        let half_width_1 = result.upper[0] - result.point[0];
        let half_width_5 = result.upper[4] - result.point[4];
        assert!(half_width_1 < half_width_5 || (half_width_5 - half_width_1).abs() < 1e-9);
    }
}
