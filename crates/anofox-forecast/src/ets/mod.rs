//! ETS state-space recursion (C3): the single most important algorithm in
//! this crate. Fits ETS(error, trend, seasonal) by maximum likelihood on
//! Gaussian innovations.

pub mod auto;

use crate::error::{ErrorKind, Result};
use crate::intervals::{bounds_from_multipliers, innovation_variance, z_quantile, InnovationsStateSpace};
use crate::optim::{lbfgs, nelder_mead, Bounds, CancelFlag, CancelToken, OptimResult};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Additive,
    Multiplicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendType {
    None,
    Additive,
    AdditiveDamped,
    Multiplicative,
    MultiplicativeDamped,
}

impl TrendType {
    pub fn is_present(self) -> bool {
        !matches!(self, TrendType::None)
    }
    pub fn is_damped(self) -> bool {
        matches!(self, TrendType::AdditiveDamped | TrendType::MultiplicativeDamped)
    }
    pub fn is_multiplicative(self) -> bool {
        matches!(self, TrendType::Multiplicative | TrendType::MultiplicativeDamped)
    }
    fn letter(self) -> &'static str {
        match self {
            TrendType::None => "N",
            TrendType::Additive => "A",
            TrendType::AdditiveDamped => "Ad",
            TrendType::Multiplicative => "M",
            TrendType::MultiplicativeDamped => "Md",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalType {
    None,
    Additive,
    Multiplicative,
}

impl SeasonalType {
    pub fn is_present(self) -> bool {
        !matches!(self, SeasonalType::None)
    }
    fn letter(self) -> &'static str {
        match self {
            SeasonalType::None => "N",
            SeasonalType::Additive => "A",
            SeasonalType::Multiplicative => "M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtsSpec {
    pub error: ErrorType,
    pub trend: TrendType,
    pub seasonal: SeasonalType,
}

impl EtsSpec {
    pub fn new(error: ErrorType, trend: TrendType, seasonal: SeasonalType) -> Self {
        Self { error, trend, seasonal }
    }

    pub fn short_name(&self) -> String {
        let e = match self.error {
            ErrorType::Additive => "A",
            ErrorType::Multiplicative => "M",
        };
        format!("{e},{},{}", self.trend.letter(), self.seasonal.letter())
    }

    pub fn tag(&self) -> String {
        format!("ETS({})", self.short_name())
    }
}

/// The ETS state tuple (C3): level, optional trend, and a rotating
/// seasonal buffer where `seasonal[0]` is the newest phase and
/// `seasonal[m-1]` the oldest (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct EtsState {
    pub level: f64,
    pub trend: Option<f64>,
    pub seasonal: VecDeque<f64>,
}

/// Free smoothing/damping parameters estimated by MLE.
#[derive(Debug, Clone, Copy)]
pub struct EtsParams {
    pub alpha: f64,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub phi: Option<f64>,
}

const ALPHA_BOUNDS: (f64, f64) = (1e-4, 0.9999);
const PHI_BOUNDS: (f64, f64) = (0.80, 0.98);
const GAMMA_LOWER: f64 = 1e-4;

/// Seasonal admissibility upper bound (`spec.md` §4.3, load-bearing): the
/// naive `1 - alpha` form degrades accuracy for damped-seasonal
/// combinations, this is `1 + 1/phi - alpha`.
fn gamma_upper(alpha: f64, phi: f64) -> f64 {
    1.0 + 1.0 / phi - alpha
}

/// OLS intercept/slope of `y` against its integer index, shared with
/// `crate::theta`'s drift estimation.
pub(crate) fn simple_linear_regression(y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    let xs: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, v) in xs.iter().zip(y) {
        num += (x - x_mean) * (v - y_mean);
        den += (x - x_mean).powi(2);
    }
    let slope = if den.abs() > 1e-12 { num / den } else { 0.0 };
    let intercept = y_mean - slope * x_mean;
    (intercept, slope)
}

/// State initialization (`spec.md` §4.3): seasonal indices from the first
/// two full cycles, a linear regression on the deseasonalized prefix for
/// (l0, b0), and a seasonal buffer with the newest phase at index 0.
pub fn initial_state(y: &[f64], spec: EtsSpec, m: usize) -> EtsState {
    let seasonal_active = spec.seasonal.is_present() && m > 1;

    let seasonal_indices: Vec<f64> = if seasonal_active {
        let cycles = (y.len() / m).max(2).min(y.len() / m.max(1));
        let cycles = cycles.max(1);
        let mut phase_sum = vec![0.0; m];
        let mut phase_count = vec![0usize; m];
        for (i, v) in y.iter().take(cycles * m).enumerate() {
            phase_sum[i % m] += v;
            phase_count[i % m] += 1;
        }
        let phase_mean: Vec<f64> = phase_sum
            .iter()
            .zip(&phase_count)
            .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
            .collect();
        let overall_mean = phase_mean.iter().sum::<f64>() / m as f64;
        match spec.seasonal {
            SeasonalType::Additive => phase_mean.iter().map(|p| p - overall_mean).collect(),
            SeasonalType::Multiplicative => phase_mean
                .iter()
                .map(|p| if overall_mean.abs() > 1e-12 { p / overall_mean } else { 1.0 })
                .collect(),
            SeasonalType::None => unreachable!(),
        }
    } else {
        vec![]
    };

    let prefix_len = y.len().min(10).max(if seasonal_active { 2 * m } else { 2 });
    let prefix_len = prefix_len.min(y.len());
    let deseasonalized: Vec<f64> = (0..prefix_len)
        .map(|i| {
            if seasonal_active {
                match spec.seasonal {
                    SeasonalType::Additive => y[i] - seasonal_indices[i % m],
                    SeasonalType::Multiplicative => {
                        let s = seasonal_indices[i % m];
                        if s.abs() > 1e-12 { y[i] / s } else { y[i] }
                    }
                    SeasonalType::None => y[i],
                }
            } else {
                y[i]
            }
        })
        .collect();

    let (mut l0, mut b0) = simple_linear_regression(&deseasonalized);
    if spec.trend.is_multiplicative() {
        if l0 <= 0.0 {
            l0 = deseasonalized.iter().cloned().fold(f64::MIN, f64::max).max(1e-6);
        }
        if deseasonalized.len() >= 2 && deseasonalized[0].abs() > 1e-12 {
            b0 = (deseasonalized[deseasonalized.len() - 1] / deseasonalized[0])
                .powf(1.0 / (deseasonalized.len() - 1).max(1) as f64);
        } else {
            b0 = 1.0;
        }
        if b0 <= 0.0 {
            b0 = 1.0;
        }
    }

    let trend = if spec.trend.is_present() { Some(b0) } else { None };
    // seasonal[0] = newest phase, rotating backward to seasonal[m-1] = oldest.
    let seasonal: VecDeque<f64> = if seasonal_active {
        let mut buf: VecDeque<f64> = VecDeque::with_capacity(m);
        for i in 0..m {
            let phase = (m - 1 - i) % m;
            buf.push_back(seasonal_indices[phase]);
        }
        buf
    } else {
        VecDeque::new()
    };

    EtsState { level: l0, trend, seasonal }
}

/// Runs the full additive/multiplicative recursion (`spec.md` §4.3 steps
/// 1-8) over `y`, returning the final state, fitted values, and the
/// residual sum of squares. `Err` signals a non-finite state was reached
/// or `cancel` was raised mid-recursion.
pub fn recurse(
    y: &[f64],
    init: &EtsState,
    spec: EtsSpec,
    params: EtsParams,
    cancel: &CancelFlag,
) -> std::result::Result<(EtsState, Vec<f64>, Vec<f64>, f64), ()> {
    let m = init.seasonal.len();
    let phi = params.phi.unwrap_or(1.0);
    let alpha = params.alpha;
    let beta = params.beta.unwrap_or(0.0);
    let gamma = params.gamma.unwrap_or(0.0);

    let mut level = init.level;
    let mut trend = init.trend;
    let mut seasonal = init.seasonal.clone();

    let mut fitted = Vec::with_capacity(y.len());
    let mut residuals = Vec::with_capacity(y.len());
    let mut rss = 0.0;

    for &yt in y {
        if cancel.cancelled() {
            return Err(());
        }
        let trend_component = trend.map(|b| phi * b).unwrap_or(if spec.trend.is_multiplicative() { 1.0 } else { 0.0 });
        let q = match spec.trend {
            TrendType::None => level,
            TrendType::Additive | TrendType::AdditiveDamped => level + trend_component,
            TrendType::Multiplicative | TrendType::MultiplicativeDamped => level * trend_component,
        };

        let s_old = if m > 1 { *seasonal.back().unwrap() } else if spec.seasonal == SeasonalType::Multiplicative { 1.0 } else { 0.0 };

        let y_hat = match spec.seasonal {
            SeasonalType::None => q,
            SeasonalType::Additive => q + s_old,
            SeasonalType::Multiplicative => q * s_old,
        };

        let e_t = match spec.error {
            ErrorType::Additive => yt - y_hat,
            ErrorType::Multiplicative => {
                if y_hat.abs() < 1e-10 {
                    return Err(());
                }
                (yt - y_hat) / y_hat
            }
        };

        if !e_t.is_finite() || !y_hat.is_finite() {
            return Err(());
        }

        fitted.push(y_hat);
        residuals.push(yt - y_hat);
        rss += (yt - y_hat).powi(2);

        // Level update.
        let new_level = match spec.error {
            ErrorType::Additive => q + alpha * e_t,
            ErrorType::Multiplicative => q * (1.0 + alpha * e_t),
        };

        // Trend update.
        let new_trend = trend.map(|b_prev| match spec.error {
            ErrorType::Additive => phi * b_prev + beta * e_t,
            ErrorType::Multiplicative => match spec.trend {
                TrendType::Multiplicative | TrendType::MultiplicativeDamped => {
                    phi * b_prev * (1.0 + beta * e_t)
                }
                _ => phi * b_prev + beta * e_t * level,
            },
        });

        // Seasonal update (deseasonalized innovation already folded into e_t).
        if m > 1 {
            let new_season = match spec.error {
                ErrorType::Additive => s_old + gamma * e_t,
                ErrorType::Multiplicative => s_old * (1.0 + gamma * e_t),
            };
            if !new_season.is_finite() {
                return Err(());
            }
            seasonal.push_front(new_season);
            seasonal.pop_back();
        }

        if !new_level.is_finite() || new_trend.map(|t| !t.is_finite()).unwrap_or(false) {
            return Err(());
        }
        if spec.error == ErrorType::Multiplicative && new_level <= 0.0 {
            return Err(());
        }

        level = new_level;
        trend = new_trend;
    }

    Ok((EtsState { level, trend, seasonal }, fitted, residuals, rss))
}

/// Free-parameter count for a given spec/seasonal-length, exposed for
/// `ets::auto`'s AICc tie-break (smaller `k` wins).
pub fn free_param_count_pub(spec: EtsSpec, m: usize) -> usize {
    free_param_count(spec, m)
}

fn free_param_count(spec: EtsSpec, m: usize) -> usize {
    let mut k = 2; // sigma^2 + alpha
    k += 1; // l0
    if spec.trend.is_present() {
        k += 2; // beta + b0
    }
    if spec.trend.is_damped() {
        k += 1; // phi
    }
    if spec.seasonal.is_present() && m > 1 {
        k += 1 + m.saturating_sub(1); // gamma + seasonal initial states
    }
    k
}

struct ParamLayout {
    has_beta: bool,
    has_gamma: bool,
    has_phi: bool,
}

impl ParamLayout {
    fn of(spec: EtsSpec) -> Self {
        Self {
            has_beta: spec.trend.is_present(),
            has_gamma: spec.seasonal.is_present(),
            has_phi: spec.trend.is_damped(),
        }
    }

    fn dim(&self) -> usize {
        1 + self.has_beta as usize + self.has_gamma as usize + self.has_phi as usize
    }

    fn decode(&self, x: &[f64]) -> EtsParams {
        let mut i = 1;
        let alpha = x[0];
        let beta = if self.has_beta {
            let v = x[i];
            i += 1;
            Some(v)
        } else {
            None
        };
        let gamma = if self.has_gamma {
            let v = x[i];
            i += 1;
            Some(v)
        } else {
            None
        };
        let phi = if self.has_phi {
            Some(x[i])
        } else {
            None
        };
        EtsParams { alpha, beta, gamma, phi }
    }

    fn bounds(&self) -> Bounds {
        let mut lower = vec![ALPHA_BOUNDS.0];
        let mut upper = vec![ALPHA_BOUNDS.1];
        if self.has_beta {
            lower.push(1e-4);
            upper.push(ALPHA_BOUNDS.1);
        }
        if self.has_gamma {
            lower.push(GAMMA_LOWER);
            upper.push(2.0); // loose box; tight coupling enforced in the objective penalty
        }
        if self.has_phi {
            lower.push(PHI_BOUNDS.0);
            upper.push(PHI_BOUNDS.1);
        }
        Bounds::new(lower, upper)
    }

    fn seed(&self) -> Vec<f64> {
        let mut x = vec![0.3];
        if self.has_beta {
            x.push(0.1);
        }
        if self.has_gamma {
            x.push(0.1);
        }
        if self.has_phi {
            x.push(0.98);
        }
        x
    }
}

fn feasible(params: &EtsParams) -> bool {
    if let Some(beta) = params.beta {
        if beta > params.alpha {
            return false;
        }
    }
    if let Some(gamma) = params.gamma {
        let phi = params.phi.unwrap_or(1.0);
        if gamma > gamma_upper(params.alpha, phi) {
            return false;
        }
    }
    true
}

fn objective(y: &[f64], init: &EtsState, spec: EtsSpec, params: &EtsParams, cancel: &CancelFlag) -> f64 {
    if !feasible(params) {
        return f64::INFINITY;
    }
    match recurse(y, init, spec, *params, cancel) {
        Ok((_, _, _, rss)) => {
            let n = y.len() as f64;
            let mse = (rss / n).max(1e-12);
            n * mse.ln()
        }
        Err(()) => f64::INFINITY,
    }
}

/// The fitted ETS model (C3), including its estimated parameters, final
/// state, and residual diagnostics.
#[derive(Debug, Clone)]
pub struct EtsModel {
    pub spec: EtsSpec,
    pub m: usize,
    params: Option<EtsParams>,
    init_state: Option<EtsState>,
    final_state: Option<EtsState>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    n: usize,
    k: usize,
    rss: f64,
}

impl EtsModel {
    pub fn new(spec: EtsSpec, seasonal_period: usize) -> Self {
        let m = if spec.seasonal.is_present() { seasonal_period.max(2) } else { 1 };
        Self {
            spec,
            m,
            params: None,
            init_state: None,
            final_state: None,
            fitted: Vec::new(),
            residuals: Vec::new(),
            n: 0,
            k: 0,
            rss: 0.0,
        }
    }

    pub fn min_length(spec: EtsSpec, m: usize) -> usize {
        if spec.seasonal.is_present() && m > 1 {
            m + 3
        } else {
            3
        }
    }

    pub fn aic(&self) -> Option<f64> {
        if self.n == 0 {
            return None;
        }
        let mse = (self.rss / self.n as f64).max(1e-12);
        Some(self.n as f64 * mse.ln() + 2.0 * self.k as f64)
    }

    pub fn bic(&self) -> Option<f64> {
        if self.n == 0 {
            return None;
        }
        let mse = (self.rss / self.n as f64).max(1e-12);
        Some(self.n as f64 * mse.ln() + self.k as f64 * (self.n as f64).ln())
    }

    pub fn aicc(&self) -> Option<f64> {
        let aic = self.aic()?;
        let denom = self.n as f64 - self.k as f64 - 1.0;
        if denom > 0.0 {
            Some(aic + (2.0 * self.k as f64 * (self.k as f64 + 1.0)) / denom)
        } else {
            Some(f64::INFINITY)
        }
    }

    pub fn fit(&mut self, series: &TimeSeries, _params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        if cancel.cancelled() {
            return Err(ErrorKind::Cancelled);
        }
        let y = series.values();
        let min_len = Self::min_length(self.spec, self.m);
        if y.len() < min_len {
            return Err(ErrorKind::InsufficientData { needed: min_len, got: y.len() });
        }
        if series.has_non_finite() {
            return Err(ErrorKind::NonFiniteObservation("series contains NaN/Inf".to_string()));
        }
        if self.spec.error == ErrorType::Multiplicative && y.iter().any(|v| *v <= 0.0) {
            return Err(ErrorKind::InvalidParameter {
                param: "error".to_string(),
                value: "multiplicative".to_string(),
                reason: "multiplicative error requires strictly positive observations".to_string(),
            });
        }

        let init = initial_state(y, self.spec, self.m);
        let layout = ParamLayout::of(self.spec);
        let bounds = layout.bounds();
        let seed = layout.seed();

        let obj = |x: &[f64]| -> f64 {
            let p = layout.decode(x);
            objective(y, &init, self.spec, &p, cancel)
        };

        let lbfgs_result: OptimResult = lbfgs(obj, &seed, &bounds, 1e-6, 200, cancel);
        let mut best = lbfgs_result;
        if !best.f.is_finite() {
            best = nelder_mead(obj, &seed, &bounds, 1e-8, 1000, cancel);
        }
        if !best.f.is_finite() {
            if cancel.cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            return Err(ErrorKind::ModelFitFailed(
                "optimizer failed to reach a finite objective".to_string(),
            ));
        }

        let final_params = layout.decode(&best.x);
        let (final_state, fitted, residuals, rss) = recurse(y, &init, self.spec, final_params, cancel)
            .map_err(|_| {
                if cancel.cancelled() {
                    ErrorKind::Cancelled
                } else {
                    ErrorKind::ModelFitFailed("recursion diverged at the optimum".to_string())
                }
            })?;

        self.params = Some(final_params);
        self.init_state = Some(init);
        self.final_state = Some(final_state);
        self.fitted = fitted;
        self.residuals = residuals;
        self.n = y.len();
        self.k = free_param_count(self.spec, self.m);
        self.rss = rss;
        Ok(())
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        let state = self.final_state.as_ref().ok_or(ErrorKind::PredictBeforeFit)?;
        let params = self.params.unwrap();
        if !(0.0..=1.0).contains(&confidence_level) || confidence_level == 0.0 || confidence_level == 1.0 {
            return Err(ErrorKind::InvalidParameter {
                param: "confidence_level".to_string(),
                value: confidence_level.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }

        let phi = params.phi.unwrap_or(1.0);
        let m = self.m;
        let mut point = Vec::with_capacity(horizon);
        let mut phi_cum = 0.0;
        for h in 1..=horizon {
            phi_cum += phi.powi(h as i32);
            let trend_part = match (self.spec.trend, state.trend) {
                (TrendType::None, _) | (_, None) => None,
                (TrendType::Additive, Some(b)) => Some(state.level + phi_cum * b),
                (TrendType::AdditiveDamped, Some(b)) => Some(state.level + phi_cum * b),
                (TrendType::Multiplicative, Some(b)) => Some(state.level * b.powf(h as f64)),
                (TrendType::MultiplicativeDamped, Some(b)) => Some(state.level * b.powf(phi_cum)),
            };
            let base = trend_part.unwrap_or(state.level);

            let season_idx = {
                let m_i = m as i64;
                let raw = (m_i - 1) - ((h as i64 - 1) % m_i);
                ((raw % m_i) + m_i) % m_i
            } as usize;

            let forecast = if m > 1 && self.spec.seasonal.is_present() {
                let s = state.seasonal[season_idx];
                match self.spec.seasonal {
                    SeasonalType::Additive => base + s,
                    SeasonalType::Multiplicative => base * s,
                    SeasonalType::None => base,
                }
            } else {
                base
            };
            point.push(forecast);
        }

        let sigma2 = innovation_variance(&self.residuals, self.k);
        let has_trend = self.spec.trend.is_present();
        let ssm = InnovationsStateSpace::new(
            has_trend,
            phi,
            params.alpha,
            params.beta.unwrap_or(0.0),
            if self.spec.seasonal.is_present() { m } else { 1 },
            params.gamma.unwrap_or(0.0),
        );
        let multipliers = ssm.variance_multipliers(horizon);
        let log_scale = self.spec.error == ErrorType::Multiplicative && point.iter().all(|p| *p > 0.0);
        let (lower, upper) = bounds_from_multipliers(&point, &multipliers, sigma2, confidence_level, log_scale);

        Ok(ForecastResult {
            point,
            lower,
            upper,
            model_name: self.spec.tag(),
            confidence_level,
            fitted: None,
            aic: self.aic(),
            bic: self.bic(),
            aicc: self.aicc(),
        })
    }

    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}

/// Standard-normal-quantile convenience used by models that don't run the
/// full innovations state-space machinery (re-exported for symmetry with
/// `crate::intervals`).
pub fn normal_z(confidence_level: f64) -> f64 {
    z_quantile(confidence_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_ets(y: Vec<f64>, spec: EtsSpec, m: usize) -> EtsModel {
        let series = TimeSeries::from_values(y).unwrap();
        let mut model = EtsModel::new(spec, m);
        model.fit(&series, &ModelParams::new(), &CancelFlag::new()).unwrap();
        model
    }

    #[test]
    fn constant_series_forecasts_constant() {
        let y = vec![10.0; 10];
        let spec = EtsSpec::new(ErrorType::Additive, TrendType::None, SeasonalType::None);
        let model = fit_ets(y, spec, 1);
        let result = model.predict(3, 0.90).unwrap();
        for p in result.point {
            assert!((p - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn seasonal_admissibility_upper_bound_formula() {
        assert!((gamma_upper(0.3, 0.9) - (1.0 + 1.0 / 0.9 - 0.3)).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_series() {
        let series = TimeSeries::from_values(vec![1.0, 2.0]).unwrap();
        let spec = EtsSpec::new(ErrorType::Additive, TrendType::None, SeasonalType::None);
        let mut model = EtsModel::new(spec, 1);
        assert!(matches!(
            model.fit(&series, &ModelParams::new(), &CancelFlag::new()),
            Err(ErrorKind::InsufficientData { .. })
        ));
    }

    #[test]
    fn rejects_multiplicative_error_on_nonpositive_series() {
        let series = TimeSeries::from_values(vec![1.0, -2.0, 3.0, 4.0, 5.0]).unwrap();
        let spec = EtsSpec::new(ErrorType::Multiplicative, TrendType::None, SeasonalType::None);
        let mut model = EtsModel::new(spec, 1);
        assert!(model.fit(&series, &ModelParams::new(), &CancelFlag::new()).is_err());
    }

    #[test]
    fn predict_before_fit_errors() {
        let spec = EtsSpec::new(ErrorType::Additive, TrendType::None, SeasonalType::None);
        let model = EtsModel::new(spec, 1);
        assert!(matches!(model.predict(3, 0.9), Err(ErrorKind::PredictBeforeFit)));
    }

    #[test]
    fn confidence_level_boundary_rejected() {
        let y = vec![10.0; 10];
        let model = fit_ets(y, EtsSpec::new(ErrorType::Additive, TrendType::None, SeasonalType::None), 1);
        assert!(model.predict(3, 0.0).is_err());
        assert!(model.predict(3, 1.0).is_err());
    }

    #[test]
    fn cancelled_flag_short_circuits_fit() {
        let series = TimeSeries::from_values(vec![10.0; 20]).unwrap();
        let spec = EtsSpec::new(ErrorType::Additive, TrendType::None, SeasonalType::None);
        let mut model = EtsModel::new(spec, 1);
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            model.fit(&series, &ModelParams::new(), &cancel),
            Err(ErrorKind::Cancelled)
        ));
    }
}
