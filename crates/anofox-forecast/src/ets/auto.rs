//! AutoETS (C4): enumerate ETS variants and select by AICc.

use super::{ErrorType, EtsModel, EtsSpec, SeasonalType, TrendType};
use crate::error::{ErrorKind, Result};
use crate::optim::{CancelFlag, CancelToken};
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::TimeSeries;

const TRENDS: [TrendType; 5] = [
    TrendType::None,
    TrendType::Additive,
    TrendType::AdditiveDamped,
    TrendType::Multiplicative,
    TrendType::MultiplicativeDamped,
];

fn lexicographic_rank(spec: EtsSpec) -> (u8, u8, u8) {
    let e = match spec.error {
        ErrorType::Additive => 0,
        ErrorType::Multiplicative => 1,
    };
    let t = match spec.trend {
        TrendType::None => 0,
        TrendType::Additive => 1,
        TrendType::AdditiveDamped => 2,
        TrendType::Multiplicative => 3,
        TrendType::MultiplicativeDamped => 4,
    };
    let s = match spec.seasonal {
        SeasonalType::None => 0,
        SeasonalType::Additive => 1,
        SeasonalType::Multiplicative => 2,
    };
    (e, t, s)
}

/// The outcome of automatic ETS selection: the winning fitted model plus
/// the information criteria it was chosen on.
pub struct AutoEtsModel {
    pub best: EtsModel,
}

impl AutoEtsModel {
    /// Enumerates the {error} x {trend} x {seasonal} cross-product
    /// restricted per `spec.md` §4.4: seasonal forced to `none` when
    /// `seasonal_period` is 1 or absent, multiplicative error/seasonal
    /// skipped whenever any observation is <= 0.
    pub fn fit(series: &TimeSeries, params: &ModelParams, seasonal_period: usize, cancel: &CancelFlag) -> Result<Self> {
        let y = series.values();
        let allow_multiplicative = y.iter().all(|v| *v > 0.0);
        let seasonal_options: Vec<SeasonalType> = if seasonal_period > 1 {
            if allow_multiplicative {
                vec![SeasonalType::None, SeasonalType::Additive, SeasonalType::Multiplicative]
            } else {
                vec![SeasonalType::None, SeasonalType::Additive]
            }
        } else {
            vec![SeasonalType::None]
        };
        let error_options: Vec<ErrorType> = if allow_multiplicative {
            vec![ErrorType::Additive, ErrorType::Multiplicative]
        } else {
            vec![ErrorType::Additive]
        };

        let mut candidates: Vec<EtsSpec> = Vec::new();
        for &error in &error_options {
            for &trend in &TRENDS {
                for &seasonal in &seasonal_options {
                    candidates.push(EtsSpec::new(error, trend, seasonal));
                }
            }
        }

        let mut best: Option<(EtsModel, f64, usize)> = None;
        let mut last_err: Option<ErrorKind> = None;
        for spec in candidates {
            if cancel.cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            let mut model = EtsModel::new(spec, seasonal_period.max(1));
            match model.fit(series, params, cancel) {
                Ok(()) => {
                    let aicc = model.aicc().unwrap_or(f64::INFINITY);
                    if !aicc.is_finite() {
                        continue;
                    }
                    let k = crate::ets::free_param_count_pub(spec, model.m);
                    let better = match &best {
                        None => true,
                        Some((_, best_aicc, best_k)) => {
                            if (aicc - best_aicc).abs() < 1e-12 {
                                // tie-break: smaller k, then lexicographic (error, trend, seasonal)
                                k < *best_k
                                    || (k == *best_k
                                        && lexicographic_rank(spec)
                                            < lexicographic_rank(best.as_ref().unwrap().0.spec))
                            } else {
                                aicc < *best_aicc
                            }
                        }
                    };
                    if better {
                        best = Some((model, aicc, k));
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }

        match best {
            Some((model, _, _)) => Ok(Self { best: model }),
            None => Err(last_err.unwrap_or(ErrorKind::ModelFitFailed(
                "no ETS variant converged".to_string(),
            ))),
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
    fn selects_seasonal_for_clear_seasonality() {
        let mut y = Vec::new();
        for cycle in 0..8 {
            for phase in 0..4 {
                y.push(10.0 + phase as f64 * 2.0 + cycle as f64 * 0.1);
            }
        }
        let series = TimeSeries::from_values(y).unwrap();
        let auto = AutoEtsModel::fit(&series, &ModelParams::new(), 4, &CancelFlag::new()).unwrap();
        assert!(auto.best.spec.seasonal.is_present());
    }

    #[test]
    fn excludes_multiplicative_on_nonpositive_series() {
        let y = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0];
        let series = TimeSeries::from_values(y).unwrap();
        let auto = AutoEtsModel::fit(&series, &ModelParams::new(), 1, &CancelFlag::new()).unwrap();
        assert_eq!(auto.best.spec.error, ErrorType::Additive);
    }

    #[test]
    fn constant_series_forecast_is_constant() {
        let y = vec![5.0; 12];
        let series = TimeSeries::from_values(y).unwrap();
        let auto = AutoEtsModel::fit(&series, &ModelParams::new(), 1, &CancelFlag::new()).unwrap();
        let result = auto.predict(4, 0.9).unwrap();
        for p in result.point {
            assert!((p - 5.0).abs() < 1e-6);
        }
    }
}
