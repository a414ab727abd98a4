//! Model factory (C10): case-insensitive name -> instance dispatch, with
//! parameter-map schema validation per model.
//!
//! Dispatch is a tagged-variant pattern match (`ModelInstance`), not a
//! `dyn Forecaster` trait object — each worker owns a concrete, sized
//! instance with no shared mutable state (see module doc on
//! `crate::lib`'s design note).

use crate::baselines::{Holt, HoltWinters, Naive, RandomWalkDrift, Ses, Sma};
use crate::error::{ErrorKind, Result};
use crate::ets::auto::AutoEtsModel;
use crate::ets::{EtsModel, EtsSpec, ErrorType, SeasonalType, TrendType};
use crate::intermittent::{Adida, Croston, CrostonVariant, Imapa, Tsb};
use crate::multiseasonal::{AutoTbats, Mfles, Mstl, Tbats};
use crate::optim::CancelFlag;
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::seasonal_es::{SeasonalEs, SeasonalEsOptimized, SeasonalWindowAverage};
use crate::series::TimeSeries;
use crate::theta::{ThetaModel, ThetaVariant};

use crate::baselines::SeasonalNaive;

/// Every model name the factory recognizes, normalized to lowercase
/// without separators for the alias table below.
fn normalize(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric()).map(|c| c.to_ascii_lowercase()).collect()
}

/// A concrete, owned model instance. Fit exactly once, then queried
/// (the crate-wide lifecycle contract).
#[derive(Debug, Clone)]
pub enum ModelInstance {
    Naive(Naive),
    SeasonalNaive(SeasonalNaive),
    RandomWalkDrift(RandomWalkDrift),
    Sma(Sma),
    Ses(Ses),
    Holt(Holt),
    HoltWinters(HoltWinters),
    Ets(EtsModel),
    AutoEts { seasonal_period: usize, model: Option<AutoEtsModel> },
    Theta(ThetaModel),
    SeasonalEs(SeasonalEs),
    SeasonalEsOptimized(SeasonalEsOptimized),
    SeasonalWindowAverage(SeasonalWindowAverage),
    Croston(Croston),
    Adida(Adida),
    Imapa(Imapa),
    Tsb(Tsb),
    Mstl(Mstl),
    Mfles(Mfles),
    Tbats(Tbats),
    AutoTbats { max_harmonics: usize, model: Option<AutoTbats> },
}

impl std::fmt::Debug for AutoEtsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoEtsModel").field("spec", &self.best.spec).finish()
    }
}

impl Clone for AutoEtsModel {
    fn clone(&self) -> Self {
        Self { best: self.best.clone() }
    }
}

impl std::fmt::Debug for AutoTbats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTbats").finish()
    }
}

impl Clone for AutoTbats {
    fn clone(&self) -> Self {
        Self { best: self.best.clone() }
    }
}

fn ets_spec_from_params(params: &ModelParams) -> Result<EtsSpec> {
    let error = match params.get_bool("multiplicative_error").unwrap_or(false) {
        true => ErrorType::Multiplicative,
        false => ErrorType::Additive,
    };
    let trend = match params.get_usize("trend_code") {
        None => TrendType::None,
        Some(0) => TrendType::None,
        Some(1) => TrendType::Additive,
        Some(2) => TrendType::AdditiveDamped,
        Some(3) => TrendType::Multiplicative,
        Some(4) => TrendType::MultiplicativeDamped,
        Some(other) => {
            return Err(ErrorKind::InvalidParameter {
                param: "trend_code".to_string(),
                value: other.to_string(),
                reason: "expected 0..=4".to_string(),
            })
        }
    };
    let seasonal = match params.get_usize("seasonal_code") {
        None => SeasonalType::None,
        Some(0) => SeasonalType::None,
        Some(1) => SeasonalType::Additive,
        Some(2) => SeasonalType::Multiplicative,
        Some(other) => {
            return Err(ErrorKind::InvalidParameter {
                param: "seasonal_code".to_string(),
                value: other.to_string(),
                reason: "expected 0..=2".to_string(),
            })
        }
    };
    Ok(EtsSpec::new(error, trend, seasonal))
}

/// Cross-parameter invariant checks that belong to the factory rather
/// than to any single model's `fit`: `seasonal_period >= 2` and
/// `N >= seasonal_period + 3` for models that declare a seasonal
/// component (`SPEC_FULL.md` §4.6a).
fn check_seasonal_invariant(name: &str, params: &ModelParams, n: usize) -> Result<()> {
    let m = params.seasonal_period(1);
    if m < 2 {
        return Err(ErrorKind::InvalidParameter {
            param: "seasonal_period".to_string(),
            value: m.to_string(),
            reason: format!("{name} requires seasonal_period >= 2"),
        });
    }
    if n < m + 3 {
        return Err(ErrorKind::InsufficientData { needed: m + 3, got: n });
    }
    Ok(())
}

const SHARED_KEYS: &[(&str, &'static str)] = &[
    ("confidence_level", "real"),
    ("return_insample", "bool"),
];

/// The recognized parameter keys for `name`, shared keys plus any the
/// model declares for itself. Used by `create_and_fit_raw` to reject
/// unknown keys before a model ever sees them (C10).
fn schema_for(name: &str) -> Vec<(&'static str, &'static str)> {
    let mut schema: Vec<(&'static str, &'static str)> = SHARED_KEYS.to_vec();
    let key = normalize(name);
    let model_specific: &[(&str, &'static str)] = match key.as_str() {
        "seasonalnaive" | "snaive" | "holtwinters" | "hw" | "seasonales" | "seasonalesoptimized" => {
            &[("seasonal_period", "int")]
        }
        "seasonalwindowaverage" | "swa" => &[("seasonal_period", "int"), ("window_cycles", "int")],
        "sma" => &[("window", "int")],
        "ses" | "sesoptimized" => &[("alpha", "real")],
        "ets" | "autoets" | "auto" => &[
            ("seasonal_period", "int"),
            ("multiplicative_error", "bool"),
            ("trend_code", "int"),
            ("seasonal_code", "int"),
        ],
        "crostonclassic" | "croston" | "crostonoptimized" | "crostonsba" | "sba" => &[("alpha", "real")],
        "tsb" => &[("alpha_d", "real"), ("alpha_p", "real")],
        "mstl" | "automstl" => &[("seasonal_periods", "real_list"), ("horizon", "int")],
        "mfles" | "automfles" => &[("seasonal_periods", "real_list"), ("n_iterations", "int"), ("max_rounds", "int")],
        "tbats" => &[("seasonal_periods", "real_list"), ("harmonics", "int")],
        "autotbats" => &[("seasonal_periods", "real_list"), ("max_harmonics", "int")],
        _ => &[],
    };
    schema.extend_from_slice(model_specific);
    schema
}

impl ModelInstance {
    /// Instantiates an unfit model shell for `name`. `seasonal_period`
    /// is fixed here for the models whose internal recursion dimension
    /// depends on it (HoltWinters, ETS, AutoETS, SeasonalESOptimized);
    /// the remaining seasonal models re-read `seasonal_period` from
    /// `params` at `fit` time instead, matching how they were already
    /// parameterized before this split.
    pub fn create(name: &str, params: &ModelParams, seasonal_period: usize) -> Result<Self> {
        let key = normalize(name);
        let instance = match key.as_str() {
            "naive" => ModelInstance::Naive(Naive::new()),
            "seasonalnaive" | "snaive" => ModelInstance::SeasonalNaive(SeasonalNaive::new()),
            "randomwalkdrift" | "randomwalkwithdrift" => ModelInstance::RandomWalkDrift(RandomWalkDrift::new()),
            "sma" => ModelInstance::Sma(Sma::new()),
            "ses" => ModelInstance::Ses(Ses::new(false)),
            "sesoptimized" => ModelInstance::Ses(Ses::new(true)),
            "holt" => ModelInstance::Holt(Holt::new()),
            "holtwinters" | "hw" => ModelInstance::HoltWinters(HoltWinters::new(seasonal_period)),
            "ets" => {
                let spec = ets_spec_from_params(params)?;
                ModelInstance::Ets(EtsModel::new(spec, seasonal_period))
            }
            "autoets" | "auto" => ModelInstance::AutoEts { seasonal_period, model: None },
            "theta" => ModelInstance::Theta(ThetaModel::new(ThetaVariant::Theta)),
            "optimizedtheta" | "otm" => ModelInstance::Theta(ThetaModel::new(ThetaVariant::OptimizedTheta)),
            "dynamictheta" | "dstm" => ModelInstance::Theta(ThetaModel::new(ThetaVariant::DynamicTheta)),
            "dynamicoptimizedtheta" | "dotm" | "autotheta" => {
                ModelInstance::Theta(ThetaModel::new(ThetaVariant::DynamicOptimizedTheta))
            }
            "seasonales" => ModelInstance::SeasonalEs(SeasonalEs::new(params.get_bool("multiplicative").unwrap_or(false))),
            "seasonalesoptimized" => ModelInstance::SeasonalEsOptimized(SeasonalEsOptimized::new(
                params.get_bool("multiplicative").unwrap_or(false),
                seasonal_period,
            )),
            "seasonalwindowaverage" | "swa" => ModelInstance::SeasonalWindowAverage(SeasonalWindowAverage::new()),
            "crostonclassic" | "croston" => ModelInstance::Croston(Croston::new(CrostonVariant::Classic)),
            "crostonoptimized" => ModelInstance::Croston(Croston::new(CrostonVariant::Optimized)),
            "crostonsba" | "sba" => ModelInstance::Croston(Croston::new(CrostonVariant::Sba)),
            "adida" => ModelInstance::Adida(Adida::new()),
            "imapa" => ModelInstance::Imapa(Imapa::new()),
            "tsb" => ModelInstance::Tsb(Tsb::new()),
            "mstl" | "automstl" => ModelInstance::Mstl(Mstl::new()),
            "mfles" | "automfles" => ModelInstance::Mfles(Mfles::new()),
            "tbats" => ModelInstance::Tbats(Tbats::new()),
            "autotbats" => ModelInstance::AutoTbats {
                max_harmonics: params.get_usize("max_harmonics").unwrap_or(3),
                model: None,
            },
            other => {
                return Err(ErrorKind::InvalidParameter {
                    param: "model".to_string(),
                    value: other.to_string(),
                    reason: "unrecognized model name".to_string(),
                })
            }
        };
        Ok(instance)
    }

    /// Fits an instance produced by `create` against `series`. Seasonal
    /// cross-parameter invariants are checked here rather than in
    /// `create` since they depend on the series length, which `create`
    /// never sees.
    pub fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        let n = series.len();
        match self {
            ModelInstance::Naive(m) => m.fit(series, params, cancel),
            ModelInstance::SeasonalNaive(m) => {
                check_seasonal_invariant("SeasonalNaive", params, n)?;
                m.fit(series, params, cancel)
            }
            ModelInstance::RandomWalkDrift(m) => m.fit(series, params, cancel),
            ModelInstance::Sma(m) => m.fit(series, params, cancel),
            ModelInstance::Ses(m) => m.fit(series, params, cancel),
            ModelInstance::Holt(m) => m.fit(series, params, cancel),
            ModelInstance::HoltWinters(m) => {
                check_seasonal_invariant("HoltWinters", params, n)?;
                m.fit(series, params, cancel)
            }
            ModelInstance::Ets(m) => m.fit(series, params, cancel),
            ModelInstance::AutoEts { seasonal_period, model } => {
                let fitted = AutoEtsModel::fit(series, params, *seasonal_period, cancel)?;
                *model = Some(fitted);
                Ok(())
            }
            ModelInstance::Theta(m) => m.fit(series, params, cancel),
            ModelInstance::SeasonalEs(m) => {
                check_seasonal_invariant("SeasonalES", params, n)?;
                m.fit(series, params, cancel)
            }
            ModelInstance::SeasonalEsOptimized(m) => {
                check_seasonal_invariant("SeasonalESOptimized", params, n)?;
                m.fit(series, params, cancel)
            }
            ModelInstance::SeasonalWindowAverage(m) => {
                check_seasonal_invariant("SeasonalWindowAverage", params, n)?;
                m.fit(series, params, cancel)
            }
            ModelInstance::Croston(m) => m.fit(series, params, cancel),
            ModelInstance::Adida(m) => m.fit(series, params, cancel),
            ModelInstance::Imapa(m) => m.fit(series, params, cancel),
            ModelInstance::Tsb(m) => m.fit(series, params, cancel),
            ModelInstance::Mstl(m) => {
                let horizon_hint = params.get_usize("horizon").unwrap_or(1);
                m.fit(series, params, horizon_hint, cancel)
            }
            ModelInstance::Mfles(m) => m.fit(series, params, cancel),
            ModelInstance::Tbats(m) => m.fit(series, params, cancel),
            ModelInstance::AutoTbats { max_harmonics, model } => {
                let fitted = AutoTbats::fit(series, params, *max_harmonics, cancel)?;
                *model = Some(fitted);
                Ok(())
            }
        }
    }

    /// Instantiates and fits a model in one step, for callers that don't
    /// need to separate model configuration from data. `seasonal_period`
    /// defaults match what each model previously assumed when created
    /// through this single-step path.
    pub fn create_and_fit(name: &str, series: &TimeSeries, params: &ModelParams) -> Result<Self> {
        let key = normalize(name);
        let default_seasonal = match key.as_str() {
            "seasonalesoptimized" | "seasonalwindowaverage" | "swa" | "seasonales" => 2,
            _ => 1,
        };
        let seasonal_period = params.seasonal_period(default_seasonal);
        let mut instance = Self::create(name, params, seasonal_period)?;
        instance.fit(series, params, &CancelFlag::new())?;
        Ok(instance)
    }

    /// Validates raw host parameters against the declared schema for
    /// `name` (unknown-key / wrong-type rejection, default fill-in),
    /// then creates and fits in one step. This is the factory's actual
    /// entry point from the host boundary (§6); `create_and_fit` above
    /// is the lower-level path used once parameters are already a
    /// trusted `ModelParams`.
    pub fn create_and_fit_raw(
        name: &str,
        raw: std::collections::HashMap<String, crate::params::ParamValue>,
        series: &TimeSeries,
    ) -> Result<Self> {
        let schema = schema_for(name);
        let params = ModelParams::from_raw(raw, &schema, &ModelParams::new())?;
        Self::create_and_fit(name, series, &params)
    }

    pub fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        match self {
            ModelInstance::Naive(m) => m.predict(horizon, confidence_level),
            ModelInstance::SeasonalNaive(m) => m.predict(horizon, confidence_level),
            ModelInstance::RandomWalkDrift(m) => m.predict(horizon, confidence_level),
            ModelInstance::Sma(m) => m.predict(horizon, confidence_level),
            ModelInstance::Ses(m) => m.predict(horizon, confidence_level),
            ModelInstance::Holt(m) => m.predict(horizon, confidence_level),
            ModelInstance::HoltWinters(m) => m.predict(horizon, confidence_level),
            ModelInstance::Ets(m) => m.predict(horizon, confidence_level),
            ModelInstance::AutoEts { model, .. } => {
                model.as_ref().ok_or(ErrorKind::PredictBeforeFit)?.predict(horizon, confidence_level)
            }
            ModelInstance::Theta(m) => m.predict(horizon, confidence_level),
            ModelInstance::SeasonalEs(m) => m.predict(horizon, confidence_level),
            ModelInstance::SeasonalEsOptimized(m) => m.predict(horizon, confidence_level),
            ModelInstance::SeasonalWindowAverage(m) => m.predict(horizon, confidence_level),
            ModelInstance::Croston(m) => m.predict(horizon, confidence_level),
            ModelInstance::Adida(m) => m.predict(horizon, confidence_level),
            ModelInstance::Imapa(m) => m.predict(horizon, confidence_level),
            ModelInstance::Tsb(m) => m.predict(horizon, confidence_level),
            ModelInstance::Mstl(m) => m.predict(horizon, confidence_level),
            ModelInstance::Mfles(m) => m.predict(horizon, confidence_level),
            ModelInstance::Tbats(m) => m.predict(horizon, confidence_level),
            ModelInstance::AutoTbats { model, .. } => {
                model.as_ref().ok_or(ErrorKind::PredictBeforeFit)?.predict(horizon, confidence_level)
            }
        }
    }

    /// The raw, ungated fitted-value series (may be empty if the model
    /// hasn't been fit, e.g. an `AutoEts`/`AutoTbats` shell between
    /// `create` and `fit`).
    pub fn fitted_values(&self) -> &[f64] {
        match self {
            ModelInstance::Naive(m) => m.fitted_values(),
            ModelInstance::SeasonalNaive(m) => m.fitted_values(),
            ModelInstance::RandomWalkDrift(m) => m.fitted_values(),
            ModelInstance::Sma(m) => m.fitted_values(),
            ModelInstance::Ses(m) => m.fitted_values(),
            ModelInstance::Holt(m) => m.fitted_values(),
            ModelInstance::HoltWinters(m) => m.fitted_values(),
            ModelInstance::Ets(m) => m.fitted_values(),
            ModelInstance::AutoEts { model, .. } => model.as_ref().map(|a| a.fitted_values()).unwrap_or(&[]),
            ModelInstance::Theta(m) => m.fitted_values(),
            ModelInstance::SeasonalEs(m) => m.fitted_values(),
            ModelInstance::SeasonalEsOptimized(m) => m.fitted_values(),
            ModelInstance::SeasonalWindowAverage(m) => m.fitted_values(),
            ModelInstance::Croston(m) => m.fitted_values(),
            ModelInstance::Adida(m) => m.fitted_values(),
            ModelInstance::Imapa(m) => m.fitted_values(),
            ModelInstance::Tsb(m) => m.fitted_values(),
            ModelInstance::Mstl(m) => m.fitted_values(),
            ModelInstance::Mfles(m) => m.fitted_values(),
            ModelInstance::Tbats(m) => m.fitted_values(),
            ModelInstance::AutoTbats { model, .. } => model.as_ref().map(|a| a.fitted_values()).unwrap_or(&[]),
        }
    }

    /// The in-sample (fitted) series, empty unless `return_insample` is
    /// set: the host pays the allocation only when it actually wants the
    /// fitted values back.
    pub fn in_sample(&self, return_insample: bool) -> Vec<f64> {
        if return_insample {
            self.fitted_values().to_vec()
        } else {
            Vec::new()
        }
    }

    /// `in_sample` gated by the `return_insample` parameter key instead
    /// of an explicit bool, for callers that already carry a
    /// `ModelParams`.
    pub fn in_sample_from_params(&self, params: &ModelParams) -> Vec<f64> {
        self.in_sample(params.return_insample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_case_insensitively() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let a = ModelInstance::create_and_fit("naive", &series, &ModelParams::new()).unwrap();
        let b = ModelInstance::create_and_fit("NAIVE", &series, &ModelParams::new()).unwrap();
        assert_eq!(a.predict(1, 0.9).unwrap().point, b.predict(1, 0.9).unwrap().point);
    }

    #[test]
    fn rejects_unknown_model_name() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let result = ModelInstance::create_and_fit("not_a_model", &series, &ModelParams::new());
        assert!(result.is_err());
    }

    #[test]
    fn holt_winters_enforces_cross_parameter_invariant() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        let mut params = ModelParams::new();
        params.insert("seasonal_period", 4i64);
        let result = ModelInstance::create_and_fit("HoltWinters", &series, &params);
        assert!(result.is_err());
    }

    #[test]
    fn auto_ets_dispatch_runs() {
        let y: Vec<f64> = (0..20).map(|i| 5.0 + i as f64 * 0.5).collect();
        let series = TimeSeries::from_values(y).unwrap();
        let model = ModelInstance::create_and_fit("AutoETS", &series, &ModelParams::new()).unwrap();
        let result = model.predict(3, 0.9).unwrap();
        assert_eq!(result.point.len(), 3);
    }

    #[test]
    fn raw_params_reject_unknown_key() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut raw = std::collections::HashMap::new();
        raw.insert("not_a_real_key".to_string(), crate::params::ParamValue::Real(1.0));
        let result = ModelInstance::create_and_fit_raw("naive", raw, &series);
        assert!(result.is_err());
    }

    #[test]
    fn raw_params_accept_declared_key() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut raw = std::collections::HashMap::new();
        raw.insert("window".to_string(), crate::params::ParamValue::Int(2));
        let result = ModelInstance::create_and_fit_raw("sma", raw, &series);
        assert!(result.is_ok());
    }

    #[test]
    fn create_then_fit_matches_create_and_fit() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let params = ModelParams::new();
        let mut split = ModelInstance::create("naive", &params, 1).unwrap();
        split.fit(&series, &params, &CancelFlag::new()).unwrap();
        let fused = ModelInstance::create_and_fit("naive", &series, &params).unwrap();
        assert_eq!(split.predict(2, 0.9).unwrap().point, fused.predict(2, 0.9).unwrap().point);
    }

    #[test]
    fn predict_before_fit_on_auto_variant_is_rejected() {
        let params = ModelParams::new();
        let instance = ModelInstance::create("autoets", &params, 1).unwrap();
        assert!(matches!(instance.predict(1, 0.9), Err(ErrorKind::PredictBeforeFit)));
    }

    #[test]
    fn in_sample_is_empty_unless_requested() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let model = ModelInstance::create_and_fit("naive", &series, &ModelParams::new()).unwrap();
        assert!(model.in_sample(false).is_empty());
        assert_eq!(model.in_sample(true).len(), model.fitted_values().len());

        let mut params = ModelParams::new();
        params.insert("return_insample", true);
        assert_eq!(model.in_sample_from_params(&params).len(), model.fitted_values().len());
        assert!(model.in_sample_from_params(&ModelParams::new()).is_empty());
    }
}
