//! Core forecasting engine backing a SQL-facing host's `FORECAST`/
//! `FORECAST_BATCH` functions: ETS (C3/C4), Theta-Pegels (C5), simple
//! baselines and Holt/Holt-Winters presets (C6), intermittent-demand
//! estimators (C7), seasonal exponential smoothing (C8), multi-seasonal
//! decomposition models (C9), a name-dispatched model factory (C10), and
//! a parallel batch dispatcher (C12).
//!
//! Dispatch across model kinds is a tagged-variant pattern match
//! (`factory::ModelInstance`), not a `dyn Forecaster` trait object:
//! every model is a concrete, sized struct owned by the worker that fits
//! it, with no shared mutable state and no locking. Shared recursion
//! code (the ETS step function, the Theta-Pegels update) is a free
//! function taking a state and parameter struct, not a method on a base
//! class.

pub mod baselines;
pub mod batch;
pub mod error;
pub mod ets;
pub mod factory;
pub mod intermittent;
pub mod intervals;
pub mod multiseasonal;
pub mod optim;
pub mod params;
pub mod result;
pub mod seasonal_es;
pub mod series;
pub mod theta;
pub mod timestamps;

pub use error::{ErrorKind, Result};
pub use factory::ModelInstance;
pub use optim::CancelFlag;
pub use params::{ModelParams, ParamValue};
pub use result::ForecastResult;
pub use series::{Interval, TimeSeries, Timestamp};

/// The common forecasting contract every model in this crate implements:
/// fit once on a series, then predict and optionally read back in-sample
/// fitted values. `ModelInstance` implements this by delegating to
/// whichever concrete model it wraps.
pub trait Forecaster {
    fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()>;
    fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult>;
    /// In-sample fitted values, empty unless `return_insample` is set
    /// (the caller pays the allocation only when it wants them back).
    fn in_sample(&self, return_insample: bool) -> Vec<f64>;
}

impl Forecaster for ModelInstance {
    fn fit(&mut self, series: &TimeSeries, params: &ModelParams, cancel: &CancelFlag) -> Result<()> {
        ModelInstance::fit(self, series, params, cancel)
    }

    fn predict(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        ModelInstance::predict(self, horizon, confidence_level)
    }

    fn in_sample(&self, return_insample: bool) -> Vec<f64> {
        ModelInstance::in_sample(self, return_insample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// End-to-end smoke test: factory dispatch -> predict, for a plain
    /// model name and for the auto-selecting one.
    #[test]
    fn factory_round_trip_naive_and_autoets() {
        let series = TimeSeries::from_values(vec![10.0; 12]).unwrap();
        let naive = ModelInstance::create_and_fit("Naive", &series, &ModelParams::new()).unwrap();
        let result = naive.predict(3, 0.90).unwrap();
        assert_eq!(result.point, vec![10.0, 10.0, 10.0]);

        let trending: Vec<f64> = (0..24).map(|i| 100.0 + i as f64 * 2.0).collect();
        let trending_series = TimeSeries::from_values(trending).unwrap();
        let auto = ModelInstance::create_and_fit("AutoETS", &trending_series, &ModelParams::new()).unwrap();
        let auto_result = auto.predict(4, 0.90).unwrap();
        assert_eq!(auto_result.point.len(), 4);
        assert!(auto_result.point.windows(2).all(|w| w[1] >= w[0] - 1e-6));
    }

    #[test]
    fn forecaster_trait_is_implemented_by_model_instance() {
        fn fit_via_trait<T: Forecaster>(model: &mut T, series: &TimeSeries, params: &ModelParams) -> Result<()> {
            model.fit(series, params, &CancelFlag::new())
        }

        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let mut model = ModelInstance::create("naive", &ModelParams::new(), 1).unwrap();
        fit_via_trait(&mut model, &series, &ModelParams::new()).unwrap();
        let result = Forecaster::predict(&model, 2, 0.9).unwrap();
        assert_eq!(result.point.len(), 2);
    }

    #[test]
    fn in_sample_gated_by_return_insample_flag() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let model = ModelInstance::create_and_fit("Naive", &series, &ModelParams::new()).unwrap();
        assert!(Forecaster::in_sample(&model, false).is_empty());
        assert_eq!(Forecaster::in_sample(&model, true).len(), series.len());
    }
}
