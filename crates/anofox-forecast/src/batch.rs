//! Batch dispatcher (C12): the crate's concurrency boundary.
//!
//! Grounded on the rayon `ThreadPoolBuilder` + `num_cpus` fan-out and
//! per-job error isolation pattern used for power-flow batch runs in the
//! retrieved `gat-batch` crate, generalized here from "one job per grid
//! scenario" to "one job per (group_key, model, series)".

use crate::error::ErrorKind;
use crate::factory::ModelInstance;
use crate::params::ModelParams;
use crate::result::ForecastResult;
use crate::series::{TimeSeries, Timestamp};
use crate::timestamps::{future_timestamps, ForecastTimestamp};

#[cfg(feature = "native")]
use rayon::prelude::*;

/// One independent unit of work: a group key, the series for that group,
/// the model name to fit, and the parameters/horizon to use.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub group_key: String,
    pub series: TimeSeries,
    pub model_name: String,
    pub params: ModelParams,
    pub horizon: usize,
}

/// A single output row: `(group_key, forecast_step, future_timestamp,
/// point, lower, upper, model_tag, ...)` per `spec.md` §4.12.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub group_key: String,
    pub forecast_step: usize,
    pub forecast_timestamp: ForecastTimestamp,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
    pub model_name: String,
    pub confidence_level: f64,
    pub fit_time_ms: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    pub aicc: Option<f64>,
    pub error_kind: Option<&'static str>,
}

/// Batch-wide settings: thread count (0 = auto-detect via `num_cpus`)
/// and `safe_mode` (per-group failures become sentinel rows instead of
/// aborting the batch).
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub threads: usize,
    pub safe_mode: bool,
    pub confidence_level: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { threads: 0, safe_mode: true, confidence_level: 0.90 }
    }
}

/// Runs `fit` then `predict` for one job, isolating any failure into its
/// own result rather than propagating it to sibling jobs.
fn run_job(job: &BatchJob, confidence_level: f64) -> Vec<BatchRow> {
    let start = std::time::Instant::now();
    let outcome = ModelInstance::create_and_fit(&job.model_name, &job.series, &job.params)
        .and_then(|model| model.predict(job.horizon, confidence_level).map(|result| (model, result)));
    let fit_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok((_model, result)) => assemble_rows(job, &result, Some(fit_time_ms), None),
        Err(err) => {
            let sentinel = ForecastResult::sentinel(job.horizon, confidence_level);
            assemble_rows(job, &sentinel, None, Some(err.tag()))
        }
    }
}

fn assemble_rows(
    job: &BatchJob,
    result: &ForecastResult,
    fit_time_ms: Option<f64>,
    error_kind: Option<&'static str>,
) -> Vec<BatchRow> {
    let timestamps = future_timestamps(&job.series, job.horizon, true);
    (0..job.horizon)
        .map(|h| BatchRow {
            group_key: job.group_key.clone(),
            forecast_step: h + 1,
            forecast_timestamp: timestamps.get(h).cloned().unwrap_or(ForecastTimestamp::Step(h + 1)),
            point: result.point.get(h).copied().unwrap_or(f64::NAN),
            lower: result.lower.get(h).copied().unwrap_or(f64::NAN),
            upper: result.upper.get(h).copied().unwrap_or(f64::NAN),
            model_name: result.model_name.clone(),
            confidence_level: result.confidence_level,
            fit_time_ms,
            aic: result.aic,
            bic: result.bic,
            aicc: result.aicc,
            error_kind,
        })
        .collect()
}

/// Runs every job in `jobs`, one per CPU core by default (`config.threads
/// == 0`), with failure isolation controlled by `config.safe_mode`.
/// Returns rows ordered by forecast_step ascending within each group; no
/// ordering is guaranteed across groups (`spec.md` §4.12).
#[cfg(feature = "native")]
pub fn run_batch(jobs: &[BatchJob], config: &BatchConfig) -> crate::error::Result<Vec<BatchRow>> {
    let thread_count = if config.threads == 0 { num_cpus::get() } else { config.threads };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count.max(1))
        .build()
        .map_err(|e| ErrorKind::ModelFitFailed(format!("building thread pool: {e}")))?;

    if config.safe_mode {
        let rows: Vec<Vec<BatchRow>> = pool.install(|| jobs.par_iter().map(|job| run_job(job, config.confidence_level)).collect());
        Ok(rows.into_iter().flatten().collect())
    } else {
        let outcomes: Vec<Result<Vec<BatchRow>, ErrorKind>> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    ModelInstance::create_and_fit(&job.model_name, &job.series, &job.params)
                        .and_then(|model| model.predict(job.horizon, config.confidence_level).map(|result| (model, result)))
                        .map(|(_, result)| assemble_rows(job, &result, None, None))
                })
                .collect()
        });
        let mut rows = Vec::new();
        for outcome in outcomes {
            rows.extend(outcome?);
        }
        Ok(rows)
    }
}

/// Sequential fallback used when the `native` feature (rayon/num_cpus)
/// is disabled, e.g. a `wasm` build (`Cargo.toml` feature gate).
#[cfg(not(feature = "native"))]
pub fn run_batch(jobs: &[BatchJob], config: &BatchConfig) -> crate::error::Result<Vec<BatchRow>> {
    let mut rows = Vec::new();
    for job in jobs {
        if config.safe_mode {
            rows.extend(run_job(job, config.confidence_level));
        } else {
            let model = ModelInstance::create_and_fit(&job.model_name, &job.series, &job.params)?;
            let result = model.predict(job.horizon, config.confidence_level)?;
            rows.extend(assemble_rows(job, &result, None, None));
        }
    }
    Ok(rows)
}

/// Groups flat `(group_key, timestamp, value)` rows by `group_key`
/// (first-seen order, observation order preserved within a group) and
/// dispatches one `BatchJob` per group to `run_batch`. This is the
/// entry point the host actually calls: callers hand over raw rows, not
/// pre-built jobs, so the grouping that `BatchJob` assumes has already
/// happened lives here instead.
pub fn batch_forecast(
    rows: impl IntoIterator<Item = (String, Timestamp, f64)>,
    model_name: &str,
    horizon: usize,
    params: &ModelParams,
    safe_mode: bool,
) -> crate::error::Result<Vec<BatchRow>> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: std::collections::HashMap<String, (Vec<Timestamp>, Vec<f64>)> = std::collections::HashMap::new();
    for (group_key, timestamp, value) in rows {
        if !grouped.contains_key(&group_key) {
            order.push(group_key.clone());
        }
        let entry = grouped.entry(group_key).or_insert_with(|| (Vec::new(), Vec::new()));
        entry.0.push(timestamp);
        entry.1.push(value);
    }

    let mut jobs = Vec::with_capacity(order.len());
    let mut sentinel_rows = Vec::new();
    for group_key in order {
        let (timestamps, values) = grouped.remove(&group_key).expect("group_key came from `order`");
        match TimeSeries::with_timestamps(timestamps, values) {
            Ok(series) => jobs.push(BatchJob {
                group_key,
                series,
                model_name: model_name.to_string(),
                params: params.clone(),
                horizon,
            }),
            Err(err) if safe_mode => {
                let sentinel = ForecastResult::sentinel(horizon, params.get_real("confidence_level").unwrap_or(0.90));
                let placeholder = BatchJob {
                    group_key,
                    series: sentinel_series(),
                    model_name: model_name.to_string(),
                    params: params.clone(),
                    horizon,
                };
                sentinel_rows.extend(assemble_rows(&placeholder, &sentinel, None, Some(err.tag())));
            }
            Err(err) => return Err(err),
        }
    }

    let config = BatchConfig {
        safe_mode,
        confidence_level: params.get_real("confidence_level").unwrap_or(0.90),
        ..BatchConfig::default()
    };
    let mut result = run_batch(&jobs, &config)?;
    result.extend(sentinel_rows);
    Ok(result)
}

/// An empty, timestamp-less series used only to carry a sentinel row's
/// forecast-timestamp lookup when the real series failed to construct.
fn sentinel_series() -> TimeSeries {
    TimeSeries::from_values(vec![0.0]).expect("single-point series always constructs")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(group_key: &str, values: Vec<f64>, model: &str) -> BatchJob {
        BatchJob {
            group_key: group_key.to_string(),
            series: TimeSeries::from_values(values).unwrap(),
            model_name: model.to_string(),
            params: ModelParams::new(),
            horizon: 3,
        }
    }

    #[test]
    fn mixed_success_and_failure_under_safe_mode() {
        let jobs = vec![
            job("good", vec![1.0, 2.0, 3.0, 4.0, 5.0], "naive"),
            job("bad", vec![1.0], "naive"),
        ];
        let config = BatchConfig::default();
        let rows = run_batch(&jobs, &config).unwrap();
        let good_rows: Vec<&BatchRow> = rows.iter().filter(|r| r.group_key == "good").collect();
        let bad_rows: Vec<&BatchRow> = rows.iter().filter(|r| r.group_key == "bad").collect();
        assert_eq!(good_rows.len(), 3);
        assert_eq!(bad_rows.len(), 3);
        assert!(good_rows.iter().all(|r| r.point.is_finite()));
        assert!(bad_rows.iter().all(|r| r.point.is_nan()));
        assert_eq!(bad_rows[0].error_kind, Some("InsufficientData"));
    }

    #[test]
    fn rows_within_a_group_are_ordered_by_step() {
        let jobs = vec![job("g", vec![1.0, 2.0, 3.0, 4.0, 5.0], "naive")];
        let rows = run_batch(&jobs, &BatchConfig::default()).unwrap();
        let steps: Vec<usize> = rows.iter().map(|r| r.forecast_step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn non_safe_mode_raises_first_failure() {
        let jobs = vec![job("bad", vec![1.0], "naive")];
        let config = BatchConfig { safe_mode: false, ..BatchConfig::default() };
        assert!(run_batch(&jobs, &config).is_err());
    }

    #[test]
    fn batch_forecast_groups_flat_rows_by_key() {
        let rows = vec![
            ("a".to_string(), Timestamp::Index(0), 1.0),
            ("b".to_string(), Timestamp::Index(0), 10.0),
            ("a".to_string(), Timestamp::Index(1), 2.0),
            ("b".to_string(), Timestamp::Index(1), 11.0),
            ("a".to_string(), Timestamp::Index(2), 3.0),
            ("b".to_string(), Timestamp::Index(2), 12.0),
        ];
        let result = batch_forecast(rows, "naive", 2, &ModelParams::new(), true).unwrap();
        let a_rows: Vec<&BatchRow> = result.iter().filter(|r| r.group_key == "a").collect();
        let b_rows: Vec<&BatchRow> = result.iter().filter(|r| r.group_key == "b").collect();
        assert_eq!(a_rows.len(), 2);
        assert_eq!(b_rows.len(), 2);
        assert!((a_rows[0].point - 3.0).abs() < 1e-9);
        assert!((b_rows[0].point - 12.0).abs() < 1e-9);
    }

    #[test]
    fn batch_forecast_safe_mode_sentinels_a_failing_group() {
        let rows = vec![
            ("good".to_string(), Timestamp::Index(0), 1.0),
            ("good".to_string(), Timestamp::Index(1), 2.0),
            ("good".to_string(), Timestamp::Index(2), 3.0),
            ("bad".to_string(), Timestamp::Index(0), 1.0),
        ];
        let result = batch_forecast(rows, "naive", 2, &ModelParams::new(), true).unwrap();
        let bad_rows: Vec<&BatchRow> = result.iter().filter(|r| r.group_key == "bad").collect();
        assert_eq!(bad_rows.len(), 2);
        assert!(bad_rows.iter().all(|r| r.point.is_nan()));
    }
}
