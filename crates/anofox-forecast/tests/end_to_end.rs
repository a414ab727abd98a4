//! Cross-component integration tests: the six literal end-to-end
//! scenarios named by this crate's testable-properties section, driven
//! through the factory (scenarios 1-5) and the batch dispatcher
//! (scenario 6).

use anofox_forecast::batch::{BatchConfig, BatchJob};
use anofox_forecast::{ModelInstance, ModelParams, TimeSeries};

fn series(values: Vec<f64>) -> TimeSeries {
    TimeSeries::from_values(values).unwrap()
}

#[test]
fn naive_on_constant_input() {
    let s = series(vec![10.0, 10.0, 10.0, 10.0, 10.0]);
    let model = ModelInstance::create_and_fit("Naive", &s, &ModelParams::new()).unwrap();
    let result = model.predict(3, 0.90).unwrap();
    assert_eq!(result.point, vec![10.0, 10.0, 10.0]);
    assert_eq!(result.lower, vec![10.0, 10.0, 10.0]);
    assert_eq!(result.upper, vec![10.0, 10.0, 10.0]);
    assert_eq!(result.model_name, "Naive");
}

#[test]
fn seasonal_naive_weekly() {
    let values: Vec<f64> = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
        .iter()
        .cycle()
        .take(21)
        .copied()
        .collect();
    let s = series(values);
    let mut params = ModelParams::new();
    params.insert("seasonal_period", 7i64);
    let model = ModelInstance::create_and_fit("SeasonalNaive", &s, &params).unwrap();
    let result = model.predict(7, 0.90).unwrap();
    assert_eq!(result.point, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn random_walk_drift_linear() {
    let s = series(vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    let model = ModelInstance::create_and_fit("RandomWalkWithDrift", &s, &ModelParams::new()).unwrap();
    let result = model.predict(3, 0.90).unwrap();
    for (got, expected) in result.point.iter().zip([60.0, 70.0, 80.0]) {
        assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
    }
}

#[test]
fn ses_on_trendless_noisy_input() {
    let values: Vec<f64> = (0..50)
        .map(|i| 100.0 + (i as f64 * 0.9).sin())
        .collect();
    let s = series(values);
    let model = ModelInstance::create_and_fit("SESOptimized", &s, &ModelParams::new()).unwrap();
    let result = model.predict(5, 0.90).unwrap();
    assert_eq!(result.point.len(), 5);
    for p in &result.point {
        assert!((99.0..=101.0).contains(p), "point {p} out of range");
    }
    let width_1 = result.upper[0] - result.lower[0];
    let width_5 = result.upper[4] - result.lower[4];
    assert!(width_1 < width_5, "interval should widen with horizon: {width_1} vs {width_5}");
}

#[test]
fn autoets_on_airpassengers_prefix() {
    let values: Vec<f64> = AIR_PASSENGERS.to_vec();
    let s = series(values);
    let mut params = ModelParams::new();
    params.insert("seasonal_period", 12i64);
    let model = ModelInstance::create_and_fit("AutoETS", &s, &params).unwrap();
    let result = model.predict(12, 0.90).unwrap();
    assert_eq!(result.point.len(), 12);
    assert!(
        result.model_name.ends_with(",M)"),
        "expected a multiplicative-seasonal variant, got {}",
        result.model_name
    );
    let first = result.point[0];
    let reference = 424.0;
    let rel_error = (first - reference).abs() / reference;
    assert!(rel_error < 0.03, "first forecast {first} too far from reference {reference}");
}

#[test]
fn batch_with_mixed_failure() {
    let horizon = 4usize;
    let jobs = vec![
        BatchJob {
            group_key: "A".to_string(),
            series: series(vec![5.0, 5.0, 5.0, 5.0, 5.0]),
            model_name: "Naive".to_string(),
            params: ModelParams::new(),
            horizon,
        },
        BatchJob {
            group_key: "B".to_string(),
            series: series(vec![1.0, 2.0]),
            model_name: "AutoETS".to_string(),
            params: {
                let mut p = ModelParams::new();
                p.insert("seasonal_period", 12i64);
                p
            },
            horizon,
        },
        BatchJob {
            group_key: "C".to_string(),
            series: series(vec![1.0, f64::NAN, 3.0, 4.0, 5.0]),
            model_name: "Naive".to_string(),
            params: ModelParams::new(),
            horizon,
        },
    ];
    let config = BatchConfig { safe_mode: true, ..BatchConfig::default() };
    let rows = anofox_forecast::batch::run_batch(&jobs, &config).unwrap();

    assert_eq!(rows.len(), 3 * horizon);

    let a_rows: Vec<_> = rows.iter().filter(|r| r.group_key == "A").collect();
    assert!(a_rows.iter().all(|r| r.point.is_finite()));
    assert!(a_rows.iter().all(|r| r.error_kind.is_none()));

    let b_rows: Vec<_> = rows.iter().filter(|r| r.group_key == "B").collect();
    assert!(b_rows.iter().all(|r| r.point.is_nan()));
    assert_eq!(b_rows[0].error_kind, Some("InsufficientData"));

    let c_rows: Vec<_> = rows.iter().filter(|r| r.group_key == "C").collect();
    assert!(c_rows.iter().all(|r| r.point.is_nan()));
    assert_eq!(c_rows[0].error_kind, Some("NonFiniteObservation"));
}

/// The classic 132-month AirPassengers prefix (1949-01 through 1959-12),
/// used by statsforecast's own AutoETS reference tests.
const AIR_PASSENGERS: [f64; 132] = [
    112.0, 118.0, 132.0, 129.0, 121.0, 135.0, 148.0, 148.0, 136.0, 119.0, 104.0, 118.0, 115.0,
    126.0, 141.0, 135.0, 125.0, 149.0, 170.0, 170.0, 158.0, 133.0, 114.0, 140.0, 145.0, 150.0,
    178.0, 163.0, 172.0, 178.0, 199.0, 199.0, 184.0, 162.0, 146.0, 166.0, 171.0, 180.0, 193.0,
    181.0, 183.0, 218.0, 230.0, 242.0, 209.0, 191.0, 172.0, 194.0, 196.0, 196.0, 236.0, 235.0,
    229.0, 243.0, 264.0, 272.0, 237.0, 211.0, 180.0, 201.0, 204.0, 188.0, 235.0, 227.0, 234.0,
    264.0, 302.0, 293.0, 259.0, 229.0, 203.0, 229.0, 242.0, 233.0, 267.0, 269.0, 270.0, 315.0,
    364.0, 347.0, 312.0, 274.0, 237.0, 278.0, 284.0, 277.0, 317.0, 313.0, 318.0, 374.0, 413.0,
    405.0, 355.0, 306.0, 271.0, 306.0, 315.0, 301.0, 356.0, 348.0, 355.0, 422.0, 465.0, 467.0,
    404.0, 347.0, 305.0, 336.0, 340.0, 318.0, 362.0, 348.0, 363.0, 435.0, 491.0, 505.0, 404.0,
    359.0, 310.0, 337.0, 360.0, 342.0, 406.0, 396.0, 420.0, 472.0, 548.0, 559.0, 463.0, 407.0,
    362.0, 405.0,
];
