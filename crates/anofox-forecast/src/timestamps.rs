//! Forecast-timestamp generator (C13).

use crate::series::{Interval, TimeSeries, Timestamp};

/// Either a generated timestamp (date/instant/index, matching the
/// training series' kind) or a bare `1..H` step count when the caller
/// disabled timestamp generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastTimestamp {
    Step(usize),
    At(Timestamp),
}

/// Computes the future timestamps for horizon `1..=horizon` by
/// extrapolating from `series`' last timestamp using its median
/// consecutive interval. When `generate_timestamps` is false, only the
/// integer step is returned.
pub fn future_timestamps(
    series: &TimeSeries,
    horizon: usize,
    generate_timestamps: bool,
) -> Vec<ForecastTimestamp> {
    if !generate_timestamps {
        return (1..=horizon).map(ForecastTimestamp::Step).collect();
    }
    let delta: Interval = series.median_interval();
    let last = series.last_timestamp();
    (1..=horizon)
        .map(|h| match last.advance(delta, h as i64) {
            Some(ts) => ForecastTimestamp::At(ts),
            None => ForecastTimestamp::Step(h),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrapolates_integer_index() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        let ts = future_timestamps(&series, 3, true);
        assert_eq!(
            ts,
            vec![
                ForecastTimestamp::At(Timestamp::Index(3)),
                ForecastTimestamp::At(Timestamp::Index(4)),
                ForecastTimestamp::At(Timestamp::Index(5)),
            ]
        );
    }

    #[test]
    fn falls_back_to_steps_when_disabled() {
        let series = TimeSeries::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        let ts = future_timestamps(&series, 2, false);
        assert_eq!(ts, vec![ForecastTimestamp::Step(1), ForecastTimestamp::Step(2)]);
    }
}
