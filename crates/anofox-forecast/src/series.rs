//! `TimeSeries` (C1): an equispaced observation vector with an optional
//! index -> timestamp mapping.

use crate::error::{ErrorKind, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// A timestamp key. The host may key a series by an integer index, a
/// calendar date, or an absolute instant; the median consecutive interval
/// (see `median_interval`) is computed generically over whichever kind is
/// in use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timestamp {
    Index(i64),
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

/// The cadence between two timestamps, or between a timestamp and the
/// `h`-th future one. Integer-index series produce an integer step;
/// date/instant series produce a duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    Steps(i64),
    Duration(chrono::Duration),
}

impl Timestamp {
    fn sub(&self, other: &Timestamp) -> Option<Interval> {
        match (self, other) {
            (Timestamp::Index(a), Timestamp::Index(b)) => Some(Interval::Steps(a - b)),
            (Timestamp::Date(a), Timestamp::Date(b)) => {
                Some(Interval::Duration(*a - *b))
            }
            (Timestamp::Instant(a), Timestamp::Instant(b)) => {
                Some(Interval::Duration(*a - *b))
            }
            _ => None,
        }
    }

    /// Returns `self + h * delta`.
    pub fn advance(&self, delta: Interval, h: i64) -> Option<Timestamp> {
        match (self, delta) {
            (Timestamp::Index(t), Interval::Steps(d)) => Some(Timestamp::Index(t + d * h)),
            (Timestamp::Date(t), Interval::Duration(d)) => {
                Some(Timestamp::Date(*t + d * h as i32))
            }
            (Timestamp::Instant(t), Interval::Duration(d)) => {
                Some(Timestamp::Instant(*t + d * h as i32))
            }
            _ => None,
        }
    }
}

/// Equispaced observation vector (C1).
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Option<Vec<Timestamp>>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Builds a series keyed by an implicit `0..N` integer index.
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ErrorKind::InsufficientData { needed: 1, got: 0 });
        }
        Ok(Self {
            timestamps: None,
            values,
        })
    }

    /// Builds a series from explicit, strictly monotonically increasing
    /// timestamps paired with observations.
    pub fn with_timestamps(timestamps: Vec<Timestamp>, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ErrorKind::InsufficientData { needed: 1, got: 0 });
        }
        if timestamps.len() != values.len() {
            return Err(ErrorKind::InvalidParameter {
                param: "timestamps".to_string(),
                value: format!("len={}", timestamps.len()),
                reason: format!("must match values length {}", values.len()),
            });
        }
        for w in timestamps.windows(2) {
            let delta = w[0].sub(&w[1]).ok_or_else(|| ErrorKind::InvalidParameter {
                param: "timestamps".to_string(),
                value: "mixed timestamp kinds".to_string(),
                reason: "all timestamps must be the same kind".to_string(),
            })?;
            let non_increasing = match delta {
                Interval::Steps(d) => d >= 0,
                Interval::Duration(d) => d >= chrono::Duration::zero(),
            };
            if non_increasing {
                return Err(ErrorKind::InvalidParameter {
                    param: "timestamps".to_string(),
                    value: "non-monotonic".to_string(),
                    reason: "timestamps must be strictly increasing".to_string(),
                });
            }
        }
        Ok(Self {
            timestamps: Some(timestamps),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn timestamps(&self) -> Option<&[Timestamp]> {
        self.timestamps.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn has_non_finite(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// The last timestamp key, defaulting to the integer index `N-1` when
    /// no explicit timestamps were supplied.
    pub fn last_timestamp(&self) -> Timestamp {
        match &self.timestamps {
            Some(ts) => *ts.last().expect("non-empty series"),
            None => Timestamp::Index(self.values.len() as i64 - 1),
        }
    }

    /// The median of consecutive timestamp differences (C13): robust to
    /// outliers, missing weekends, and month-length variance.
    pub fn median_interval(&self) -> Interval {
        match &self.timestamps {
            None => Interval::Steps(1),
            Some(ts) if ts.len() < 2 => Interval::Steps(1),
            Some(ts) => {
                let mut deltas: Vec<Interval> =
                    ts.windows(2).map(|w| w[1].sub(&w[0]).unwrap()).collect();
                match deltas[0] {
                    Interval::Steps(_) => {
                        let mut steps: Vec<i64> = deltas
                            .iter()
                            .map(|d| match d {
                                Interval::Steps(s) => *s,
                                _ => unreachable!(),
                            })
                            .collect();
                        steps.sort_unstable();
                        Interval::Steps(steps[steps.len() / 2])
                    }
                    Interval::Duration(_) => {
                        let mut secs: Vec<i64> = deltas
                            .drain(..)
                            .map(|d| match d {
                                Interval::Duration(dur) => dur.num_seconds(),
                                _ => unreachable!(),
                            })
                            .collect();
                        secs.sort_unstable();
                        Interval::Duration(chrono::Duration::seconds(secs[secs.len() / 2]))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(TimeSeries::from_values(vec![]).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let ts = vec![Timestamp::Index(0), Timestamp::Index(1)];
        assert!(TimeSeries::with_timestamps(ts, vec![1.0]).is_err());
    }

    #[test]
    fn rejects_non_monotonic() {
        let ts = vec![Timestamp::Index(1), Timestamp::Index(0)];
        assert!(TimeSeries::with_timestamps(ts, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn median_interval_integer_index() {
        let s = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.median_interval(), Interval::Steps(1));
    }

    #[test]
    fn median_interval_robust_to_gap() {
        let ts = vec![
            Timestamp::Index(0),
            Timestamp::Index(1),
            Timestamp::Index(2),
            Timestamp::Index(10),
        ];
        let s = TimeSeries::with_timestamps(ts, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.median_interval(), Interval::Steps(1));
    }
}
