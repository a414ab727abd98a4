//! `ModelParams`: a validated string-keyed map of tagged scalar/list values.

use crate::error::{ErrorKind, Result};
use std::collections::HashMap;

/// A single parameter value. The host passes parameters as a
/// dictionary-like value of (string -> tagged scalar | list); this is the
/// in-process Rust shape of that contract (see `spec.md` §6).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Real(f64),
    Int(i64),
    Bool(bool),
    RealList(Vec<f64>),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Real(_) => "real",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::RealList(_) => "real_list",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::RealList(v)
    }
}

/// A validated map of model parameters.
///
/// Construction from raw host input goes through `ModelParams::from_raw`,
/// which is where unknown-key / wrong-type rejection happens (C10 in
/// `SPEC_FULL.md`). Once built, accessors are infallible convenience
/// wrappers used by model `fit` implementations that already trust the
/// schema was enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    values: HashMap<String, ParamValue>,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }

    pub fn get_real(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            ParamValue::Real(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_int(key).and_then(|v| usize::try_from(v).ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_real_list(&self, key: &str) -> Option<&[f64]> {
        match self.values.get(key)? {
            ParamValue::RealList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn seasonal_period(&self, default: usize) -> usize {
        self.get_usize("seasonal_period").unwrap_or(default)
    }

    pub fn seasonal_periods(&self, default: &[usize]) -> Vec<usize> {
        self.get_real_list("seasonal_periods")
            .map(|list| list.iter().map(|v| *v as usize).collect())
            .unwrap_or_else(|| default.to_vec())
    }

    pub fn confidence_level(&self, default: f64) -> f64 {
        self.get_real("confidence_level").unwrap_or(default)
    }

    pub fn return_insample(&self) -> bool {
        self.get_bool("return_insample").unwrap_or(false)
    }

    /// Validate `raw` against a declared schema: every key in `raw` must
    /// appear in `schema`, and its runtime tag must match the declared
    /// one. Defaults for keys absent from `raw` are taken from `defaults`.
    /// This is the factory-time validation contract of C10.
    pub fn from_raw(
        raw: HashMap<String, ParamValue>,
        schema: &[(&str, &'static str)],
        defaults: &ModelParams,
    ) -> Result<Self> {
        for (key, value) in &raw {
            let declared = schema.iter().find(|(name, _)| name == key);
            match declared {
                None => {
                    return Err(ErrorKind::InvalidParameter {
                        param: key.clone(),
                        value: format!("{:?}", value),
                        reason: "unknown key".to_string(),
                    });
                }
                Some((_, expected_ty)) if *expected_ty != value.type_name() => {
                    return Err(ErrorKind::InvalidParameter {
                        param: key.clone(),
                        value: format!("{:?}", value),
                        reason: format!(
                            "expected type {expected_ty}, got {}",
                            value.type_name()
                        ),
                    });
                }
                _ => {}
            }
        }

        let mut merged = defaults.clone();
        for (key, value) in raw {
            merged.values.insert(key, value);
        }
        Ok(merged)
    }
}
