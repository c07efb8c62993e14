//! Typed parameter maps.
//!
//! Every configurable object owns a map from parameter name to a variant
//! value. Parameters must be declared (`add`) before they can be set; setting
//! an undeclared parameter is a `BadArgument`. Owners mirror heavily-used
//! parameters into typed fields from their `parameter_updated` hooks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DockError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    StrList(Vec<String>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::StrList(v) => write!(f, "{}", v.join(",")),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Real(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamMap {
    params: BTreeMap<String, Value>,
}

impl ParamMap {
    pub fn new() -> ParamMap {
        ParamMap::default()
    }

    /// Declares a parameter with its default value.
    pub fn add(&mut self, name: &str, default: impl Into<Value>) {
        self.params.insert(name.to_string(), default.into());
    }

    /// Sets a declared parameter. Callers are expected to invoke their
    /// `parameter_updated` hook after a successful set.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self.params.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(DockError::bad_argument(format!("undefined parameter: {}", name))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn get_f64(&self, name: &str) -> f64 {
        self.get(name).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn get_i64(&self, name: &str) -> i64 {
        self.get(name).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(|s| s.as_str())
    }
}

/// Score-map output: dotted full name to variant value.
pub type ScoreMap = BTreeMap<String, Value>;

/// Accumulates a scalar into a score-map entry, creating it if absent.
pub fn accumulate(map: &mut ScoreMap, key: &str, delta: f64) {
    let current = map.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    map.insert(key.to_string(), Value::Real(current + delta));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_requires_declaration() {
        let mut p = ParamMap::new();
        p.add("weight", 1.0);
        assert!(p.set("weight", 2.5).is_ok());
        assert_eq!(p.get_f64("weight"), 2.5);
        assert!(p.set("unknown", 1.0).is_err());
    }

    #[test]
    fn int_coerces_to_f64() {
        let mut p = ParamMap::new();
        p.add("n", 5i64);
        assert_eq!(p.get_f64("n"), 5.0);
        assert_eq!(p.get_i64("n"), 5);
    }

    #[test]
    fn accumulate_creates_and_adds() {
        let mut map = ScoreMap::new();
        accumulate(&mut map, "score.inter", 1.5);
        accumulate(&mut map, "score.inter", 2.0);
        assert_eq!(map["score.inter"].as_f64(), Some(3.5));
    }
}
