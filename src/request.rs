//! Scoring-function request bus.
//!
//! Requests are dispatched by the aggregate scoring function to itself first,
//! then cascaded to every child in insertion order. A transform may queue
//! requests at construction and fire them at the workspace scoring function
//! immediately before each execute.

use crate::params::Value;

#[derive(Debug, Clone)]
pub enum SfRequest {
    /// Enable the term whose full name matches.
    Enable(String),
    /// Disable the term whose full name matches.
    Disable(String),
    /// Re-split interaction lists by distance. `name == None` applies to all
    /// terms; distance 0 removes the partitioning.
    Partition { name: Option<String>, dist: f64 },
    /// Set a named parameter. `name == None` is the global form: every term
    /// that recognises `param` applies it.
    SetParam {
        name: Option<String>,
        param: String,
        value: Value,
    },
}

impl SfRequest {
    pub fn partition(dist: f64) -> SfRequest {
        SfRequest::Partition { name: None, dist }
    }

    pub fn partition_named(name: impl Into<String>, dist: f64) -> SfRequest {
        SfRequest::Partition {
            name: Some(name.into()),
            dist,
        }
    }

    pub fn set_param_global(param: impl Into<String>, value: impl Into<Value>) -> SfRequest {
        SfRequest::SetParam {
            name: None,
            param: param.into(),
            value: value.into(),
        }
    }

    pub fn set_param(
        name: impl Into<String>,
        param: impl Into<String>,
        value: impl Into<Value>,
    ) -> SfRequest {
        SfRequest::SetParam {
            name: Some(name.into()),
            param: param.into(),
            value: value.into(),
        }
    }
}
