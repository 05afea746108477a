//! Generic named-parameter registry shared by the solver backends
//!
//! Each backend registers the names it supports once at construction,
//! mapping every stable string name to a variant of its own closed parameter
//! enum. Lookups of unregistered names never crash: getters return a typed
//! sentinel (NaN, -1, false, empty string) and log the failure, so uniform
//! tooling can probe structurally different backends.

use std::collections::HashMap;

use crate::error::{Result, SolverError};
use crate::Real;

/// A typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Real(Real),
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Name → backend-specific identifier table, populated once at construction
#[derive(Debug, Clone, Default)]
pub(crate) struct ParamRegistry<Id: Copy> {
    names: HashMap<&'static str, Id>,
}

impl<Id: Copy> ParamRegistry<Id> {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, id: Id) {
        self.names.insert(name, id);
    }

    /// Identifier for `name`, or an unknown-parameter error
    pub fn id(&self, name: &str) -> Result<Id> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SolverError::UnknownParameter(name.to_string()))
    }
}

/// Parse the textual form of a real parameter
pub(crate) fn parse_real(name: &str, value: &str) -> Result<Real> {
    value.parse().map_err(|_| SolverError::ParamParse {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Parse the textual form of an integer parameter
pub(crate) fn parse_int(name: &str, value: &str) -> Result<i64> {
    value.parse().map_err(|_| SolverError::ParamParse {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Parse the textual form of a boolean parameter
///
/// Accepts `yes`/`no`, `true`/`false` and `1`/`0`.
pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(SolverError::ParamParse {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Sentinel for an unknown real parameter lookup
pub(crate) fn unknown_real(name: &str) -> Real {
    log::error!("trying to get unknown real parameter {name}");
    Real::NAN
}

/// Sentinel for an unknown integer parameter lookup
pub(crate) fn unknown_int(name: &str) -> i64 {
    log::error!("trying to get unknown integer parameter {name}");
    -1
}

/// Sentinel for an unknown boolean parameter lookup
pub(crate) fn unknown_bool(name: &str) -> bool {
    log::error!("trying to get unknown boolean parameter {name}");
    false
}

/// Sentinel for an unknown string parameter lookup
pub(crate) fn unknown_string(name: &str) -> String {
    log::error!("trying to get unknown string parameter {name}");
    String::new()
}
