//! Parameter expansion.
//!
//! Each declared parameter expands into its ordered value set: an explicit
//! `only` list, a `min`/`max` range (stepped by increment or by powers), or
//! the single `default`. A parameter that expands to nothing is dropped from
//! the permutation product with a warning.

use super::error::JobError;
use super::permutation::ParamValue;
use super::spec::ParamSpec;
use tracing::warn;

/// The declared type of a parameter.
///
/// The type selects the expansion strategy; downstream consumers receive
/// every value as a string and treat the type as advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    /// Parses the declared type name. `int` and `integer` are synonyms.
    fn from_spec(spec: &ParamSpec) -> Result<Self, JobError> {
        match spec.ptype.as_str() {
            "string" => Ok(Self::String),
            "int" | "integer" => Ok(Self::Integer),
            other => Err(JobError::UnknownParamType {
                param: spec.name.clone(),
                ptype: other.to_string(),
            }),
        }
    }
}

/// Expands one parameter into its ordered value list.
///
/// An empty result means the parameter declared no values at all; the caller
/// drops it from the product.
pub fn expand_param(spec: &ParamSpec) -> Result<Vec<ParamValue>, JobError> {
    match ParamType::from_spec(spec)? {
        ParamType::String => Ok(expand_string(spec)),
        ParamType::Integer => expand_integer(spec),
    }
}

fn value(spec: &ParamSpec, ptype: ParamType, value: impl Into<String>) -> ParamValue {
    ParamValue {
        name: spec.name.clone(),
        ptype,
        value: value.into(),
    }
}

fn expand_string(spec: &ParamSpec) -> Vec<ParamValue> {
    if !spec.only.is_empty() {
        return spec
            .only
            .iter()
            .map(|v| value(spec, ParamType::String, v.clone()))
            .collect();
    }

    if let Some(default) = spec.default.as_ref().filter(|d| !d.is_empty()) {
        return vec![value(spec, ParamType::String, default.clone())];
    }

    warn!(param = %spec.name, "parameter declares no values");
    Vec::new()
}

fn expand_integer(spec: &ParamSpec) -> Result<Vec<ParamValue>, JobError> {
    if !spec.only.is_empty() {
        return Ok(spec
            .only
            .iter()
            .map(|v| value(spec, ParamType::Integer, v.clone()))
            .collect());
    }

    if let Some(raw_min) = spec.min.as_deref() {
        return expand_range(spec, raw_min);
    }

    if let Some(default) = spec.default.as_ref().filter(|d| !d.is_empty()) {
        return Ok(vec![value(spec, ParamType::Integer, default.clone())]);
    }

    warn!(param = %spec.name, "parameter declares no values");
    Ok(Vec::new())
}

fn parse_field(spec: &ParamSpec, field: &'static str, raw: &str) -> Result<i64, JobError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| JobError::MalformedNumber {
            param: spec.name.clone(),
            field,
            value: raw.to_string(),
        })
}

fn expand_range(spec: &ParamSpec, raw_min: &str) -> Result<Vec<ParamValue>, JobError> {
    let min = parse_field(spec, "min", raw_min)?;
    let max = match spec.max.as_deref() {
        Some(raw) => parse_field(spec, "max", raw)?,
        None => {
            return Err(JobError::MissingMax {
                param: spec.name.clone(),
            })
        }
    };

    if max < min {
        return Err(JobError::InvalidRange {
            param: spec.name.clone(),
            min,
            max,
        });
    }

    let step = match spec.step.as_deref() {
        Some(raw) => parse_field(spec, "step", raw)?,
        None => 1,
    };

    let mut values = Vec::new();

    match spec.step_mode.as_deref() {
        None | Some("increment") => {
            // A non-positive step never reaches max.
            if step < 1 {
                return Err(JobError::InvalidStep {
                    param: spec.name.clone(),
                    step,
                });
            }

            let mut v = min;
            while v <= max {
                values.push(value(spec, ParamType::Integer, v.to_string()));
                v = match v.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
        }

        Some("power") => {
            // step^j stalls below 2, so the sequence would never terminate.
            if step < 2 {
                return Err(JobError::InvalidStep {
                    param: spec.name.clone(),
                    step,
                });
            }

            // The literal min is always emitted first; the powers follow,
            // skipping any that do not exceed it.
            values.push(value(spec, ParamType::Integer, min.to_string()));
            let mut power = step;
            while power <= max {
                if power > min {
                    values.push(value(spec, ParamType::Integer, power.to_string()));
                }
                power = match power.checked_mul(step) {
                    Some(next) => next,
                    None => break,
                };
            }
        }

        Some(mode) => {
            return Err(JobError::UnknownStepMode {
                param: spec.name.clone(),
                mode: mode.to_string(),
            })
        }
    }

    Ok(values)
}
