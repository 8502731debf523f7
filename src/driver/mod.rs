//! Driver snippet parsing and invocation.
//!
//! The driver is a single call expression over the loaded artifact's
//! exported functions, e.g. `add(2, 3)`. The snippet is parsed into an
//! explicit value before anything runs, so user text never reaches a
//! general-purpose evaluator; the artifact's exports are the whole
//! capability set.

use std::fmt;

use wasmtime::Val;

use crate::{error::PipelineError, loader::LoadedArtifact};

/// A parsed driver snippet: one export name and its integer arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub function: String,
    pub args: Vec<i64>,
}

impl DriverCall {
    /// Parse `name(arg, ...)`, integer arguments only.
    pub fn parse(snippet: &str) -> Result<Self, PipelineError> {
        let snippet = snippet.trim();
        let open = snippet.find('(').ok_or_else(|| {
            PipelineError::Driver("expected a call expression like `add(2, 3)`".into())
        })?;
        if !snippet.ends_with(')') {
            return Err(PipelineError::Driver("unbalanced parentheses".into()));
        }

        let function = snippet[..open].trim();
        let mut chars = function.chars();
        let valid_name = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(PipelineError::Driver(format!(
                "invalid function name `{function}`"
            )));
        }

        let inner = &snippet[open + 1..snippet.len() - 1];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(|a| {
                    let a = a.trim();
                    a.parse::<i64>().map_err(|_| {
                        PipelineError::Driver(format!("invalid integer argument `{a}`"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            function: function.to_string(),
            args,
        })
    }

    /// Invoke the parsed call against a loaded artifact; the return value
    /// propagates out of the cycle as the overall result.
    pub fn invoke(&self, artifact: &mut LoadedArtifact) -> Result<Option<DriverValue>, PipelineError> {
        let val = artifact
            .invoke(&self.function, &self.args)
            .map_err(|e| PipelineError::Driver(e.to_string()))?;
        match val {
            None => Ok(None),
            Some(Val::I32(v)) => Ok(Some(DriverValue::I32(v))),
            Some(Val::I64(v)) => Ok(Some(DriverValue::I64(v))),
            Some(Val::F32(bits)) => Ok(Some(DriverValue::F32(f32::from_bits(bits)))),
            Some(Val::F64(bits)) => Ok(Some(DriverValue::F64(f64::from_bits(bits)))),
            Some(other) => Err(PipelineError::Driver(format!(
                "unsupported return type {other:?} from `{}`",
                self.function
            ))),
        }
    }
}

/// Value a driver invocation produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl fmt::Display for DriverValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverValue::I32(v) => write!(f, "{v}"),
            DriverValue::I64(v) => write!(f, "{v}"),
            DriverValue::F32(v) => write!(f, "{v}"),
            DriverValue::F64(v) => write!(f, "{v}"),
        }
    }
}
