//! Command dispatch table.
//!
//! Each definition carries an arity range and per-parameter kinds. `Value`
//! parameters are fully evaluated before the handler is called; `Var`
//! parameters pass the bare variable name so handlers can write results back.
//! For unlimited-arity commands the last declared kind repeats.

use std::collections::HashMap;

use core_value::Value;

use crate::error::VmError;
use crate::vm::Vm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Var,
    Value,
}

/// A resolved call parameter.
#[derive(Debug, Clone)]
pub enum Param {
    /// Bare variable name (full path form, indices already resolved).
    Var(String),
    Value(Value),
}

pub type Handler = fn(&mut Vm, &[Param]) -> Result<(), VmError>;

pub struct CommandDef {
    pub name: &'static str,
    pub min: usize,
    /// -1 means unlimited.
    pub max: i32,
    pub kinds: &'static [ParamKind],
    pub handler: Handler,
}

impl CommandDef {
    pub fn kind_at(&self, index: usize) -> ParamKind {
        self.kinds
            .get(index)
            .or_else(|| self.kinds.last())
            .copied()
            .unwrap_or(ParamKind::Value)
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && (self.max < 0 || count <= self.max as usize)
    }

    pub fn expected(&self) -> String {
        if self.max < 0 {
            format!("at least {}", self.min)
        } else if self.min == self.max as usize {
            format!("{}", self.min)
        } else {
            format!("{}..{}", self.min, self.max)
        }
    }
}

pub struct Registry {
    commands: HashMap<&'static str, &'static CommandDef>,
}

impl Registry {
    /// The full command set.
    pub fn standard() -> Self {
        let mut commands = HashMap::new();
        for def in crate::commands::all() {
            commands.insert(def.name, def);
        }
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<&'static CommandDef> {
        self.commands.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ---- handler-side parameter accessors -------------------------------------

pub fn value_at<'a>(command: &str, params: &'a [Param], i: usize) -> Result<&'a Value, VmError> {
    match params.get(i) {
        Some(Param::Value(v)) => Ok(v),
        Some(Param::Var(_)) => Err(VmError::bad(command, format!("parameter {} is a variable name", i + 1))),
        None => Err(VmError::bad(command, format!("missing parameter {}", i + 1))),
    }
}

pub fn text_at(command: &str, params: &[Param], i: usize) -> Result<String, VmError> {
    value_at(command, params, i).map(Value::to_text)
}

pub fn opt_text_at(command: &str, params: &[Param], i: usize) -> Result<Option<String>, VmError> {
    if i < params.len() {
        text_at(command, params, i).map(Some)
    } else {
        Ok(None)
    }
}

pub fn num_at(command: &str, params: &[Param], i: usize) -> Result<f64, VmError> {
    value_at(command, params, i).map(Value::number_lossy)
}

pub fn int_at(command: &str, params: &[Param], i: usize) -> Result<i64, VmError> {
    Ok(num_at(command, params, i)? as i64)
}

pub fn var_at<'a>(command: &str, params: &'a [Param], i: usize) -> Result<&'a str, VmError> {
    match params.get(i) {
        Some(Param::Var(name)) => Ok(name),
        Some(Param::Value(_)) => Err(VmError::bad(command, format!("parameter {} must be a variable", i + 1))),
        None => Err(VmError::bad(command, format!("missing parameter {}", i + 1))),
    }
}
