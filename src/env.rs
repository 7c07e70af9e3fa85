//! Runtime environments
//!
//! This leverages immutable [`HashMap`](im::hashmap::HashMap)s from the
//! [`im`](im) crate: overlaying an environment shares structure with its
//! parent instead of copying it, so closures can capture environments by
//! value cheaply.

use im::hashmap::HashMap;

use crate::data::{Symbol, Value};
use crate::errors::*;

use std::fmt;

/// Represents runtime variable bindings.
///
/// Semantically immutable: [`Env::with_values`] produces a new environment
/// whose bindings are the parent's overlaid with the extras, leaving the
/// parent untouched.
#[derive(Clone, Default, PartialEq)]
pub struct Env {
    values: HashMap<Symbol, Value>,
}

impl Env {
    /// Return a new empty environment.
    pub fn new() -> Env {
        Env {
            values: HashMap::new(),
        }
    }

    /// Get the value bound to a name, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Create a new `Env` based on the current one, containing the extra
    /// bindings. Existing bindings with the same names are shadowed.
    pub fn with_values<I>(&self, extra: I) -> Env
    where
        I: IntoIterator<Item = (Symbol, Value)>,
    {
        let mut values = self.values.clone();
        for (name, value) in extra {
            values.insert(name, value);
        }
        Env { values }
    }

    /// Number of visible bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Is the environment devoid of bindings?
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Env {
    // Bindings may contain closures whose environments point back here;
    // print the keys only.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(|k| k.as_str()).collect();
        keys.sort();
        write!(f, "Env {{{}}}", keys.join(", "))
    }
}

/// Represents multiple nested environment bindings.
///
/// The VM pushes a frame when entering a function or a `let` scope and pops
/// it on the way out; the innermost frame is on top.
#[derive(Clone, Default)]
pub struct EnvStack {
    envs: Vec<Env>,
}

impl EnvStack {
    /// Return a new [`EnvStack`] holding a single empty environment.
    pub fn new() -> EnvStack {
        EnvStack {
            envs: vec![Env::new()],
        }
    }

    /// Push a fully formed environment frame.
    pub fn push(&mut self, env: Env) {
        self.envs.push(env);
    }

    /// Pop the top environment, forgetting those bindings.
    pub fn pop(&mut self) -> Result<Env> {
        self.envs
            .pop()
            .ok_or_else(|| err_msg("Attempted to pop empty environment stack"))
    }

    /// Peek the top [`Env`] from the stack.
    pub fn peek(&self) -> Result<&Env> {
        self.envs.last().ok_or_else(|| err_msg("Env stack empty"))
    }

    /// Number of frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.envs.len()
    }
}

impl fmt::Debug for EnvStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EnvStack {{depth: {}}}", self.envs.len())
    }
}
