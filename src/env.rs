//! The environment pass.
//!
//! Options with an [`env`][crate::Opt::env] variable are looked up in an [`Environment`]. Usually
//! that's the environment of the process ([`ProcessEnv`]), but any map of strings works too, which
//! is handy in tests or when the variables come from somewhere else.

use std::collections::{BTreeMap, HashMap};
use std::env::{self, VarError};
use std::hash::BuildHasher;

use log::{trace, warn};

use crate::registry::Registry;
use crate::value::{Map, Value};

/// A source of environment variables.
pub trait Environment {
    /// The value of the variable, `None` if it is not set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the current process.
///
/// Variables that are not valid unicode are treated as not set (and a warning is logged).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        match env::var(name) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(raw)) => {
                warn!(
                    "Ignoring environment variable {}, not valid unicode: {:?}",
                    name, raw
                );
                None
            }
        }
    }
}

impl<S: BuildHasher> Environment for HashMap<String, String, S> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

/// Writes values of the set variables into the tree.
///
/// The text is converted according to the option's type hint. If that fails, the text is kept as
/// it is.
pub(crate) fn apply<E: Environment + ?Sized>(registry: &Registry, env: &E, tree: &mut Map) {
    for opt in registry.iter() {
        let name = match opt.env_flag.as_ref() {
            Some(name) => name,
            None => continue,
        };
        let raw = match env.var(name) {
            Some(raw) => raw,
            None => continue,
        };
        let value = opt.coerce(&raw).unwrap_or_else(|e| {
            warn!(
                "Environment variable {} for option {}: {}, using it as a string",
                name, opt.name, e
            );
            Value::String(raw)
        });
        trace!("Environment {} sets {} to {}", name, opt.location(), value);
        opt.set_value(tree, value);
    }
}
