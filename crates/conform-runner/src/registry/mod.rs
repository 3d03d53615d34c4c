//! Named formatter definitions and slot expansion.
//!
//! A [`FormatterRegistry`] is an explicitly passed table of
//! [`FormatterSpec`] values keyed by name. Callers describe what to run as a
//! list of [`Slot`]s; an alternation slot picks the first of its members that
//! is available, so a request can say "ruff or black" without knowing which
//! is installed.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::spec::FormatterSpec;

/// Tracing target for registry operations.
const REGISTRY_TARGET: &str = "conform_runner::registry";

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A formatter with the same name is already registered.
    #[error("formatter '{name}' is already registered")]
    Duplicate {
        /// Name that clashed.
        name: String,
    },

    /// A slot named a formatter that is not registered.
    #[error("formatter '{name}' is not registered")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },
}

/// One position in a requested formatter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// A single named formatter.
    Single(String),
    /// Candidates tried in order; the first available one is used.
    Alternation(Vec<String>),
}

impl From<&str> for Slot {
    fn from(name: &str) -> Self {
        Self::Single(name.to_owned())
    }
}

/// Result of expanding a slot list.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    formatters: Vec<FormatterSpec>,
    skipped: Vec<String>,
}

impl Expansion {
    /// Formatters to run, in order.
    #[must_use]
    pub fn formatters(&self) -> &[FormatterSpec] {
        &self.formatters
    }

    /// Consumes the expansion, returning the formatters to run.
    #[must_use]
    pub fn into_formatters(self) -> Vec<FormatterSpec> {
        self.formatters
    }

    /// Names passed over because they were unavailable.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

/// Table of formatter definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FormatterRegistry {
    formatters: BTreeMap<String, FormatterSpec>,
}

impl FormatterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `spec` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the name is taken.
    pub fn register(&mut self, spec: FormatterSpec) -> Result<(), RegistryError> {
        let name = spec.name().to_owned();
        if self.formatters.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        debug!(target: REGISTRY_TARGET, formatter = %name, "formatter registered");
        self.formatters.insert(name, spec);
        Ok(())
    }

    /// Looks a formatter up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormatterSpec> {
        self.formatters.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formatters.keys().map(String::as_str)
    }

    /// Number of registered formatters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// Removes every registration.
    pub fn clear(&mut self) {
        self.formatters.clear();
    }

    /// Flattens `slots` into an ordered formatter list.
    ///
    /// A single slot is kept even when unavailable, so the pipeline reports
    /// it. Alternation members are tested with `is_available` and the first
    /// available one wins; an alternation with no available member
    /// contributes nothing and its names are recorded as skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when a slot names an unregistered
    /// formatter.
    pub fn expand<P>(&self, slots: &[Slot], mut is_available: P) -> Result<Expansion, RegistryError>
    where
        P: FnMut(&FormatterSpec) -> bool,
    {
        let mut expansion = Expansion::default();
        for slot in slots {
            match slot {
                Slot::Single(name) => {
                    expansion.formatters.push(self.lookup(name)?.clone());
                }
                Slot::Alternation(names) => {
                    let mut chosen = None;
                    for name in names {
                        let spec = self.lookup(name)?;
                        if chosen.is_none() && is_available(spec) {
                            chosen = Some(spec.clone());
                        } else if chosen.is_none() {
                            expansion.skipped.push(name.clone());
                        }
                    }
                    if let Some(spec) = chosen {
                        debug!(
                            target: REGISTRY_TARGET,
                            formatter = spec.name(),
                            "alternation resolved"
                        );
                        expansion.formatters.push(spec);
                    }
                }
            }
        }
        Ok(expansion)
    }

    fn lookup(&self, name: &str) -> Result<&FormatterSpec, RegistryError> {
        self.formatters.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_owned(),
        })
    }
}
