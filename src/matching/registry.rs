//! Name → predicate registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::interaction::Request;
use crate::{Result, VcrError};

use super::BUILTIN;

/// A named request predicate
#[derive(Clone)]
pub struct Matcher {
    name: String,
    predicate: Arc<dyn Fn(&Request, &Request) -> bool + Send + Sync>,
}

impl Matcher {
    /// Wrap a predicate under a name
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Matcher name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the predicate
    #[must_use]
    pub fn matches(&self, r1: &Request, r2: &Request) -> bool {
        (self.predicate)(r1, r2)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher").field("name", &self.name).finish()
    }
}

/// Registry of matchers available to cassettes
#[derive(Debug, Clone)]
pub struct MatcherRegistry {
    matchers: HashMap<String, Matcher>,
}

impl MatcherRegistry {
    /// Registry holding only the built-in matchers
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            matchers: HashMap::new(),
        };
        for (name, predicate) in BUILTIN {
            registry.register(name, predicate);
        }
        registry
    }

    /// Register (or replace) a matcher
    pub fn register<F>(&mut self, name: &str, predicate: F)
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.insert(Matcher::new(name, predicate));
    }

    /// Register (or replace) an already named matcher
    pub fn insert(&mut self, matcher: Matcher) {
        self.matchers.insert(matcher.name.clone(), matcher);
    }

    /// Whether a matcher is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    /// Look up matchers in the given order
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::UnknownMatcher`] for the first unregistered name
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Matcher>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.matchers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| VcrError::UnknownMatcher(name.to_string()))
            })
            .collect()
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of the matchers in `matchers` that reject the pair
#[must_use]
pub fn failed_matchers<'a>(matchers: &'a [Matcher], r1: &Request, r2: &Request) -> Vec<&'a str> {
    matchers
        .iter()
        .filter(|m| !m.matches(r1, r2))
        .map(Matcher::name)
        .collect()
}
