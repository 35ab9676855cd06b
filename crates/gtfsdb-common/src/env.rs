//! Environment variable access
//!
//! [`EnvReader`] wraps a lookup function instead of calling `std::env::var`
//! directly, which keeps configuration parsing testable without mutating the
//! process environment.

use crate::error::ConfigError;
use std::fmt::Display;
use std::str::FromStr;

/// Lookup backed by the real process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Reads configuration keys, remembering every required key that was absent.
pub struct EnvReader<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    /// Value of `key`, treating an empty string the same as unset.
    pub fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Value of a required key.
    ///
    /// An absent key is recorded and an empty string is returned; call
    /// [`EnvReader::finish`] to turn the recorded keys into an error.
    pub fn require(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            },
        }
    }

    /// Parse an optional key, falling back to `default` when unset.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
            None => Ok(default),
        }
    }

    /// Keys recorded as missing so far.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Fails with every missing required key, if any.
    pub fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEnv(self.missing))
        }
    }
}
