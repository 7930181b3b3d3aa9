//! Types shared by the whole crate.

use std::fmt::Display;

/// A sanitized value: the only way to construct one is to run the
/// underlying value's `validate()`, so any code that takes a `Valid<T>`
/// can rely on the invariants that `validate()` checks.
#[derive(Clone, Debug)]
pub struct Valid<T>(pub T);

// A validation failure, naming the offending function as name/arity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationError {
    pub function: (String, u32),
    pub detail: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.function.0, self.function.1, self.detail)
    }
}

impl std::error::Error for ValidationError {}
