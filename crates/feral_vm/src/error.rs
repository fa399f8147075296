//! Runtime and loader error taxonomy (`spec.md` §7 "Error kinds" 4 and 5).
//!
//! Compile-time errors (lex/parse) already carry their own
//! `feral_syntax::error::SyntaxError`; this module only covers failures
//! that happen after a module is loaded and running.

use std::fmt;

use feral_base::Location;
use feral_value::Value;

/// A runtime or loader failure, always pinned to the `Location` of the
/// instruction (or load request) that raised it (`spec.md` §7).
///
/// `payload` carries the raw value an `or`-handler's `capture` should bind
/// to. A plain `fail()` has no payload of its own — `catch` falls back to
/// rendering `message` as a `Str` value — while `raise(v)` (`spec.md` §4.6
/// "Exceptions") attaches `v` verbatim so the handler sees the exact value
/// that was raised, not a stringified description of it.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub loc: Location,
    pub message: String,
    pub payload: Option<Value>,
}

impl RuntimeError {
    pub fn new(loc: Location, message: impl Into<String>) -> Self {
        Self { loc, message: message.into(), payload: None }
    }

    /// Builds a `raise(value)` error: `message` is derived from `value`'s
    /// display form so `Display`/logging still has something readable, but
    /// `payload` carries `value` itself for the handler to capture.
    pub fn with_payload(loc: Location, value: Value) -> Self {
        let message = value.to_display_string();
        Self { loc, message, payload: Some(value) }
    }

    /// The value an `or`-handler's `capture` binds to: `payload` if this
    /// error carries one, else `message` rendered as a `Str`.
    pub fn capture_value(&self) -> Value {
        self.payload.clone().unwrap_or_else(|| Value::Str(self.message.as_str().into()))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}
