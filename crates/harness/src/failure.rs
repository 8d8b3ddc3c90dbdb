//! Failures raised by test steps and the abort signal

use std::fmt;

use backtrace::Backtrace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognised categories of step failure.
///
/// The step layer picks one of these when it raises; scopes use it to look
/// up a custom message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An expected element could not be located
    ElementNotFound,
    /// A polled condition did not hold before its deadline
    Timeout,
    /// A checked expectation about page state was false
    Assertion,
    /// An element went away between lookup and use
    StaleElement,
    /// A page load or redirect did not land where expected
    Navigation,
    /// Anything the step layer could not classify
    Unclassified,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::ElementNotFound => "ElementNotFound",
            FailureKind::Timeout => "Timeout",
            FailureKind::Assertion => "Assertion",
            FailureKind::StaleElement => "StaleElement",
            FailureKind::Navigation => "Navigation",
            FailureKind::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure raised by a step, with the call stack at the raise point
#[derive(Clone)]
pub struct StepFailure {
    kind: FailureKind,
    message: String,
    backtrace: Backtrace,
}

impl StepFailure {
    /// Raise a failure of the given kind, capturing the current call stack
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ElementNotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unclassified, message)
    }

    /// Fail with an assertion failure unless `condition` holds
    pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), Self> {
        if condition {
            Ok(())
        } else {
            Err(Self::assertion(message))
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Unresolved call stack captured when the failure was raised
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFailure")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StepFailure {}

/// Control-flow marker unwinding a test case whose failure is already recorded.
///
/// Carries nothing; it must never become an outcome.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("test case aborted after a recorded failure")]
pub struct AbortSignal;

/// What a step body can propagate
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Failed(#[from] StepFailure),

    #[error(transparent)]
    Abort(#[from] AbortSignal),
}

impl StepError {
    pub fn is_abort(&self) -> bool {
        matches!(self, StepError::Abort(_))
    }
}

pub type StepResult<T> = Result<T, StepError>;
