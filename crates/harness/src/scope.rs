//! Assertion scopes
//!
//! A [`Scope`] describes how a captured step failure is reported: a label for
//! the step, an optional default message, a table of per-kind messages and an
//! optional recovery callback. It is executed through
//! [`TestContext::restrain`](crate::TestContext::restrain) (record and
//! continue) or [`TestContext::destroy`](crate::TestContext::destroy) (record
//! and abort the test case).

use std::collections::HashMap;
use std::fmt;

use crate::failure::{FailureKind, StepFailure, StepResult};
use crate::trace::TraceFormatter;

type Recovery<'a> = Box<dyn FnOnce() -> StepResult<()> + 'a>;

pub struct Scope<'a> {
    label: String,
    default_message: Option<String>,
    messages: HashMap<FailureKind, String>,
    recovery: Option<Recovery<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            default_message: None,
            messages: HashMap::new(),
            recovery: None,
        }
    }

    /// Message used when the failure kind has no entry in the table
    pub fn default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = Some(message.into());
        self
    }

    /// Message used for one failure kind
    pub fn message(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.messages.insert(kind, message.into());
        self
    }

    pub fn messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = (FailureKind, S)>,
        S: Into<String>,
    {
        self.messages
            .extend(messages.into_iter().map(|(kind, message)| (kind, message.into())));
        self
    }

    /// Callback run after a failure is recorded.
    ///
    /// An error it returns is not captured by this scope.
    pub fn recover(mut self, recovery: impl FnOnce() -> StepResult<()> + 'a) -> Self {
        self.recovery = Some(Box::new(recovery));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Message for a failure kind: table entry, else the default
    pub fn message_for(&self, kind: FailureKind) -> Option<&str> {
        self.messages
            .get(&kind)
            .or(self.default_message.as_ref())
            .map(String::as_str)
    }

    /// Detail text for a captured failure: message (if any) over the tidied trace
    pub(crate) fn describe(&self, failure: &StepFailure, formatter: &TraceFormatter) -> String {
        let trace = formatter.format(failure.into()).unwrap_or_default();
        match self.message_for(failure.kind()) {
            Some(message) => format!("{}\n{}", message, trace),
            None => trace,
        }
    }

    pub(crate) fn run_recovery(self) -> StepResult<()> {
        match self.recovery {
            Some(recovery) => recovery(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("label", &self.label)
            .field("default_message", &self.default_message)
            .field("messages", &self.messages)
            .field("recovery", &self.recovery.is_some())
            .finish()
    }
}
