//! Multi-outcome result store keyed by test identity

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::outcome::{Outcome, Status, TestId};
use crate::trace::{Diagnostic, TraceFormatter};

/// Aggregator handle shared between the runner and each test context.
///
/// Appends to one identity's sequence must be serialized; the mutex does that
/// if test cases ever run off the main thread.
pub type SharedAggregator = Arc<Mutex<ResultAggregator>>;

/// Ordered outcomes per test identity for one run
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    formatter: TraceFormatter,

    /// Identities in the order they were first recorded
    order: Vec<TestId>,

    records: HashMap<TestId, Vec<Outcome>>,
}

impl ResultAggregator {
    pub fn new(formatter: TraceFormatter) -> Self {
        Self {
            formatter,
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    /// Wrap into a shareable handle
    pub fn shared(self) -> SharedAggregator {
        Arc::new(Mutex::new(self))
    }

    pub fn formatter(&self) -> &TraceFormatter {
        &self.formatter
    }

    fn append(&mut self, id: &TestId, outcome: Outcome) {
        match self.records.get_mut(id) {
            Some(outcomes) => outcomes.push(outcome),
            None => {
                self.order.push(id.clone());
                self.records.insert(id.clone(), vec![outcome]);
            }
        }
    }

    pub fn record_success(&mut self, id: &TestId) {
        self.append(id, Outcome::pass(""));
    }

    pub fn record_skip(&mut self, id: &TestId, reason: impl Into<String>) {
        self.append(id, Outcome::skip(reason));
    }

    /// Append a Fail outcome. Returns `false` without recording for an abort.
    pub fn record_failure<'a>(&mut self, id: &TestId, diagnostic: impl Into<Diagnostic<'a>>) -> bool {
        self.record_problem(id, Status::Fail, diagnostic.into())
    }

    /// Append an Error outcome. Returns `false` without recording for an abort.
    pub fn record_error<'a>(&mut self, id: &TestId, diagnostic: impl Into<Diagnostic<'a>>) -> bool {
        self.record_problem(id, Status::Error, diagnostic.into())
    }

    fn record_problem(&mut self, id: &TestId, status: Status, diagnostic: Diagnostic<'_>) -> bool {
        match self.formatter.format(diagnostic) {
            Some(detail) => {
                self.append(id, Outcome::new(status, detail));
                true
            }
            None => {
                debug!("{}: abort already recorded, not recording again", id);
                false
            }
        }
    }

    /// Move a test case's pending outcomes into the permanent record, in order.
    ///
    /// Pending failures are already formatted, so each goes through
    /// [`record_failure`](Self::record_failure) as text.
    pub fn flush_pending(&mut self, id: &TestId, pending: Vec<Outcome>) {
        for outcome in pending {
            match outcome.status() {
                Status::Fail => {
                    self.record_failure(id, outcome.detail());
                }
                _ => self.append(id, outcome),
            }
        }
    }

    /// Outcomes recorded for an identity, oldest first
    pub fn outcomes(&self, id: &TestId) -> &[Outcome] {
        self.records.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identities in first-recorded order with their outcomes
    pub fn iter(&self) -> impl Iterator<Item = (&TestId, &[Outcome])> {
        self.order
            .iter()
            .map(move |id| (id, self.outcomes(id)))
    }

    /// Number of identities recorded
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total outcomes across every identity
    pub fn total_outcomes(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// A run is successful iff no identity holds a Fail or Error outcome
    pub fn is_successful(&self) -> bool {
        self.records
            .values()
            .flatten()
            .all(|outcome| !outcome.status().is_problem())
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(TraceFormatter::default())
    }
}
