//! Per-test-case execution context

use tracing::{debug, warn};

use crate::aggregator::SharedAggregator;
use crate::failure::{AbortSignal, StepError, StepFailure, StepResult};
use crate::outcome::{Outcome, Status, TestId};
use crate::scope::Scope;
use crate::trace::TraceFormatter;

/// State owned by one running test case.
///
/// Outcomes captured by scopes are held in a pending list until
/// [`finish`](Self::finish) flushes them into the shared aggregator.
pub struct TestContext {
    id: TestId,
    pending: Vec<Outcome>,
    results: SharedAggregator,
    formatter: TraceFormatter,
}

impl TestContext {
    pub fn new(id: TestId, results: SharedAggregator) -> Self {
        let formatter = results.lock().formatter().clone();
        Self {
            id,
            pending: Vec::new(),
            results,
            formatter,
        }
    }

    pub fn id(&self) -> &TestId {
        &self.id
    }

    /// Outcomes captured so far and not yet flushed
    pub fn pending(&self) -> &[Outcome] {
        &self.pending
    }

    /// Number of pending Fail outcomes
    pub fn pending_failures(&self) -> usize {
        self.pending
            .iter()
            .filter(|o| o.status() == Status::Fail)
            .count()
    }

    /// Run a step, recording a failure and continuing.
    ///
    /// Returns `Ok(None)` when the step failed and was recorded. An abort
    /// raised inside the step passes through untouched, as does any error
    /// from the scope's recovery callback.
    pub fn restrain<T, F>(&mut self, scope: Scope<'_>, step: F) -> StepResult<Option<T>>
    where
        F: FnOnce(&mut TestContext) -> StepResult<T>,
    {
        match step(self) {
            Ok(value) => {
                self.pending.push(Outcome::pass(scope.label()));
                Ok(Some(value))
            }
            Err(StepError::Abort(signal)) => Err(signal.into()),
            Err(StepError::Failed(failure)) => {
                self.capture(&scope, &failure);
                scope.run_recovery()?;
                Ok(None)
            }
        }
    }

    /// Run a step, recording a failure and aborting the rest of the test case.
    ///
    /// After a failure is recorded this returns [`AbortSignal`], which the
    /// runner swallows at teardown.
    pub fn destroy<T, F>(&mut self, scope: Scope<'_>, step: F) -> StepResult<T>
    where
        F: FnOnce(&mut TestContext) -> StepResult<T>,
    {
        match step(self) {
            Ok(value) => {
                self.pending.push(Outcome::pass(scope.label()));
                Ok(value)
            }
            Err(StepError::Abort(signal)) => Err(signal.into()),
            Err(StepError::Failed(failure)) => {
                self.capture(&scope, &failure);
                scope.run_recovery()?;
                debug!("{}: aborting after '{}'", self.id, failure);
                Err(AbortSignal.into())
            }
        }
    }

    fn capture(&mut self, scope: &Scope<'_>, failure: &StepFailure) {
        warn!("{}: '{}' failed: {}", self.id, scope.label(), failure);
        let detail = scope.describe(failure, &self.formatter);
        self.pending.push(Outcome::fail(detail));
    }

    /// Flush pending outcomes into the aggregator.
    ///
    /// Returns the number of outcomes flushed.
    pub fn finish(self) -> usize {
        let flushed = self.pending.len();
        self.results.lock().flush_pending(&self.id, self.pending);
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::aggregator::ResultAggregator;
    use crate::failure::FailureKind;

    fn context(name: &str) -> (TestContext, SharedAggregator) {
        let results = ResultAggregator::new(TraceFormatter::new(env!("CARGO_MANIFEST_DIR"))).shared();
        (TestContext::new(TestId::new(name), results.clone()), results)
    }

    #[test]
    fn test_restrain_continues_after_failure() {
        let (mut ctx, results) = context("search");

        let first = ctx.restrain(Scope::new("type query"), |_| Ok(1)).unwrap();
        let second: Option<()> = ctx
            .restrain(Scope::new("results shown"), |_| {
                Err(StepFailure::assertion("no results").into())
            })
            .unwrap();
        let third = ctx.restrain(Scope::new("clear query"), |_| Ok(3)).unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(second, None);
        assert_eq!(third, Some(3));
        assert_eq!(ctx.pending_failures(), 1);

        assert_eq!(ctx.finish(), 3);
        let results = results.lock();
        let statuses: Vec<Status> = results
            .outcomes(&TestId::new("search"))
            .iter()
            .map(|o| o.status())
            .collect();
        assert_eq!(statuses, vec![Status::Pass, Status::Fail, Status::Pass]);
    }

    #[test]
    fn test_destroy_records_then_aborts() {
        let (mut ctx, _results) = context("login");

        let err = ctx
            .destroy(Scope::new("open login").default_message("login page unreachable"), |_| {
                Err::<(), _>(StepFailure::not_found("#login").into())
            })
            .unwrap_err();

        assert!(err.is_abort());
        assert_eq!(ctx.pending_failures(), 1);
        assert!(ctx.pending()[0].detail().starts_with("login page unreachable\n"));
    }

    #[test]
    fn test_restrain_passes_abort_through() {
        let (mut ctx, _results) = context("nested");

        let err = ctx
            .restrain(Scope::new("outer").default_message("outer"), |ctx| {
                ctx.destroy(Scope::new("inner"), |_| {
                    Err::<(), _>(StepFailure::timeout("menu").into())
                })
            })
            .unwrap_err();

        assert!(err.is_abort());
        assert_eq!(ctx.pending_failures(), 1);
        assert!(ctx.pending()[0].detail().ends_with("Timeout: menu"));
    }

    #[test]
    fn test_recovery_runs_after_capture() {
        let (mut ctx, _results) = context("nav");
        let recovered = Cell::new(false);

        let scope = Scope::new("click nav")
            .message(FailureKind::ElementNotFound, "using backup link")
            .recover(|| {
                recovered.set(true);
                Ok(())
            });
        ctx.restrain(scope, |_| Err::<(), _>(StepFailure::not_found("#nav").into()))
            .unwrap();

        assert!(recovered.get());
        assert_eq!(ctx.pending_failures(), 1);
    }

    #[test]
    fn test_recovery_error_propagates() {
        let (mut ctx, _results) = context("nav");

        let scope = Scope::new("click nav")
            .recover(|| Err(StepFailure::unclassified("backup link also missing").into()));
        let err = ctx
            .restrain(scope, |_| Err::<(), _>(StepFailure::not_found("#nav").into()))
            .unwrap_err();

        assert!(matches!(err, StepError::Failed(f) if f.message() == "backup link also missing"));
        assert_eq!(ctx.pending_failures(), 1);
    }
}
