//! Test driver: runs test cases one at a time and aggregates their outcomes

use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::aggregator::{ResultAggregator, SharedAggregator};
use crate::config::HarnessConfig;
use crate::context::TestContext;
use crate::error::{HarnessError, HarnessResult};
use crate::failure::{StepError, StepResult};
use crate::outcome::TestId;
use crate::report::RunReport;
use crate::trace::TraceFormatter;

/// A resource acquired per test case, typically a browser session
pub trait Session {
    /// Release the session. Called exactly once, on every exit path.
    fn close(&mut self) -> HarnessResult<()>;
}

/// Opens a fresh session for each test case
pub trait SessionFactory {
    type Session: Session;

    fn open(&mut self, id: &TestId) -> HarnessResult<Self::Session>;
}

/// One test case of the suite
pub trait TestCase<S> {
    fn id(&self) -> TestId;

    fn tags(&self) -> &[String] {
        &[]
    }

    /// When set, the case is recorded as skipped and never run
    fn skip_reason(&self) -> Option<&str> {
        None
    }

    fn run(&self, ctx: &mut TestContext, session: &mut S) -> StepResult<()>;
}

/// Closes its session when dropped, however the test body exited
pub struct SessionGuard<S: Session> {
    id: TestId,
    session: S,
}

impl<S: Session> SessionGuard<S> {
    pub fn new(id: TestId, session: S) -> Self {
        Self { id, session }
    }
}

impl<S: Session> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: Session> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        match self.session.close() {
            Ok(()) => debug!("{}: session closed", self.id),
            Err(e) => warn!("{}: {}", self.id, e),
        }
    }
}

/// Selects which test cases a run executes
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub tags: Vec<String>,
    pub names: Vec<String>,
}

impl RunFilter {
    pub fn matches<S>(&self, case: &dyn TestCase<S>) -> bool {
        let named = self.names.is_empty() || self.names.iter().any(|n| n == case.id().as_str());
        let tagged = self.tags.is_empty() || case.tags().iter().any(|t| self.tags.contains(t));
        named && tagged
    }
}

/// Sequential test driver
pub struct TestRunner<F: SessionFactory> {
    factory: F,
    results: SharedAggregator,
    filter: RunFilter,
}

impl<F: SessionFactory> TestRunner<F> {
    pub fn new(factory: F, formatter: TraceFormatter) -> Self {
        Self {
            factory,
            results: ResultAggregator::new(formatter).shared(),
            filter: RunFilter::default(),
        }
    }

    /// Create a runner from configuration, installing its debug flag
    pub fn with_config(factory: F, config: &HarnessConfig) -> Self {
        config.apply();
        Self::new(factory, config.formatter()).with_filter(RunFilter {
            tags: config.tags.clone(),
            names: config.names.clone(),
        })
    }

    pub fn with_filter(mut self, filter: RunFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Handle to the run's aggregator
    pub fn results(&self) -> SharedAggregator {
        self.results.clone()
    }

    /// Run every case the filter selects, then summarise
    pub fn run(&mut self, cases: &[Box<dyn TestCase<F::Session>>]) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let selected: Vec<&dyn TestCase<F::Session>> = cases
            .iter()
            .map(|case| case.as_ref())
            .filter(|case| self.filter.matches(*case))
            .collect();

        info!("Running {} test(s)...", selected.len());

        for case in selected {
            self.run_case(case);
        }

        let report = RunReport::from_results(&self.results.lock(), started_at, start.elapsed());
        info!(
            "Test Results: {} tests, {} failures, {} errors, {} skipped ({} ms)",
            report.tally.tests,
            report.tally.failures,
            report.tally.errors,
            report.tally.skipped,
            report.duration_ms
        );
        report
    }

    /// Run one case by name, ignoring the filter
    pub fn run_test(&mut self, cases: &[Box<dyn TestCase<F::Session>>], name: &str) -> HarnessResult<RunReport> {
        let case = cases
            .iter()
            .find(|case| case.id().as_str() == name)
            .ok_or_else(|| HarnessError::TestNotFound(name.to_string()))?;

        let started_at = Utc::now();
        let start = Instant::now();
        self.run_case(case.as_ref());
        Ok(RunReport::from_results(&self.results.lock(), started_at, start.elapsed()))
    }

    /// Run a single case: open a session, run the body, flush, release.
    pub fn run_case(&mut self, case: &dyn TestCase<F::Session>) {
        let id = case.id();

        if let Some(reason) = case.skip_reason() {
            info!("- {} skipped: {}", id, reason);
            self.results.lock().record_skip(&id, reason);
            return;
        }

        let start = Instant::now();
        debug!("Running test: {}", id);

        let factory = &mut self.factory;
        let opened = panic::catch_unwind(AssertUnwindSafe(|| factory.open(&id)));
        let session = match opened {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("✗ {} - {}", id, e);
                self.results.lock().record_error(&id, e.to_string().as_str());
                return;
            }
            Err(payload) => {
                let detail = format!("panicked opening session: {}", panic_message(payload.as_ref()));
                error!("✗ {} - {}", id, detail);
                self.results.lock().record_error(&id, detail.as_str());
                return;
            }
        };
        let mut session = SessionGuard::new(id.clone(), session);

        let mut ctx = TestContext::new(id.clone(), self.results.clone());
        let result = panic::catch_unwind(AssertUnwindSafe(|| case.run(&mut ctx, &mut *session)));

        let failures = ctx.pending_failures();
        let flushed = ctx.finish();

        let clean = match result {
            Ok(Ok(())) => {
                if flushed == 0 {
                    self.results.lock().record_success(&id);
                }
                failures == 0
            }
            Ok(Err(StepError::Abort(_))) if failures > 0 => {
                debug!("{}: aborted, failure already recorded", id);
                false
            }
            Ok(Err(StepError::Abort(_))) => {
                error!("{}: aborted with no recorded failure", id);
                self.results
                    .lock()
                    .record_error(&id, "aborted with no recorded failure");
                false
            }
            Ok(Err(err)) => {
                error!("{}: uncaught failure: {}", id, err);
                self.results.lock().record_error(&id, &err);
                false
            }
            Err(payload) => {
                let detail = format!("panicked: {}", panic_message(payload.as_ref()));
                error!("{}: {}", id, detail);
                self.results.lock().record_error(&id, detail.as_str());
                false
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(session))) {
            warn!("{}: panicked closing session: {}", id, panic_message(payload.as_ref()));
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if clean {
            info!("✓ {} ({} ms)", id, duration_ms);
        } else {
            error!("✗ {} ({} ms)", id, duration_ms);
        }
    }
}

/// Route panic reports through `tracing` instead of stderr.
///
/// Panics in test bodies are contained and recorded as Error outcomes, so
/// the default hook's output only duplicates the report.
pub fn log_panics() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        debug!("{}", describe_panic(info.payload(), location.as_deref()));
    }));
}

fn describe_panic(payload: &(dyn Any + Send), location: Option<&str>) -> String {
    match location {
        Some(location) => format!("panicked at {}: {}", location, panic_message(payload)),
        None => format!("panicked: {}", panic_message(payload)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");

        let payload = panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_describe_panic() {
        let payload = panic::catch_unwind(|| panic!("gone")).unwrap_err();
        assert_eq!(
            describe_panic(payload.as_ref(), Some("tests/login.rs:12")),
            "panicked at tests/login.rs:12: gone"
        );
        assert_eq!(describe_panic(payload.as_ref(), None), "panicked: gone");
    }

    struct Tagged(&'static str, Vec<String>);

    impl TestCase<()> for Tagged {
        fn id(&self) -> TestId {
            TestId::new(self.0)
        }

        fn tags(&self) -> &[String] {
            &self.1
        }

        fn run(&self, _ctx: &mut TestContext, _session: &mut ()) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_filter() {
        let smoke = Tagged("home", vec!["smoke".to_string()]);
        let slow = Tagged("export", vec!["slow".to_string()]);

        let by_tag = RunFilter {
            tags: vec!["smoke".to_string()],
            names: vec![],
        };
        assert!(by_tag.matches::<()>(&smoke));
        assert!(!by_tag.matches::<()>(&slow));

        let by_name = RunFilter {
            tags: vec![],
            names: vec!["export".to_string()],
        };
        assert!(!by_name.matches::<()>(&smoke));
        assert!(by_name.matches::<()>(&slow));

        assert!(RunFilter::default().matches::<()>(&slow));
    }
}
