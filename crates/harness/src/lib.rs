//! Regress Test Harness
//!
//! This crate provides the execution and result-aggregation layer for
//! sequential browser regression suites:
//! - Soft assertion scopes that record a failure and let the test continue
//! - Hard assertion scopes that record a failure and abort the test case
//! - A multi-outcome store keyed by test identity
//! - Stack traces trimmed to the frames that belong to the suite itself
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TestRunner                           │
//! │    for each TestCase:                                       │
//! │      ├── SessionFactory::open() -> SessionGuard             │
//! │      ├── TestCase::run(ctx, session)                        │
//! │      │     ├── ctx.restrain(scope, step)  record, continue  │
//! │      │     └── ctx.destroy(scope, step)   record, abort     │
//! │      └── ctx.finish()  flush pending -> ResultAggregator    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ResultAggregator                                           │
//! │    TestId -> [Outcome { status, detail }, ...]              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunReport                                                  │
//! │    sections per TestId, then OK | FAILED (...)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod config;
pub mod context;
pub mod error;
pub mod failure;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod scope;
pub mod script;
pub mod trace;

pub use aggregator::{ResultAggregator, SharedAggregator};
pub use config::HarnessConfig;
pub use context::TestContext;
pub use error::{HarnessError, HarnessResult};
pub use failure::{AbortSignal, FailureKind, StepError, StepFailure, StepResult};
pub use outcome::{Outcome, Status, TestId};
pub use report::{RunReport, Tally};
pub use runner::{Session, SessionFactory, TestCase, TestRunner};
pub use scope::Scope;
pub use trace::{Diagnostic, TraceFormatter};
