//! End-of-run summary

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::ResultAggregator;
use crate::error::HarnessResult;
use crate::outcome::{Outcome, Status, TestId};

const SECTION_RULE: &str =
    "======================================================================";
const OUTCOME_RULE: &str =
    "----------------------------------------------------------------------";

/// Aggregate counts, per test identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Identities recorded
    pub tests: usize,
    /// Identities with at least one Fail outcome
    pub failures: usize,
    /// Identities with at least one Error outcome
    pub errors: usize,
    /// Identities whose every outcome is a Skip
    pub skipped: usize,
}

impl Tally {
    pub fn from_results(results: &ResultAggregator) -> Self {
        let mut tally = Tally::default();
        for (_, outcomes) in results.iter() {
            tally.tests += 1;
            if outcomes.iter().any(|o| o.status() == Status::Fail) {
                tally.failures += 1;
            }
            if outcomes.iter().any(|o| o.status() == Status::Error) {
                tally.errors += 1;
            }
            if !outcomes.is_empty() && outcomes.iter().all(|o| o.status() == Status::Skip) {
                tally.skipped += 1;
            }
        }
        tally
    }

    pub fn is_successful(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }

    /// `OK` or `FAILED (failures=N, errors=M, skipped=K)`
    pub fn verdict(&self) -> String {
        if self.is_successful() {
            "OK".to_string()
        } else {
            format!(
                "FAILED (failures={}, errors={}, skipped={})",
                self.failures, self.errors, self.skipped
            )
        }
    }
}

/// Every outcome recorded for one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: TestId,
    pub outcomes: Vec<Outcome>,
}

/// Snapshot of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub tally: Tally,
    pub records: Vec<TestRecord>,
}

impl RunReport {
    pub fn from_results(results: &ResultAggregator, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        let tally = Tally::from_results(results);
        let records = results
            .iter()
            .map(|(id, outcomes)| TestRecord {
                id: id.clone(),
                outcomes: outcomes.to_vec(),
            })
            .collect();

        Self {
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            success: tally.is_successful(),
            tally,
            records,
        }
    }

    /// Render the human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();

        for record in &self.records {
            let _ = writeln!(out, "{}", SECTION_RULE);
            let _ = writeln!(out, "{}", record.id);
            for outcome in &record.outcomes {
                let _ = writeln!(out, "{}", OUTCOME_RULE);
                if outcome.detail().is_empty() {
                    let _ = writeln!(out, "{}", outcome.status());
                } else {
                    let _ = writeln!(out, "{}: {}", outcome.status(), outcome.detail());
                }
            }
        }

        let _ = writeln!(out, "{}", OUTCOME_RULE);
        let _ = writeln!(
            out,
            "Ran {} test{} in {:.3}s",
            self.tally.tests,
            if self.tally.tests == 1 { "" } else { "s" },
            self.duration_ms as f64 / 1000.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.tally.verdict());
        out
    }

    /// Write the report as JSON into `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
