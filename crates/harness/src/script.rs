//! Declarative YAML test scripts
//!
//! A script replays predetermined step results through the harness scopes.
//! It is how the harness is exercised without a browser: each step says which
//! scope wraps it and whether it passes, fails or panics.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::TestContext;
use crate::error::{HarnessError, HarnessResult};
use crate::failure::{FailureKind, StepFailure, StepResult};
use crate::outcome::TestId;
use crate::runner::{Session, SessionFactory, TestCase};
use crate::scope::Scope;

/// A complete test script parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScript {
    /// Unique name; becomes the test identity
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Record the test as skipped with this reason
    #[serde(default)]
    pub skip: Option<String>,

    /// Steps to execute in order
    pub steps: Vec<ScriptStep>,
}

/// Which scope wraps a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Record and continue
    #[default]
    Soft,
    /// Record and abort the test
    Hard,
    /// No scope; a failure is an uncaught error
    Bare,
}

/// Scripted result of a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedResult {
    #[default]
    Pass,
    Fail,
    Panic,
}

/// A single step in a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub label: String,

    #[serde(default)]
    pub mode: StepMode,

    #[serde(default)]
    pub result: ScriptedResult,

    /// Failure kind raised when `result` is `fail`
    #[serde(default = "default_kind")]
    pub kind: FailureKind,

    /// Failure or panic message
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub default_message: Option<String>,

    #[serde(default)]
    pub messages: HashMap<FailureKind, String>,

    /// Backup locator noted by the recovery callback
    #[serde(default)]
    pub backup: Option<String>,
}

fn default_kind() -> FailureKind {
    FailureKind::Assertion
}

impl ScriptStep {
    fn scope(&self) -> Scope<'_> {
        let mut scope = Scope::new(&self.label).messages(self.messages.clone());
        if let Some(message) = &self.default_message {
            scope = scope.default_message(message);
        }
        if let Some(backup) = &self.backup {
            let label = &self.label;
            scope = scope.recover(move || {
                info!("'{}' falling back to {}", label, backup);
                Ok(())
            });
        }
        scope
    }

    fn execute(&self) -> StepResult<()> {
        match self.result {
            ScriptedResult::Pass => Ok(()),
            ScriptedResult::Fail => Err(StepFailure::new(self.kind, &self.message).into()),
            ScriptedResult::Panic => panic!("{}", self.message),
        }
    }
}

impl TestScript {
    /// Parse a script from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    /// Parse a script from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| HarnessError::ScriptParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scripts under a directory, ordered by path.
    ///
    /// A missing directory or an unreadable entry is an error.
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(HarnessError::ScriptsNotFound(dir.to_path_buf()));
        }

        let mut scripts = Vec::new();

        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let is_script = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);

            if is_script && entry.file_type().is_file() {
                scripts.push(Self::from_file(entry.path())?);
            }
        }

        Ok(scripts)
    }
}

impl TestCase<ScriptSession> for TestScript {
    fn id(&self) -> TestId {
        TestId::new(&self.name)
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn skip_reason(&self) -> Option<&str> {
        self.skip.as_deref()
    }

    fn run(&self, ctx: &mut TestContext, session: &mut ScriptSession) -> StepResult<()> {
        for step in &self.steps {
            session.steps_run += 1;
            match step.mode {
                StepMode::Soft => {
                    ctx.restrain(step.scope(), |_| step.execute())?;
                }
                StepMode::Hard => ctx.destroy(step.scope(), |_| step.execute())?,
                StepMode::Bare => step.execute()?,
            }
        }
        Ok(())
    }
}

/// Stand-in session for scripted runs
#[derive(Debug)]
pub struct ScriptSession {
    id: TestId,
    pub steps_run: usize,
}

impl Session for ScriptSession {
    fn close(&mut self) -> HarnessResult<()> {
        info!("{}: released session after {} step(s)", self.id, self.steps_run);
        Ok(())
    }
}

/// Opens a [`ScriptSession`] per test
#[derive(Debug, Default)]
pub struct ScriptSessions {
    opened: usize,
}

impl ScriptSessions {
    pub fn opened(&self) -> usize {
        self.opened
    }
}

impl SessionFactory for ScriptSessions {
    type Session = ScriptSession;

    fn open(&mut self, id: &TestId) -> HarnessResult<ScriptSession> {
        self.opened += 1;
        Ok(ScriptSession {
            id: id.clone(),
            steps_run: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let yaml = r#"
name: checkout
description: Cart to confirmation
tags:
  - smoke
steps:
  - label: open cart
    mode: hard
    default_message: cart unreachable
  - label: badge count
    result: fail
    kind: assertion
    message: expected 2 items
    messages:
      assertion: badge count wrong
  - label: nav link
    result: fail
    kind: element_not_found
    backup: /cart
"#;
        let script = TestScript::from_yaml(yaml).unwrap();
        assert_eq!(script.name, "checkout");
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[0].mode, StepMode::Hard);
        assert_eq!(script.steps[0].result, ScriptedResult::Pass);
        assert_eq!(script.steps[1].mode, StepMode::Soft);
        assert_eq!(
            script.steps[1].messages.get(&FailureKind::Assertion).map(String::as_str),
            Some("badge count wrong")
        );
        assert_eq!(script.steps[2].backup.as_deref(), Some("/cart"));
    }

    #[test]
    fn test_load_all_orders_by_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: second\nsteps: []\n").unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: first\nsteps: []\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let scripts = TestScript::load_all(dir.path()).unwrap();
        let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo");

        let err = TestScript::load_all(&missing).unwrap_err();
        assert!(matches!(err, HarnessError::ScriptsNotFound(path) if path == missing));
    }

    #[test]
    fn test_file_instead_of_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.yaml");
        std::fs::write(&path, "name: single\nsteps: []\n").unwrap();

        assert!(matches!(
            TestScript::load_all(&path),
            Err(HarnessError::ScriptsNotFound(_))
        ));
    }

    #[test]
    fn test_bad_script_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "steps: 3\n").unwrap();

        let err = TestScript::from_file(&path).unwrap_err();
        assert!(matches!(err, HarnessError::ScriptParse(msg) if msg.contains("broken.yaml")));
    }
}
