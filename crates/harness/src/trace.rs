//! Diagnostic formatting for recorded failures
//!
//! A failure's call stack is trimmed to the frames whose source lies under
//! the suite root, then the failure kind and message are appended. When the
//! process-wide debug flag is set the full stack is kept.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::failure::{StepError, StepFailure};

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Set the process-wide debug flag
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

/// Whether full, unfiltered stacks are rendered
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Input to the formatter
#[derive(Debug, Clone, Copy)]
pub enum Diagnostic<'a> {
    /// Already formatted text, passed through unchanged
    Text(&'a str),
    /// A live failure with its captured stack
    Failure(&'a StepFailure),
    /// An abort unwinding past a recorded failure; never rendered
    Abort,
}

impl<'a> From<&'a str> for Diagnostic<'a> {
    fn from(text: &'a str) -> Self {
        Diagnostic::Text(text)
    }
}

impl<'a> From<&'a String> for Diagnostic<'a> {
    fn from(text: &'a String) -> Self {
        Diagnostic::Text(text)
    }
}

impl<'a> From<&'a StepFailure> for Diagnostic<'a> {
    fn from(failure: &'a StepFailure) -> Self {
        Diagnostic::Failure(failure)
    }
}

impl<'a> From<&'a StepError> for Diagnostic<'a> {
    fn from(error: &'a StepError) -> Self {
        match error {
            StepError::Failed(failure) => Diagnostic::Failure(failure),
            StepError::Abort(_) => Diagnostic::Abort,
        }
    }
}

/// Renders diagnostics scoped to the suite's own source tree
#[derive(Debug, Clone)]
pub struct TraceFormatter {
    suite_root: PathBuf,
}

impl TraceFormatter {
    /// Create a formatter. A relative root is resolved against the working
    /// directory, since frame paths are compared component by component.
    pub fn new(suite_root: impl Into<PathBuf>) -> Self {
        Self {
            suite_root: absolutize(suite_root.into()),
        }
    }

    pub fn suite_root(&self) -> &Path {
        &self.suite_root
    }

    /// Format using the process-wide debug flag.
    ///
    /// Returns `None` for [`Diagnostic::Abort`].
    pub fn format(&self, diagnostic: Diagnostic<'_>) -> Option<String> {
        self.format_with(diagnostic, debug_enabled())
    }

    /// Format with an explicit verbosity
    pub fn format_with(&self, diagnostic: Diagnostic<'_>, full: bool) -> Option<String> {
        match diagnostic {
            Diagnostic::Text(text) => Some(text.to_string()),
            Diagnostic::Failure(failure) => Some(self.render(failure, full)),
            Diagnostic::Abort => None,
        }
    }

    fn render(&self, failure: &StepFailure, full: bool) -> String {
        let mut backtrace = failure.backtrace().clone();
        backtrace.resolve();

        let mut out = String::new();
        for frame in backtrace.frames() {
            for symbol in frame.symbols() {
                let name = symbol
                    .name()
                    .map(|n| format!("{:#}", n))
                    .unwrap_or_else(|| "<unknown>".to_string());

                match symbol.filename() {
                    Some(file) if full || self.owns(file) => {
                        let _ = writeln!(
                            out,
                            "  at {} ({}:{})",
                            name,
                            file.display(),
                            symbol.lineno().unwrap_or(0)
                        );
                    }
                    None if full => {
                        let _ = writeln!(out, "  at {}", name);
                    }
                    _ => {}
                }
            }
        }

        let _ = write!(out, "{}: {}", failure.kind(), failure.message());
        out
    }

    /// Whether a frame's source file lies under the suite root.
    ///
    /// Workspace members are compiled with paths relative to the workspace
    /// root, so relative paths are resolved against each ancestor of the root.
    fn owns(&self, file: &Path) -> bool {
        if file.is_absolute() {
            return file.starts_with(&self.suite_root);
        }

        let from_cwd = std::env::current_dir()
            .map(|cwd| cwd.join(file))
            .map(|candidate| candidate.starts_with(&self.suite_root) && candidate.is_file())
            .unwrap_or(false);

        from_cwd
            || self.suite_root.ancestors().any(|base| {
                let candidate = base.join(file);
                candidate.starts_with(&self.suite_root) && candidate.is_file()
            })
    }
}

/// Absolute form of a path; absolute paths are kept as given
fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::fs::canonicalize(&path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    })
}

impl Default for TraceFormatter {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{AbortSignal, FailureKind};

    fn formatter() -> TraceFormatter {
        TraceFormatter::new(env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_text_passes_through_unchanged() {
        let formatter = formatter();
        let once = formatter.format_with("hand written".into(), false).unwrap();
        let twice = formatter.format_with(Diagnostic::Text(&once), false).unwrap();
        assert_eq!(once, "hand written");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_failure_ends_with_kind_and_message() {
        let failure = StepFailure::new(FailureKind::Navigation, "landed on /login");
        let text = formatter().format_with((&failure).into(), false).unwrap();
        assert!(text.ends_with("Navigation: landed on /login"));
    }

    #[test]
    fn test_filtered_frames_are_subset_of_full_stack() {
        let failure = StepFailure::assertion("cart badge shows 0");
        let formatter = formatter();

        let filtered = formatter.format_with((&failure).into(), false).unwrap();
        let full = formatter.format_with((&failure).into(), true).unwrap();

        assert!(full.len() >= filtered.len());
        let full_lines: Vec<&str> = full.lines().collect();
        for line in filtered.lines() {
            assert!(full_lines.contains(&line), "missing from full stack: {line}");
        }
        for line in filtered.lines().filter(|l| l.starts_with("  at ")) {
            assert!(line.contains(env!("CARGO_MANIFEST_DIR")) || !line.contains(" (/"));
        }
    }

    #[test]
    fn test_abort_is_never_rendered() {
        let error = StepError::from(AbortSignal);
        assert!(formatter().format_with((&error).into(), true).is_none());
    }

    #[test]
    fn test_relative_root_keeps_suite_frames() {
        // cargo runs unit tests from the package directory
        let relative = TraceFormatter::new(".");
        let absolute = formatter();
        assert!(relative.suite_root().is_absolute());

        let failure = StepFailure::assertion("x");
        let from_relative = relative.format_with((&failure).into(), false).unwrap();
        let from_absolute = absolute.format_with((&failure).into(), false).unwrap();

        assert!(from_relative.lines().any(|l| l.starts_with("  at ")));
        assert_eq!(
            from_relative.lines().filter(|l| l.starts_with("  at ")).count(),
            from_absolute.lines().filter(|l| l.starts_with("  at ")).count()
        );
    }

    #[test]
    fn test_absolutize_resolves_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        assert!(absolutize(PathBuf::from("does/not/exist")).starts_with(&cwd));
        assert_eq!(absolutize(PathBuf::from("/srv/suite")), PathBuf::from("/srv/suite"));
    }

    #[test]
    fn test_foreign_absolute_paths_are_not_owned() {
        let formatter = TraceFormatter::new("/srv/suite");
        assert!(formatter.owns(Path::new("/srv/suite/pages/login.rs")));
        assert!(!formatter.owns(Path::new("/rustc/abc/library/core/src/ops.rs")));
    }
}
