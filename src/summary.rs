use crate::media::Outcome;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// End-of-run tally of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful outcomes per distinct action text.
    pub actions: BTreeMap<String, usize>,
    /// Path and error text of every failed file.
    pub failures: Vec<(PathBuf, String)>,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut summary = Summary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match &outcome.error {
                None => {
                    summary.successful += 1;
                    *summary.actions.entry(outcome.action.clone()).or_default() += 1;
                }
                Some(error) => {
                    summary.failed += 1;
                    summary
                        .failures
                        .push((outcome.entry.path.clone(), error.to_string()));
                }
            }
        }
        summary.failures.sort();
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, error) in &self.failures {
            writeln!(f, "ERROR: {} - {}", path.display(), error)?;
        }
        if !self.failures.is_empty() {
            writeln!(f)?;
        }
        writeln!(f, "=== SUMMARY ===")?;
        writeln!(f, "Total files processed: {}", self.total)?;
        writeln!(f, "Successful: {}", self.successful)?;
        writeln!(f, "Failed: {}", self.failed)?;
        if !self.actions.is_empty() {
            writeln!(f)?;
            writeln!(f, "Actions taken:")?;
            for (action, count) in &self.actions {
                writeln!(f, "  {}: {}", action, count)?;
            }
        }
        Ok(())
    }
}
