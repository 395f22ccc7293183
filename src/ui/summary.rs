// src/ui/summary.rs
use std::fmt;

use crate::app::{RunSummary, SaveOutcome};

const OK: &str = "✓";
const WARN: &str = "⚠";
const FAIL: &str = "✗";

/// Plain-text end-of-run report for stdout.
pub struct SummaryView<'a>(pub &'a RunSummary);

impl fmt::Display for SummaryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        let report = &summary.report;

        match &summary.saved {
            SaveOutcome::Written => {
                writeln!(f, "{} Updated {}", OK, summary.kubeconfig.display())?;
                writeln!(f, "{} Credentials updated for the following contexts:", OK)?;
                for ctx in &report.changed {
                    writeln!(f, "   - {}", ctx)?;
                }
            }
            SaveOutcome::NotNeeded => {
                writeln!(f, "{} All credentials are up-to-date", OK)?;
            }
            SaveOutcome::Failed(e) => {
                writeln!(
                    f,
                    "{} Could not write {}: {}",
                    FAIL,
                    summary.kubeconfig.display(),
                    e
                )?;
                writeln!(
                    f,
                    "  The original file is preserved at {}",
                    summary.backup.display()
                )?;
            }
        }

        if !report.skipped.is_empty() {
            writeln!(f, "{} Skipped {} context(s):", WARN, report.skipped.len())?;
            for (ctx, reason) in &report.skipped {
                writeln!(f, "   - {}: {}", ctx, reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::reconcile::{ReconcileReport, SkipReason};
    use std::path::PathBuf;

    fn summary(saved: SaveOutcome, report: ReconcileReport) -> RunSummary {
        RunSummary {
            kubeconfig: PathBuf::from("/home/me/.kube/config"),
            backup: PathBuf::from("/home/me/.kube/config.bak"),
            report,
            saved,
        }
    }

    #[test]
    fn lists_updated_and_skipped_contexts() {
        let report = ReconcileReport {
            changed: vec!["prod".into(), "staging".into()],
            up_to_date: vec![],
            skipped: vec![("lab".into(), SkipReason::UnknownCluster("lab-k8s".into()))],
        };
        let text = SummaryView(&summary(SaveOutcome::Written, report)).to_string();

        assert!(text.contains("Updated /home/me/.kube/config"));
        assert!(text.contains("   - prod\n   - staging\n"));
        assert!(text.contains("Skipped 1 context(s):"));
        assert!(text.contains("lab: cannot find cluster lab-k8s configuration"));
    }

    #[test]
    fn clean_run_says_up_to_date() {
        let text =
            SummaryView(&summary(SaveOutcome::NotNeeded, ReconcileReport::default())).to_string();
        assert_eq!(text, "✓ All credentials are up-to-date\n");
    }
}
