use std::path::{Path, PathBuf};

use super::reconcile::{ReconcileReport, Reconciler};
use crate::config::{store, StoreError};
use crate::discovery::{FetchTimeouts, RemoteExecutor};
use crate::ui::CredentialPrompt;
use crate::utils::logging::Logger;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub kubeconfig: PathBuf,
    pub timeouts: FetchTimeouts,
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Every context was already up to date; the file was not touched.
    NotNeeded,
    Written,
    /// The new file could not be written; the backup still holds the
    /// original contents.
    Failed(StoreError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub kubeconfig: PathBuf,
    pub backup: PathBuf,
    pub report: ReconcileReport,
    pub saved: SaveOutcome,
}

/// Load, back up, reconcile every context, and write back only if
/// something changed. Only load and backup failures are returned as
/// errors; everything after that ends in a summary.
pub async fn run_update<E: RemoteExecutor>(
    options: &RunOptions,
    executor: &E,
    prompt: &mut dyn CredentialPrompt,
    logger: &mut dyn Logger,
) -> Result<RunSummary, StoreError> {
    let path: &Path = &options.kubeconfig;
    let mut config = store::load(path, logger)?;
    let backup = store::backup(path, logger)?;

    let report = Reconciler::new(executor, options.timeouts, prompt, &mut *logger)
        .reconcile(&mut config)
        .await;

    let saved = if config.is_dirty() {
        match store::save(path, &config, logger) {
            Ok(()) => {
                logger.success(&format!(
                    "Updated {} for {}",
                    path.display(),
                    config.changed_contexts().join(", ")
                ));
                SaveOutcome::Written
            }
            Err(e) => {
                logger.error(&format!(
                    "Error writing to {}: {} (original kept at {})",
                    path.display(),
                    e,
                    backup.display()
                ));
                SaveOutcome::Failed(e)
            }
        }
    } else {
        SaveOutcome::NotNeeded
    };

    Ok(RunSummary {
        kubeconfig: options.kubeconfig.clone(),
        backup,
        report,
        saved,
    })
}
