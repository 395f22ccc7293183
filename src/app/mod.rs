pub mod reconcile;
mod run;

pub use run::{run_update, RunOptions, RunSummary, SaveOutcome};
