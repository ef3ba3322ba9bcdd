pub mod reconciliation_run;

pub use reconciliation_run::{ReconciliationRun, RunStatus, SourcePair};
