//! `orderrecon-engine` — order vs. payment-gateway batch reconciliation.
//!
//! Pure engine crate: receives pre-fetched order rows and gateway batch rows,
//! returns classified results. No CLI or IO dependencies.

pub mod batch;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod orders;
pub mod report;
pub mod retry;
pub mod summary;

pub use config::ReconcileConfig;
pub use engine::{load_csv_rows, run, ReconInput};
pub use error::ReconError;
pub use model::{ClassificationState, ReconResult};
pub use report::build_report;
