//! Persisted report handling: the on-disk store and the two-report
//! diff engine.

pub mod diff;
pub mod store;

pub use diff::{diff, DeltaScore, DiffReport, SectionDelta};
pub use store::{ReportStore, StoreError};
