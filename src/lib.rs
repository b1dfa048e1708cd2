//! # kube-sanitize
//!
//! A read-only Kubernetes cluster sanitizer. It pulls live resource
//! state through the cluster API, runs one rule-based linter per
//! resource kind, scores the findings into a graded report, and diffs
//! the report against the previous scan of the same cluster.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kube_sanitize::client::{KubeFetcher, Lister};
//! use kube_sanitize::config::ScanConfig;
//! use kube_sanitize::scan::Scanner;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = KubeFetcher::new().await?;
//! let scanner = Scanner::new(Lister::new(fetcher, ScanConfig::default()));
//! let report = scanner.scan().await;
//! println!("{} scored {} ({})", report.cluster, report.score, report.grade);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod issues;
pub mod labels;
pub mod linters;
pub mod refs;
pub mod report;
pub mod scan;
pub mod tally;

// Re-export the types most callers touch
pub use config::ScanConfig;
pub use issues::{Issue, Outcome, ResourceId, Severity};
pub use scan::Scanner;
pub use tally::{Report, Section, Tally};
