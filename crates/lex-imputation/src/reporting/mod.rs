//! Report generation module.
//!
//! Writes imputed tables and run reports for the CLI, and renders the
//! human-readable summaries it prints.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_imputation::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build_run_report("data/train.csv", None, &outcome);
//! println!("{}", ReportGenerator::render_summary(&report));
//!
//! let generator = ReportGenerator::new(PathBuf::from("output"), None);
//! generator.write_report_to_file(&report, "train")?;
//! ```

mod generator;

pub use generator::{ReportGenerator, RunReport};
