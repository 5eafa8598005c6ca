//! # clonalboot
//!
//! `clonalboot` estimates clonal population statistics from pooled
//! sequencing of dual-guide barcoded tumours. Raw read counts of samples
//! sequenced to different depths are not comparable, so every sample is
//! repeatedly subsampled ("bootstrapped") to controlled depths and per-group
//! statistics are recomputed on each draw, yielding per-iteration tables
//! from which confidence intervals are derived downstream.
//!
//! If you do not want to use clonalboot as a crate, check out the
//! `clonalboot` command line tool in the `console` workspace member.
//!
//! ## Key Features
//!
//! * **Exact subsampling**: draws are uniform without replacement over a
//!   sample's reads, computed as a chain of exact conditional
//!   hypergeometric draws over its clones without materializing reads.
//! * **Multiplexed grouping**: one draw per iteration is re-bucketed by every
//!   grouping variable (guide pair, unordered guide pair, gene pair, clonal
//!   barcode, any categorical column), so results of one iteration are
//!   correlated across variables.
//! * **Reproducible parallelism**: units run on a Rayon pool, each with its
//!   own generator seeded from the unit coordinates, so results do not depend
//!   on the thread count.
//! * **Atomic outputs**: one table per grouping variable and arm, written
//!   through Polars to a temporary file and renamed into place, with
//!   independent retries.
//!
//! Number of threads to be used can be configured with setting
//! `CLONALBOOT_NUM_THREADS` environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: observations, samples, records and warnings.
//! * [`io`]: the clonal table loader and the result writers.
//! * [`tools`]: the bootstrap engine ([`tools::bootstrap`]).
//! * [`utils`]: the thread pool, helper macros and summary statistics.
//! * [`error`]: the [`BootstrapError`](error::BootstrapError) taxonomy.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use clonalboot::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BootstrapConfig::default()
//!         .with_arm_pair(
//!             ArmConfig::new("KT", "results/KT"),
//!             ArmConfig::new("KTC", "results/KTC"),
//!         )
//!         .with_thresholds(vec![50.0, 90.0])
//!         .with_iterations(100)
//!         .with_seed(Some(42));
//!
//!     let runner = BootstrapRunner::try_new(config)?;
//!     let report = runner.run(Path::new("gRNA_clonalbarcode_combined.tsv"))?;
//!     for arm in report.into_result()? {
//!         println!("{}: {} outputs", arm.genotype, arm.outputs.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod data_structs;
pub mod error;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;
