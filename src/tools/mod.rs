//! Analysis tools built on top of the loaded clonal tables.
//!
//! - [`bootstrap`]: depth-normalized bootstrap of per-sample clonal
//!   populations. Samples are subsampled to configured depths many times and
//!   per-group statistics are computed for every grouping variable from the
//!   same draw, then collected into one table per grouping variable.
pub mod bootstrap;
