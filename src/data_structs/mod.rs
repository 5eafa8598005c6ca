//! Core data structures of the bootstrap engine.
//!
//! - [`ClonalObservation`] and [`GroupKey`]: one validated row of the
//!   aggregated clonal table and its grouping keys.
//! - [`Sample`]: the observations of one sample with its total read depth.
//! - [`ResultRecord`] and [`BootstrapWarning`]: what a run produces.
//! - Enumerations configuring a run ([`ThresholdMode`], [`AccountingMode`],
//!   [`Statistic`], [`GroupingVariable`], [`OutputFormat`]).
//! - [`typedef`]: type aliases for counts, statistics and labels.

mod enums;
mod observation;
mod record;
mod sample;
pub mod typedef;

pub use enums::{
    AccountingMode,
    GroupingVariable,
    OutputFormat,
    Statistic,
    ThresholdMode,
};
pub use observation::{
    ClonalObservation,
    GroupKey,
};
pub use record::{
    sort_records,
    BootstrapWarning,
    ResultRecord,
};
pub use sample::Sample;
