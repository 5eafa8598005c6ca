//! Reading aggregated clonal tables and writing bootstrap results.
//!
//! - [`read`]: [`ClonalTable`] loads a CSV/TSV or Arrow IPC table through
//!   polars and validates it into observations.
//! - [`schema`]: configurable column names and input format detection.
//! - [`write`]: [`ResultWriter`] persists result, summary and warning tables
//!   atomically, plus the run metadata.
pub mod read;
pub mod schema;
pub mod write;

pub use read::{
    read_frame,
    read_sample_sheet,
    ClonalTable,
    SampleDepth,
};
pub use schema::{
    ClonalColumns,
    InputFormat,
};
pub use write::{
    read_output,
    ResultWriter,
};
