pub use crate::data_structs::typedef::{
    CountType,
    IterType,
    LabelStr,
    StatType,
};
pub use crate::data_structs::{
    AccountingMode,
    BootstrapWarning,
    ClonalObservation,
    GroupKey,
    GroupingVariable,
    OutputFormat,
    ResultRecord,
    Sample,
    Statistic,
    ThresholdMode,
};
pub use crate::error::BootstrapError;
pub use crate::io::{
    ClonalColumns,
    ClonalTable,
    ResultWriter,
};
pub use crate::tools::bootstrap::{
    bootstrap_samples,
    ArmConfig,
    ArmReport,
    BootstrapConfig,
    BootstrapRunner,
    ControlFilter,
    RunReport,
};
pub use crate::utils::SummaryStats;
