mod aggregate;
mod config;
mod partition;
mod resample;
mod runner;
mod stats;

pub use aggregate::{
    collect_records,
    summarize_records,
    SummaryRecord,
};
pub use config::{
    ArmConfig,
    BootstrapConfig,
    ControlFilter,
};
pub use partition::{
    partition_samples,
    Partition,
};
pub use resample::{
    arm_seed,
    draw,
    entropy_seed,
    plan_units,
    resolve_depth,
    target_depth,
    task_rng,
    task_seed,
    BootstrapDraw,
    ResampleUnit,
};
pub use runner::{
    bootstrap_samples,
    ArmOutput,
    ArmReport,
    BootstrapRunner,
    ProgressEvent,
    ProgressHook,
    RunReport,
    SampleEntry,
    WriteFailure,
};
pub use stats::{
    group_records,
    GroupIndex,
    GroupTally,
    SampleGroups,
};
