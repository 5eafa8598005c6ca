use std::path::{
    Path,
    PathBuf,
};
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

use anyhow::Context;
use crossbeam::channel::{
    bounded,
    Sender,
};
use itertools::Itertools;
use log::{
    debug,
    error,
    info,
    warn,
};
use rayon::prelude::*;
use serde::Serialize;

use super::aggregate::{
    collect_records,
    summarize_records,
};
use super::config::{
    ArmConfig,
    BootstrapConfig,
};
use super::partition::partition_samples;
use super::resample::{
    arm_seed,
    draw,
    entropy_seed,
    plan_units,
    task_rng,
    ResampleUnit,
};
use super::stats::{
    group_records,
    SampleGroups,
};
use crate::data_structs::typedef::{
    CountType,
    LabelStr,
};
use crate::data_structs::{
    sort_records,
    BootstrapWarning,
    ClonalObservation,
    ResultRecord,
};
use crate::error::BootstrapError;
use crate::io::{
    ClonalTable,
    ResultWriter,
};
use crate::utils::{
    n_threads,
    THREAD_POOL,
};

const CHANNEL_CAPACITY: usize = 256;

/// Progress notifications of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Number of resampling units an arm is going to run.
    Planned(u64),
    /// Units completed since the last notification.
    Completed(u64),
}

pub type ProgressHook = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Depth of one resampled sample, as recorded in the run metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEntry {
    pub sample_id:   LabelStr,
    pub clones:      usize,
    pub total_depth: CountType,
}

/// An output table that could not be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub variable: String,
    pub message:  String,
}

/// Outcome of one comparison arm.
#[derive(Debug, Clone, Serialize)]
pub struct ArmReport {
    pub genotype:       String,
    pub prefix:         PathBuf,
    pub arm_seed:       u64,
    pub samples:        Vec<SampleEntry>,
    pub units:          usize,
    pub warnings:       Vec<BootstrapWarning>,
    pub outputs:        Vec<PathBuf>,
    pub write_failures: Vec<WriteFailure>,
}

impl ArmReport {
    pub fn is_complete(&self) -> bool {
        self.write_failures.is_empty()
    }
}

#[derive(Serialize)]
struct RunMetadata<'a> {
    version:  &'static str,
    seed:     u64,
    config:   &'a BootstrapConfig,
    input:    Option<&'a Path>,
    arm:      &'a ArmReport,
}

/// Outcome of a run. Each arm succeeds or fails on its own.
#[derive(Debug)]
pub struct RunReport {
    pub seed: u64,
    pub arms: Vec<anyhow::Result<ArmReport>>,
}

impl RunReport {
    /// Whether every arm completed and wrote all of its outputs.
    pub fn is_success(&self) -> bool {
        self.arms
            .iter()
            .all(|arm| arm.as_ref().is_ok_and(ArmReport::is_complete))
    }

    /// Reports of all arms, or the first arm error.
    pub fn into_result(self) -> anyhow::Result<Vec<ArmReport>> {
        self.arms.into_iter().collect()
    }
}

/// In-memory results of one arm.
#[derive(Debug, Clone, Default)]
pub struct ArmOutput {
    pub samples:  Vec<SampleEntry>,
    /// Sorted records, one vector per grouping variable.
    pub records:  Vec<Vec<ResultRecord>>,
    pub warnings: Vec<BootstrapWarning>,
}

/// A prepared arm: sample groups and the units to resample.
struct ArmPlan {
    groups:   Vec<SampleGroups>,
    units:    Vec<ResampleUnit>,
    warnings: Vec<BootstrapWarning>,
}

impl ArmPlan {
    fn new(
        observations: Vec<ClonalObservation>,
        config: &BootstrapConfig,
    ) -> Result<Self, BootstrapError> {
        let partition = partition_samples(observations, config);
        let (units, unit_warnings) = plan_units(&partition.samples, config);
        let mut warnings = partition.warnings;
        warnings.extend(unit_warnings);

        let groups = partition
            .samples
            .into_iter()
            .map(|sample| SampleGroups::new(sample, config.grouping.len(), config.accounting))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            groups,
            units,
            warnings,
        })
    }

    fn sample_entries(&self) -> Vec<SampleEntry> {
        self.groups
            .iter()
            .map(|groups| {
                SampleEntry {
                    sample_id:   groups.sample().id().clone(),
                    clones:      groups.sample().len(),
                    total_depth: groups.sample().total_depth(),
                }
            })
            .collect()
    }
}

/// Draws one unit and derives the records of every grouping variable from
/// that single draw.
fn run_unit(
    unit: &ResampleUnit,
    groups: &SampleGroups,
    arm_seed: u64,
    variable_names: &[LabelStr],
    config: &BootstrapConfig,
) -> Result<Vec<Vec<ResultRecord>>, BootstrapError> {
    let mut rng = task_rng(unit.seed(arm_seed));
    let draw = draw(groups.counts(), unit.depth, &mut rng)?;
    Ok(variable_names
        .iter()
        .enumerate()
        .map(|(variable_idx, name)| {
            group_records(
                unit,
                groups.sample(),
                groups.variable(variable_idx),
                name,
                &draw,
                &config.statistics,
            )
        })
        .collect())
}

/// Resamples every unit of `plan` and sends the records of each grouping
/// variable to its collector.
///
/// `failed` is raised before the failing worker drops its senders, so a
/// collector that sees its channel close also sees the failure.
fn produce(
    plan: &ArmPlan,
    arm_seed: u64,
    variable_names: &[LabelStr],
    config: &BootstrapConfig,
    senders: Vec<Sender<Vec<ResultRecord>>>,
    failed: &AtomicBool,
    on_unit: &(dyn Fn() + Sync),
) -> Result<(), BootstrapError> {
    plan.units
        .par_iter()
        .try_for_each_with(senders, |senders, unit| {
            let groups = &plan.groups[unit.sample_idx];
            run_unit(unit, groups, arm_seed, variable_names, config)
                .and_then(|per_variable| {
                    for (sender, batch) in senders.iter().zip(per_variable) {
                        sender.send(batch).map_err(|_| {
                            BootstrapError::Sampling("result collector stopped".into())
                        })?;
                    }
                    Ok(())
                })
                .inspect(|_| on_unit())
                .inspect_err(|_| failed.store(true, Ordering::Release))
        })
}

fn variable_names(config: &BootstrapConfig) -> Vec<LabelStr> {
    config
        .grouping
        .iter()
        .map(|variable| LabelStr::from(variable.name()))
        .collect()
}

/// Resamples the observations of one arm without touching the filesystem.
pub fn bootstrap_samples(
    observations: Vec<ClonalObservation>,
    config: &BootstrapConfig,
    arm_seed: u64,
) -> Result<ArmOutput, BootstrapError> {
    let plan = ArmPlan::new(observations, config)?;
    let names = variable_names(config);

    let per_unit = THREAD_POOL.install(|| {
        plan.units
            .par_iter()
            .map(|unit| run_unit(unit, &plan.groups[unit.sample_idx], arm_seed, &names, config))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let mut records = vec![Vec::new(); names.len()];
    for unit_records in per_unit {
        for (variable_records, batch) in records.iter_mut().zip(unit_records) {
            variable_records.extend(batch);
        }
    }
    records.iter_mut().for_each(|records| sort_records(records));

    Ok(ArmOutput {
        samples: plan.sample_entries(),
        records,
        warnings: plan.warnings,
    })
}

/// Runs both comparison arms of a configuration.
pub struct BootstrapRunner {
    config:   BootstrapConfig,
    progress: Option<ProgressHook>,
}

impl BootstrapRunner {
    /// Validates the configuration.
    pub fn try_new(config: BootstrapConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
        })
    }

    pub fn with_progress(
        mut self,
        hook: ProgressHook,
    ) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Loads `input` and runs both arms.
    ///
    /// Schema errors abort before any resampling. Arm failures are reported
    /// per arm in the returned [`RunReport`].
    pub fn run(
        &self,
        input: &Path,
    ) -> anyhow::Result<RunReport> {
        let table = ClonalTable::read(input, &self.config)?;
        self.run_table(&table, Some(input))
    }

    /// Runs both arms on an already loaded table.
    ///
    /// The table must have been loaded with the grouping variables of this
    /// runner's configuration, in the same order.
    pub fn run_table(
        &self,
        table: &ClonalTable,
        input: Option<&Path>,
    ) -> anyhow::Result<RunReport> {
        if table.grouping() != self.config.grouping.as_slice() {
            return Err(BootstrapError::config(format!(
                "table was loaded for grouping [{}], run is configured for [{}]",
                table.grouping().iter().map(|v| v.name()).join(", "),
                self.config.grouping.iter().map(|v| v.name()).join(", ")
            ))
            .into());
        }

        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        info!("Run seed: {seed}, {} threads", n_threads());

        let (first, second) = THREAD_POOL.install(|| {
            rayon::join(
                || self.run_arm(0, &self.config.arms[0], table, seed, input),
                || self.run_arm(1, &self.config.arms[1], table, seed, input),
            )
        });
        for (arm, result) in self.config.arms.iter().zip([&first, &second]) {
            match result {
                Ok(report) if report.is_complete() => {
                    info!("Arm {} finished: {} units", arm.genotype, report.units)
                },
                Ok(report) => {
                    error!(
                        "Arm {} finished with {} failed outputs",
                        arm.genotype,
                        report.write_failures.len()
                    )
                },
                Err(e) => error!("Arm {} failed: {:#}", arm.genotype, e),
            }
        }
        Ok(RunReport {
            seed,
            arms: vec![first, second],
        })
    }

    fn notify(
        &self,
        event: ProgressEvent,
    ) {
        if let Some(hook) = self.progress.as_ref() {
            hook(event)
        }
    }

    fn run_arm(
        &self,
        arm_idx: usize,
        arm: &ArmConfig,
        table: &ClonalTable,
        run_seed: u64,
        input: Option<&Path>,
    ) -> anyhow::Result<ArmReport> {
        let config = &self.config;
        let observations = table.select_genotype(&arm.genotype)?;
        let plan = ArmPlan::new(observations, config)?;
        let seed = arm_seed(run_seed, arm_idx);
        let names = variable_names(config);
        let writer = ResultWriter::new(
            arm.output.clone(),
            config.output_format,
            config.write_attempts,
        );
        info!(
            "Arm {}: {} samples, {} units, {} grouping variables",
            arm.genotype,
            plan.groups.len(),
            plan.units.len(),
            names.len()
        );
        self.notify(ProgressEvent::Planned(plan.units.len() as u64));

        let production_failed = AtomicBool::new(false);
        let (senders, receivers): (Vec<Sender<Vec<ResultRecord>>>, Vec<_>) =
            (0..names.len()).map(|_| bounded(CHANNEL_CAPACITY)).unzip();

        let (produced, written) = std::thread::scope(|scope| {
            let collectors = receivers
                .into_iter()
                .zip(names.iter())
                .map(|(receiver, name)| {
                    let writer = &writer;
                    let production_failed = &production_failed;
                    scope.spawn(move || -> Result<Vec<PathBuf>, BootstrapError> {
                        let records = collect_records(receiver);
                        if production_failed.load(Ordering::Acquire) {
                            debug!("Skipping {name} output, resampling failed");
                            return Ok(Vec::new());
                        }
                        let mut outputs = vec![writer.write_records(name, &records)?];
                        if config.summarize {
                            let summary = summarize_records(&records, config.iterations);
                            outputs.push(writer.write_summary(name, &summary)?);
                        }
                        Ok(outputs)
                    })
                })
                .collect_vec();

            let produced = produce(
                &plan,
                seed,
                &names,
                config,
                senders,
                &production_failed,
                &|| self.notify(ProgressEvent::Completed(1)),
            );

            let written = collectors
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| {
                            Err(BootstrapError::Sampling("result collector panicked".into()))
                        })
                })
                .collect_vec();
            (produced, written)
        });
        produced.with_context(|| format!("Resampling arm {} failed", arm.genotype))?;

        let mut outputs = Vec::new();
        let mut write_failures = Vec::new();
        for (name, result) in names.iter().zip(written) {
            match result {
                Ok(paths) => outputs.extend(paths),
                Err(e) => {
                    error!("{e}");
                    write_failures.push(WriteFailure {
                        variable: name.to_string(),
                        message:  e.to_string(),
                    });
                },
            }
        }

        for warning in plan.warnings.iter() {
            debug!("Arm {}: {}", arm.genotype, warning);
        }
        if !plan.warnings.is_empty() {
            warn!(
                "Arm {}: {} warnings recorded",
                arm.genotype,
                plan.warnings.len()
            );
        }
        match writer.write_warnings(&plan.warnings) {
            Ok(path) => outputs.push(path),
            Err(e) => {
                error!("{e}");
                write_failures.push(WriteFailure {
                    variable: "warnings".into(),
                    message:  e.to_string(),
                });
            },
        }

        let mut report = ArmReport {
            genotype: arm.genotype.clone(),
            prefix: arm.output.clone(),
            arm_seed: seed,
            samples: plan.sample_entries(),
            units: plan.units.len(),
            warnings: plan.warnings,
            outputs,
            write_failures,
        };
        let metadata = RunMetadata {
            version: env!("CARGO_PKG_VERSION"),
            seed: run_seed,
            config,
            input,
            arm: &report,
        };
        match writer.write_metadata(&metadata) {
            Ok(path) => report.outputs.push(path),
            Err(e) => {
                error!("{e}");
                report.write_failures.push(WriteFailure {
                    variable: "run metadata".into(),
                    message:  e.to_string(),
                });
            },
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::{
        GroupKey,
        GroupingVariable,
        Statistic,
    };

    fn observations() -> Vec<ClonalObservation> {
        [("M1", "A", 60), ("M1", "B", 40), ("M2", "A", 10)]
            .into_iter()
            .map(|(sample, barcode, count)| {
                ClonalObservation::new(sample.into(), "KT".into(), count, vec![
                    GroupKey::Single(barcode.into()),
                ])
            })
            .collect()
    }

    fn config() -> BootstrapConfig {
        BootstrapConfig::default()
            .with_arm_pair(ArmConfig::new("KT", "a"), ArmConfig::new("KT", "b"))
            .with_grouping(vec![GroupingVariable::ClonalBarcode])
            .with_statistics(vec![Statistic::Reads])
            .with_thresholds(vec![50.0])
            .with_iterations(20)
    }

    #[test]
    fn in_memory_bootstrap_is_reproducible() {
        let config = config();
        let first = bootstrap_samples(observations(), &config, 99).unwrap();
        let second = bootstrap_samples(observations(), &config, 99).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.samples.len(), 2);

        let other = bootstrap_samples(observations(), &config, 100).unwrap();
        assert_ne!(first.records, other.records);
    }

    #[test]
    fn observations_must_carry_every_grouping_key() {
        let config = config().with_grouping(vec![
            GroupingVariable::GuidePair,
            GroupingVariable::ClonalBarcode,
        ]);
        let result = bootstrap_samples(observations(), &config, 1);
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[test]
    fn failed_resampling_is_visible_to_collectors() {
        let config = config();
        let mut plan = ArmPlan::new(observations(), &config).unwrap();
        plan.units = vec![ResampleUnit {
            sample_idx:    0,
            sample_id:     "M1".into(),
            threshold_idx: 0,
            threshold:     1000.0,
            depth:         1000,
            round:         0,
            iteration:     0,
        }];
        let names = variable_names(&config);
        let failed = AtomicBool::new(false);
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);

        let (produced, (collected, saw_failure)) = std::thread::scope(|scope| {
            let failed = &failed;
            let collector = scope.spawn(move || {
                let records = collect_records(receiver);
                (records.len(), failed.load(Ordering::Acquire))
            });
            let produced = produce(&plan, 7, &names, &config, vec![sender], failed, &|| {});
            (produced, collector.join().unwrap())
        });
        assert!(matches!(produced, Err(BootstrapError::Sampling(_))));
        assert_eq!(collected, 0);
        assert!(saw_failure);
    }

    #[test]
    fn reads_per_iteration_sum_to_depth() {
        let output = bootstrap_samples(observations(), &config(), 3).unwrap();
        let sums = output.records[0]
            .iter()
            .into_group_map_by(|r| (r.sample_id.clone(), r.iteration))
            .into_iter()
            .map(|((sample, _), records)| {
                (sample, records.iter().map(|r| r.value).sum::<f64>() as u64)
            })
            .collect_vec();
        assert_eq!(sums.len(), 40);
        for (sample, total) in sums {
            let expected = if sample.as_str() == "M1" { 50 } else { 5 };
            assert_eq!(total, expected);
        }
    }
}
