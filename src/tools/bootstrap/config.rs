use std::path::PathBuf;

use hashbrown::HashSet;
use itertools::Itertools;
use serde::Serialize;

use crate::data_structs::typedef::{
    CountType,
    IterType,
};
use crate::data_structs::{
    AccountingMode,
    GroupingVariable,
    OutputFormat,
    Statistic,
    ThresholdMode,
};
use crate::error::BootstrapError;
use crate::io::ClonalColumns;
use crate::with_field_fn;

/// One comparison arm: the genotype to select and the output prefix its
/// tables are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmConfig {
    pub genotype: String,
    pub output:   PathBuf,
}

impl ArmConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(
        genotype: S,
        output: P,
    ) -> Self {
        Self {
            genotype: genotype.into(),
            output:   output.into(),
        }
    }
}

/// Treatment of control clones (clones whose guides all target a control
/// locus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFilter {
    /// Case-insensitive substring marking a control guide or gene. An empty
    /// label disables control detection.
    pub label:   String,
    /// Whether control clones take part in the resampling.
    pub include: bool,
}

impl Default for ControlFilter {
    fn default() -> Self {
        Self {
            label:   "Safe".into(),
            include: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapConfig {
    pub arms:               Vec<ArmConfig>,
    /// Depth thresholds in run order.
    pub thresholds:         Vec<f64>,
    pub threshold_mode:     ThresholdMode,
    /// Bootstrap draws per threshold and round.
    pub iterations:         IterType,
    /// Independent repeats of the whole iteration series.
    pub rounds:             IterType,
    pub grouping:           Vec<GroupingVariable>,
    pub statistics:         Vec<Statistic>,
    pub accounting:         AccountingMode,
    pub control:            ControlFilter,
    /// Samples with fewer reads are excluded with a warning.
    pub min_required_depth: CountType,
    /// Run seed. Drawn from the OS when unset and recorded in the run
    /// metadata.
    pub seed:               Option<u64>,
    pub output_format:      OutputFormat,
    pub summarize:          bool,
    pub write_attempts:     usize,
    pub columns:            ClonalColumns,
    pub sample_sheet:       Option<PathBuf>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            arms:               Vec::new(),
            thresholds:         vec![50.0, 75.0, 90.0],
            threshold_mode:     ThresholdMode::default(),
            iterations:         100,
            rounds:             1,
            grouping:           GroupingVariable::defaults(),
            statistics:         vec![
                Statistic::CloneCount,
                Statistic::Reads,
                Statistic::ReadFraction,
            ],
            accounting:         AccountingMode::default(),
            control:            ControlFilter::default(),
            min_required_depth: 1,
            seed:               None,
            output_format:      OutputFormat::default(),
            summarize:          false,
            write_attempts:     2,
            columns:            ClonalColumns::default(),
            sample_sheet:       None,
        }
    }
}

impl BootstrapConfig {
    with_field_fn!(arms, Vec<ArmConfig>);

    with_field_fn!(thresholds, Vec<f64>);

    with_field_fn!(threshold_mode, ThresholdMode);

    with_field_fn!(iterations, IterType);

    with_field_fn!(rounds, IterType);

    with_field_fn!(grouping, Vec<GroupingVariable>);

    with_field_fn!(statistics, Vec<Statistic>);

    with_field_fn!(accounting, AccountingMode);

    with_field_fn!(control, ControlFilter);

    with_field_fn!(min_required_depth, CountType);

    with_field_fn!(seed, Option<u64>);

    with_field_fn!(output_format, OutputFormat);

    with_field_fn!(summarize, bool);

    with_field_fn!(write_attempts, usize);

    with_field_fn!(columns, ClonalColumns);

    with_field_fn!(sample_sheet, Option<PathBuf>);

    /// Configuration with the two comparison arms set.
    pub fn with_arm_pair(
        self,
        first: ArmConfig,
        second: ArmConfig,
    ) -> Self {
        self.with_arms(vec![first, second])
    }

    /// Checks the configuration once before a run.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.arms.len() != 2 {
            return Err(BootstrapError::config(format!(
                "exactly two arms are required, got {}",
                self.arms.len()
            )));
        }
        if self.arms[0].output == self.arms[1].output {
            return Err(BootstrapError::config(format!(
                "both arms write to the same output prefix {}",
                self.arms[0].output.display()
            )));
        }
        if let Some(arm) = self.arms.iter().find(|arm| arm.genotype.is_empty()) {
            return Err(BootstrapError::config(format!(
                "arm writing to {} has an empty genotype",
                arm.output.display()
            )));
        }

        if self.thresholds.is_empty() {
            return Err(BootstrapError::config("at least one threshold is required"));
        }
        for threshold in self.thresholds.iter() {
            if !threshold.is_finite() || *threshold <= 0.0 {
                return Err(BootstrapError::config(format!(
                    "thresholds must be positive, got {threshold}"
                )));
            }
            if self.threshold_mode == ThresholdMode::Absolute && threshold.fract() != 0.0 {
                return Err(BootstrapError::config(format!(
                    "absolute thresholds must be whole read counts, got {threshold}"
                )));
            }
        }
        let distinct = self
            .thresholds
            .iter()
            .map(|threshold| threshold.to_bits())
            .collect::<HashSet<_>>();
        if distinct.len() != self.thresholds.len() {
            return Err(BootstrapError::config(format!(
                "duplicate thresholds in [{}]",
                self.thresholds.iter().join(", ")
            )));
        }

        if self.iterations == 0 {
            return Err(BootstrapError::config("iterations must be at least 1"));
        }
        if self.rounds == 0 {
            return Err(BootstrapError::config("rounds must be at least 1"));
        }
        if self.write_attempts == 0 {
            return Err(BootstrapError::config("write attempts must be at least 1"));
        }

        if self.grouping.is_empty() {
            return Err(BootstrapError::config(
                "at least one grouping variable is required",
            ));
        }
        if self.grouping.iter().unique().count() != self.grouping.len() {
            return Err(BootstrapError::config("duplicate grouping variables"));
        }
        if self.statistics.is_empty() {
            return Err(BootstrapError::config("at least one statistic is required"));
        }
        if self.statistics.iter().unique().count() != self.statistics.len() {
            return Err(BootstrapError::config("duplicate statistics"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[fixture]
    fn config() -> BootstrapConfig {
        BootstrapConfig::default().with_arm_pair(
            ArmConfig::new("KT", "out/kt"),
            ArmConfig::new("KTC", "out/ktc"),
        )
    }

    #[rstest]
    fn default_with_arms_is_valid(config: BootstrapConfig) {
        assert!(config.validate().is_ok());
    }

    #[rstest]
    fn equal_genotypes_are_allowed(config: BootstrapConfig) {
        let config = config.with_arm_pair(
            ArmConfig::new("KT", "out/a"),
            ArmConfig::new("KT", "out/b"),
        );
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::no_thresholds(config().with_thresholds(vec![]))]
    #[case::negative_threshold(config().with_thresholds(vec![-5.0]))]
    #[case::duplicate_threshold(config().with_thresholds(vec![50.0, 50.0]))]
    #[case::fractional_absolute(
        config()
            .with_threshold_mode(ThresholdMode::Absolute)
            .with_thresholds(vec![100.5])
    )]
    #[case::zero_iterations(config().with_iterations(0))]
    #[case::zero_rounds(config().with_rounds(0))]
    #[case::no_grouping(config().with_grouping(vec![]))]
    #[case::no_statistics(config().with_statistics(vec![]))]
    #[case::one_arm(config().with_arms(vec![ArmConfig::new("KT", "out/kt")]))]
    #[case::shared_output(config().with_arm_pair(
        ArmConfig::new("KT", "out/kt"),
        ArmConfig::new("KTC", "out/kt"),
    ))]
    fn invalid_configs_are_rejected(#[case] config: BootstrapConfig) {
        assert!(matches!(config.validate(), Err(BootstrapError::Config(_))));
    }
}
