use std::cmp::Ordering;
use std::fmt::Display;

use serde::Serialize;

use super::enums::Statistic;
use super::typedef::{
    CountType,
    IterType,
    LabelStr,
    StatType,
};

/// One statistic of one group in one bootstrap iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub sample_id:         LabelStr,
    pub genotype:          LabelStr,
    /// Configured threshold value (percentile or absolute).
    pub threshold:         f64,
    /// Realized draw size.
    pub depth:             CountType,
    pub round:             IterType,
    pub iteration:         IterType,
    pub grouping_variable: LabelStr,
    pub group_value:       LabelStr,
    pub statistic:         Statistic,
    pub value:             StatType,
}

impl ResultRecord {
    /// Deterministic output order: sample, threshold, round, iteration,
    /// group, statistic.
    pub fn output_cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.sample_id
            .cmp(&other.sample_id)
            .then_with(|| self.threshold.total_cmp(&other.threshold))
            .then_with(|| self.round.cmp(&other.round))
            .then_with(|| self.iteration.cmp(&other.iteration))
            .then_with(|| self.group_value.cmp(&other.group_value))
            .then_with(|| self.statistic.cmp(&other.statistic))
    }
}

/// Sorts records into the order they are persisted in.
pub fn sort_records(records: &mut [ResultRecord]) {
    records.sort_unstable_by(ResultRecord::output_cmp);
}

/// Recoverable conditions collected during a run and persisted next to the
/// results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BootstrapWarning {
    /// The sample cannot be subsampled to this threshold.
    InsufficientDepth {
        sample_id: LabelStr,
        threshold: f64,
        /// Target depth; zero when the threshold resolves to no reads.
        required:  CountType,
        available: CountType,
    },
    /// The sample is below the configured minimum depth.
    SampleExcluded {
        sample_id:    LabelStr,
        total_depth:  CountType,
        min_required: CountType,
    },
}

impl BootstrapWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            BootstrapWarning::InsufficientDepth { .. } => "insufficient_depth",
            BootstrapWarning::SampleExcluded { .. } => "sample_excluded",
        }
    }

    pub fn sample_id(&self) -> &LabelStr {
        match self {
            BootstrapWarning::InsufficientDepth { sample_id, .. } => sample_id,
            BootstrapWarning::SampleExcluded { sample_id, .. } => sample_id,
        }
    }

    pub fn threshold(&self) -> Option<f64> {
        match self {
            BootstrapWarning::InsufficientDepth { threshold, .. } => Some(*threshold),
            BootstrapWarning::SampleExcluded { .. } => None,
        }
    }
}

impl Display for BootstrapWarning {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            BootstrapWarning::InsufficientDepth {
                sample_id,
                threshold,
                required,
                available,
            } => write!(
                f,
                "sample {sample_id} cannot reach threshold {threshold} \
                 ({required} reads required, {available} available)"
            ),
            BootstrapWarning::SampleExcluded {
                sample_id,
                total_depth,
                min_required,
            } => write!(
                f,
                "sample {sample_id} excluded: depth {total_depth} is below the \
                 minimum of {min_required}"
            ),
        }
    }
}
