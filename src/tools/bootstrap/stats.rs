//! Per-group statistics of a bootstrap draw.
//!
//! Group membership of every clone is resolved once per sample
//! ([`SampleGroups`]); each draw is then tallied against it for every
//! grouping variable, so all variables of one iteration see the same draw.

use hashbrown::HashMap;
use itertools::Itertools;

use super::resample::{
    BootstrapDraw,
    ResampleUnit,
};
use crate::data_structs::typedef::{
    CountType,
    LabelStr,
    StatType,
};
use crate::data_structs::{
    AccountingMode,
    GroupKey,
    ResultRecord,
    Sample,
    Statistic,
};
use crate::error::BootstrapError;

/// Aggregated draw counts of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupTally {
    pub clones:    CountType,
    pub reads:     CountType,
    pub max_clone: CountType,
}

impl GroupTally {
    fn add(
        &mut self,
        reads: CountType,
    ) {
        self.clones += 1;
        self.reads += reads;
        self.max_clone = self.max_clone.max(reads);
    }

    /// Value of `statistic` for this group in a draw of `depth` reads with
    /// `clones_in_draw` clones present.
    pub fn value(
        &self,
        statistic: Statistic,
        depth: CountType,
        clones_in_draw: usize,
    ) -> StatType {
        match statistic {
            Statistic::CloneCount => self.clones as StatType,
            Statistic::Reads => self.reads as StatType,
            Statistic::ReadFraction => self.reads as StatType / depth as StatType,
            Statistic::CloneFraction => self.clones as StatType / clones_in_draw as StatType,
            Statistic::MeanCloneSize => self.reads as StatType / self.clones as StatType,
            Statistic::MaxCloneSize => self.max_clone as StatType,
        }
    }
}

/// Group membership of one sample's clones for one grouping variable.
///
/// Labels are sorted; `members[i]` lists the groups clone `i` counts
/// towards (exactly one in multiplex accounting).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupIndex {
    labels:  Vec<LabelStr>,
    members: Vec<Vec<usize>>,
}

impl GroupIndex {
    pub fn new(
        keys: &[&GroupKey],
        accounting: AccountingMode,
    ) -> Self {
        let clone_labels = keys
            .iter()
            .map(|key| {
                match (accounting, key) {
                    (AccountingMode::SingleGuide, GroupKey::Pair { .. }) => {
                        key.constituents().into_iter().cloned().collect_vec()
                    },
                    _ => vec![key.label().clone()],
                }
            })
            .collect_vec();

        let labels = clone_labels
            .iter()
            .flatten()
            .cloned()
            .unique()
            .sorted()
            .collect_vec();
        let members = {
            let positions: HashMap<&LabelStr, usize> = labels
                .iter()
                .enumerate()
                .map(|(idx, label)| (label, idx))
                .collect();
            clone_labels
                .iter()
                .map(|labels| labels.iter().map(|label| positions[label]).collect_vec())
                .collect_vec()
        };

        Self { labels, members }
    }

    pub fn labels(&self) -> &[LabelStr] {
        &self.labels
    }

    /// Tallies of the groups present in `draw` (at least one read), in label
    /// order.
    pub fn tally(
        &self,
        draw: &BootstrapDraw,
    ) -> Vec<(&LabelStr, GroupTally)> {
        let mut tallies = vec![GroupTally::default(); self.labels.len()];
        for (groups, &reads) in self.members.iter().zip(draw.counts()) {
            if reads == 0 {
                continue;
            }
            for &group in groups {
                tallies[group].add(reads);
            }
        }
        self.labels
            .iter()
            .zip(tallies)
            .filter(|(_, tally)| tally.reads > 0)
            .collect()
    }
}

/// A sample together with its group membership for every grouping
/// variable.
#[derive(Debug, Clone)]
pub struct SampleGroups {
    sample:    Sample,
    counts:    Vec<CountType>,
    variables: Vec<GroupIndex>,
}

impl SampleGroups {
    /// Fails with [`BootstrapError::Config`] when an observation does not
    /// carry exactly one key per grouping variable.
    pub fn new(
        sample: Sample,
        n_variables: usize,
        accounting: AccountingMode,
    ) -> Result<Self, BootstrapError> {
        if let Some(obs) = sample
            .observations()
            .iter()
            .find(|obs| obs.keys().len() != n_variables)
        {
            return Err(BootstrapError::config(format!(
                "sample {} has an observation with {} group keys, expected one per grouping \
                 variable ({n_variables})",
                sample.id(),
                obs.keys().len()
            )));
        }

        let variables = (0..n_variables)
            .map(|variable_idx| {
                let keys = sample
                    .observations()
                    .iter()
                    .filter_map(|obs| obs.key(variable_idx))
                    .collect_vec();
                GroupIndex::new(&keys, accounting)
            })
            .collect();
        Ok(Self {
            counts: sample.counts(),
            sample,
            variables,
        })
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// Read counts of the sample's clones, in observation order.
    pub fn counts(&self) -> &[CountType] {
        &self.counts
    }

    pub fn variable(
        &self,
        variable_idx: usize,
    ) -> &GroupIndex {
        &self.variables[variable_idx]
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }
}

/// Records of one grouping variable for one resampling unit.
pub fn group_records(
    unit: &ResampleUnit,
    sample: &Sample,
    index: &GroupIndex,
    variable_name: &LabelStr,
    draw: &BootstrapDraw,
    statistics: &[Statistic],
) -> Vec<ResultRecord> {
    let clones_in_draw = draw.clones_present();
    let mut records = Vec::new();
    for (label, tally) in index.tally(draw) {
        for &statistic in statistics {
            records.push(ResultRecord {
                sample_id: sample.id().clone(),
                genotype: sample.genotype().clone(),
                threshold: unit.threshold,
                depth: draw.depth(),
                round: unit.round,
                iteration: unit.iteration,
                grouping_variable: variable_name.clone(),
                group_value: label.clone(),
                statistic,
                value: tally.value(statistic, draw.depth(), clones_in_draw),
            });
        }
    }
    records
}
