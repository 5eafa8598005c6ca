use std::fmt::Display;

use super::typedef::{
    CountType,
    LabelStr,
};
use crate::getter_fn;

/// The value of one grouping variable for one clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// A plain categorical value (barcode, arbitrary column).
    Single(LabelStr),
    /// A guide or gene pair. `label` is `first_second`; unordered variables
    /// store the constituents already sorted.
    Pair {
        label:  LabelStr,
        first:  LabelStr,
        second: LabelStr,
    },
}

impl GroupKey {
    pub fn label(&self) -> &LabelStr {
        match self {
            GroupKey::Single(label) => label,
            GroupKey::Pair { label, .. } => label,
        }
    }

    /// Distinct constituents of the key. A pair of identical guides yields a
    /// single constituent.
    pub fn constituents(&self) -> Vec<&LabelStr> {
        match self {
            GroupKey::Single(label) => vec![label],
            GroupKey::Pair { first, second, .. } if first == second => vec![first],
            GroupKey::Pair { first, second, .. } => vec![first, second],
        }
    }
}

impl Display for GroupKey {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the aggregated clonal table: a clone observed in a sample.
///
/// `keys` is aligned with the grouping variables the table was loaded for.
#[derive(Debug, Clone, PartialEq)]
pub struct ClonalObservation {
    sample_id:  LabelStr,
    genotype:   LabelStr,
    read_count: CountType,
    keys:       Vec<GroupKey>,
    is_control: bool,
}

impl ClonalObservation {
    getter_fn!(sample_id, LabelStr);

    getter_fn!(genotype, LabelStr);

    getter_fn!(keys, Vec<GroupKey>);

    pub fn new(
        sample_id: LabelStr,
        genotype: LabelStr,
        read_count: CountType,
        keys: Vec<GroupKey>,
    ) -> Self {
        Self {
            sample_id,
            genotype,
            read_count,
            keys,
            is_control: false,
        }
    }

    pub fn with_control(
        mut self,
        is_control: bool,
    ) -> Self {
        self.is_control = is_control;
        self
    }

    pub fn read_count(&self) -> CountType {
        self.read_count
    }

    pub fn is_control(&self) -> bool {
        self.is_control
    }

    pub fn key(
        &self,
        variable_idx: usize,
    ) -> Option<&GroupKey> {
        self.keys.get(variable_idx)
    }
}
