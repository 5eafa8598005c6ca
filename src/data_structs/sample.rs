use super::observation::ClonalObservation;
use super::typedef::{
    CountType,
    LabelStr,
};
use crate::getter_fn;

/// All clones of one sample within one genotype arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    id:           LabelStr,
    genotype:     LabelStr,
    observations: Vec<ClonalObservation>,
    total_depth:  CountType,
}

impl Sample {
    getter_fn!(id, LabelStr);

    getter_fn!(genotype, LabelStr);

    getter_fn!(observations, Vec<ClonalObservation>);

    pub fn new(
        id: LabelStr,
        genotype: LabelStr,
        observations: Vec<ClonalObservation>,
    ) -> Self {
        let total_depth = observations
            .iter()
            .map(ClonalObservation::read_count)
            .sum();
        Self {
            id,
            genotype,
            observations,
            total_depth,
        }
    }

    pub fn total_depth(&self) -> CountType {
        self.total_depth
    }

    /// Read counts in observation order.
    pub fn counts(&self) -> Vec<CountType> {
        self.observations
            .iter()
            .map(ClonalObservation::read_count)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
