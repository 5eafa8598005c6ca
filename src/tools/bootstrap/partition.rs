//! Splits the observations of one arm into per-sample multisets.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{
    debug,
    warn,
};

use super::config::BootstrapConfig;
use super::resample::resolve_depth;
use crate::data_structs::typedef::LabelStr;
use crate::data_structs::{
    BootstrapWarning,
    ClonalObservation,
    Sample,
};

/// Samples eligible for resampling plus the warnings for the ones that are
/// not.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub samples:  Vec<Sample>,
    pub warnings: Vec<BootstrapWarning>,
}

/// Groups observations by sample id, in sorted sample order.
///
/// Control observations are dropped when the configuration excludes them.
/// Samples below `min_required_depth` and samples that cannot reach any
/// threshold are excluded; each exclusion is recorded as a warning.
pub fn partition_samples(
    observations: Vec<ClonalObservation>,
    config: &BootstrapConfig,
) -> Partition {
    let include_controls = config.control.include;
    let mut by_sample: BTreeMap<LabelStr, Vec<ClonalObservation>> = BTreeMap::new();
    let mut dropped_controls = 0usize;
    for obs in observations {
        if obs.is_control() && !include_controls {
            dropped_controls += 1;
            continue;
        }
        by_sample.entry(obs.sample_id().clone()).or_default().push(obs);
    }
    if dropped_controls > 0 {
        debug!("Dropped {dropped_controls} control observations");
    }

    let mut partition = Partition::default();
    for (sample_id, observations) in by_sample {
        let genotype = observations[0].genotype().clone();
        let sample = Sample::new(sample_id, genotype, observations);

        if sample.total_depth() < config.min_required_depth {
            let warning = BootstrapWarning::SampleExcluded {
                sample_id:    sample.id().clone(),
                total_depth:  sample.total_depth(),
                min_required: config.min_required_depth,
            };
            warn!("{warning}");
            partition.warnings.push(warning);
            continue;
        }

        let unsatisfied = config
            .thresholds
            .iter()
            .filter(|threshold| {
                resolve_depth(config.threshold_mode, **threshold, sample.total_depth())
                    .is_none()
            })
            .collect_vec();
        if unsatisfied.len() == config.thresholds.len() {
            for threshold in unsatisfied {
                let warning = BootstrapWarning::InsufficientDepth {
                    sample_id: sample.id().clone(),
                    threshold: *threshold,
                    required:  super::resample::target_depth(
                        config.threshold_mode,
                        *threshold,
                        sample.total_depth(),
                    ),
                    available: sample.total_depth(),
                };
                warn!("{warning}");
                partition.warnings.push(warning);
            }
            continue;
        }

        debug!(
            "Sample {} has {} clones and {} reads",
            sample.id(),
            sample.len(),
            sample.total_depth()
        );
        partition.samples.push(sample);
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::{
        GroupKey,
        ThresholdMode,
    };

    fn obs(
        sample: &str,
        barcode: &str,
        count: u64,
        control: bool,
    ) -> ClonalObservation {
        ClonalObservation::new(
            sample.into(),
            "KT".into(),
            count,
            vec![GroupKey::Single(barcode.into())],
        )
        .with_control(control)
    }

    #[test]
    fn groups_samples_in_sorted_order() {
        let config = BootstrapConfig::default().with_thresholds(vec![50.0]);
        let partition = partition_samples(
            vec![
                obs("M2", "A", 10, false),
                obs("M1", "B", 5, false),
                obs("M2", "C", 4, false),
            ],
            &config,
        );
        assert!(partition.warnings.is_empty());
        let ids = partition.samples.iter().map(|s| s.id().as_str()).collect_vec();
        assert_eq!(ids, vec!["M1", "M2"]);
        assert_eq!(partition.samples[1].total_depth(), 14);
    }

    #[test]
    fn excludes_shallow_samples_with_warnings() {
        let config = BootstrapConfig::default()
            .with_threshold_mode(ThresholdMode::Absolute)
            .with_thresholds(vec![100.0, 200.0])
            .with_min_required_depth(20);
        let partition = partition_samples(
            vec![
                obs("M1", "A", 10, false),
                obs("M2", "A", 50, false),
                obs("M3", "A", 150, false),
            ],
            &config,
        );
        assert_eq!(partition.samples.len(), 1);
        assert_eq!(partition.samples[0].id().as_str(), "M3");

        let kinds = partition
            .warnings
            .iter()
            .map(|w| (w.kind(), w.sample_id().as_str(), w.threshold()))
            .collect_vec();
        assert_eq!(kinds, vec![
            ("sample_excluded", "M1", None),
            ("insufficient_depth", "M2", Some(100.0)),
            ("insufficient_depth", "M2", Some(200.0)),
        ]);
    }

    #[test]
    fn drops_controls_when_excluded() {
        let mut config = BootstrapConfig::default().with_thresholds(vec![50.0]);
        config.control.include = false;
        let partition = partition_samples(
            vec![obs("M1", "A", 10, false), obs("M1", "Safe", 30, true)],
            &config,
        );
        assert_eq!(partition.samples[0].total_depth(), 10);
        assert_eq!(partition.samples[0].len(), 1);
    }
}
