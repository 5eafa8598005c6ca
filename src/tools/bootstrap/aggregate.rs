//! Collection of unit results per grouping variable and their summaries.

use std::collections::BTreeMap;

use crossbeam::channel::Receiver;
use log::debug;
use serde::Serialize;

use crate::data_structs::typedef::{
    CountType,
    IterType,
    LabelStr,
};
use crate::data_structs::{
    sort_records,
    ResultRecord,
    Statistic,
};
use crate::utils::SummaryStats;

/// Receives record batches until every sender is dropped, then returns
/// them in output order.
pub fn collect_records(receiver: Receiver<Vec<ResultRecord>>) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    let mut batches = 0usize;
    for batch in receiver.iter() {
        records.extend(batch);
        batches += 1;
    }
    sort_records(&mut records);
    debug!("Collected {} records from {} batches", records.len(), batches);
    records
}

/// Distribution of one statistic of one group over the iterations of a
/// round.
///
/// Groups absent from a draw have no record for it, so `stats.n` counts
/// the iterations in which the group was present out of `iterations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub sample_id:         LabelStr,
    pub genotype:          LabelStr,
    pub threshold:         f64,
    pub depth:             CountType,
    pub round:             IterType,
    pub iterations:        IterType,
    pub grouping_variable: LabelStr,
    pub group_value:       LabelStr,
    pub statistic:         Statistic,
    pub stats:             SummaryStats,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct SummaryKey {
    sample_id:   LabelStr,
    threshold:   u64,
    round:       IterType,
    group_value: LabelStr,
    statistic:   Statistic,
}

/// Summarizes records of one grouping variable.
pub fn summarize_records(
    records: &[ResultRecord],
    iterations: IterType,
) -> Vec<SummaryRecord> {
    let mut groups: BTreeMap<SummaryKey, (&ResultRecord, Vec<f64>)> = BTreeMap::new();
    for record in records {
        let key = SummaryKey {
            sample_id:   record.sample_id.clone(),
            threshold:   record.threshold.to_bits(),
            round:       record.round,
            group_value: record.group_value.clone(),
            statistic:   record.statistic,
        };
        groups
            .entry(key)
            .or_insert_with(|| (record, Vec::new()))
            .1
            .push(record.value);
    }

    let mut summary = groups
        .into_values()
        .filter_map(|(first, values)| {
            SummaryStats::from_values(&values).map(|stats| {
                SummaryRecord {
                    sample_id: first.sample_id.clone(),
                    genotype: first.genotype.clone(),
                    threshold: first.threshold,
                    depth: first.depth,
                    round: first.round,
                    iterations,
                    grouping_variable: first.grouping_variable.clone(),
                    group_value: first.group_value.clone(),
                    statistic: first.statistic,
                    stats,
                }
            })
        })
        .collect::<Vec<_>>();
    summary.sort_by(|a, b| {
        a.sample_id
            .cmp(&b.sample_id)
            .then_with(|| a.threshold.total_cmp(&b.threshold))
            .then_with(|| a.round.cmp(&b.round))
            .then_with(|| a.group_value.cmp(&b.group_value))
            .then_with(|| a.statistic.cmp(&b.statistic))
    });
    summary
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn record(
        threshold: f64,
        iteration: IterType,
        group: &str,
        value: f64,
    ) -> ResultRecord {
        ResultRecord {
            sample_id: "M1".into(),
            genotype: "KT".into(),
            threshold,
            depth: 100,
            round: 0,
            iteration,
            grouping_variable: "Clonal_barcode".into(),
            group_value: group.into(),
            statistic: Statistic::Reads,
            value,
        }
    }

    #[test]
    fn collects_and_sorts_batches() {
        let (sender, receiver) = crossbeam::channel::unbounded();
        sender.send(vec![record(90.0, 1, "B", 1.0)]).unwrap();
        sender
            .send(vec![record(50.0, 0, "B", 1.0), record(50.0, 0, "A", 1.0)])
            .unwrap();
        drop(sender);

        let records = collect_records(receiver);
        let order = records
            .iter()
            .map(|r| (r.threshold, r.group_value.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(50.0, "A"), (50.0, "B"), (90.0, "B")]);
    }

    #[test]
    fn summarizes_per_group_and_threshold() {
        let records = vec![
            record(50.0, 0, "A", 10.0),
            record(50.0, 1, "A", 20.0),
            record(50.0, 0, "B", 5.0),
            record(90.0, 0, "A", 30.0),
        ];
        let summary = summarize_records(&records, 2);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].group_value.as_str(), "A");
        assert_eq!(summary[0].stats.n, 2);
        assert_approx_eq!(summary[0].stats.mean, 15.0);
        assert_eq!(summary[1].stats.n, 1);
        assert_approx_eq!(summary[2].threshold, 90.0);
    }
}
