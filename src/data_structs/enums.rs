use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

/// How configured depth thresholds are turned into a target read depth.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Threshold is a percentage of each sample's own total depth.
    #[default]
    Percentile,
    /// Threshold is a read count shared by all samples.
    Absolute,
}

impl Display for ThresholdMode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ThresholdMode::Percentile => write!(f, "percentile"),
            ThresholdMode::Absolute => write!(f, "absolute"),
        }
    }
}

/// How pair-structured grouping keys are bucketed.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum AccountingMode {
    /// A clone belongs to the group of its whole guide (or gene) pair.
    #[default]
    Multiplex,
    /// A clone is credited to each distinct guide (or gene) of its pair.
    SingleGuide,
}

impl Display for AccountingMode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            AccountingMode::Multiplex => write!(f, "multiplex"),
            AccountingMode::SingleGuide => write!(f, "single_guide"),
        }
    }
}

/// Per-group statistic computed on every bootstrap draw.
#[derive(
    Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Number of distinct clones with at least one drawn read.
    CloneCount,
    /// Total drawn reads.
    Reads,
    /// Drawn reads divided by the draw depth.
    ReadFraction,
    /// Clones of the group divided by all clones present in the draw.
    CloneFraction,
    /// Mean drawn reads per present clone.
    MeanCloneSize,
    /// Largest drawn clone.
    MaxCloneSize,
}

impl Statistic {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Statistic::CloneCount => "clone_count",
            Statistic::Reads => "reads",
            Statistic::ReadFraction => "read_fraction",
            Statistic::CloneFraction => "clone_fraction",
            Statistic::MeanCloneSize => "mean_clone_size",
            Statistic::MaxCloneSize => "max_clone_size",
        }
    }

    pub fn all() -> Vec<Statistic> {
        vec![
            Statistic::CloneCount,
            Statistic::Reads,
            Statistic::ReadFraction,
            Statistic::CloneFraction,
            Statistic::MeanCloneSize,
            Statistic::MaxCloneSize,
        ]
    }
}

impl Display for Statistic {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File format of the per-grouping-variable result tables.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Tab separated text with a header.
    #[default]
    Tsv,
    /// Arrow IPC file.
    Ipc,
}

impl OutputFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tsv => "tsv",
            OutputFormat::Ipc => "ipc",
        }
    }
}

/// A categorical dimension used to bucket the reads of a draw.
///
/// The preset variables follow the column layout of the aggregated clonal
/// table; anything else names an input column directly.
#[derive(Eq, Hash, PartialEq, Clone, Debug, PartialOrd, Ord)]
pub enum GroupingVariable {
    /// Clonal barcode identity.
    ClonalBarcode,
    /// Ordered guide pair (`gRNA1_gRNA2`).
    GuidePair,
    /// Guide pair with the two guides sorted.
    GuidePairUnordered,
    /// Ordered gene pair (`Gene1_Gene2`).
    GenePair,
    /// Gene pair with the two genes sorted.
    GenePairUnordered,
    /// Any other categorical column of the input table.
    Column(String),
}

impl GroupingVariable {
    pub fn name(&self) -> &str {
        match self {
            GroupingVariable::ClonalBarcode => "Clonal_barcode",
            GroupingVariable::GuidePair => "gRNA_combination",
            GroupingVariable::GuidePairUnordered => "gRNA_combination_unordered",
            GroupingVariable::GenePair => "Gene_combination",
            GroupingVariable::GenePairUnordered => "Gene_combination_unordered",
            GroupingVariable::Column(name) => name.as_str(),
        }
    }

    pub const fn is_unordered(&self) -> bool {
        matches!(
            self,
            GroupingVariable::GuidePairUnordered | GroupingVariable::GenePairUnordered
        )
    }

    /// The four pair variables every dual-guide analysis reports.
    pub fn defaults() -> Vec<GroupingVariable> {
        vec![
            GroupingVariable::GuidePair,
            GroupingVariable::GuidePairUnordered,
            GroupingVariable::GenePair,
            GroupingVariable::GenePairUnordered,
        ]
    }
}

impl Display for GroupingVariable {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupingVariable {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        let variable = match normalized.as_str() {
            "clonal_barcode" | "barcode" => GroupingVariable::ClonalBarcode,
            "grna_combination" | "guide_pair" => GroupingVariable::GuidePair,
            "grna_combination_unordered" | "guide_pair_unordered" => {
                GroupingVariable::GuidePairUnordered
            },
            "gene_combination" | "gene_pair" => GroupingVariable::GenePair,
            "gene_combination_unordered" | "gene_pair_unordered" => {
                GroupingVariable::GenePairUnordered
            },
            _ => GroupingVariable::Column(s.to_string()),
        };
        Ok(variable)
    }
}

impl Serialize for GroupingVariable {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer, {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for GroupingVariable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>, {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_variable_aliases() {
        assert_eq!(
            "guide-pair".parse::<GroupingVariable>().unwrap(),
            GroupingVariable::GuidePair
        );
        assert_eq!(
            "Gene_combination_unordered"
                .parse::<GroupingVariable>()
                .unwrap(),
            GroupingVariable::GenePairUnordered
        );
        assert_eq!(
            "Mouse_cohort".parse::<GroupingVariable>().unwrap(),
            GroupingVariable::Column("Mouse_cohort".to_string())
        );
    }

    #[test]
    fn grouping_variable_names_roundtrip() {
        for variable in GroupingVariable::defaults() {
            let parsed: GroupingVariable = variable.name().parse().unwrap();
            assert_eq!(parsed, variable);
        }
    }
}
