use std::path::Path;

use polars::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::GroupingVariable;

/// Column names of the aggregated clonal table.
///
/// Defaults follow the layout written by the dual-guide aggregation step
/// (`Sample_ID`, `gRNA1`, `gRNA2`, `gRNA_combination`, `Clonal_barcode`,
/// `Frequency`) plus the genotype and gene annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClonalColumns {
    pub sample:           String,
    pub genotype:         String,
    pub read_count:       String,
    pub barcode:          String,
    pub guide1:           String,
    pub guide2:           String,
    pub guide_pair:       String,
    pub gene1:            String,
    pub gene2:            String,
    pub gene_pair:        String,
}

impl Default for ClonalColumns {
    fn default() -> Self {
        Self {
            sample:     "Sample_ID".into(),
            genotype:   "Genotype".into(),
            read_count: "Frequency".into(),
            barcode:    "Clonal_barcode".into(),
            guide1:     "gRNA1".into(),
            guide2:     "gRNA2".into(),
            guide_pair: "gRNA_combination".into(),
            gene1:      "Gene1".into(),
            gene2:      "Gene2".into(),
            gene_pair:  "Gene_combination".into(),
        }
    }
}

/// Where the two constituents of a pair-structured variable come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairColumns<'a> {
    /// Two component columns, e.g. `gRNA1` and `gRNA2`.
    Components(&'a str, &'a str),
    /// A single `first_second` column that has to be split.
    Combined(&'a str),
}

/// Kind of pair a pair-structured grouping variable is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    Guide,
    Gene,
}

impl ClonalColumns {
    pub fn pair_names(
        &self,
        kind: PairKind,
    ) -> (&str, &str, &str) {
        match kind {
            PairKind::Guide => (&self.guide1, &self.guide2, &self.guide_pair),
            PairKind::Gene => (&self.gene1, &self.gene2, &self.gene_pair),
        }
    }

    /// Resolves the columns of a pair against a table schema. Component
    /// columns take precedence over the combined column.
    pub fn resolve_pair(
        &self,
        kind: PairKind,
        schema: &Schema,
    ) -> Option<PairColumns<'_>> {
        let (first, second, combined) = self.pair_names(kind);
        if schema.contains(first) && schema.contains(second) {
            Some(PairColumns::Components(first, second))
        }
        else if schema.contains(combined) {
            Some(PairColumns::Combined(combined))
        }
        else {
            None
        }
    }

    /// Human readable description of what a grouping variable needs.
    pub fn requirement(
        &self,
        variable: &GroupingVariable,
    ) -> String {
        match pair_kind(variable) {
            Some(kind) => {
                let (first, second, combined) = self.pair_names(kind);
                format!("{first}+{second} or {combined}")
            },
            None => self.single_column(variable).to_string(),
        }
    }

    /// Column holding the value of a non-pair grouping variable.
    pub fn single_column<'a>(
        &'a self,
        variable: &'a GroupingVariable,
    ) -> &'a str {
        match variable {
            GroupingVariable::ClonalBarcode => &self.barcode,
            other => other.name(),
        }
    }
}

pub fn pair_kind(variable: &GroupingVariable) -> Option<PairKind> {
    match variable {
        GroupingVariable::GuidePair | GroupingVariable::GuidePairUnordered => {
            Some(PairKind::Guide)
        },
        GroupingVariable::GenePair | GroupingVariable::GenePairUnordered => {
            Some(PairKind::Gene)
        },
        GroupingVariable::ClonalBarcode | GroupingVariable::Column(_) => None,
    }
}

/// Splits a combined `first_second` value into its two constituents.
pub fn split_pair(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => {
            Some((first, second))
        },
        _ => None,
    }
}

/// Tabular formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv(u8),
    Ipc,
}

impl InputFormat {
    /// Picks the format from the file extension (ignoring a trailing `.gz`
    /// or `.zst`). Unknown extensions are read as delimited text with the
    /// delimiter sniffed from the header line.
    pub fn from_path(
        path: &Path,
        header_line: Option<&str>,
    ) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".zst"))
            .unwrap_or(&name);
        let extension = name.rsplit('.').next().unwrap_or_default();

        match extension {
            "ipc" | "arrow" | "feather" => InputFormat::Ipc,
            "tsv" | "tab" => InputFormat::Csv(b'\t'),
            "csv" => InputFormat::Csv(b','),
            _ => {
                match header_line {
                    Some(line) if line.contains('\t') => InputFormat::Csv(b'\t'),
                    _ => InputFormat::Csv(b','),
                }
            },
        }
    }

    /// CSV options reading every column as a string; numeric columns are
    /// cast explicitly during validation.
    pub fn read_options(&self) -> Option<CsvReadOptions> {
        match self {
            InputFormat::Csv(separator) => {
                Some(
                    CsvReadOptions::default()
                        .with_has_header(true)
                        .with_infer_schema_length(Some(0))
                        .with_parse_options(
                            CsvParseOptions::default()
                                .with_separator(*separator)
                                .with_try_parse_dates(false),
                        ),
                )
            },
            InputFormat::Ipc => None,
        }
    }
}
