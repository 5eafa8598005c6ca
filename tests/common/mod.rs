#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{
    Path,
    PathBuf,
};

use clonalboot::data_structs::{
    GroupingVariable,
    Statistic,
};
use clonalboot::tools::bootstrap::{
    ArmConfig,
    BootstrapConfig,
};
use tempfile::TempDir;

/// One clone of a generated clonal table.
#[derive(Debug, Clone)]
pub struct Row {
    pub sample:   &'static str,
    pub genotype: &'static str,
    pub barcode:  String,
    pub guide1:   &'static str,
    pub guide2:   &'static str,
    pub gene1:    &'static str,
    pub gene2:    &'static str,
    pub count:    u64,
}

impl Row {
    pub fn barcode(
        sample: &'static str,
        genotype: &'static str,
        barcode: &str,
        count: u64,
    ) -> Self {
        Self {
            sample,
            genotype,
            barcode: barcode.to_string(),
            guide1: "sgKeap1",
            guide2: "sgSafe1",
            gene1: "Keap1",
            gene2: "Safe",
            count,
        }
    }

    pub fn guides(
        mut self,
        guide1: &'static str,
        guide2: &'static str,
        gene1: &'static str,
        gene2: &'static str,
    ) -> Self {
        self.guide1 = guide1;
        self.guide2 = guide2;
        self.gene1 = gene1;
        self.gene2 = gene2;
        self
    }
}

/// Writes rows in the aggregated table layout and keeps the directory alive.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(
        &self,
        name: &str,
    ) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_table(
        &self,
        name: &str,
        rows: &[Row],
    ) -> PathBuf {
        let mut content = String::from(
            "Sample_ID\tGenotype\tgRNA1\tgRNA2\tgRNA_combination\tGene1\tGene2\t\
             Gene_combination\tClonal_barcode\tFrequency\n",
        );
        for row in rows {
            writeln!(
                content,
                "{}\t{}\t{}\t{}\t{}_{}\t{}\t{}\t{}_{}\t{}\t{}",
                row.sample,
                row.genotype,
                row.guide1,
                row.guide2,
                row.guide1,
                row.guide2,
                row.gene1,
                row.gene2,
                row.gene1,
                row.gene2,
                row.barcode,
                row.count
            )
            .unwrap();
        }
        let path = self.path(name);
        std::fs::write(&path, content).expect("failed to write table");
        path
    }
}

/// Sample A: 1000 reads over 500/300/200, sample B: 200 reads over 150/50.
pub fn two_sample_rows() -> Vec<Row> {
    vec![
        Row::barcode("A", "KT", "AAAA", 500),
        Row::barcode("A", "KT", "CCCC", 300),
        Row::barcode("A", "KT", "GGGG", 200),
        Row::barcode("B", "KT", "TTTT", 150),
        Row::barcode("B", "KT", "ACGT", 50),
    ]
}

pub fn barcode_config(
    out_a: &Path,
    out_b: &Path,
) -> BootstrapConfig {
    BootstrapConfig::default()
        .with_arm_pair(ArmConfig::new("KT", out_a), ArmConfig::new("KT", out_b))
        .with_thresholds(vec![50.0, 90.0])
        .with_iterations(100)
        .with_grouping(vec![GroupingVariable::ClonalBarcode])
        .with_statistics(vec![Statistic::Reads])
        .with_seed(Some(2024))
}
