mod common;

use std::fs::File;

use clonalboot::data_structs::{
    GroupingVariable,
    Statistic,
};
use clonalboot::error::BootstrapError;
use clonalboot::io::{
    read_frame,
    ClonalTable,
};
use clonalboot::tools::bootstrap::{
    bootstrap_samples,
    BootstrapRunner,
    ControlFilter,
};
use common::*;
use polars::prelude::{
    DataType,
    IpcWriter,
    SerWriter,
};

#[test]
fn reads_tsv_and_ipc_tables_alike() {
    let workspace = Workspace::new();
    let tsv = workspace.write_table("combined.tsv", &two_sample_rows());
    let config = barcode_config(&workspace.path("a"), &workspace.path("b"))
        .with_grouping(GroupingVariable::defaults());

    let mut df = read_frame(&tsv).unwrap();
    let ipc = workspace.path("combined.arrow");
    IpcWriter::new(File::create(&ipc).unwrap())
        .finish(&mut df)
        .unwrap();

    let from_tsv = ClonalTable::read(&tsv, &config).unwrap();
    let from_ipc = ClonalTable::read(&ipc, &config).unwrap();
    assert_eq!(from_tsv.observations(), from_ipc.observations());
    assert_eq!(from_tsv.len(), 5);
}

#[test]
fn combined_columns_are_split() {
    let workspace = Workspace::new();
    let path = workspace.path("combined.csv");
    std::fs::write(
        &path,
        "Sample_ID,Genotype,gRNA_combination,Clonal_barcode,Frequency\n\
         M1,KT,sgLkb1_sgKeap1,AAAA,12\n\
         M1,KT,sgKeap1_sgLkb1,CCCC,8\n",
    )
    .unwrap();
    let config = barcode_config(&workspace.path("a"), &workspace.path("b")).with_grouping(vec![
        GroupingVariable::GuidePair,
        GroupingVariable::GuidePairUnordered,
    ]);

    let table = ClonalTable::read(&path, &config).unwrap();
    let labels = table
        .observations()
        .iter()
        .map(|obs| {
            (
                obs.keys()[0].label().to_string(),
                obs.keys()[1].label().to_string(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(labels, vec![
        ("sgLkb1_sgKeap1".to_string(), "sgKeap1_sgLkb1".to_string()),
        ("sgKeap1_sgLkb1".to_string(), "sgKeap1_sgLkb1".to_string()),
    ]);
}

#[test]
fn unsplittable_pairs_are_schema_errors() {
    let workspace = Workspace::new();
    let path = workspace.path("combined.csv");
    std::fs::write(
        &path,
        "Sample_ID,Genotype,gRNA_combination,Frequency\nM1,KT,sgLkb1,12\n",
    )
    .unwrap();
    let config = barcode_config(&workspace.path("a"), &workspace.path("b"))
        .with_grouping(vec![GroupingVariable::GuidePair]);

    let err = ClonalTable::read(&path, &config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::Schema(_))
    ));
}

#[test]
fn sample_sheet_supplies_genotypes() {
    let workspace = Workspace::new();
    let path = workspace.path("combined.tsv");
    std::fs::write(
        &path,
        "Sample_ID\tClonal_barcode\tFrequency\nM1\tAAAA\t10\nM2\tCCCC\t20\nM3\tGGGG\t30\n",
    )
    .unwrap();
    let sheet = workspace.path("samples.tsv");
    std::fs::write(&sheet, "Sample_ID\tGenotype\nM1\tKT\nM2\tKTC\nM3\tKT\n").unwrap();

    let config = barcode_config(&workspace.path("a"), &workspace.path("b"))
        .with_sample_sheet(Some(sheet));
    let table = ClonalTable::read(&path, &config).unwrap();
    assert_eq!(
        table
            .genotypes()
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>(),
        vec!["KT", "KTC"]
    );
    assert_eq!(table.select_genotype("KT").unwrap().len(), 2);
    assert_eq!(table.depth_summary()[1].total_depth, 30);
}

#[test]
fn excluded_controls_are_not_resampled() {
    let rows = vec![
        Row::barcode("A", "KT", "AAAA", 60),
        Row::barcode("A", "KT", "CCCC", 40).guides("sgSafe1", "sgSafe2", "Safe", "Safe"),
    ];
    let workspace = Workspace::new();
    let input = workspace.write_table("combined.tsv", &rows);
    let config = barcode_config(&workspace.path("a"), &workspace.path("b"))
        .with_thresholds(vec![50.0])
        .with_iterations(10)
        .with_statistics(vec![Statistic::Reads, Statistic::ReadFraction]);

    let table = ClonalTable::read(&input, &config).unwrap();
    assert_eq!(table.depth_summary()[0].control_reads, 40);

    let excluded = config.clone().with_control(ControlFilter {
        label:   "safe".into(),
        include: false,
    });
    let output =
        bootstrap_samples(table.select_genotype("KT").unwrap(), &excluded, 1).unwrap();
    assert_eq!(output.samples[0].total_depth, 60);
    assert!(output.records[0]
        .iter()
        .all(|record| record.group_value.as_str() == "AAAA" && record.depth == 30));

    let included =
        bootstrap_samples(table.select_genotype("KT").unwrap(), &config, 1).unwrap();
    assert_eq!(included.samples[0].total_depth, 100);
}

#[test]
fn runner_writes_ipc_outputs() {
    let workspace = Workspace::new();
    let input = workspace.write_table("combined.tsv", &two_sample_rows());
    let config = barcode_config(&workspace.path("a"), &workspace.path("b"))
        .with_iterations(3)
        .with_output_format(clonalboot::data_structs::OutputFormat::Ipc);
    let report = BootstrapRunner::try_new(config).unwrap().run(&input).unwrap();
    assert!(report.is_success());

    let df = clonalboot::io::read_output(
        &workspace.path("a.Clonal_barcode.ipc"),
        clonalboot::data_structs::OutputFormat::Ipc,
    )
    .unwrap();
    assert!(df.height() > 0);
    assert_eq!(df.column("value").unwrap().dtype(), &DataType::Float64);
    assert_eq!(df.column("iteration").unwrap().dtype(), &DataType::UInt32);
}
