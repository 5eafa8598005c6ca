use std::path::PathBuf;

use anyhow::anyhow;
use clap::Args;
use clonalboot::data_structs::{
    AccountingMode,
    GroupingVariable,
    OutputFormat,
    Statistic,
    ThresholdMode,
};
use clonalboot::error::BootstrapError;
use clonalboot::io::ClonalColumns;
use clonalboot::tools::bootstrap::{
    ArmConfig,
    BootstrapConfig,
    BootstrapRunner,
    ControlFilter,
};
use console::style;
use indicatif::ProgressBar;

use crate::utils::{
    init_pbar,
    progress_hook,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct BootstrapArgs {
    #[arg(
        short,
        long,
        required = true,
        help = "Aggregated clonal table (CSV, TSV or Arrow IPC)."
    )]
    input: PathBuf,

    #[arg(long, required = true, help = "Genotype of the first arm.")]
    genotype_a: String,
    #[arg(long, required = true, help = "Output prefix of the first arm.")]
    out_a:      PathBuf,
    #[arg(long, required = true, help = "Genotype of the second arm.")]
    genotype_b: String,
    #[arg(long, required = true, help = "Output prefix of the second arm.")]
    out_b:      PathBuf,

    #[arg(
        short,
        long,
        num_args = 1..,
        value_delimiter = ',',
        default_values_t = vec![50.0, 75.0, 90.0],
        help_heading = "RESAMPLING",
        help = "Depth thresholds, in run order."
    )]
    thresholds:     Vec<f64>,
    #[arg(
        long,
        value_enum,
        default_value_t = ThresholdMode::Percentile,
        help_heading = "RESAMPLING",
        help = "Percentile of each sample's depth, or an absolute read count."
    )]
    threshold_mode: ThresholdMode,
    #[arg(
        short = 'n',
        long,
        default_value_t = 100,
        help_heading = "RESAMPLING",
        help = "Bootstrap iterations per threshold."
    )]
    iterations:     u32,
    #[arg(
        long,
        default_value_t = 1,
        help_heading = "RESAMPLING",
        help = "Independent repeats of the whole iteration series."
    )]
    rounds:         u32,
    #[arg(
        long,
        default_value_t = 1,
        help_heading = "RESAMPLING",
        help = "Samples with fewer reads are excluded with a warning."
    )]
    min_depth:      u64,
    #[arg(
        long,
        help_heading = "RESAMPLING",
        help = "Run seed. Drawn at random and recorded in the run metadata when \
                omitted."
    )]
    seed:           Option<u64>,

    #[arg(
        short,
        long,
        num_args = 1..,
        value_delimiter = ',',
        help_heading = "GROUPING",
        help = "Grouping variables: gRNA_combination, gRNA_combination_unordered, \
                Gene_combination, Gene_combination_unordered, Clonal_barcode or \
                any categorical column. Defaults to the four pair variables."
    )]
    grouping:      Vec<GroupingVariable>,
    #[arg(
        long = "stats",
        num_args = 1..,
        value_delimiter = ',',
        value_enum,
        help_heading = "GROUPING",
        help = "Statistics computed per group. Defaults to clone-count, reads and \
                read-fraction."
    )]
    statistics:    Vec<Statistic>,
    #[arg(
        long,
        value_enum,
        default_value_t = AccountingMode::Multiplex,
        help_heading = "GROUPING",
        help = "Credit pair groups whole, or split them per guide."
    )]
    accounting:    AccountingMode,
    #[arg(
        long,
        default_value = "Safe",
        help_heading = "GROUPING",
        help = "Substring marking control guides or genes. Empty disables control \
                detection."
    )]
    control_label: String,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "GROUPING",
        help = "Drop control clones before resampling."
    )]
    exclude_control: bool,

    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Tsv,
        help_heading = "OUTPUT",
        help = "Format of the per-variable result tables."
    )]
    output_format:  OutputFormat,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "OUTPUT",
        help = "Also write per-group mean, standard deviation and 95% intervals."
    )]
    summarize:      bool,
    #[arg(
        long,
        default_value_t = 2,
        help_heading = "OUTPUT",
        help = "Attempts per output file before it is reported as failed."
    )]
    write_attempts: usize,

    #[arg(
        long = "samples",
        help_heading = "COLUMNS",
        help = "Sample sheet (Sample_ID, Genotype) used instead of a genotype column."
    )]
    sample_sheet:     Option<PathBuf>,
    #[arg(long, default_value = "Sample_ID", help_heading = "COLUMNS")]
    sample_col:       String,
    #[arg(long, default_value = "Genotype", help_heading = "COLUMNS")]
    genotype_col:     String,
    #[arg(long, default_value = "Frequency", help_heading = "COLUMNS")]
    count_col:        String,
    #[arg(long, default_value = "Clonal_barcode", help_heading = "COLUMNS")]
    barcode_col:      String,
    #[arg(long, default_value = "gRNA1", help_heading = "COLUMNS")]
    guide1_col:       String,
    #[arg(long, default_value = "gRNA2", help_heading = "COLUMNS")]
    guide2_col:       String,
    #[arg(long, default_value = "gRNA_combination", help_heading = "COLUMNS")]
    guide_pair_col:   String,
    #[arg(long, default_value = "Gene1", help_heading = "COLUMNS")]
    gene1_col:        String,
    #[arg(long, default_value = "Gene2", help_heading = "COLUMNS")]
    gene2_col:        String,
    #[arg(long, default_value = "Gene_combination", help_heading = "COLUMNS")]
    gene_pair_col:    String,
}

impl BootstrapArgs {
    fn columns(&self) -> ClonalColumns {
        ClonalColumns {
            sample:     self.sample_col.clone(),
            genotype:   self.genotype_col.clone(),
            read_count: self.count_col.clone(),
            barcode:    self.barcode_col.clone(),
            guide1:     self.guide1_col.clone(),
            guide2:     self.guide2_col.clone(),
            guide_pair: self.guide_pair_col.clone(),
            gene1:      self.gene1_col.clone(),
            gene2:      self.gene2_col.clone(),
            gene_pair:  self.gene_pair_col.clone(),
        }
    }

    pub fn config(&self) -> BootstrapConfig {
        let defaults = BootstrapConfig::default();
        let grouping = if self.grouping.is_empty() {
            defaults.grouping.clone()
        }
        else {
            self.grouping.clone()
        };
        let statistics = if self.statistics.is_empty() {
            defaults.statistics.clone()
        }
        else {
            self.statistics.clone()
        };

        defaults
            .with_arm_pair(
                ArmConfig::new(self.genotype_a.clone(), self.out_a.clone()),
                ArmConfig::new(self.genotype_b.clone(), self.out_b.clone()),
            )
            .with_thresholds(self.thresholds.clone())
            .with_threshold_mode(self.threshold_mode)
            .with_iterations(self.iterations)
            .with_rounds(self.rounds)
            .with_grouping(grouping)
            .with_statistics(statistics)
            .with_accounting(self.accounting)
            .with_control(ControlFilter {
                label:   self.control_label.clone(),
                include: !self.exclude_control,
            })
            .with_min_required_depth(self.min_depth)
            .with_seed(self.seed)
            .with_output_format(self.output_format)
            .with_summarize(self.summarize)
            .with_write_attempts(self.write_attempts)
            .with_columns(self.columns())
            .with_sample_sheet(self.sample_sheet.clone())
    }

    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        if !self.input.is_file() {
            eprintln!(
                "Input {} is not a file.",
                style(self.input.display()).red()
            );
            return Err(anyhow!("Input file not found"));
        }
        for output in [&self.out_a, &self.out_b] {
            if output.is_dir() {
                eprintln!(
                    "Output prefix {} is a directory.",
                    style(output.display()).red()
                );
                return Err(anyhow!("Output prefix must not be a directory"));
            }
        }

        let progress_bar = if utils.progress {
            init_pbar(0)?
        }
        else {
            ProgressBar::hidden()
        };
        let runner = BootstrapRunner::try_new(self.config())?
            .with_progress(progress_hook(progress_bar.clone()));
        let report = runner.run(&self.input)?;
        progress_bar.finish_and_clear();

        println!("Seed: {}", style(report.seed).green());
        let success = report.is_success();
        for (arm, result) in runner.config().arms.iter().zip(report.arms.iter()) {
            match result {
                Ok(report) => {
                    println!(
                        "{} {}: {} samples, {} units, {} warnings",
                        style("Arm").bold(),
                        style(&arm.genotype).cyan(),
                        report.samples.len(),
                        report.units,
                        report.warnings.len()
                    );
                    for path in report.outputs.iter() {
                        println!("  {}", style(path.display()).green());
                    }
                    for failure in report.write_failures.iter() {
                        eprintln!(
                            "  {} {}: {}",
                            style("failed").red(),
                            failure.variable,
                            failure.message
                        );
                    }
                },
                Err(e) => {
                    let reason = match e.downcast_ref::<BootstrapError>() {
                        Some(BootstrapError::EmptyInput { .. }) => "no input rows",
                        _ => "failed",
                    };
                    eprintln!(
                        "{} {} {}: {:#}",
                        style("Arm").bold(),
                        style(&arm.genotype).red(),
                        reason,
                        e
                    );
                },
            }
        }

        if success {
            Ok(())
        }
        else {
            Err(anyhow!("Bootstrap run did not complete"))
        }
    }
}
