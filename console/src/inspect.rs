use std::path::PathBuf;

use clap::Args;
use clonalboot::data_structs::GroupingVariable;
use clonalboot::io::ClonalTable;
use clonalboot::tools::bootstrap::BootstrapConfig;
use console::style;
use itertools::Itertools;

use crate::utils::UtilsArgs;

#[derive(Args, Debug, Clone)]
pub(crate) struct InspectArgs {
    #[arg(
        short,
        long,
        required = true,
        help = "Aggregated clonal table (CSV, TSV or Arrow IPC)."
    )]
    input:        PathBuf,
    #[arg(
        short,
        long,
        num_args = 1..,
        value_delimiter = ',',
        help = "Grouping variables to validate. Defaults to the four pair variables."
    )]
    grouping:     Vec<GroupingVariable>,
    #[arg(
        long = "samples",
        help = "Sample sheet (Sample_ID, Genotype) used instead of a genotype column."
    )]
    sample_sheet: Option<PathBuf>,
    #[arg(long, help = "Print the depth summary as JSON.")]
    json:         bool,
}

impl InspectArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let mut config = BootstrapConfig::default().with_sample_sheet(self.sample_sheet.clone());
        if !self.grouping.is_empty() {
            config = config.with_grouping(self.grouping.clone());
        }

        let table = ClonalTable::read(&self.input, &config)?;
        let summary = table.depth_summary();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!(
            "{} observations, genotypes: {}",
            style(table.len()).green(),
            table.genotypes().iter().join(", ")
        );
        for (genotype, samples) in &summary.iter().chunk_by(|entry| entry.genotype.clone()) {
            let samples = samples.collect_vec();
            println!(
                "\n{} ({} samples, {} reads)",
                style(genotype).cyan().bold(),
                samples.len(),
                samples.iter().map(|s| s.total_depth).sum::<u64>()
            );
            println!("{:<24}{:>10}{:>14}{:>14}", "sample", "clones", "reads", "control");
            for entry in samples {
                println!(
                    "{:<24}{:>10}{:>14}{:>14}",
                    entry.sample_id.as_str(),
                    entry.clones,
                    entry.total_depth,
                    entry.control_reads
                );
            }
        }
        Ok(())
    }
}
