use std::fs::File;
use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};

use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use polars::df;
use polars::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::data_structs::{
    BootstrapWarning,
    OutputFormat,
    ResultRecord,
};
use crate::error::{
    BootstrapError,
    BoxedError,
};
use crate::tools::bootstrap::SummaryRecord;

/// Converts result records into a long-format DataFrame.
pub fn records_to_frame(records: &[ResultRecord]) -> PolarsResult<DataFrame> {
    df!(
        "sample_id" => records.iter().map(|r| r.sample_id.as_str()).collect_vec(),
        "genotype" => records.iter().map(|r| r.genotype.as_str()).collect_vec(),
        "threshold" => records.iter().map(|r| r.threshold).collect_vec(),
        "depth" => records.iter().map(|r| r.depth).collect_vec(),
        "round" => records.iter().map(|r| r.round).collect_vec(),
        "iteration" => records.iter().map(|r| r.iteration).collect_vec(),
        "grouping_variable" => records.iter().map(|r| r.grouping_variable.as_str()).collect_vec(),
        "group_value" => records.iter().map(|r| r.group_value.as_str()).collect_vec(),
        "statistic" => records.iter().map(|r| r.statistic.as_str()).collect_vec(),
        "value" => records.iter().map(|r| r.value).collect_vec(),
    )
}

pub fn summary_to_frame(records: &[SummaryRecord]) -> PolarsResult<DataFrame> {
    df!(
        "sample_id" => records.iter().map(|r| r.sample_id.as_str()).collect_vec(),
        "genotype" => records.iter().map(|r| r.genotype.as_str()).collect_vec(),
        "threshold" => records.iter().map(|r| r.threshold).collect_vec(),
        "depth" => records.iter().map(|r| r.depth).collect_vec(),
        "round" => records.iter().map(|r| r.round).collect_vec(),
        "iterations" => records.iter().map(|r| r.iterations).collect_vec(),
        "grouping_variable" => records.iter().map(|r| r.grouping_variable.as_str()).collect_vec(),
        "group_value" => records.iter().map(|r| r.group_value.as_str()).collect_vec(),
        "statistic" => records.iter().map(|r| r.statistic.as_str()).collect_vec(),
        "n" => records.iter().map(|r| r.stats.n as u64).collect_vec(),
        "mean" => records.iter().map(|r| r.stats.mean).collect_vec(),
        "std" => records.iter().map(|r| r.stats.std_dev).collect_vec(),
        "q025" => records.iter().map(|r| r.stats.lower).collect_vec(),
        "median" => records.iter().map(|r| r.stats.median).collect_vec(),
        "q975" => records.iter().map(|r| r.stats.upper).collect_vec(),
    )
}

pub fn warnings_to_frame(warnings: &[BootstrapWarning]) -> PolarsResult<DataFrame> {
    let (required, available): (Vec<Option<u64>>, Vec<Option<u64>>) = warnings
        .iter()
        .map(|warning| {
            match warning {
                BootstrapWarning::InsufficientDepth {
                    required,
                    available,
                    ..
                } => (Some(*required), Some(*available)),
                BootstrapWarning::SampleExcluded {
                    min_required,
                    total_depth,
                    ..
                } => (Some(*min_required), Some(*total_depth)),
            }
        })
        .unzip();
    df!(
        "kind" => warnings.iter().map(BootstrapWarning::kind).collect_vec(),
        "sample_id" => warnings.iter().map(|w| w.sample_id().as_str()).collect_vec(),
        "threshold" => warnings.iter().map(BootstrapWarning::threshold).collect_vec(),
        "required" => required,
        "available" => available,
        "message" => warnings.iter().map(|w| w.to_string()).collect_vec(),
    )
}

/// Writes the outputs of one arm next to its prefix.
///
/// Every file is first written to a temporary file in the destination
/// directory and then atomically renamed, so a failed or interrupted write
/// never leaves a partial table behind.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    prefix:   PathBuf,
    format:   OutputFormat,
    attempts: usize,
}

impl ResultWriter {
    pub fn new(
        prefix: PathBuf,
        format: OutputFormat,
        attempts: usize,
    ) -> Self {
        Self {
            prefix,
            format,
            attempts: attempts.max(1),
        }
    }

    fn with_suffix(
        &self,
        suffix: &str,
    ) -> PathBuf {
        let mut name = self
            .prefix
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.prefix.with_file_name(name)
    }

    pub fn records_path(
        &self,
        variable: &str,
    ) -> PathBuf {
        self.with_suffix(&format!("{variable}.{}", self.format.extension()))
    }

    pub fn summary_path(
        &self,
        variable: &str,
    ) -> PathBuf {
        self.with_suffix(&format!("{variable}.summary.tsv"))
    }

    pub fn warnings_path(&self) -> PathBuf {
        self.with_suffix("warnings.tsv")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.with_suffix("run.json")
    }

    /// Writes the records of one grouping variable.
    pub fn write_records(
        &self,
        variable: &str,
        records: &[ResultRecord],
    ) -> Result<PathBuf, BootstrapError> {
        let path = self.records_path(variable);
        self.retrying(variable, &path, || {
            let mut df = records_to_frame(records)?;
            persist_frame(&mut df, &path, self.format)
        })?;
        info!(
            "Wrote {} records of {} to {}",
            records.len(),
            variable,
            path.display()
        );
        Ok(path)
    }

    pub fn write_summary(
        &self,
        variable: &str,
        summary: &[SummaryRecord],
    ) -> Result<PathBuf, BootstrapError> {
        let path = self.summary_path(variable);
        self.retrying(variable, &path, || {
            let mut df = summary_to_frame(summary)?;
            persist_frame(&mut df, &path, OutputFormat::Tsv)
        })?;
        debug!("Wrote summary of {} to {}", variable, path.display());
        Ok(path)
    }

    /// Writes the warnings table. An empty table still gets its header.
    pub fn write_warnings(
        &self,
        warnings: &[BootstrapWarning],
    ) -> Result<PathBuf, BootstrapError> {
        let path = self.warnings_path();
        self.retrying("warnings", &path, || {
            let mut df = warnings_to_frame(warnings)?;
            persist_frame(&mut df, &path, OutputFormat::Tsv)
        })?;
        debug!("Wrote {} warnings to {}", warnings.len(), path.display());
        Ok(path)
    }

    pub fn write_metadata<T: Serialize>(
        &self,
        metadata: &T,
    ) -> Result<PathBuf, BootstrapError> {
        let path = self.metadata_path();
        self.retrying("run metadata", &path, || {
            let mut file = NamedTempFile::new_in(parent_dir(&path))?;
            serde_json::to_writer_pretty(&mut file, metadata)?;
            file.write_all(b"\n")?;
            file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })?;
        Ok(path)
    }

    fn retrying<F>(
        &self,
        variable: &str,
        path: &Path,
        mut write: F,
    ) -> Result<(), BootstrapError>
    where
        F: FnMut() -> Result<(), BoxedError>, {
        let mut attempt = 1;
        loop {
            match write() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    warn!(
                        "Writing {} to {} failed (attempt {}/{}): {}",
                        variable,
                        path.display(),
                        attempt,
                        self.attempts,
                        e
                    );
                    attempt += 1;
                },
                Err(source) => {
                    return Err(BootstrapError::Write {
                        variable: variable.to_string(),
                        path: path.to_path_buf(),
                        source,
                    })
                },
            }
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Writes `df` to a temporary file next to `path` and renames it into
/// place.
pub fn persist_frame(
    df: &mut DataFrame,
    path: &Path,
    format: OutputFormat,
) -> Result<(), BoxedError> {
    let mut file = NamedTempFile::new_in(parent_dir(path))?;
    match format {
        OutputFormat::Tsv => {
            CsvWriter::new(file.as_file_mut())
                .include_header(true)
                .with_separator(b'\t')
                .finish(df)?
        },
        OutputFormat::Ipc => IpcWriter::new(file.as_file_mut()).finish(df)?,
    }
    file.as_file_mut().flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads back a table written by [`ResultWriter`].
pub fn read_output(
    path: &Path,
    format: OutputFormat,
) -> PolarsResult<DataFrame> {
    match format {
        OutputFormat::Tsv => {
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t'))
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()
        },
        OutputFormat::Ipc => IpcReader::new(File::open(path)?).finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::Statistic;

    fn record(value: f64) -> ResultRecord {
        ResultRecord {
            sample_id: "M1".into(),
            genotype: "KT".into(),
            threshold: 50.0,
            depth: 500,
            round: 0,
            iteration: 0,
            grouping_variable: "Clonal_barcode".into(),
            group_value: "AAAA".into(),
            statistic: Statistic::Reads,
            value,
        }
    }

    #[test]
    fn output_paths_extend_the_prefix() {
        let writer = ResultWriter::new("out/kt.v1".into(), OutputFormat::Ipc, 1);
        assert_eq!(
            writer.records_path("gRNA_combination"),
            PathBuf::from("out/kt.v1.gRNA_combination.ipc")
        );
        assert_eq!(writer.warnings_path(), PathBuf::from("out/kt.v1.warnings.tsv"));
        assert_eq!(writer.metadata_path(), PathBuf::from("out/kt.v1.run.json"));
    }

    #[test]
    fn writes_tsv_and_ipc_tables() {
        let dir = tempfile::tempdir().unwrap();
        for format in [OutputFormat::Tsv, OutputFormat::Ipc] {
            let writer = ResultWriter::new(dir.path().join("kt"), format, 1);
            let path = writer
                .write_records("Clonal_barcode", &[record(250.0), record(250.0)])
                .unwrap();
            let df = read_output(&path, format).unwrap();
            assert_eq!(df.height(), 2);
            assert_eq!(df.width(), 10);
        }
    }

    #[test]
    fn empty_warnings_keep_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("kt"), OutputFormat::Tsv, 1);
        let path = writer.write_warnings(&[]).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content.trim_end(),
            "kind\tsample_id\tthreshold\trequired\tavailable\tmessage"
        );
    }

    #[test]
    fn failed_write_reports_the_variable() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(
            dir.path().join("missing").join("kt"),
            OutputFormat::Tsv,
            3,
        );
        match writer.write_records("gRNA_combination", &[record(1.0)]) {
            Err(BootstrapError::Write { variable, .. }) => {
                assert_eq!(variable, "gRNA_combination")
            },
            other => panic!("unexpected result {other:?}"),
        }
    }
}
