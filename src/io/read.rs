use std::collections::BTreeMap;
use std::fs::File;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;

use anyhow::Context;
use hashbrown::HashMap;
use itertools::Itertools;
use log::{
    debug,
    info,
};
use polars::prelude::*;
use serde::Serialize;

use super::schema::{
    pair_kind,
    split_pair,
    ClonalColumns,
    InputFormat,
    PairColumns,
    PairKind,
};
use crate::data_structs::typedef::{
    CountType,
    LabelStr,
};
use crate::data_structs::{
    ClonalObservation,
    GroupKey,
    GroupingVariable,
};
use crate::error::BootstrapError;
use crate::tools::bootstrap::BootstrapConfig;
use crate::utils::LabelInterner;

/// Reads a CSV/TSV (optionally compressed) or Arrow IPC file into a
/// DataFrame. Delimited files are read with every column as a string.
pub fn read_frame(path: &Path) -> anyhow::Result<DataFrame> {
    let header = first_line(path).ok();
    let format = InputFormat::from_path(path, header.as_deref());
    debug!("Reading {} as {:?}", path.display(), format);

    let df = match format.read_options() {
        Some(options) => {
            options
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?
        },
        None => IpcReader::new(File::open(path)?).finish()?,
    };
    Ok(df)
}

fn first_line(path: &Path) -> std::io::Result<String> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    Ok(line)
}

fn polars_schema_error(
    column: &str,
    err: PolarsError,
) -> BootstrapError {
    BootstrapError::schema(format!("column '{column}': {err}"))
}

/// Per-sample depth overview of a loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleDepth {
    pub sample_id:     LabelStr,
    pub genotype:      LabelStr,
    pub clones:        usize,
    pub total_depth:   CountType,
    pub control_reads: CountType,
}

/// Validated observations of an aggregated clonal table.
///
/// Grouping keys are resolved once, at load time, for the grouping
/// variables of the configuration the table was loaded with.
#[derive(Debug, Clone)]
pub struct ClonalTable {
    observations: Vec<ClonalObservation>,
    grouping:     Vec<GroupingVariable>,
}

impl ClonalTable {
    /// Reads and validates the table at `path`.
    ///
    /// Fails with [`BootstrapError::Schema`] when required columns are
    /// missing or values are malformed.
    pub fn read(
        path: &Path,
        config: &BootstrapConfig,
    ) -> anyhow::Result<Self> {
        let df = read_frame(path)
            .with_context(|| format!("Failed to read clonal table {}", path.display()))?;
        info!(
            "Read {} rows, {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );

        let sample_sheet = match config.sample_sheet.as_ref() {
            Some(sheet_path) => {
                Some(read_sample_sheet(sheet_path, &config.columns).with_context(
                    || format!("Failed to read sample sheet {}", sheet_path.display()),
                )?)
            },
            None => None,
        };

        let table = Self::from_dataframe(&df, config, sample_sheet.as_ref())
            .with_context(|| format!("Invalid clonal table {}", path.display()))?;
        Ok(table)
    }

    /// Validates a DataFrame. `sample_sheet` maps sample ids to genotypes
    /// and replaces the genotype column when given.
    pub fn from_dataframe(
        df: &DataFrame,
        config: &BootstrapConfig,
        sample_sheet: Option<&HashMap<String, String>>,
    ) -> Result<Self, BootstrapError> {
        let columns = &config.columns;
        let schema = df.schema();

        let mut missing = Vec::new();
        for required in [&columns.sample, &columns.read_count] {
            if !schema.contains(required) {
                missing.push(required.clone());
            }
        }
        if sample_sheet.is_none() && !schema.contains(&columns.genotype) {
            missing.push(columns.genotype.clone());
        }
        for variable in config.grouping.iter() {
            let available = match pair_kind(variable) {
                Some(kind) => columns.resolve_pair(kind, &schema).is_some(),
                None => schema.contains(columns.single_column(variable)),
            };
            if !available {
                missing.push(columns.requirement(variable));
            }
        }
        if !missing.is_empty() {
            return Err(BootstrapError::schema(format!(
                "missing required columns: {}",
                missing.into_iter().unique().join(", ")
            )));
        }

        let mut interner = LabelInterner::new();
        let sample_ids = string_column(df, &columns.sample, &mut interner)?;
        let read_counts = count_column(df, &columns.read_count)?;
        let genotypes = match sample_sheet {
            Some(sheet) => {
                sample_ids
                    .iter()
                    .map(|sample| {
                        sheet
                            .get(sample.as_str())
                            .map(|genotype| interner.intern(genotype))
                            .ok_or_else(|| {
                                BootstrapError::schema(format!(
                                    "sample '{sample}' is not listed in the sample sheet"
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            },
            None => string_column(df, &columns.genotype, &mut interner)?,
        };

        let mut pair_cache: HashMap<PairKind, Vec<(LabelStr, LabelStr)>> = HashMap::new();
        let mut key_columns = Vec::with_capacity(config.grouping.len());
        for variable in config.grouping.iter() {
            let keys = match pair_kind(variable) {
                Some(kind) => {
                    if !pair_cache.contains_key(&kind) {
                        let pairs = pair_column(df, columns, kind, &mut interner)?
                            .ok_or_else(|| {
                                BootstrapError::schema(format!(
                                    "missing required columns: {}",
                                    columns.requirement(variable)
                                ))
                            })?;
                        pair_cache.insert(kind, pairs);
                    }
                    pair_keys(&pair_cache[&kind], variable.is_unordered(), &mut interner)
                },
                None => {
                    string_column(df, columns.single_column(variable), &mut interner)?
                        .into_iter()
                        .map(GroupKey::Single)
                        .collect_vec()
                },
            };
            key_columns.push(keys);
        }

        let control_flags = control_flags(
            df,
            config,
            &mut pair_cache,
            &mut interner,
        )?;

        let observations = assemble_observations(
            sample_ids,
            genotypes,
            read_counts,
            control_flags,
            key_columns,
        );
        debug!(
            "Validated {} observations with {} distinct labels",
            observations.len(),
            interner.len()
        );

        Ok(Self {
            observations,
            grouping: config.grouping.clone(),
        })
    }

    pub fn observations(&self) -> &[ClonalObservation] {
        &self.observations
    }

    pub fn grouping(&self) -> &[GroupingVariable] {
        &self.grouping
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Sorted distinct genotypes of the table.
    pub fn genotypes(&self) -> Vec<LabelStr> {
        self.observations
            .iter()
            .map(|obs| obs.genotype().clone())
            .unique()
            .sorted()
            .collect()
    }

    /// Observations of one genotype arm.
    ///
    /// Fails with [`BootstrapError::EmptyInput`] when nothing matches.
    pub fn select_genotype(
        &self,
        genotype: &str,
    ) -> Result<Vec<ClonalObservation>, BootstrapError> {
        let selected = self
            .observations
            .iter()
            .filter(|obs| obs.genotype().as_str() == genotype)
            .cloned()
            .collect_vec();
        if selected.is_empty() {
            return Err(BootstrapError::EmptyInput {
                genotype: genotype.to_string(),
            });
        }
        debug!(
            "Selected {} observations for genotype {}",
            selected.len(),
            genotype
        );
        Ok(selected)
    }

    /// Depth overview per (genotype, sample), sorted.
    pub fn depth_summary(&self) -> Vec<SampleDepth> {
        let mut summary: BTreeMap<(LabelStr, LabelStr), SampleDepth> = BTreeMap::new();
        for obs in self.observations.iter() {
            let entry = summary
                .entry((obs.genotype().clone(), obs.sample_id().clone()))
                .or_insert_with(|| {
                    SampleDepth {
                        sample_id:     obs.sample_id().clone(),
                        genotype:      obs.genotype().clone(),
                        clones:        0,
                        total_depth:   0,
                        control_reads: 0,
                    }
                });
            entry.clones += 1;
            entry.total_depth += obs.read_count();
            if obs.is_control() {
                entry.control_reads += obs.read_count();
            }
        }
        summary.into_values().collect()
    }
}

/// Zips the validated columns into row observations. Every key column has
/// the table height.
fn assemble_observations(
    sample_ids: Vec<LabelStr>,
    genotypes: Vec<LabelStr>,
    read_counts: Vec<CountType>,
    control_flags: Vec<bool>,
    key_columns: Vec<Vec<GroupKey>>,
) -> Vec<ClonalObservation> {
    let mut row_keys = vec![Vec::with_capacity(key_columns.len()); sample_ids.len()];
    for column in key_columns {
        for (keys, key) in row_keys.iter_mut().zip(column) {
            keys.push(key);
        }
    }

    itertools::izip!(sample_ids, genotypes, read_counts, control_flags, row_keys)
        .map(|(sample_id, genotype, read_count, is_control, keys)| {
            ClonalObservation::new(sample_id, genotype, read_count, keys)
                .with_control(is_control)
        })
        .collect()
}

fn string_column(
    df: &DataFrame,
    name: &str,
    interner: &mut LabelInterner,
) -> Result<Vec<LabelStr>, BootstrapError> {
    let series = df
        .column(name)
        .and_then(|column| column.as_materialized_series().cast(&DataType::String))
        .map_err(|e| polars_schema_error(name, e))?;
    let values = series.str().map_err(|e| polars_schema_error(name, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            match value.map(str::trim) {
                Some(value) if !value.is_empty() => Ok(interner.intern(value)),
                _ => {
                    Err(BootstrapError::schema(format!(
                        "column '{name}' has a missing value at row {row}"
                    )))
                },
            }
        })
        .collect()
}

fn count_column(
    df: &DataFrame,
    name: &str,
) -> Result<Vec<CountType>, BootstrapError> {
    let series = df
        .column(name)
        .and_then(|column| column.as_materialized_series().cast(&DataType::Float64))
        .map_err(|e| polars_schema_error(name, e))?;
    let values = series.f64().map_err(|e| polars_schema_error(name, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            match value {
                Some(count) if count.is_finite() && count.fract() == 0.0 && count > 0.0 => {
                    Ok(count as CountType)
                },
                Some(count) => {
                    Err(BootstrapError::schema(format!(
                        "read count in column '{name}' must be a positive integer, \
                         got {count} at row {row}"
                    )))
                },
                None => {
                    Err(BootstrapError::schema(format!(
                        "read count in column '{name}' is missing or not numeric at \
                         row {row}"
                    )))
                },
            }
        })
        .collect()
}

/// Constituents of a guide or gene pair per row, or `None` when the table
/// carries neither the component nor the combined columns.
fn pair_column(
    df: &DataFrame,
    columns: &ClonalColumns,
    kind: PairKind,
    interner: &mut LabelInterner,
) -> Result<Option<Vec<(LabelStr, LabelStr)>>, BootstrapError> {
    let schema = df.schema();
    let pairs = match columns.resolve_pair(kind, &schema) {
        Some(PairColumns::Components(first, second)) => {
            let first = string_column(df, first, interner)?;
            let second = string_column(df, second, interner)?;
            first.into_iter().zip(second).collect_vec()
        },
        Some(PairColumns::Combined(combined)) => {
            string_column(df, combined, interner)?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    split_pair(&value)
                        .map(|(first, second)| {
                            (interner.intern(first), interner.intern(second))
                        })
                        .ok_or_else(|| {
                            BootstrapError::schema(format!(
                                "cannot split '{value}' in column '{combined}' at row \
                                 {row} into two constituents"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        },
        None => return Ok(None),
    };
    Ok(Some(pairs))
}

fn pair_keys(
    pairs: &[(LabelStr, LabelStr)],
    unordered: bool,
    interner: &mut LabelInterner,
) -> Vec<GroupKey> {
    pairs
        .iter()
        .map(|(first, second)| {
            let (first, second) = if unordered && second < first {
                (second, first)
            }
            else {
                (first, second)
            };
            GroupKey::Pair {
                label:  interner.intern(&format!("{first}_{second}")),
                first:  first.clone(),
                second: second.clone(),
            }
        })
        .collect()
}

/// Flags rows whose gene pair (or guide pair, when genes are absent)
/// consists only of control constituents.
fn control_flags(
    df: &DataFrame,
    config: &BootstrapConfig,
    pair_cache: &mut HashMap<PairKind, Vec<(LabelStr, LabelStr)>>,
    interner: &mut LabelInterner,
) -> Result<Vec<bool>, BootstrapError> {
    let label = config.control.label.trim().to_lowercase();
    if label.is_empty() {
        return Ok(vec![false; df.height()]);
    }

    for kind in [PairKind::Gene, PairKind::Guide] {
        if !pair_cache.contains_key(&kind) {
            if let Some(pairs) = pair_column(df, &config.columns, kind, interner)? {
                pair_cache.insert(kind, pairs);
            }
        }
        if let Some(pairs) = pair_cache.get(&kind) {
            let is_control = |value: &LabelStr| value.to_lowercase().contains(&label);
            return Ok(pairs
                .iter()
                .map(|(first, second)| is_control(first) && is_control(second))
                .collect());
        }
    }
    debug!("No guide or gene columns available, control detection disabled");
    Ok(vec![false; df.height()])
}

/// Reads a sample sheet mapping sample ids to genotypes.
pub fn read_sample_sheet(
    path: &Path,
    columns: &ClonalColumns,
) -> anyhow::Result<HashMap<String, String>> {
    let df = read_frame(path)?;
    let mut interner = LabelInterner::new();
    let samples = string_column(&df, &columns.sample, &mut interner)?;
    let genotypes = string_column(&df, &columns.genotype, &mut interner)?;

    let mut sheet = HashMap::with_capacity(samples.len());
    for (sample, genotype) in samples.into_iter().zip(genotypes) {
        match sheet.insert(sample.to_string(), genotype.to_string()) {
            Some(previous) if previous != genotype.as_str() => {
                return Err(BootstrapError::schema(format!(
                    "sample '{sample}' is assigned to both '{previous}' and \
                     '{genotype}' in the sample sheet"
                ))
                .into());
            },
            _ => {},
        }
    }
    info!("Read {} samples from sample sheet {}", sheet.len(), path.display());
    Ok(sheet)
}
