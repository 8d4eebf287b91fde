//! Line-oriented reader for instrument output files.
//!
//! Every line starts with a fixed six-character tag column (`$CONFIG`,
//! `$MDCDA`, `$PMTHV`, ...). The reader keeps the raw lines plus an index of
//! those tags so the extractors can jump straight to the sections they need.

pub mod config;
pub mod data;

pub use config::{
    ConfigField, ConfigScalar, ConfigValue, DisplayFormat, ExtractedConfig, ValueType,
    extract_config, universal_fields,
};
pub use data::{
    ALTERNATE_COLUMN_NAMES, ColumnRequest, ExtractedData, SeriesTarget, alternate_column_name,
    extract_data,
};

use crate::domain::{AvivError, AvivResult, ExperimentDescriptor, ExperimentType, Instrument};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TAG_WIDTH: usize = 6;
pub const ATF_TAG: &str = "$PMTHV";
pub const CD_TAG: &str = "$CDHV:";

#[derive(Debug, Clone)]
pub struct InstrumentFile {
    path: PathBuf,
    lines: Vec<String>,
    tag_positions: HashMap<String, usize>,
    descriptor: ExperimentDescriptor,
}

impl InstrumentFile {
    pub fn open(path: impl AsRef<Path>) -> AvivResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AvivError::io_system(
                "IO.INPUT_MISSING",
                format!("'{}' does not exist", path.display()),
            ));
        }
        let source = fs::read_to_string(path).map_err(|source| {
            AvivError::io_system(
                "IO.INPUT_READ",
                format!("failed to read '{}': {}", path.display(), source),
            )
        })?;
        Self::from_source(path, &source)
    }

    /// Builds the reader from text already in memory. `path` is only used
    /// for messages and the provenance header.
    pub fn from_source(path: impl Into<PathBuf>, source: &str) -> AvivResult<Self> {
        let path = path.into();
        let lines: Vec<String> = source.lines().map(str::to_string).collect();

        let mut tag_positions = HashMap::new();
        for (index, line) in lines.iter().enumerate() {
            tag_positions.entry(line_tag(line)).or_insert(index);
        }

        let instrument = if tag_positions.contains_key(ATF_TAG) {
            Instrument::Atf
        } else if tag_positions.contains_key(CD_TAG) {
            Instrument::Cd
        } else {
            return Err(AvivError::format(
                "FORMAT.UNKNOWN_INSTRUMENT",
                format!(
                    "instrument type in '{}' is not recognized (neither {} nor {} present)",
                    path.display(),
                    ATF_TAG,
                    CD_TAG
                ),
            ));
        };

        let experiment = lines
            .get(1)
            .map(|line| {
                line.split_once(':')
                    .map(|(_, rest)| rest)
                    .unwrap_or(line)
                    .trim()
                    .to_string()
            })
            .ok_or_else(|| {
                AvivError::format(
                    "FORMAT.MISSING_EXPERIMENT_LINE",
                    format!("'{}' has no experiment-type header line", path.display()),
                )
            })?;

        debug!(
            file = %path.display(),
            instrument = %instrument,
            experiment = %experiment,
            "indexed instrument file"
        );

        Ok(Self {
            path,
            lines,
            tag_positions,
            descriptor: ExperimentDescriptor::new(instrument, experiment),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }

    pub fn instrument(&self) -> Instrument {
        self.descriptor.instrument
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_positions.contains_key(tag)
    }

    /// First line whose tag column equals `tag`.
    pub fn tag_position(&self, tag: &str) -> Option<usize> {
        self.tag_positions.get(tag).copied()
    }

    /// Fails when the file disagrees with a profile the caller already chose.
    pub fn verify_against(&self, instrument: Instrument, experiment: ExperimentType) -> AvivResult<()> {
        if self.descriptor.instrument != instrument {
            return Err(AvivError::format(
                "FORMAT.INSTRUMENT_MISMATCH",
                format!(
                    "instrument/experiment mismatch: '{}' was written by a {} instrument, not {}",
                    self.path.display(),
                    self.descriptor.instrument,
                    instrument
                ),
            ));
        }
        if self.descriptor.experiment != experiment.as_str() {
            return Err(AvivError::format(
                "FORMAT.EXPERIMENT_MISMATCH",
                format!(
                    "instrument/experiment mismatch: '{}' holds a '{}' experiment, not '{}'",
                    self.path.display(),
                    self.descriptor.experiment,
                    experiment
                ),
            ));
        }
        Ok(())
    }
}

/// Reads only enough of a file to learn which instrument and experiment wrote it.
pub fn identify_experiment(path: impl AsRef<Path>) -> AvivResult<ExperimentDescriptor> {
    InstrumentFile::open(path).map(|file| file.descriptor().clone())
}

fn line_tag(line: &str) -> String {
    line.chars()
        .take(TAG_WIDTH)
        .collect::<String>()
        .trim()
        .to_string()
}
