//! Fixed-order processing run.
//!
//! `Created → InstrumentConfigured → ExperimentConfigured → Loaded →
//! ConfigExtracted → DataExtracted → ChannelsBuilt → Corrected → Rendered`,
//! with `Failed` reachable from any non-terminal stage. A failure aborts the
//! run; there is no partial output. Errors leave the dispatcher tagged with
//! the stage that was being entered.

pub mod dispatch;

pub use dispatch::{
    SUPPORTED_COMBINATIONS, combination_supported, parameter_specs, placeholder_parameters,
    resolve_combination,
};

use crate::channel::{BlankReference, Channel};
use crate::domain::{
    AvivError, AvivResult, ExperimentDescriptor, ExperimentType, Instrument, ParameterBundle,
    PipelineStage,
};
use crate::profiles::{ExperimentProfile, ExtractionPlan, InstrumentProfile};
use crate::reader::{ExtractedConfig, InstrumentFile, extract_config, extract_data, identify_experiment};
use crate::render::{DEFAULT_COLUMN_WIDTH, OutputColumn, ProvenanceHeader, render_table};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    pub column_width: usize,
    /// Free-text lines placed in the header after the experiment block.
    pub annotations: Vec<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            column_width: DEFAULT_COLUMN_WIDTH,
            annotations: Vec::new(),
        }
    }
}

/// Result of a run that stopped after building channels.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewedExperiment {
    pub descriptor: ExperimentDescriptor,
    pub config: ExtractedConfig,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedExperiment {
    input: PathBuf,
    descriptor: ExperimentDescriptor,
    config: ExtractedConfig,
    channels: Vec<Channel>,
    columns: Vec<OutputColumn>,
    annotations: Vec<String>,
    table: String,
}

impl ProcessedExperiment {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ExtractedConfig {
        &self.config
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Adds a header line after processing, e.g. a sanity check computed
    /// from the corrected channels.
    pub fn annotate(&mut self, line: impl Into<String>) {
        self.annotations.push(line.into());
    }

    pub fn header(&self) -> String {
        ProvenanceHeader {
            input_file: &self.input,
            descriptor: &self.descriptor,
            annotations: &self.annotations,
            config: &self.config,
            channels: &self.channels,
        }
        .render()
    }

    /// Provenance header followed by the table.
    pub fn output(&self) -> String {
        let mut out = self.header();
        out.push_str(&self.table);
        out
    }
}

/// Drives one input file through the stages with a single profile pair.
#[derive(Debug)]
pub struct ExperimentDispatcher {
    input: PathBuf,
    instrument: Instrument,
    experiment: ExperimentType,
    stage: PipelineStage,
}

impl ExperimentDispatcher {
    /// Dispatcher for a combination the caller already chose. The file is
    /// checked against it when loaded.
    pub fn new(input: impl Into<PathBuf>, instrument: Instrument, experiment: ExperimentType) -> AvivResult<Self> {
        if !dispatch::combination_supported(instrument, experiment) {
            return Err(dispatch::unsupported_combination_error(
                instrument,
                experiment.as_str(),
            ));
        }
        Ok(Self {
            input: input.into(),
            instrument,
            experiment,
            stage: PipelineStage::Created,
        })
    }

    /// Pre-reads the file header to choose the combination.
    pub fn for_file(input: impl Into<PathBuf>) -> AvivResult<Self> {
        let input = input.into();
        let descriptor = identify_experiment(&input)?;
        let (instrument, experiment) = resolve_combination(&descriptor)?;
        info!(file = %input.display(), %instrument, %experiment, "identified experiment");
        Self::new(input, instrument, experiment)
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn experiment(&self) -> ExperimentType {
        self.experiment
    }

    pub fn process(&mut self, params: &ParameterBundle, options: &ProcessOptions) -> AvivResult<ProcessedExperiment> {
        let staged = self.extract(params)?;
        let StagedRun {
            instrument_profile,
            experiment_profile,
            file,
            config,
            mut channels,
        } = staged;

        self.advance(PipelineStage::Corrected, || {
            let blank = experiment_profile
                .blank_file()
                .map(load_blank_reference)
                .transpose()?;
            experiment_profile.apply_corrections(&instrument_profile, &config, &mut channels, blank.as_ref())
        })?;

        let columns = experiment_profile.output_columns(&instrument_profile);
        let width = options.column_width;
        let table = self.advance(PipelineStage::Rendered, || render_table(&channels, &columns, width))?;

        info!(
            file = %self.input.display(),
            channels = channels.len(),
            rows = channels.first().map_or(0, Channel::len),
            "processed experiment"
        );

        Ok(ProcessedExperiment {
            input: self.input.clone(),
            descriptor: file.descriptor().clone(),
            config,
            channels,
            columns,
            annotations: options.annotations.clone(),
            table,
        })
    }

    /// Runs through `ChannelsBuilt` with placeholder parameters. Nothing is
    /// corrected.
    pub fn preview(&mut self) -> AvivResult<PreviewedExperiment> {
        let params = placeholder_parameters(self.instrument, self.experiment);
        let staged = self.extract(&params)?;
        Ok(PreviewedExperiment {
            descriptor: staged.file.descriptor().clone(),
            config: staged.config,
            channels: staged.channels,
        })
    }

    fn extract(&mut self, params: &ParameterBundle) -> AvivResult<StagedRun> {
        let (instrument, experiment) = (self.instrument, self.experiment);
        let input = self.input.clone();

        let instrument_profile = self.advance(PipelineStage::InstrumentConfigured, || {
            InstrumentProfile::from_parameters(instrument, params)
        })?;
        let experiment_profile = self.advance(PipelineStage::ExperimentConfigured, || {
            ExperimentProfile::from_parameters(experiment, &instrument_profile, params)
        })?;

        let file = self.advance(PipelineStage::Loaded, || {
            let file = InstrumentFile::open(&input)?;
            file.verify_against(instrument, experiment)?;
            Ok(file)
        })?;

        let mut plan = ExtractionPlan::new();
        instrument_profile.declare_extraction(&mut plan);
        experiment_profile.declare_extraction(&instrument_profile, &mut plan);

        let config = self.advance(PipelineStage::ConfigExtracted, || {
            extract_config(&file, plan.config_fields().to_vec())
        })?;
        let data = self.advance(PipelineStage::DataExtracted, || extract_data(&file, plan.columns()))?;
        let channels = self.advance(PipelineStage::ChannelsBuilt, || instrument_profile.build_channels(&data))?;

        Ok(StagedRun {
            instrument_profile,
            experiment_profile,
            file,
            config,
            channels,
        })
    }

    fn advance<T>(&mut self, next: PipelineStage, work: impl FnOnce() -> AvivResult<T>) -> AvivResult<T> {
        if self.stage.successor() != Some(next) {
            let error = AvivError::internal(
                "INTERNAL.STAGE_ORDER",
                format!("cannot enter {} from {}", next, self.stage),
            )
            .at_stage(next);
            self.stage = PipelineStage::Failed;
            return Err(error);
        }

        match work() {
            Ok(value) => {
                debug!(file = %self.input.display(), from = %self.stage, to = %next, "stage complete");
                self.stage = next;
                Ok(value)
            }
            Err(error) => {
                debug!(file = %self.input.display(), stage = %next, code = error.code(), "stage failed");
                self.stage = PipelineStage::Failed;
                Err(error.at_stage(next))
            }
        }
    }
}

struct StagedRun {
    instrument_profile: InstrumentProfile,
    experiment_profile: ExperimentProfile,
    file: InstrumentFile,
    config: ExtractedConfig,
    channels: Vec<Channel>,
}

/// Identifies and fully processes `path`.
pub fn process_file(
    path: impl Into<PathBuf>,
    params: &ParameterBundle,
    options: &ProcessOptions,
) -> AvivResult<ProcessedExperiment> {
    ExperimentDispatcher::for_file(path)?.process(params, options)
}

/// Identifies `path` and reads it without corrections.
pub fn preview(path: impl Into<PathBuf>) -> AvivResult<PreviewedExperiment> {
    ExperimentDispatcher::for_file(path)?.preview()
}

/// The blank file goes through its own independent run; only its first
/// channel's raw trace is kept.
fn load_blank_reference(path: &Path) -> AvivResult<BlankReference> {
    let blank = preview(path)?;
    let channel = blank.channels.first().ok_or_else(|| {
        AvivError::format(
            "FORMAT.BLANK_EMPTY",
            format!("blank file '{}' produced no channels", path.display()),
        )
    })?;
    Ok(BlankReference {
        source: path.to_path_buf(),
        raw_x: channel.raw_x().to_vec(),
        raw_signal: channel.raw_signal().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ExperimentDispatcher, ProcessOptions, preview, process_file};
    use crate::domain::{
        AvivErrorCategory, ExperimentType, Instrument, ParamValue, ParameterBundle, PipelineStage,
    };
    use std::fs;
    use tempfile::TempDir;

    const CD_MELT: &str = "\
Aviv CD instrument file
EXPERIMENT TYPE: Temperature
$CDHV: 450.0
$CONFIG
$EXPNAME:melt
$MONOWL:222.0
$TEMPSP:25.0
$MDCDA
X CD_Signal CD_Error
20.0 -10.0 0.5
50.0 -6.0 0.5
80.0 -2.0 0.5
$ENDDA
";

    fn cd_params() -> ParameterBundle {
        ParameterBundle::new()
            .with("num_residues", ParamValue::Int(100))
            .with("molec_weight", ParamValue::Float(10000.0))
            .with("protein_conc", ParamValue::Float(50.0))
            .with("path_length", ParamValue::Float(0.1))
    }

    fn staged(source: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("input.dat");
        fs::write(&path, source).expect("fixture staged");
        (temp, path)
    }

    #[test]
    fn successful_run_ends_rendered() {
        let (_temp, path) = staged(CD_MELT);
        let mut dispatcher = ExperimentDispatcher::for_file(&path).expect("file identified");
        assert_eq!(dispatcher.stage(), PipelineStage::Created);

        let processed = dispatcher
            .process(&cd_params(), &ProcessOptions::default())
            .expect("melt processes");
        assert_eq!(dispatcher.stage(), PipelineStage::Rendered);

        let output = processed.output();
        assert!(output.starts_with("# ----- Experiment information -----\n"));
        assert!(!output.contains("Sample temperature"));
        assert!(output.contains("# Wavelength: 222.000\n"));
        assert!(output.contains("      s_temp       s_raw"));
        assert_eq!(processed.table().lines().count(), 4);
    }

    #[test]
    fn failure_is_tagged_with_the_stage_entered() {
        let (_temp, path) = staged(CD_MELT);
        let mut dispatcher = ExperimentDispatcher::for_file(&path).expect("file identified");

        let error = dispatcher
            .process(&ParameterBundle::new(), &ProcessOptions::default())
            .expect_err("missing protein properties should fail");
        assert_eq!(error.category(), AvivErrorCategory::Configuration);
        assert_eq!(error.stage(), Some(PipelineStage::InstrumentConfigured));
        assert_eq!(dispatcher.stage(), PipelineStage::Failed);

        let error = dispatcher
            .process(&cd_params(), &ProcessOptions::default())
            .expect_err("a failed dispatcher cannot be rerun");
        assert_eq!(error.code(), "INTERNAL.STAGE_ORDER");
    }

    #[test]
    fn chosen_profile_must_match_the_file() {
        let (_temp, path) = staged(CD_MELT);
        let mut dispatcher = ExperimentDispatcher::new(&path, Instrument::Cd, ExperimentType::Ph)
            .expect("combination exists");
        let error = dispatcher
            .process(&cd_params(), &ProcessOptions::default())
            .expect_err("file holds a melt");
        assert_eq!(error.category(), AvivErrorCategory::Format);
        assert_eq!(error.stage(), Some(PipelineStage::Loaded));
        assert!(error.message().starts_with("instrument/experiment mismatch"));
    }

    #[test]
    fn preview_stops_before_corrections() {
        let (_temp, path) = staged(CD_MELT);
        let previewed = preview(&path).expect("preview runs");
        assert_eq!(previewed.descriptor.instrument, Instrument::Cd);
        assert_eq!(previewed.channels.len(), 1);
        assert!(previewed.channels[0].correction_log().is_empty());
        assert_eq!(previewed.config.float("wavelength"), Some(222.0));
    }

    #[test]
    fn annotations_follow_the_experiment_block() {
        let (_temp, path) = staged(CD_MELT);
        let options = ProcessOptions {
            column_width: 10,
            annotations: vec!["Buffer: 25 mM phosphate".to_string()],
        };
        let mut processed = process_file(&path, &cd_params(), &options).expect("melt processes");
        processed.annotate("Checked by: lab");

        let output = processed.output();
        let buffer = output.find("# Buffer: 25 mM phosphate").expect("annotation present");
        let config = output.find("# ----- Instrument configuration").expect("config block");
        assert!(buffer < config);
        assert!(output.contains("# Checked by: lab\n"));
        assert!(processed.table().starts_with("              s_temp"));
    }
}
