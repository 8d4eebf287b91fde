use super::{ExtractionPlan, InstrumentProfile};
use crate::channel::{BlankReference, Channel, DenaturantValues, Series};
use crate::domain::{
    AvivError, AvivResult, ChannelRole, ExperimentType, Instrument, ParamKind, ParameterBundle,
    ParameterSpec,
};
use crate::reader::{ConfigField, ExtractedConfig, SeriesTarget};
use crate::render::OutputColumn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TITRATION_PARAMETERS: [ParameterSpec; 7] = [
    ParameterSpec::with_channel("sam_buf", ParamKind::Float, ChannelRole::Sample),
    ParameterSpec::with_channel("sam_titr", ParamKind::Float, ChannelRole::Sample),
    ParameterSpec::with_channel("ref_buf", ParamKind::Float, ChannelRole::Reference),
    ParameterSpec::with_channel("ref_titr", ParamKind::Float, ChannelRole::Reference),
    ParameterSpec::optional("init_conc", ParamKind::Float),
    ParameterSpec::optional("titrant_conc", ParamKind::Float),
    ParameterSpec::optional("cell_vol", ParamKind::Float),
];

pub const WAVELENGTH_PARAMETERS: [ParameterSpec; 1] =
    [ParameterSpec::optional("blank_file", ParamKind::Text)];

/// Blanks per channel as (buffer, titrant), plus any caller overrides of the
/// instrument's titrant settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitrationSettings {
    pub blanks: BTreeMap<ChannelRole, (f64, f64)>,
    pub denaturant: DenaturantValues,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentProfile {
    Titration(TitrationSettings),
    Ph,
    Temperature,
    Wavelength { blank_file: Option<PathBuf> },
}

impl ExperimentProfile {
    pub fn parameter_specs(experiment: ExperimentType) -> &'static [ParameterSpec] {
        match experiment {
            ExperimentType::Titration => &TITRATION_PARAMETERS,
            ExperimentType::Wavelength => &WAVELENGTH_PARAMETERS,
            ExperimentType::Ph | ExperimentType::Temperature => &[],
        }
    }

    pub fn from_parameters(
        experiment: ExperimentType,
        instrument: &InstrumentProfile,
        params: &ParameterBundle,
    ) -> AvivResult<Self> {
        if experiment == ExperimentType::Wavelength && instrument.instrument() == Instrument::Atf {
            return Err(AvivError::unsupported(
                "UNSUPPORTED.ATF_WAVELENGTH",
                "wavelength scans cannot be processed for ATF experiments",
            ));
        }

        let channels = instrument.enabled_channels();
        params.validate(Self::parameter_specs(experiment), &channels)?;

        let profile = match experiment {
            ExperimentType::Titration => {
                let mut blanks = BTreeMap::new();
                for role in channels {
                    let (buffer, titrant) = match role {
                        ChannelRole::Sample => ("sam_buf", "sam_titr"),
                        ChannelRole::Reference => ("ref_buf", "ref_titr"),
                    };
                    blanks.insert(role, (params.require_float(buffer)?, params.require_float(titrant)?));
                }
                Self::Titration(TitrationSettings {
                    blanks,
                    denaturant: DenaturantValues {
                        initial_conc: params.float("init_conc")?,
                        titrant_conc: params.float("titrant_conc")?,
                        cell_volume: params.float("cell_vol")?,
                    },
                })
            }
            ExperimentType::Ph => Self::Ph,
            ExperimentType::Temperature => Self::Temperature,
            ExperimentType::Wavelength => Self::Wavelength {
                blank_file: params.text("blank_file")?.map(PathBuf::from),
            },
        };

        debug!(experiment = %profile.experiment_type(), "experiment configured");
        Ok(profile)
    }

    pub fn experiment_type(&self) -> ExperimentType {
        match self {
            Self::Titration(_) => ExperimentType::Titration,
            Self::Ph => ExperimentType::Ph,
            Self::Temperature => ExperimentType::Temperature,
            Self::Wavelength { .. } => ExperimentType::Wavelength,
        }
    }

    pub fn blank_file(&self) -> Option<&Path> {
        match self {
            Self::Wavelength { blank_file } => blank_file.as_deref(),
            _ => None,
        }
    }

    /// Runs after the instrument has declared its own fields, so it can drop
    /// instrument fields the experiment makes redundant.
    pub fn declare_extraction(&self, instrument: &InstrumentProfile, plan: &mut ExtractionPlan) {
        match (self, instrument) {
            (Self::Titration(_), _) => {
                plan.add_field(ConfigField::float("$CONCSYRTITRANT", "titrant_conc", "Titrant concentration"));
                plan.add_field(ConfigField::float("$CONCINITTITRANT", "init_conc", "Initial titrant"));
                plan.add_field(ConfigField::float("$CONCCELLVOL", "cell_vol", "Cuvette volume"));
                plan.add_field(ConfigField::float("$CONCTARGET2", "final_titr_conc", "Final [titrant]"));
                plan.request("X", SeriesTarget::AllX);
                plan.request("Samp._Conc.", SeriesTarget::Concentrations);
                plan.request("Inj._Vol._ul.", SeriesTarget::ShotSize);
            }
            (Self::Ph, InstrumentProfile::Atf(channels)) => {
                plan.request("pH_Inj._Volumes", SeriesTarget::ShotSize);
                plan.request("Samp._Conc.", SeriesTarget::Concentrations);
                if channels.sample {
                    plan.request("pH_Channel_1", SeriesTarget::SampleX);
                }
                if channels.reference {
                    plan.request("pH_Channel_2", SeriesTarget::ReferenceX);
                }
            }
            (Self::Ph, InstrumentProfile::Cd(_)) => {
                plan.request("pH_Inj._Volumes", SeriesTarget::ShotSize);
                plan.request("Samp._Conc.", SeriesTarget::Concentrations);
                plan.request("X", SeriesTarget::AllX);
            }
            (Self::Temperature, InstrumentProfile::Atf(channels)) => {
                if channels.sample {
                    plan.request("Sample_Temp", SeriesTarget::SampleX);
                    plan.drop_field("$TEMPSP");
                }
                if channels.reference {
                    plan.request("Reference_Temp", SeriesTarget::ReferenceX);
                    plan.drop_field("$TEMPREFSP");
                }
            }
            (Self::Temperature, InstrumentProfile::Cd(_)) => {
                plan.request("X", SeriesTarget::AllX);
                plan.drop_field("$TEMPSP");
            }
            (Self::Wavelength { .. }, _) => {
                plan.request("X", SeriesTarget::AllX);
            }
        }
    }

    /// Applies this experiment's correction sequence to every channel.
    /// `blank` is the raw trace of the blank file, already loaded by the
    /// caller when [`Self::blank_file`] names one.
    pub fn apply_corrections(
        &self,
        instrument: &InstrumentProfile,
        config: &ExtractedConfig,
        channels: &mut [Channel],
        blank: Option<&BlankReference>,
    ) -> AvivResult<()> {
        for channel in channels.iter_mut() {
            match self {
                Self::Titration(settings) => {
                    if !settings.denaturant.is_empty() {
                        let reported = DenaturantValues {
                            initial_conc: config.float("init_conc"),
                            titrant_conc: config.float("titrant_conc"),
                            cell_volume: config.float("cell_vol"),
                        };
                        channel.correct_denaturant(reported, settings.denaturant)?;
                    }
                    if instrument.qc_correction() {
                        channel.correct_dark_qc()?;
                    }
                    let (buffer, titrant) =
                        settings.blanks.get(&channel.role()).copied().ok_or_else(|| {
                            AvivError::configuration(
                                "CONFIG.MISSING_PARAMETER",
                                format!("no buffer/titrant blanks for the {} channel", channel.name()),
                            )
                        })?;
                    channel.correct_titrant_blanks(buffer, titrant);
                    channel.correct_dilution()?;
                    finish_with_normalization(instrument, channel)?;
                }
                Self::Ph => {
                    if instrument.qc_correction() {
                        channel.correct_dark_qc()?;
                    }
                    channel.correct_dilution()?;
                    finish_with_normalization(instrument, channel)?;
                }
                Self::Temperature => {
                    if instrument.qc_correction() {
                        channel.correct_dark_qc()?;
                    }
                    finish_with_normalization(instrument, channel)?;
                }
                Self::Wavelength { .. } => {
                    channel.subtract_blank(blank)?;
                    let protein = instrument.protein().ok_or_else(|| {
                        AvivError::unsupported(
                            "UNSUPPORTED.ATF_WAVELENGTH",
                            "wavelength scans cannot be processed for ATF experiments",
                        )
                    })?;
                    channel.convert_to_mme(protein)?;
                }
            }
        }
        Ok(())
    }

    pub fn output_columns(&self, instrument: &InstrumentProfile) -> Vec<OutputColumn> {
        let axis = match self {
            Self::Titration(_) => "x",
            Self::Ph => "pH",
            Self::Temperature => "temp",
            Self::Wavelength { .. } => "wavelength",
        };

        match (self, instrument.instrument()) {
            (Self::Wavelength { .. }, _) => vec![
                OutputColumn::new(axis, Series::X),
                OutputColumn::new("raw", Series::RawSignal),
                OutputColumn::new("raw_err", Series::RawErr),
                OutputColumn::new("MME", Series::Mme),
                OutputColumn::new("MME_err", Series::MmeErr),
            ],
            (_, Instrument::Cd) => vec![
                OutputColumn::new(axis, Series::X),
                OutputColumn::new("raw", Series::RawSignal),
                OutputColumn::new("raw_err", Series::RawErr),
                OutputColumn::new("norm", Series::Normalized),
                OutputColumn::new("norm_err", Series::NormalizedErr),
                OutputColumn::new("MME", Series::Mme),
                OutputColumn::new("MME_err", Series::MmeErr),
            ],
            (_, Instrument::Atf) => vec![
                OutputColumn::new(axis, Series::X),
                OutputColumn::new("raw", Series::RawSignal),
                OutputColumn::new("norm", Series::Normalized),
            ],
        }
    }
}

/// CD signals are converted to molar ellipticity and normalized inverted;
/// everything else is normalized as is.
fn finish_with_normalization(instrument: &InstrumentProfile, channel: &mut Channel) -> AvivResult<()> {
    match instrument.protein() {
        Some(protein) => {
            channel.convert_to_mme(protein)?;
            channel.normalize(true)?;
        }
        None => {
            channel.normalize(false)?;
        }
    }
    Ok(())
}
