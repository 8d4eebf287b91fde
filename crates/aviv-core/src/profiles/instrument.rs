use super::ExtractionPlan;
use crate::channel::{Channel, ChannelSeries, ProteinProperties};
use crate::domain::{
    AvivError, AvivResult, ChannelRole, Instrument, ParamKind, ParameterBundle, ParameterSpec,
};
use crate::reader::{ConfigField, ExtractedData, SeriesTarget};
use tracing::{debug, warn};

pub const CD_PARAMETERS: [ParameterSpec; 4] = [
    ParameterSpec::required("num_residues", ParamKind::Int),
    ParameterSpec::required("molec_weight", ParamKind::Float),
    ParameterSpec::required("protein_conc", ParamKind::Float),
    ParameterSpec::required("path_length", ParamKind::Float),
];

/// `sample` and `reference` are individually optional; at least one has to
/// be switched on.
pub const ATF_PARAMETERS: [ParameterSpec; 3] = [
    ParameterSpec::optional("sample", ParamKind::Bool),
    ParameterSpec::optional("reference", ParamKind::Bool),
    ParameterSpec::optional("qc_corr", ParamKind::Bool),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtfChannels {
    pub sample: bool,
    pub reference: bool,
    pub qc_corr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstrumentProfile {
    Cd(ProteinProperties),
    Atf(AtfChannels),
}

impl InstrumentProfile {
    pub fn parameter_specs(instrument: Instrument) -> &'static [ParameterSpec] {
        match instrument {
            Instrument::Cd => &CD_PARAMETERS,
            Instrument::Atf => &ATF_PARAMETERS,
        }
    }

    pub fn from_parameters(instrument: Instrument, params: &ParameterBundle) -> AvivResult<Self> {
        params.validate(Self::parameter_specs(instrument), &[])?;

        let profile = match instrument {
            Instrument::Cd => Self::Cd(ProteinProperties {
                num_residues: params.require_int("num_residues")?,
                molec_weight: params.require_float("molec_weight")?,
                protein_conc: params.require_float("protein_conc")?,
                path_length: params.require_float("path_length")?,
            }),
            Instrument::Atf => {
                let channels = AtfChannels {
                    sample: params.flag("sample")?.unwrap_or(false),
                    reference: params.flag("reference")?.unwrap_or(false),
                    qc_corr: params.flag("qc_corr")?.unwrap_or(false),
                };
                if !channels.sample && !channels.reference {
                    return Err(AvivError::configuration(
                        "CONFIG.NO_CHANNELS",
                        "at least one of sample or reference must be enabled for ATF experiments",
                    ));
                }
                Self::Atf(channels)
            }
        };

        debug!(instrument = %profile.instrument(), channels = ?profile.enabled_channels(), "instrument configured");
        Ok(profile)
    }

    pub fn instrument(&self) -> Instrument {
        match self {
            Self::Cd(_) => Instrument::Cd,
            Self::Atf(_) => Instrument::Atf,
        }
    }

    /// Channels the caller asked for. ATF channels that fail to build are
    /// dropped later, so the built set can be smaller than this.
    pub fn enabled_channels(&self) -> Vec<ChannelRole> {
        match self {
            Self::Cd(_) => vec![ChannelRole::Sample],
            Self::Atf(channels) => {
                let mut roles = Vec::with_capacity(2);
                if channels.sample {
                    roles.push(ChannelRole::Sample);
                }
                if channels.reference {
                    roles.push(ChannelRole::Reference);
                }
                roles
            }
        }
    }

    pub fn protein(&self) -> Option<&ProteinProperties> {
        match self {
            Self::Cd(protein) => Some(protein),
            Self::Atf(_) => None,
        }
    }

    pub fn qc_correction(&self) -> bool {
        matches!(self, Self::Atf(channels) if channels.qc_corr)
    }

    pub fn declare_extraction(&self, plan: &mut ExtractionPlan) {
        match self {
            Self::Cd(_) => {
                plan.request("CD_Signal", SeriesTarget::CdSignal);
                plan.request("CD_Error", SeriesTarget::CdError);
                plan.add_field(ConfigField::float("$MONOWL", "wavelength", "Wavelength"));
                plan.add_field(ConfigField::float("$MONOBW", "bandwidth", "Bandwidth"));
                plan.add_field(ConfigField::float("$TEMPSP", "sample_temperature", "Sample temperature"));
            }
            Self::Atf(channels) => {
                plan.request("QC_Signal", SeriesTarget::QcSignal);
                plan.request("PMT_Signal_(Dark)", SeriesTarget::DarkSignal);
                plan.add_field(ConfigField::float("$EXWL", "excitation_wavelength", "Excitation wavelength"));
                plan.add_field(ConfigField::float("$EMWL", "emission_wavelength", "Emission wavelength"));
                plan.add_field(ConfigField::float("$EXBW", "excitation_bandwidth", "Excitation bandwidth"));
                plan.add_field(ConfigField::float("$EMBW", "emission_bandwidth", "Emission bandwidth"));
                if channels.sample {
                    plan.add_field(ConfigField::float("$TEMPSP", "sample_temperature", "Sample temperature"));
                    plan.request("Samp._PMT_Raw_Sig.", SeriesTarget::SampleSignal);
                }
                if channels.reference {
                    plan.add_field(ConfigField::float("$TEMPREFSP", "ref_temperature", "Reference temperature"));
                    plan.request("Ref._PMT_Raw_Sig.", SeriesTarget::ReferenceSignal);
                }
            }
        }
    }

    pub fn build_channels(&self, data: &ExtractedData) -> AvivResult<Vec<Channel>> {
        match self {
            Self::Cd(_) => {
                let channel = Channel::new(
                    ChannelRole::Sample,
                    owned(data, SeriesTarget::AllX),
                    owned(data, SeriesTarget::CdSignal),
                    ChannelSeries {
                        y_err: optional(data, SeriesTarget::CdError),
                        concentrations: optional(data, SeriesTarget::Concentrations),
                        shot_size: optional(data, SeriesTarget::ShotSize),
                        ..ChannelSeries::default()
                    },
                )?;
                Ok(vec![channel])
            }
            Self::Atf(_) => {
                let mut channels = Vec::with_capacity(2);
                for role in self.enabled_channels() {
                    let (x_target, y_target) = match role {
                        ChannelRole::Sample => (SeriesTarget::SampleX, SeriesTarget::SampleSignal),
                        ChannelRole::Reference => (SeriesTarget::ReferenceX, SeriesTarget::ReferenceSignal),
                    };
                    let x = data
                        .get(x_target)
                        .or_else(|| data.get(SeriesTarget::AllX))
                        .map(<[f64]>::to_vec)
                        .unwrap_or_default();

                    let built = Channel::new(
                        role,
                        x,
                        owned(data, y_target),
                        ChannelSeries {
                            concentrations: optional(data, SeriesTarget::Concentrations),
                            dark_signal: optional(data, SeriesTarget::DarkSignal),
                            qc_signal: optional(data, SeriesTarget::QcSignal),
                            shot_size: optional(data, SeriesTarget::ShotSize),
                            ..ChannelSeries::default()
                        },
                    );
                    match built {
                        Ok(channel) => channels.push(channel),
                        Err(error) => {
                            warn!(channel = role.as_str(), error = %error, "dropping ATF channel");
                        }
                    }
                }

                if channels.is_empty() {
                    return Err(AvivError::format(
                        "FORMAT.NO_USABLE_CHANNELS",
                        "no usable channels: every enabled ATF channel is missing its x or signal data",
                    ));
                }
                Ok(channels)
            }
        }
    }
}

fn owned(data: &ExtractedData, target: SeriesTarget) -> Vec<f64> {
    data.get(target).map(<[f64]>::to_vec).unwrap_or_default()
}

fn optional(data: &ExtractedData, target: SeriesTarget) -> Option<Vec<f64>> {
    data.get(target).map(<[f64]>::to_vec)
}
