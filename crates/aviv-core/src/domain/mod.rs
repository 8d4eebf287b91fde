pub mod errors;
pub mod params;

pub use errors::{AvivError, AvivErrorCategory, AvivResult};
pub use params::{
    ParamKind, ParamValue, ParameterBundle, ParameterBundleError, ParameterSpec, Requirement,
};

use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Instrument {
    #[serde(rename = "CD")]
    Cd,
    #[serde(rename = "ATF")]
    Atf,
}

impl Instrument {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cd => "CD",
            Self::Atf => "ATF",
        }
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ExperimentType {
    Titration,
    #[serde(rename = "pH")]
    Ph,
    Temperature,
    Wavelength,
}

impl ExperimentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Titration => "Titration",
            Self::Ph => "pH",
            Self::Temperature => "Temperature",
            Self::Wavelength => "Wavelength",
        }
    }

    /// Matches the experiment-type string written by the instrument software.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "Titration" => Some(Self::Titration),
            "pH" => Some(Self::Ph),
            "Temperature" => Some(Self::Temperature),
            "Wavelength" => Some(Self::Wavelength),
            _ => None,
        }
    }
}

impl Display for ExperimentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// The (instrument, experiment) pair read from a file header. Only used as
/// a dispatch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExperimentDescriptor {
    pub instrument: Instrument,
    pub experiment: String,
}

impl ExperimentDescriptor {
    pub fn new(instrument: Instrument, experiment: impl Into<String>) -> Self {
        Self {
            instrument,
            experiment: experiment.into(),
        }
    }

    pub fn experiment_type(&self) -> Option<ExperimentType> {
        ExperimentType::from_token(&self.experiment)
    }
}

impl Display for ExperimentDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.instrument, self.experiment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChannelRole {
    #[serde(rename = "sample")]
    Sample,
    #[serde(rename = "reference")]
    Reference,
}

impl ChannelRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sample => "sample",
            Self::Reference => "reference",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Sample => "Sample",
            Self::Reference => "Reference",
        }
    }

    /// Column prefix used in the rendered table.
    pub const fn column_prefix(self) -> &'static str {
        match self {
            Self::Sample => "s_",
            Self::Reference => "r_",
        }
    }
}

impl Display for ChannelRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineStage {
    #[default]
    Created,
    InstrumentConfigured,
    ExperimentConfigured,
    Loaded,
    ConfigExtracted,
    DataExtracted,
    ChannelsBuilt,
    Corrected,
    Rendered,
    Failed,
}

impl PipelineStage {
    pub const ORDER: [PipelineStage; 9] = [
        Self::Created,
        Self::InstrumentConfigured,
        Self::ExperimentConfigured,
        Self::Loaded,
        Self::ConfigExtracted,
        Self::DataExtracted,
        Self::ChannelsBuilt,
        Self::Corrected,
        Self::Rendered,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::InstrumentConfigured => "InstrumentConfigured",
            Self::ExperimentConfigured => "ExperimentConfigured",
            Self::Loaded => "Loaded",
            Self::ConfigExtracted => "ConfigExtracted",
            Self::DataExtracted => "DataExtracted",
            Self::ChannelsBuilt => "ChannelsBuilt",
            Self::Corrected => "Corrected",
            Self::Rendered => "Rendered",
            Self::Failed => "Failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rendered | Self::Failed)
    }

    /// The only stage a run may move to next; `None` for terminal stages.
    pub fn successor(self) -> Option<Self> {
        let index = Self::ORDER.iter().position(|stage| *stage == self)?;
        Self::ORDER.get(index + 1).copied()
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ExperimentDescriptor, ExperimentType, Instrument, PipelineStage};

    #[test]
    fn experiment_tokens_round_trip_through_display() {
        for experiment in [
            ExperimentType::Titration,
            ExperimentType::Ph,
            ExperimentType::Temperature,
            ExperimentType::Wavelength,
        ] {
            assert_eq!(ExperimentType::from_token(experiment.as_str()), Some(experiment));
        }
        assert_eq!(ExperimentType::from_token("Kinetics"), None);
    }

    #[test]
    fn descriptor_keeps_unrecognized_experiment_strings() {
        let descriptor = ExperimentDescriptor::new(Instrument::Atf, "Kinetics");
        assert_eq!(descriptor.experiment_type(), None);
        assert_eq!(descriptor.to_string(), "ATF Kinetics");
    }

    #[test]
    fn stage_order_is_linear_and_ends_in_rendered() {
        let mut stage = PipelineStage::Created;
        let mut visited = vec![stage];
        while let Some(next) = stage.successor() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, PipelineStage::ORDER.to_vec());
        assert!(stage.is_terminal());
        assert_eq!(PipelineStage::Failed.successor(), None);
    }
}
