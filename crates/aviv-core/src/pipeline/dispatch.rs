use crate::domain::{
    AvivError, AvivResult, ExperimentDescriptor, ExperimentType, Instrument, ParameterBundle,
    ParameterSpec, ParamValue,
};
use crate::profiles::{ExperimentProfile, InstrumentProfile};

/// Every (instrument, experiment) pair that has a processing route.
pub const SUPPORTED_COMBINATIONS: [(Instrument, ExperimentType); 7] = [
    (Instrument::Cd, ExperimentType::Titration),
    (Instrument::Cd, ExperimentType::Ph),
    (Instrument::Cd, ExperimentType::Temperature),
    (Instrument::Cd, ExperimentType::Wavelength),
    (Instrument::Atf, ExperimentType::Titration),
    (Instrument::Atf, ExperimentType::Ph),
    (Instrument::Atf, ExperimentType::Temperature),
];

pub fn combination_supported(instrument: Instrument, experiment: ExperimentType) -> bool {
    SUPPORTED_COMBINATIONS.contains(&(instrument, experiment))
}

pub fn unsupported_combination_error(instrument: Instrument, experiment: &str) -> AvivError {
    AvivError::unsupported(
        "UNSUPPORTED.COMBINATION",
        format!(
            "no processing route for {} '{}' experiments",
            instrument, experiment
        ),
    )
}

/// Maps a descriptor read from a file header onto the dispatch table.
pub fn resolve_combination(descriptor: &ExperimentDescriptor) -> AvivResult<(Instrument, ExperimentType)> {
    match descriptor.experiment_type() {
        Some(experiment) if combination_supported(descriptor.instrument, experiment) => {
            Ok((descriptor.instrument, experiment))
        }
        _ => Err(unsupported_combination_error(
            descriptor.instrument,
            &descriptor.experiment,
        )),
    }
}

/// Parameter names read by the pair, instrument first.
pub fn parameter_specs(instrument: Instrument, experiment: ExperimentType) -> Vec<ParameterSpec> {
    let mut specs = InstrumentProfile::parameter_specs(instrument).to_vec();
    specs.extend_from_slice(ExperimentProfile::parameter_specs(experiment));
    specs
}

/// Neutral values for every non-optional parameter, with both ATF channels
/// switched on so a preview sees whatever the file holds.
pub fn placeholder_parameters(instrument: Instrument, experiment: ExperimentType) -> ParameterBundle {
    let mut bundle = ParameterBundle::placeholders(&parameter_specs(instrument, experiment));
    if instrument == Instrument::Atf {
        bundle.insert("sample", ParamValue::Bool(true));
        bundle.insert("reference", ParamValue::Bool(true));
    }
    bundle
}
