//! Extraction and correction pipeline for Aviv CD and ATF instrument files.

pub mod channel;
pub mod denaturant;
pub mod domain;
pub mod pipeline;
pub mod profiles;
pub mod reader;
pub mod render;

pub use channel::{Channel, ChannelSeries, Series};
pub use domain::{
    AvivError, AvivErrorCategory, AvivResult, ExperimentDescriptor, ExperimentType, Instrument,
    ParamValue, ParameterBundle, PipelineStage,
};
pub use pipeline::{
    ExperimentDispatcher, PreviewedExperiment, ProcessOptions, ProcessedExperiment, preview,
    process_file,
};
