//! The two strategy axes of a run.
//!
//! An [`InstrumentProfile`] knows which columns and configuration tags a
//! particular instrument writes and how to turn them into channels. An
//! [`ExperimentProfile`] adds the experiment's own columns and fixes the
//! correction sequence and the output layout. The dispatcher composes one of
//! each; neither knows about the other beyond the read-only instrument view
//! the experiment receives.

pub mod experiment;
pub mod instrument;

pub use experiment::{ExperimentProfile, TitrationSettings};
pub use instrument::{AtfChannels, InstrumentProfile};

use crate::reader::{ColumnRequest, ConfigField, SeriesTarget};

/// Everything a profile pair wants pulled out of the input file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionPlan {
    config_fields: Vec<ConfigField>,
    columns: Vec<ColumnRequest>,
}

impl ExtractionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: ConfigField) {
        self.config_fields.push(field);
    }

    /// Removes a previously declared config field, e.g. a temperature set
    /// point that the data columns already report per row.
    pub fn drop_field(&mut self, source_tag: &str) {
        self.config_fields.retain(|field| field.source_tag != source_tag);
    }

    pub fn request(&mut self, column: &'static str, target: SeriesTarget) {
        self.columns.push(ColumnRequest::new(column, target));
    }

    pub fn config_fields(&self) -> &[ConfigField] {
        &self.config_fields
    }

    pub fn columns(&self) -> &[ColumnRequest] {
        &self.columns
    }
}
