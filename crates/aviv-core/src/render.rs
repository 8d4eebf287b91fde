use crate::channel::{Channel, Series};
use crate::domain::{AvivError, AvivResult, ExperimentDescriptor};
use crate::reader::ExtractedConfig;
use std::fs;
use std::path::Path;

pub const DEFAULT_COLUMN_WIDTH: usize = 12;
pub const TABLE_PRECISION: usize = 3;
pub const HEADER_PREFIX: &str = "# ";

/// Right-aligned fixed-point cell. A width of 0 gives the bare number.
pub fn fixed_cell(value: f64, width: usize, precision: usize) -> String {
    format!("{value:>width$.precision$}")
}

/// Unix newlines, and the last line always terminated.
pub fn with_unix_newlines(rendered: &str) -> String {
    let mut out = rendered.replace("\r\n", "\n").replace('\r', "\n");
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Writes a rendered experiment to `path`, creating missing parent
/// directories first.
pub fn write_rendered(path: &Path, rendered: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, with_unix_newlines(rendered))
}

/// One output column per channel: a header suffix and the channel series
/// printed underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputColumn {
    pub label: &'static str,
    pub series: Series,
}

impl OutputColumn {
    pub const fn new(label: &'static str, series: Series) -> Self {
        Self { label, series }
    }
}

/// Fixed-width table: a header row of `s_`/`r_` prefixed labels, then one
/// row per data point led by its zero-based index.
pub fn render_table(channels: &[Channel], columns: &[OutputColumn], width: usize) -> AvivResult<String> {
    let mut header = vec![" ".to_string()];
    let mut selected: Vec<&[f64]> = Vec::with_capacity(channels.len() * columns.len());
    for channel in channels {
        for column in columns {
            header.push(format!("{}{}", channel.role().column_prefix(), column.label));
            let values = channel.series(column.series).ok_or_else(|| {
                AvivError::internal(
                    "INTERNAL.MISSING_SERIES",
                    format!(
                        "{} channel has no {:?} series for output column '{}'",
                        channel.name(),
                        column.series,
                        column.label
                    ),
                )
            })?;
            selected.push(values);
        }
    }

    let rows = selected.first().map_or(0, |values| values.len());
    if let Some(short) = selected.iter().position(|values| values.len() != rows) {
        return Err(AvivError::internal(
            "INTERNAL.RAGGED_OUTPUT",
            format!(
                "output column '{}' has {} rows, expected {}",
                header[short + 1].trim(),
                selected[short].len(),
                rows
            ),
        ));
    }

    let mut out = String::new();
    for cell in &header {
        out.push_str(&format!("{cell:>width$}"));
    }
    out.push('\n');

    for row in 0..rows {
        out.push_str(&format!("{row:>width$}"));
        for values in &selected {
            out.push_str(&fixed_cell(values[row], width, TABLE_PRECISION));
        }
        out.push('\n');
    }
    Ok(out)
}

pub struct ProvenanceHeader<'a> {
    pub input_file: &'a Path,
    pub descriptor: &'a ExperimentDescriptor,
    pub annotations: &'a [String],
    pub config: &'a ExtractedConfig,
    pub channels: &'a [Channel],
}

impl ProvenanceHeader<'_> {
    /// Every line is prefixed with `# ` (blank separators get a bare `#`) so
    /// R skips the whole block as comments.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = vec![
            "----- Experiment information -----".to_string(),
            format!("Input file: {}", self.input_file.display()),
            format!("Instrument: {}", self.descriptor.instrument),
            format!("Experiment: {}", self.descriptor.experiment),
            String::new(),
        ];

        if !self.annotations.is_empty() {
            for annotation in self.annotations {
                lines.extend(annotation.lines().map(str::to_string));
            }
            lines.push(String::new());
        }

        lines.push("----- Instrument configuration -----".to_string());
        lines.extend(self.config.fields().iter().map(ToString::to_string));
        lines.push(String::new());

        for channel in self.channels {
            lines.push(format!("----- {} channel processing -----", channel.role().title()));
            for record in channel.correction_log() {
                lines.extend(
                    record
                        .log
                        .lines()
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            lines.push(String::new());
        }

        let mut out = String::new();
        for line in lines {
            if line.is_empty() {
                out.push_str(HEADER_PREFIX.trim_end());
            } else {
                out.push_str(HEADER_PREFIX);
                out.push_str(&line);
            }
            out.push('\n');
        }
        out
    }
}
