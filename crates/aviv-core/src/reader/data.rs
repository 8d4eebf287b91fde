use super::InstrumentFile;
use crate::domain::{AvivError, AvivResult};
use std::collections::BTreeMap;
use tracing::warn;

pub const DATA_START_TAG: &str = "$MDCDA";
pub const DATA_END_TAG: &str = "$ENDDA";

/// Column names the instrument software has renamed between releases.
/// Lookups go both ways.
pub const ALTERNATE_COLUMN_NAMES: [(&str, &str); 1] = [("CD_Error", "Error")];

pub fn alternate_column_name(column: &str) -> Option<&'static str> {
    ALTERNATE_COLUMN_NAMES.iter().find_map(|(primary, alternate)| {
        if *primary == column {
            Some(*alternate)
        } else if *alternate == column {
            Some(*primary)
        } else {
            None
        }
    })
}

/// Logical arrays a profile can ask the data block for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesTarget {
    AllX,
    SampleX,
    ReferenceX,
    CdSignal,
    CdError,
    SampleSignal,
    ReferenceSignal,
    QcSignal,
    DarkSignal,
    Concentrations,
    ShotSize,
}

impl SeriesTarget {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllX => "all_x",
            Self::SampleX => "sample_x",
            Self::ReferenceX => "reference_x",
            Self::CdSignal => "cd_signal",
            Self::CdError => "cd_err",
            Self::SampleSignal => "sample_y",
            Self::ReferenceSignal => "reference_y",
            Self::QcSignal => "qc_signal",
            Self::DarkSignal => "dark_signal",
            Self::Concentrations => "concentrations",
            Self::ShotSize => "shot_size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRequest {
    pub column: &'static str,
    pub target: SeriesTarget,
}

impl ColumnRequest {
    pub const fn new(column: &'static str, target: SeriesTarget) -> Self {
        Self { column, target }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedData {
    series: BTreeMap<SeriesTarget, Vec<f64>>,
    resolved_columns: BTreeMap<SeriesTarget, String>,
    missing_columns: Vec<String>,
    row_count: usize,
}

impl ExtractedData {
    pub fn get(&self, target: SeriesTarget) -> Option<&[f64]> {
        self.series.get(&target).map(Vec::as_slice)
    }

    pub fn contains(&self, target: SeriesTarget) -> bool {
        self.series.contains_key(&target)
    }

    /// File column each populated target was read from, after alternate-name
    /// resolution.
    pub fn resolved_column(&self, target: SeriesTarget) -> Option<&str> {
        self.resolved_columns.get(&target).map(String::as_str)
    }

    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Reads the requested columns out of the `$MDCDA`..`$ENDDA` block.
///
/// Columns absent from the header (under both primary and alternate names)
/// are skipped with a warning and their target stays unpopulated. A cell
/// that cannot be read as a float aborts extraction.
pub fn extract_data(file: &InstrumentFile, requests: &[ColumnRequest]) -> AvivResult<ExtractedData> {
    let (header_index, end) = locate_data_block(file)?;
    let lines = file.lines();

    let header: Vec<&str> = lines[header_index].split_whitespace().collect();
    let column_positions: BTreeMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(position, name)| (*name, position))
        .collect();

    let mut resolved: Vec<(SeriesTarget, String, usize)> = Vec::new();
    let mut missing_columns = Vec::new();
    for request in deduplicate(requests) {
        let found = column_positions
            .get(request.column)
            .map(|position| (request.column, *position))
            .or_else(|| {
                let alternate = alternate_column_name(request.column)?;
                column_positions
                    .get(alternate)
                    .map(|position| (alternate, *position))
            });

        match found {
            Some((column, position)) => resolved.push((request.target, column.to_string(), position)),
            None => {
                warn!(
                    file = %file.path().display(),
                    column = request.column,
                    target = request.target.as_str(),
                    "data column not found; leaving target unpopulated"
                );
                missing_columns.push(request.column.to_string());
            }
        }
    }

    let mut series: BTreeMap<SeriesTarget, Vec<f64>> = resolved
        .iter()
        .map(|(target, _, _)| (*target, Vec::new()))
        .collect();
    let mut row_count = 0;

    for (line_number, line) in lines.iter().enumerate().take(end).skip(header_index + 1) {
        let cells: Vec<&str> = line.split_whitespace().collect();
        if cells.is_empty() {
            continue;
        }
        for (target, column, position) in &resolved {
            let value = cells
                .get(*position)
                .and_then(|cell| cell.parse::<f64>().ok())
                .ok_or_else(|| {
                    AvivError::format(
                        "FORMAT.BAD_DATA_CELL",
                        format!(
                            "problem with \"{}\" column on line {} of '{}': {}",
                            column,
                            line_number + 1,
                            file.path().display(),
                            line.trim_end()
                        ),
                    )
                })?;
            if let Some(values) = series.get_mut(target) {
                values.push(value);
            }
        }
        row_count += 1;
    }

    Ok(ExtractedData {
        series,
        resolved_columns: resolved
            .into_iter()
            .map(|(target, column, _)| (target, column))
            .collect(),
        missing_columns,
        row_count,
    })
}

/// Returns (column-header line, end-of-data line). The header sits on the
/// line after `$MDCDA`; rows start on the line after that.
fn locate_data_block(file: &InstrumentFile) -> AvivResult<(usize, usize)> {
    let start = file.tag_position(DATA_START_TAG).ok_or_else(|| {
        AvivError::format(
            "FORMAT.MISSING_DATA",
            format!("no {} tag in '{}'", DATA_START_TAG, file.path().display()),
        )
    })?;
    let end = file.tag_position(DATA_END_TAG).ok_or_else(|| {
        AvivError::format(
            "FORMAT.MISSING_DATA",
            format!("no {} tag in '{}'", DATA_END_TAG, file.path().display()),
        )
    })?;

    let header_index = start + 1;
    if end <= header_index {
        return Err(AvivError::format(
            "FORMAT.MISSING_DATA",
            format!(
                "{} must follow the column header after {} in '{}'",
                DATA_END_TAG,
                DATA_START_TAG,
                file.path().display()
            ),
        ));
    }
    Ok((header_index, end))
}

/// A later request for the same column or target replaces the earlier one.
fn deduplicate(requests: &[ColumnRequest]) -> Vec<ColumnRequest> {
    let mut unique: Vec<ColumnRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        unique.retain(|existing| existing.column != request.column && existing.target != request.target);
        unique.push(*request);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::{ColumnRequest, SeriesTarget, alternate_column_name, extract_data};
    use crate::domain::AvivErrorCategory;
    use crate::reader::InstrumentFile;

    fn file(header: &str, rows: &[&str]) -> InstrumentFile {
        let mut source = String::from("Aviv experiment file\nEXPERIMENT TYPE: Titration\n$CDHV: 450\n$MDCDA\n");
        source.push_str(header);
        source.push('\n');
        for row in rows {
            source.push_str(row);
            source.push('\n');
        }
        source.push_str("$ENDDA\n");
        InstrumentFile::from_source("data.dat", &source).expect("file indexes")
    }

    #[test]
    fn all_requested_columns_have_row_count_length() {
        let file = file(
            "X CD_Signal CD_Error Samp._Conc.",
            &["0.0 -10.0 0.1 1.0", "0.5 -9.0 0.1 0.9", "1.0 -8.0 0.2 0.8"],
        );
        let data = extract_data(
            &file,
            &[
                ColumnRequest::new("X", SeriesTarget::AllX),
                ColumnRequest::new("CD_Signal", SeriesTarget::CdSignal),
                ColumnRequest::new("CD_Error", SeriesTarget::CdError),
                ColumnRequest::new("Samp._Conc.", SeriesTarget::Concentrations),
            ],
        )
        .expect("data extracts");

        assert_eq!(data.row_count(), 3);
        for target in [
            SeriesTarget::AllX,
            SeriesTarget::CdSignal,
            SeriesTarget::CdError,
            SeriesTarget::Concentrations,
        ] {
            assert_eq!(data.get(target).expect("populated").len(), 3);
        }
        assert_eq!(data.get(SeriesTarget::Concentrations), Some(&[1.0, 0.9, 0.8][..]));
    }

    #[test]
    fn missing_columns_leave_targets_unpopulated() {
        let file = file("X CD_Signal", &["0.0 -10.0", "0.5 -9.0"]);
        let data = extract_data(
            &file,
            &[
                ColumnRequest::new("X", SeriesTarget::AllX),
                ColumnRequest::new("Inj._Vol._ul.", SeriesTarget::ShotSize),
            ],
        )
        .expect("missing optional column is not fatal");

        assert!(data.contains(SeriesTarget::AllX));
        assert!(!data.contains(SeriesTarget::ShotSize));
        assert_eq!(data.missing_columns(), ["Inj._Vol._ul.".to_string()]);
    }

    #[test]
    fn renamed_error_column_is_found_under_its_alternate() {
        let file = file("X CD_Signal Error", &["0.0 -10.0 0.3"]);
        let data = extract_data(&file, &[ColumnRequest::new("CD_Error", SeriesTarget::CdError)])
            .expect("data extracts");

        assert_eq!(data.get(SeriesTarget::CdError), Some(&[0.3][..]));
        assert_eq!(data.resolved_column(SeriesTarget::CdError), Some("Error"));
        assert_eq!(alternate_column_name("Error"), Some("CD_Error"));
    }

    #[test]
    fn bad_cell_names_column_and_line() {
        let file = file("X CD_Signal", &["0.0 -10.0", "0.5 oops"]);
        let error = extract_data(&file, &[ColumnRequest::new("CD_Signal", SeriesTarget::CdSignal)])
            .expect_err("bad cell should fail");

        assert_eq!(error.category(), AvivErrorCategory::Format);
        assert_eq!(error.code(), "FORMAT.BAD_DATA_CELL");
        assert!(error.message().contains("\"CD_Signal\""));
        assert!(error.message().contains("oops"));
    }

    #[test]
    fn missing_data_block_is_a_format_error() {
        let file = InstrumentFile::from_source("bare.dat", "x\nEXPERIMENT TYPE: pH\n$CDHV: 1\n")
            .expect("file indexes");
        let error = extract_data(&file, &[]).expect_err("no data block should fail");
        assert_eq!(error.code(), "FORMAT.MISSING_DATA");
    }
}
