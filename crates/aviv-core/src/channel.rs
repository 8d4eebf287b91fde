//! One physical signal trace and the corrections applied to it.
//!
//! Every correction reads the current `y` (and sometimes `x`), overwrites it,
//! keeps a named snapshot of the result for output selection, and appends a
//! record to the channel's correction log. Order matters: normalization in
//! particular depends on whatever the previous step left in `y`.

use crate::domain::errors::checked_div;
use crate::domain::{AvivError, AvivResult, ChannelRole};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Arrays a channel can hand to the table renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Series {
    X,
    Y,
    YErr,
    RawX,
    RawSignal,
    RawErr,
    QcCorrected,
    TitrantBlankCorrected,
    DilutionCorrected,
    DenaturantX,
    Blanked,
    Mme,
    MmeErr,
    Normalized,
    NormalizedErr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectionStep {
    DarkQc,
    TitrantBlanks,
    Dilution,
    Denaturant,
    BlankFile,
    MolarEllipticity,
    Normalize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionRecord {
    pub step: CorrectionStep,
    pub log: String,
}

/// Optional per-point arrays. Anything left `None` takes a neutral default
/// that leaves the signal unchanged when used.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSeries {
    pub y_err: Option<Vec<f64>>,
    pub concentrations: Option<Vec<f64>>,
    pub dark_signal: Option<Vec<f64>>,
    pub qc_signal: Option<Vec<f64>>,
    pub shot_size: Option<Vec<f64>>,
}

/// Titrant settings as (initial concentration M, stock concentration M,
/// cell volume mL).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DenaturantValues {
    pub initial_conc: Option<f64>,
    pub titrant_conc: Option<f64>,
    pub cell_volume: Option<f64>,
}

impl DenaturantValues {
    pub fn is_empty(&self) -> bool {
        self.initial_conc.is_none() && self.titrant_conc.is_none() && self.cell_volume.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProteinProperties {
    pub num_residues: i64,
    pub molec_weight: f64,
    pub protein_conc: f64,
    pub path_length: f64,
}

/// Raw trace of a blank measurement read through the same extraction path.
#[derive(Debug, Clone, PartialEq)]
pub struct BlankReference {
    pub source: PathBuf,
    pub raw_x: Vec<f64>,
    pub raw_signal: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    role: ChannelRole,
    x: Vec<f64>,
    y: Vec<f64>,
    y_err: Vec<f64>,
    concentrations: Vec<f64>,
    dark_signal: Vec<f64>,
    qc_signal: Vec<f64>,
    shot_size: Vec<f64>,
    raw_x: Vec<f64>,
    raw_signal: Vec<f64>,
    raw_err: Vec<f64>,
    snapshots: BTreeMap<Series, Vec<f64>>,
    log: Vec<CorrectionRecord>,
}

impl Channel {
    pub fn new(role: ChannelRole, x: Vec<f64>, y: Vec<f64>, optional: ChannelSeries) -> AvivResult<Self> {
        if x.is_empty() || y.is_empty() {
            return Err(AvivError::format(
                "FORMAT.EMPTY_CHANNEL",
                format!("no x or y values recorded for channel {}", role),
            ));
        }

        let points = y.len();
        let fill = |values: Option<Vec<f64>>, neutral: f64, name: &str| -> AvivResult<Vec<f64>> {
            let values = values.unwrap_or_else(|| vec![neutral; points]);
            if values.len() != points {
                return Err(AvivError::format(
                    "FORMAT.CHANNEL_LENGTH",
                    format!(
                        "channel {} has {} signal points but {} {} values",
                        role,
                        points,
                        values.len(),
                        name
                    ),
                ));
            }
            Ok(values)
        };

        let x = fill(Some(x), 0.0, "x")?;
        let y_err = fill(optional.y_err, 0.0, "error")?;
        let concentrations = fill(optional.concentrations, 1.0, "concentration")?;
        let dark_signal = fill(optional.dark_signal, 0.0, "dark signal")?;
        let qc_signal = fill(optional.qc_signal, 1.0, "quantum counter")?;
        let shot_size = fill(optional.shot_size, 0.0, "shot size")?;

        Ok(Self {
            role,
            raw_x: x.clone(),
            raw_signal: y.clone(),
            raw_err: y_err.clone(),
            x,
            y,
            y_err,
            concentrations,
            dark_signal,
            qc_signal,
            shot_size,
            snapshots: BTreeMap::new(),
            log: Vec::new(),
        })
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn name(&self) -> &'static str {
        self.role.as_str()
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn y_err(&self) -> &[f64] {
        &self.y_err
    }

    pub fn concentrations(&self) -> &[f64] {
        &self.concentrations
    }

    pub fn shot_size(&self) -> &[f64] {
        &self.shot_size
    }

    pub fn raw_x(&self) -> &[f64] {
        &self.raw_x
    }

    pub fn raw_signal(&self) -> &[f64] {
        &self.raw_signal
    }

    pub fn raw_err(&self) -> &[f64] {
        &self.raw_err
    }

    pub fn series(&self, series: Series) -> Option<&[f64]> {
        match series {
            Series::X => Some(&self.x),
            Series::Y => Some(&self.y),
            Series::YErr => Some(&self.y_err),
            Series::RawX => Some(&self.raw_x),
            Series::RawSignal => Some(&self.raw_signal),
            Series::RawErr => Some(&self.raw_err),
            other => self.snapshots.get(&other).map(Vec::as_slice),
        }
    }

    pub fn correction_log(&self) -> &[CorrectionRecord] {
        &self.log
    }

    /// `y = (y - dark) / qc`.
    pub fn correct_dark_qc(&mut self) -> AvivResult<String> {
        let role = self.role;
        let corrected = self
            .y
            .iter()
            .zip(&self.dark_signal)
            .zip(&self.qc_signal)
            .enumerate()
            .map(|(index, ((signal, dark), qc))| {
                checked_div(signal - dark, *qc, "ARITH.QC_SIGNAL", || {
                    format!("correcting {} point {} for the quantum counter", role, index)
                })
            })
            .collect::<AvivResult<Vec<_>>>()?;

        self.replace_y(Series::QcCorrected, corrected);
        Ok(self.record(CorrectionStep::DarkQc, "Corrected with QC and dark signals\n".to_string()))
    }

    /// Removes the buffer blank plus the titrant contribution scaled by how
    /// much titrant each point contains.
    pub fn correct_titrant_blanks(&mut self, buffer_blank: f64, titrant_blank: f64) -> String {
        let titrant_signal = titrant_blank - buffer_blank;
        let corrected = self
            .y
            .iter()
            .zip(&self.concentrations)
            .map(|(signal, conc)| signal - buffer_blank - titrant_signal * (1.0 - conc))
            .collect();
        self.replace_y(Series::TitrantBlankCorrected, corrected);

        let mut log = String::from("Titrant Blank Correction:\n");
        let _ = writeln!(log, "    Buffer blank: {buffer_blank:.3}");
        let _ = writeln!(log, "    Titrant blank: {titrant_blank:.3}");
        self.record(CorrectionStep::TitrantBlanks, log)
    }

    /// `y = y / concentration`.
    pub fn correct_dilution(&mut self) -> AvivResult<String> {
        let role = self.role;
        let corrected = self
            .y
            .iter()
            .zip(&self.concentrations)
            .enumerate()
            .map(|(index, (signal, conc))| {
                checked_div(*signal, *conc, "ARITH.DILUTION", || {
                    format!("correcting {} point {} for dilution", role, index)
                })
            })
            .collect::<AvivResult<Vec<_>>>()?;

        self.replace_y(Series::DilutionCorrected, corrected);
        Ok(self.record(CorrectionStep::Dilution, "Corrected signal for dilution\n".to_string()))
    }

    /// Rebuilds the titrant axis from the injection volumes using
    /// caller overrides where given and instrument-reported values otherwise.
    /// Leaves `x` alone when nothing differs from the instrument.
    pub fn correct_denaturant(
        &mut self,
        reported: DenaturantValues,
        overrides: DenaturantValues,
    ) -> AvivResult<String> {
        if overrides.is_empty() || overrides == reported {
            self.snapshots.insert(Series::DenaturantX, self.x.clone());
            return Ok(self.record(CorrectionStep::Denaturant, String::new()));
        }

        let pick = |value: Option<f64>, fallback: Option<f64>, name: &str| {
            value.or(fallback).ok_or_else(|| {
                AvivError::format(
                    "FORMAT.MISSING_DENATURANT_DEFAULT",
                    format!("{} was not supplied and the instrument file does not report it", name),
                )
            })
        };
        let initial = pick(overrides.initial_conc, reported.initial_conc, "initial titrant concentration")?;
        let stock = pick(overrides.titrant_conc, reported.titrant_conc, "titrant concentration")?;
        let volume = pick(overrides.cell_volume, reported.cell_volume, "cell volume")?;

        let mut titrant = Vec::with_capacity(self.shot_size.len());
        titrant.push(initial);
        for index in 1..self.shot_size.len() {
            let shot = self.shot_size[index] / 1000.0;
            let retained = checked_div(titrant[index - 1] * (volume - shot), volume, "ARITH.CELL_VOLUME", || {
                "recomputing titrant concentration".to_string()
            })?;
            titrant.push(retained + shot * stock / volume);
        }

        self.x = titrant.clone();
        self.snapshots.insert(Series::DenaturantX, titrant);

        let shown = |value: Option<f64>| value.map_or_else(|| "NA".to_string(), |value| format!("{value:.3}"));
        let mut log = String::from("Denaturant Correction:\n");
        let _ = writeln!(log, "  Initial concentration: {} --> {initial:.3}", shown(reported.initial_conc));
        let _ = writeln!(log, "  Titrant concentration: {} --> {stock:.3}", shown(reported.titrant_conc));
        let _ = writeln!(log, "  Cell volume:           {} --> {volume:.3}", shown(reported.cell_volume));
        Ok(self.record(CorrectionStep::Denaturant, log))
    }

    /// Subtracts a blank trace whose x-axis must match this channel's raw
    /// x-axis exactly.
    pub fn subtract_blank(&mut self, blank: Option<&BlankReference>) -> AvivResult<String> {
        let Some(blank) = blank else {
            self.snapshots.insert(Series::Blanked, self.y.clone());
            return Ok(self.record(CorrectionStep::BlankFile, "No blank correction done!\n".to_string()));
        };

        if blank.raw_x != self.raw_x {
            return Err(AvivError::format(
                "FORMAT.BLANK_MISMATCH",
                format!(
                    "blank file '{}' and input file do not match ({} vs {} x values)",
                    blank.source.display(),
                    blank.raw_x.len(),
                    self.raw_x.len()
                ),
            ));
        }

        let blanked = self
            .y
            .iter()
            .zip(&blank.raw_signal)
            .map(|(signal, background)| signal - background)
            .collect();
        self.replace_y(Series::Blanked, blanked);
        Ok(self.record(
            CorrectionStep::BlankFile,
            format!("Removed blank (\"{}\")\n", blank.source.display()),
        ))
    }

    /// Converts signal and error to mean molar ellipticity.
    pub fn convert_to_mme(&mut self, protein: &ProteinProperties) -> AvivResult<String> {
        let factor = checked_div(
            100.0 * protein.molec_weight,
            protein.path_length * protein.protein_conc * protein.num_residues as f64,
            "ARITH.MME_FACTOR",
            || "computing the molar ellipticity factor".to_string(),
        )?;

        let mme: Vec<f64> = self.y.iter().map(|value| value * factor).collect();
        let mme_err: Vec<f64> = self.y_err.iter().map(|value| value * factor).collect();
        self.replace_y(Series::Mme, mme);
        self.replace_y_err(Series::MmeErr, mme_err);

        let mut log = String::from("MME conversion:\n");
        let _ = writeln!(log, "  Initial concentration (ug/mL): {:8.3}", protein.protein_conc);
        let _ = writeln!(log, "  Number of residues:            {:8}", protein.num_residues);
        let _ = writeln!(log, "  Molecular weight (Da):         {:8}", protein.molec_weight.trunc() as i64);
        let _ = writeln!(log, "  Path length (cm):              {:8.3}", protein.path_length);
        Ok(self.record(CorrectionStep::MolarEllipticity, log))
    }

    /// Scales `y` onto [0, 1], optionally reflecting it. The propagated error
    /// divides by the pre-normalization signal, so a point with zero signal
    /// fails the run.
    pub fn normalize(&mut self, invert: bool) -> AvivResult<String> {
        let minimum = self.y.iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = self.y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = maximum - minimum;
        let role = self.role;

        let mut normalized = self
            .y
            .iter()
            .map(|value| {
                checked_div(value - minimum, range, "ARITH.NORMALIZE_RANGE", || {
                    format!("normalizing channel {} with a flat signal", role)
                })
            })
            .collect::<AvivResult<Vec<_>>>()?;

        if invert {
            let top = normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            for value in &mut normalized {
                *value = top - *value;
            }
        }

        let normalized_err = self
            .y_err
            .iter()
            .zip(&normalized)
            .zip(&self.y)
            .enumerate()
            .map(|(index, ((err, norm), original))| {
                checked_div(err * norm, *original, "ARITH.NORMALIZE_ERROR", || {
                    format!("propagating error for channel {} point {} (signal is zero)", role, index)
                })
            })
            .collect::<AvivResult<Vec<_>>>()?;

        self.replace_y(Series::Normalized, normalized);
        self.replace_y_err(Series::NormalizedErr, normalized_err);

        let log = if invert {
            "Normalized signal to [0, 1], inverted\n"
        } else {
            "Normalized signal to [0, 1]\n"
        };
        Ok(self.record(CorrectionStep::Normalize, log.to_string()))
    }

    fn replace_y(&mut self, snapshot: Series, values: Vec<f64>) {
        self.y = values.clone();
        self.snapshots.insert(snapshot, values);
    }

    fn replace_y_err(&mut self, snapshot: Series, values: Vec<f64>) {
        self.y_err = values.clone();
        self.snapshots.insert(snapshot, values);
    }

    fn record(&mut self, step: CorrectionStep, log: String) -> String {
        self.log.push(CorrectionRecord {
            step,
            log: log.clone(),
        });
        log
    }
}
